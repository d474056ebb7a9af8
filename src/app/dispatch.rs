use crate::cli::commands::Commands;
use anyhow::Result;
use callgate::Config;
use callgate::origin;
use tracing::info;

pub async fn dispatch(command: Commands, config: Config) -> Result<()> {
    match command {
        Commands::Serve { port, host } => {
            let port = port.unwrap_or(config.gateway.port);
            let host = host.unwrap_or_else(|| config.gateway.host.clone());
            if port == 0 {
                info!("Starting callgate on {host} (random port)");
            } else {
                info!("Starting callgate on {host}:{port}");
            }
            callgate::gateway::run_gateway(&host, port, config).await
        }

        Commands::CheckOrigin { origin: request_origin } => {
            let policy = config.origin_policy();
            let decision = origin::evaluate(request_origin.as_deref(), &policy);
            println!("mode: {}", policy.mode_label());
            println!("{}", serde_json::to_string_pretty(&decision)?);
            Ok(())
        }
    }
}
