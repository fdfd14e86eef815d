use anyhow::Context;
use clap::Parser;

use scorecast::cli::Cli;
use scorecast::logging::init_logging;
use scorecast::server::ControlServer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.transcoder_log.as_deref()).context("failed to set up logging")?;

    let config = cli.server_config()?;
    tracing::info!(
        addr = %config.bind_addr,
        max_streams = config.registry.max_sessions,
        "Starting scorecast"
    );

    let server = ControlServer::new(config).context("failed to build control server")?;
    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
        })
        .await?;

    tracing::info!("Shut down cleanly");
    Ok(())
}
