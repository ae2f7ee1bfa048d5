use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use legal_engine::TextGenerator;
use legal_runtime::{MockGenerator, QwenGenerator};
use legal_server::{run_server, AppState, Cli};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.server_config().context("invalid generation settings")?;

    let generator: Arc<dyn TextGenerator> = if cli.mock {
        tracing::warn!("serving mock generator; no model weights loaded");
        Arc::new(MockGenerator::new())
    } else {
        let options = cli.load_options();
        let generator = tokio::task::spawn_blocking(move || QwenGenerator::load(&options))
            .await
            .context("model loading task panicked")?
            .context("failed to load model")?;
        Arc::new(generator.with_telemetry(cli.telemetry()))
    };

    let addr = config.addr;
    let state = AppState::new(generator, config);
    run_server(state, addr).await?;
    Ok(())
}
