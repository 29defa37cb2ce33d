use clap::Parser;
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use deployments::DeploymentStore;
use higher_lower::{
    client,
    config::{
        self,
        AppConfig,
        Args,
    },
};
use std::path::Path;
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling,
};
use tracing_subscriber::{
    EnvFilter,
    fmt,
};

const LOG_FILE_PREFIX: &str = "higher-lower.log";

/// The terminal belongs to the UI, so logs go to a daily rolling file.
fn init_tracing(log_dir: &Path) -> Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)
        .wrap_err_with(|| format!("Failed to create log directory {}", log_dir.display()))?;
    let appender = rolling::daily(log_dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
        .map_err(|e| eyre!("Failed to install tracing subscriber: {e}"))?;
    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();
    let _guard = init_tracing(&args.log_dir)?;
    tracing::info!("starting higher-lower client");

    deployments::ensure_structure().map_err(|e| eyre!(e))?;
    let store = DeploymentStore::new(args.network().deployment_env()).map_err(|e| eyre!(e))?;
    let current_height = if args.remember {
        Some(config::current_block_height(&args.network()).await?)
    } else {
        None
    };
    let app_config = AppConfig::new(&args, &store, current_height)?;
    client::run_app(app_config).await
}
