pub mod app;
pub mod config;

use std::process::ExitCode;

use config::NestConfig;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

static DEFAULT_CONFIG: &str = "nest.yaml";

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "nest=debug,nest_server=debug,nest_video=info,tower_http=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg_name = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG.to_owned());

    let config = match NestConfig::load(&cfg_name) {
        Ok(config) => config,
        Err(err) => {
            error!("failed to load config from {cfg_name}: {err}");
            return ExitCode::FAILURE;
        }
    };

    info!("nest starting up!");
    if let Some(ref name) = config.metadata.name {
        info!("name: {name}")
    }
    if let Some(ref descrip) = config.metadata.description {
        info!("description: {descrip}")
    }

    match app::run(config).await {
        Ok(()) => {
            info!("nest shut down!");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("nest exited with an error: {err}");
            ExitCode::FAILURE
        }
    }
}
