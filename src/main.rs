use std::process::ExitCode;

use anyhow::Context;
use tracing::{error, info};

use jobvisor::{Coordinator, Settings, init_tracing};

#[tokio::main]
async fn main() -> ExitCode {
    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("configuration error ({}): {e}", e.as_label());
            return ExitCode::FAILURE;
        }
    };

    init_tracing(settings.log_level, settings.app_env);
    if settings.env_file_loaded {
        info!("loaded .env file");
    }

    match run(settings).await {
        Ok(()) => {
            info!("Scheduler application stopped.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("An error occurred: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(settings: Settings) -> anyhow::Result<()> {
    info!(env = %settings.app_env, "Starting the scheduler application...");

    let coordinator = Coordinator::new(settings.coordinator);
    coordinator
        .run()
        .await
        .context("coordinator exited with an error")
}
