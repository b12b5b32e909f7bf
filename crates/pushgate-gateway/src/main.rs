//! Gateway client entry point
//!
//! Run with:
//! ```bash
//! GATEWAY_TOKEN=... cargo run -p pushgate-gateway
//! ```
//!
//! Configuration is loaded from environment variables.

use pushgate_common::{try_init_tracing_with_config, AppConfig, AppError, TracingConfig};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!(error = %e, code = e.error_code(), "Gateway client failed");
        std::process::exit(e.exit_code());
    }
}

async fn run() -> Result<(), AppError> {
    let config = AppConfig::from_env().map_err(|e| {
        eprintln!("Failed to load configuration: {e}");
        e
    })?;

    if let Err(e) = try_init_tracing_with_config(
        TracingConfig::for_environment(config.app.env).with_frame_tracing(config.app.log_frames),
    ) {
        eprintln!("Warning: Failed to initialize tracing: {e}");
    }

    info!(
        env = ?config.app.env,
        intents = %config.gateway.intents,
        "Starting pushgate..."
    );

    pushgate_gateway::run(config).await
}
