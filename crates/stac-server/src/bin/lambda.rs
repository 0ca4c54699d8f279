//! STAC API serverless binary.

use std::process::ExitCode;

use clap::Parser;
use stac_server::serverless::create_handler;
use stac_server::{app, Args, Error};
use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

async fn run() -> Result<(), Error> {
    // Settings come from the function environment.
    let settings = Args::parse().into_settings()?;
    let handle = app::build(settings)?;
    handle.run_startup_hooks().await?;
    create_handler(handle.router()).run().await
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().without_time())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "STAC API function failed");
            ExitCode::from(err.exit_code())
        }
    }
}
