//! STAC API server binary.

use std::process::ExitCode;

use clap::Parser;
use stac_server::{app, Args, Error};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_LOG_FILTER: &str = "stac_server=info,stac_pg=info,stac_core=info";

async fn run(args: Args) -> Result<(), Error> {
    let settings = args.into_settings()?;
    info!(
        listen = %settings.listen_addr(),
        database = %settings.pg.redacted_url(),
        reader = settings.pg.reader_host(),
        migrations = %settings.migrations_source(),
        target = %settings.migration_target,
        expected = %settings.migration_expected,
        "Starting STAC API"
    );

    app::build(settings)?.serve().await
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let args = Args::parse();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, exit_code = err.exit_code(), "STAC API failed");
            ExitCode::from(err.exit_code())
        }
    }
}
