//! STAC API HTTP service.
//!
//! [`assemble`] wires a base data-access client with capability extensions
//! into a [`ServiceHandle`]. Assembly performs no I/O; the schema gate runs as
//! a [`StartupHook`] when the handle is served, before the listener accepts
//! connections.

pub mod app;
pub mod config;
pub mod error;
pub mod hooks;
pub mod routes;
pub mod serverless;

pub use config::{Args, Settings};
pub use error::{AppError, Error};
pub use hooks::{MigrationCheck, MigrationSource, StartupHook};

use std::collections::HashSet;
use std::sync::Arc;

use axum::Router;
use stac_core::client::{
    compose, compose_routes, BaseClient, ComposedClient, Extension, RouteTable,
};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Application state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    /// Base client with extensions wired in.
    pub client: ComposedClient,
    /// Service settings.
    pub settings: Arc<Settings>,
    /// Conformance classes of the core API and every extension.
    pub conformance: Arc<Vec<String>>,
}

/// A fully assembled service, ready to be checked and served.
pub struct ServiceHandle {
    settings: Arc<Settings>,
    client: ComposedClient,
    extensions: Vec<Arc<dyn Extension>>,
    routes: RouteTable,
    conformance: Arc<Vec<String>>,
    hooks: Vec<Arc<dyn StartupHook>>,
}

/// Compose `base` with `extensions` and build the service.
///
/// Fails with [`Error::Config`] on invalid settings or duplicate extension
/// names.
pub fn assemble(
    settings: Settings,
    base: BaseClient,
    extensions: Vec<Arc<dyn Extension>>,
) -> Result<ServiceHandle, Error> {
    settings.validate()?;

    let mut names = HashSet::new();
    for extension in &extensions {
        if !names.insert(extension.name()) {
            return Err(Error::Config(format!(
                "extension {} is registered more than once",
                extension.name()
            )));
        }
    }

    let client = compose(base, &extensions);
    let routes = compose_routes(&extensions);

    let mut conformance: Vec<String> = routes::catalog::CORE_CONFORMANCE
        .iter()
        .map(|class| class.to_string())
        .collect();
    for extension in &extensions {
        for class in extension.conformance_classes() {
            if !conformance.contains(&class) {
                conformance.push(class);
            }
        }
    }

    info!(
        extensions = ?extensions.iter().map(|e| e.name()).collect::<Vec<_>>(),
        routes = routes.len(),
        wiring = ?client.wiring(),
        "assembled service"
    );

    Ok(ServiceHandle {
        settings: Arc::new(settings),
        client,
        extensions,
        routes,
        conformance: Arc::new(conformance),
        hooks: Vec::new(),
    })
}

impl ServiceHandle {
    /// Run `hook` before serving. Hooks run in registration order.
    pub fn with_startup_hook(mut self, hook: Arc<dyn StartupHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Service settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// The composed client.
    pub fn client(&self) -> &ComposedClient {
        &self.client
    }

    /// Resolved routes.
    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Advertised conformance classes.
    pub fn conformance(&self) -> &[String] {
        &self.conformance
    }

    /// Names of the composed extensions, in composition order.
    pub fn extension_names(&self) -> Vec<&str> {
        self.extensions.iter().map(|e| e.name()).collect()
    }

    /// Build the HTTP router.
    pub fn router(&self) -> Router {
        let state = AppState {
            client: self.client.clone(),
            settings: Arc::clone(&self.settings),
            conformance: Arc::clone(&self.conformance),
        };

        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        routes::routes(&self.routes)
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(cors),
            )
            .with_state(state)
    }

    /// Run every startup hook, stopping at the first failure.
    pub async fn run_startup_hooks(&self) -> Result<(), Error> {
        for hook in &self.hooks {
            info!(hook = hook.name(), "running startup hook");
            hook.on_startup().await?;
        }
        Ok(())
    }

    /// Run the startup hooks, then serve until Ctrl-C or SIGTERM.
    pub async fn serve(self) -> Result<(), Error> {
        self.run_startup_hooks().await?;

        if self.settings.reload {
            warn!("reload requested but not supported by this runtime, serving without it");
        }

        let addr = self.settings.listen_addr();
        let listener = TcpListener::bind(&addr).await?;
        info!("STAC API listening on {}", addr);

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("STAC API stopped");
        Ok(())
    }
}

impl std::fmt::Debug for ServiceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceHandle")
            .field("settings", &self.settings)
            .field("extensions", &self.extension_names())
            .field("client", &self.client)
            .field("hooks", &self.hooks.iter().map(|h| h.name()).collect::<Vec<_>>())
            .finish()
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
