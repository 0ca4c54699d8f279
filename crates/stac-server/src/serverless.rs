//! Request-per-invocation entry point.
//!
//! The adapter is compiled in with the `lambda` feature. Without it,
//! [`create_handler`] returns [`Handler::Disabled`] and running it reports a
//! serverless error instead of failing at construction.

use axum::Router;

use crate::error::Error;

/// A serverless handler for the assembled router.
pub enum Handler {
    /// Built without serverless support.
    Disabled,
    /// Serves invocations through the Lambda runtime.
    #[cfg(feature = "lambda")]
    Lambda(Router),
}

/// Wrap `router` for the serverless runtime.
pub fn create_handler(router: Router) -> Handler {
    #[cfg(feature = "lambda")]
    {
        Handler::Lambda(router)
    }

    #[cfg(not(feature = "lambda"))]
    {
        drop(router);
        tracing::warn!("serverless adapter not compiled in, handler is disabled");
        Handler::Disabled
    }
}

impl Handler {
    /// Whether invocations can be served.
    pub fn is_enabled(&self) -> bool {
        !matches!(self, Handler::Disabled)
    }

    /// Serve invocations until the runtime stops.
    pub async fn run(self) -> Result<(), Error> {
        match self {
            Handler::Disabled => Err(Error::Serverless(
                "serverless adapter is disabled; rebuild with the `lambda` feature".to_string(),
            )),
            #[cfg(feature = "lambda")]
            Handler::Lambda(router) => lambda_http::run(router)
                .await
                .map_err(|err| Error::Serverless(err.to_string())),
        }
    }
}

impl std::fmt::Debug for Handler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Handler::Disabled => f.write_str("Handler::Disabled"),
            #[cfg(feature = "lambda")]
            Handler::Lambda(_) => f.write_str("Handler::Lambda"),
        }
    }
}

#[cfg(all(test, not(feature = "lambda")))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_without_feature() {
        let handler = create_handler(Router::new());
        assert!(!handler.is_enabled());
        let err = handler.run().await.unwrap_err();
        assert!(matches!(err, Error::Serverless(_)));
        assert_eq!(err.exit_code(), 1);
    }
}
