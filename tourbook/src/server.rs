//! HTTP server with graceful shutdown

use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::{
    catch_panic::CatchPanicLayer,
    compression::CompressionLayer,
    cors::CorsLayer,
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};

use crate::{
    config::{Config, MiddlewareConfig},
    error::Result,
    middleware::{
        apply_security_headers, request_id_layer, request_id_propagation_layer,
        sensitive_headers_layer,
    },
};

/// Server instance
pub struct Server {
    config: Config,
}

impl Server {
    /// Create a new server instance
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run the server with the given router until Ctrl-C or SIGTERM
    pub async fn serve(self, app: Router) -> Result<()> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.service.port));
        tracing::info!("Starting {} on {}", self.config.service.name, addr);
        self.log_middleware_config();

        let app = apply_layers(app, &self.config);
        let listener = TcpListener::bind(&addr).await?;
        tracing::info!("Server listening on {}", addr);

        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }

    fn log_middleware_config(&self) {
        let middleware = &self.config.middleware;
        tracing::info!(
            environment = %self.config.service.environment,
            body_limit_kb = middleware.body_limit_kb,
            compression = middleware.compression,
            cors = %middleware.cors_mode,
            request_id = middleware.request_id,
            security_headers = middleware.security_headers,
            timeout_secs = self.config.service.timeout_secs,
            "middleware configured"
        );
        if self.config.rate_limit.enabled {
            tracing::info!(
                max_requests = self.config.rate_limit.max_requests,
                window_secs = self.config.rate_limit.window_secs,
                trust_proxy = self.config.rate_limit.trust_proxy,
                "rate limiting /api"
            );
        } else {
            tracing::info!("rate limiting disabled");
        }
    }
}

/// Wrap `app` in the server-wide middleware stack
///
/// Outermost first: CORS, security headers, compression, timeout, body
/// limit, header masking, tracing, request id, panic recovery.
pub fn apply_layers(app: Router, config: &Config) -> Router {
    let middleware = &config.middleware;

    let mut app = app;
    if middleware.catch_panic {
        app = app.layer(CatchPanicLayer::new());
    }
    if middleware.request_id {
        app = app
            .layer(request_id_propagation_layer())
            .layer(request_id_layer());
    }
    app = app
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(true))
                .on_response(DefaultOnResponse::new().include_headers(true)),
        )
        .layer(sensitive_headers_layer())
        .layer(RequestBodyLimitLayer::new(middleware.body_limit_kb * 1024))
        .layer(TimeoutLayer::with_status_code(
            http::StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(config.service.timeout_secs),
        ));
    if middleware.compression {
        app = app.layer(CompressionLayer::new());
    }
    if middleware.security_headers {
        app = apply_security_headers(app, config.service.is_production());
    }
    match cors_layer(middleware) {
        Some(cors) => app.layer(cors),
        None => app,
    }
}

fn cors_layer(middleware: &MiddlewareConfig) -> Option<CorsLayer> {
    match middleware.cors_mode.as_str() {
        "permissive" => Some(CorsLayer::permissive()),
        "restrictive" => Some(CorsLayer::new()),
        "disabled" => None,
        other => {
            tracing::warn!("Unknown CORS mode: {}, defaulting to permissive", other);
            Some(CorsLayer::permissive())
        }
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl+C), starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }

    tracing::info!("Shutdown signal received, draining requests...");
}
