//! # Trellis HTTP API Module
//!
//! This module serves resources over HTTP using axum.
//!
//! ## Endpoints
//!
//! - `GET /health` - Health check
//! - `GET /` - Root resource
//! - `GET /{path}` - Resource whose link path is `{path}`
//! - `POST /{path}` - Submit a JSON object of values to a resource
//!
//! The query string of a resource request is used both as lookup conditions
//! and as the source of meta and state values.
//!
//! ## Security Configuration (Environment Variables)
//!
//! - `TRELLIS_CORS_ORIGINS`: Comma-separated list of allowed origins, or "*" for all (default: localhost only)
//! - `TRELLIS_RATE_LIMIT`: Requests per second (default: 100, 0 to disable)
//! - `TRELLIS_API_KEY`: If set, requires Bearer token authentication

mod auth;
mod handlers;
mod middleware;
mod types;

pub use auth::get_api_key_from_env;
pub use handlers::{
    health_handler, parse_body, resource_get_handler, resource_post_handler, root_handler,
};
pub use middleware::{create_rate_limiter, get_rate_limit_from_env};
pub use types::{ErrorResponse, HealthResponse};

use crate::definitions::Definitions;
use crate::shop;
use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::get,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use trellis_core::{
    CallInput, ClassRegistry, Conditions, Engine, EngineBuilder, Journal, PlainObject, Record,
    Response, SharedStore, TrellisError, Value, Verb,
};

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state: the engine and the link path of every class.
#[derive(Clone)]
pub struct AppState {
    engine: Arc<Engine<()>>,
    routes: Arc<BTreeMap<String, String>>,
}

impl AppState {
    /// Build the engine for `definitions`.
    ///
    /// Classes without an application object are served by `PlainObject`.
    pub fn new(definitions: Definitions, store: Arc<dyn SharedStore>, journal: Arc<dyn Journal>) -> Self {
        let mut classes = ClassRegistry::new();
        shop::register(&mut classes);
        let declared: Vec<String> = definitions.classes().map(str::to_string).collect();
        for class in &declared {
            if !classes.contains(class) {
                tracing::debug!(class = %class, "serving class with plain object");
                classes.register_default::<PlainObject>(class.clone());
            }
        }

        let Definitions {
            config,
            catalog,
            types,
        } = definitions;
        let engine = EngineBuilder::new(config, Arc::new(catalog), classes, ())
            .store(store)
            .journal(journal)
            .types(types)
            .build();

        let routes = declared
            .into_iter()
            .map(|class| (engine.links().path(&class), class))
            .collect();

        Self {
            engine: Arc::new(engine),
            routes: Arc::new(routes),
        }
    }

    #[must_use]
    pub fn engine(&self) -> &Engine<()> {
        &self.engine
    }

    /// Class served at `path`. `None` is the root resource.
    pub fn class_for(&self, path: &str) -> Result<Option<&str>, TrellisError> {
        let full = format!("/{}", path.trim_start_matches('/'));
        let relative = full
            .strip_prefix(self.engine.links().base_path())
            .unwrap_or(&full)
            .trim_matches('/');
        if relative.is_empty() {
            return Ok(None);
        }
        self.routes
            .get(relative)
            .map(|class| Some(class.as_str()))
            .ok_or_else(|| TrellisError::NotFound(format!("Resource {} not found.", relative)))
    }

    /// Run one call against the resource at `path`.
    pub fn call(
        &self,
        verb: Verb,
        path: &str,
        query: BTreeMap<String, String>,
        values: Record,
    ) -> Result<Response, TrellisError> {
        let conditions: Conditions = query
            .iter()
            .map(|(k, v)| (k.clone(), Value::from(v.as_str())))
            .collect();
        let query: Record = query.into_iter().map(|(k, v)| (k, Value::from(v))).collect();

        let processor = match self.class_for(path)? {
            None => self.engine.create_root_resource(verb, conditions)?,
            Some(class) => self.engine.create_resource(class, verb, conditions)?,
        };
        tracing::debug!(class = processor.class(), method = processor.method(), "calling resource");
        processor.call(CallInput::new(values, query))
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

/// Build CORS layer from environment configuration.
///
/// Reads `TRELLIS_CORS_ORIGINS` environment variable:
/// - If "*": allows all origins (development mode - use with caution!)
/// - If not set: defaults to localhost only (restrictive default)
/// - Otherwise: parses comma-separated list of allowed origins
fn build_cors_layer() -> CorsLayer {
    let origins_env = std::env::var("TRELLIS_CORS_ORIGINS").ok();

    match origins_env.as_deref() {
        Some("*") => {
            tracing::warn!(
                "CORS: Allowing ALL origins (TRELLIS_CORS_ORIGINS=*). This is insecure for production!"
            );
            CorsLayer::permissive().expose_headers([header::LOCATION, header::ETAG])
        }
        Some(origins) => {
            let allowed_origins: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|s| {
                    let trimmed = s.trim();
                    match trimmed.parse::<HeaderValue>() {
                        Ok(hv) => {
                            tracing::info!("CORS: Allowing origin: {}", trimmed);
                            Some(hv)
                        }
                        Err(e) => {
                            tracing::warn!("CORS: Invalid origin '{}': {}", trimmed, e);
                            None
                        }
                    }
                })
                .collect();

            if allowed_origins.is_empty() {
                tracing::warn!(
                    "CORS: No valid origins in TRELLIS_CORS_ORIGINS, defaulting to localhost only"
                );
                build_localhost_cors()
            } else {
                restricted_cors(allowed_origins)
            }
        }
        None => {
            tracing::info!("CORS: No TRELLIS_CORS_ORIGINS set, defaulting to localhost only");
            build_localhost_cors()
        }
    }
}

/// Build a restrictive CORS layer that only allows localhost origins.
fn build_localhost_cors() -> CorsLayer {
    let origins: Vec<HeaderValue> = [
        "http://localhost:3000",
        "http://localhost:8080",
        "http://127.0.0.1:3000",
        "http://127.0.0.1:8080",
    ]
    .iter()
    .filter_map(|o| o.parse::<HeaderValue>().ok())
    .collect();
    restricted_cors(origins)
}

fn restricted_cors(origins: Vec<HeaderValue>) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .expose_headers([header::LOCATION, header::ETAG])
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Create the axum router with all endpoints and middleware.
///
/// Middleware stack (outer to inner):
/// 1. Tracing - logs all requests
/// 2. CORS - handles preflight requests
/// 3. Rate Limiting - protects against DoS (if enabled)
/// 4. Authentication - validates API key (if configured)
pub fn create_router(state: AppState) -> Router {
    let rate_limit = get_rate_limit_from_env();
    let rate_limiter = if rate_limit > 0 {
        tracing::info!("Rate limiting enabled: {} requests/second", rate_limit);
        Some(create_rate_limiter(rate_limit))
    } else {
        tracing::info!("Rate limiting disabled");
        None
    };

    let has_auth = get_api_key_from_env().is_some();
    if has_auth {
        tracing::info!("API key authentication enabled");
    } else {
        tracing::warn!(
            "API key authentication DISABLED - all resources are publicly accessible! \
             Set TRELLIS_API_KEY environment variable to enable authentication."
        );
    }

    let mut router = Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/", get(handlers::root_handler))
        .route(
            "/{*path}",
            get(handlers::resource_get_handler).post(handlers::resource_post_handler),
        );

    if has_auth {
        router = router.layer(axum_middleware::from_fn(auth::api_key_auth_middleware));
    }

    if let Some(limiter) = rate_limiter {
        router = router.layer(axum_middleware::from_fn_with_state(
            limiter,
            middleware::rate_limit_middleware,
        ));
    }

    router
        .layer(axum::extract::DefaultBodyLimit::max(2 * 1024 * 1024))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(build_cors_layer()),
        )
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Start the HTTP server.
pub async fn run_server(addr: &str, state: AppState) -> Result<(), TrellisError> {
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| TrellisError::Configuration(format!("Bind failed: {}", e)))?;

    tracing::info!("Trellis HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| TrellisError::Internal(format!("Server error: {}", e)))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
