use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{delete, get, patch, post},
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth::TokenService;
use crate::config::Config;
use crate::db::Store;

pub mod auth;
mod error;
pub mod todos;
mod validation;

pub use error::{ApiError, AuthCause};

pub struct AppState {
    pub config: Arc<Config>,

    pub store: Store,

    pub tokens: TokenService,

    /// Shared client for the change-feed passthrough. Reused so upstream
    /// connections are pooled.
    pub http: reqwest::Client,
}

fn build_shared_http_client() -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .user_agent("Tasker/1.0")
        .pool_max_idle_per_host(10)
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build shared HTTP client: {e}"))
}

pub async fn create_app_state(config: Config) -> anyhow::Result<Arc<AppState>> {
    let store = Store::new(&config.database_url).await?;
    store.ping().await?;

    let tokens = TokenService::new(&config);
    let http = build_shared_http_client()?;

    Ok(Arc::new(AppState {
        config: Arc::new(config),
        store,
        tokens,
        http,
    }))
}

pub fn router(state: Arc<AppState>) -> Router {
    // Login/registration reject requests that already carry an auth cookie.
    let guarded_routes = Router::new()
        .route("/auth/login", post(auth::login))
        .route("/auth/register", post(auth::register))
        .route_layer(middleware::from_fn(auth::reject_authenticated));

    let protected_routes = Router::new()
        .route("/auth/logout", post(auth::logout))
        .route("/auth/current-user", get(auth::current_user))
        .route("/api", get(todos::api_index))
        .route("/api/todos", get(todos::list_todos))
        .route("/api/todos", post(todos::create_todo))
        .route("/api/todos/shape", get(todos::shape_proxy))
        .route("/api/todos/{id}", get(todos::get_todo))
        .route("/api/todos/{id}", patch(todos::update_todo))
        .route("/api/todos/{id}", delete(todos::delete_todo))
        .route(
            "/api/todos/{id}/toggle-completed",
            patch(todos::toggle_completed),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::session_middleware,
        ));

    let cors_origins = &state.config.server.cors_allowed_origins;
    let cors_layer = if cors_origins.contains(&"*".to_string()) {
        // Wildcard cannot be combined with credentials.
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<HeaderValue> =
            cors_origins.iter().filter_map(|s| s.parse().ok()).collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::PATCH,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
            .allow_credentials(true)
            .max_age(Duration::from_secs(600))
    };

    Router::new()
        .route("/", get(root))
        .merge(guarded_routes)
        .merge(protected_routes)
        .with_state(state)
        .layer(cors_layer)
        .layer(TraceLayer::new_for_http())
}

async fn root() -> &'static str {
    "Tasker is running"
}
