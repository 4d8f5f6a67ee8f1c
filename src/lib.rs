use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    handler::Handler,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use cache::SessionManager;
use config::Config;
use database::RecordStore;
use error::AppError;
use middleware::{
    RateLimiter, log_errors, rate_limit, require_admin, require_auth, resolve_session,
    security_headers,
};

pub mod cache;
pub mod config;
pub mod database;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod utils;

/// 请求体上限
const MAX_BODY_BYTES: usize = 64 * 1024;

/// 未知用户登录时用来校验的占位密码，保证两种失败耗时一致
const DUMMY_PASSWORD: &str = "dummy-password-for-timing";

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<RecordStore>,
    pub sessions: Arc<SessionManager>,
    pub rate_limiter: Arc<RateLimiter>,
    pub dummy_hash: Arc<String>,
}

impl AppState {
    pub async fn from_config(config: Config) -> Result<Self, AppError> {
        let sessions = SessionManager::from_config(&config)
            .map_err(|e| AppError::Internal(format!("session store: {}", e)))?;
        Self::with_sessions(config, sessions).await
    }

    pub async fn with_sessions(config: Config, sessions: SessionManager) -> Result<Self, AppError> {
        let dummy_hash =
            utils::hash_password_blocking(DUMMY_PASSWORD.to_string(), config.bcrypt_cost).await?;
        Ok(Self {
            store: Arc::new(RecordStore::new(config.data_file.clone())),
            sessions: Arc::new(sessions),
            rate_limiter: Arc::new(RateLimiter::from_config(&config)),
            dummy_hash: Arc::new(dummy_hash),
            config: Arc::new(config),
        })
    }
}

async fn not_found() -> AppError {
    AppError::NotFound
}

/// 请求依次经过：安全头 → 限流 → 会话解析 → 守卫 → handler。
/// 安全头在最外层，429 响应也会带上。
pub fn build_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(routes::health))
        .route("/register", post(routes::user::register))
        .route("/login", post(routes::user::login))
        .route("/logout", post(routes::user::logout));

    let protected_routes = Router::new()
        .route("/me", get(routes::user::me))
        .route(
            "/students",
            get(routes::student::list_students).post(routes::student::create_student),
        )
        .route("/students/search", get(routes::student::search_students))
        .route(
            "/student/{id}",
            get(routes::student::get_student)
                .put(routes::student::update_student)
                .delete(routes::student::delete_student.layer(from_fn(require_admin))),
        )
        .route(
            "/export",
            get(routes::student::export_students.layer(from_fn(require_admin))),
        )
        .route_layer(from_fn(require_auth));

    Router::new()
        .nest("/api", public_routes.merge(protected_routes))
        .fallback(not_found)
        .layer(from_fn_with_state(state.clone(), resolve_session))
        .layer(from_fn(log_errors))
        .layer(from_fn_with_state(state.rate_limiter.clone(), rate_limit))
        .layer(from_fn_with_state(state.clone(), security_headers))
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}
