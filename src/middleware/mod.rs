mod auth;
mod error_handler;
mod rate_limit;
mod security_headers;

pub use auth::{
    CurrentUser, SESSION_COOKIE, clear_session_cookie, require_admin, require_auth,
    resolve_session, session_cookie,
};
pub use error_handler::log_errors;
pub use rate_limit::{RateLimiter, rate_limit};
pub use security_headers::security_headers;
