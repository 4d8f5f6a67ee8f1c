use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

use crate::{AppState, error::AppError};

/// 会话 cookie 名
pub const SESSION_COOKIE: &str = "sid";

/// 已登录用户，由 resolve_session 放入请求扩展
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentUser {
    pub user_id: u64,
    pub is_admin: bool,
}

/// HttpOnly，生产环境下加 Secure
pub fn session_cookie(token: String, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Strict)
        .build()
}

pub fn clear_session_cookie() -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, "")).path("/").build()
}

/// 从 cookie 解析会话，成功则注入 CurrentUser。本身不拒绝任何请求。
pub async fn resolve_session(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let jar = CookieJar::from_headers(req.headers());
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        match state.sessions.resolve(cookie.value()).await {
            Some(session) => {
                req.extensions_mut().insert(CurrentUser {
                    user_id: session.user_id,
                    is_admin: session.is_admin,
                });
            }
            None => tracing::debug!("session cookie present but not resolvable"),
        }
    }
    next.run(req).await
}

pub async fn require_auth(req: Request<Body>, next: Next) -> Result<Response, AppError> {
    if req.extensions().get::<CurrentUser>().is_none() {
        return Err(AppError::Unauthenticated);
    }
    Ok(next.run(req).await)
}

/// 必须放在 require_auth 之后
pub async fn require_admin(req: Request<Body>, next: Next) -> Result<Response, AppError> {
    let user = req
        .extensions()
        .get::<CurrentUser>()
        .copied()
        .ok_or(AppError::Unauthenticated)?;
    if !user.is_admin {
        tracing::warn!(
            user_id = user.user_id,
            path = %req.uri().path(),
            "admin route denied"
        );
        return Err(AppError::Forbidden);
    }
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_cookie_is_not_script_readable() {
        let dev = session_cookie("abc".into(), false).to_string();
        assert!(dev.contains("sid=abc"));
        assert!(dev.contains("HttpOnly"));
        assert!(dev.contains("SameSite=Strict"));
        assert!(!dev.contains("Secure"));

        let prod = session_cookie("abc".into(), true).to_string();
        assert!(prod.contains("Secure"));
    }
}
