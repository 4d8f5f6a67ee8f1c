use axum::{
    Json,
    extract::{Extension, State},
};
use axum_extra::extract::{CookieJar, WithRejection};

use crate::{
    AppState,
    database::{
        models::PublicUser,
        repositories::{NewUser, UserRepository},
    },
    error::AppError,
    middleware::{CurrentUser, SESSION_COOKIE, clear_session_cookie, session_cookie},
    utils::{
        ApiResponse, hash_password_blocking, message_to_api_response, success_to_api_response,
        success_with_message, verify_password_blocking,
    },
};

use super::model::{LoginRequest, RegisterRequest};

#[axum::debug_handler]
pub async fn register(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<RegisterRequest>, AppError>,
) -> Result<Json<ApiResponse<PublicUser>>, AppError> {
    let valid = req.validate()?;
    let password_hash = hash_password_blocking(valid.password, state.config.bcrypt_cost).await?;

    // 注册接口只能创建普通用户
    let user = UserRepository::create(
        &state.store,
        NewUser {
            username: valid.username,
            email: valid.email,
            password_hash,
            is_admin: false,
        },
    )
    .await?;

    Ok(success_with_message("user registered", PublicUser::from(&user)))
}

#[axum::debug_handler]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    WithRejection(Json(req), _): WithRejection<Json<LoginRequest>, AppError>,
) -> Result<(CookieJar, Json<ApiResponse<PublicUser>>), AppError> {
    let (username, password) = req.validate()?;

    // 登录前先作废旧会话
    if let Some(old) = jar.get(SESSION_COOKIE) {
        state.sessions.destroy(old.value()).await;
    }

    let user = UserRepository::find_by_username(&state.store, &username).await?;

    // 用户不存在时也做一次 bcrypt 校验，两种失败的耗时一致
    let (hash, user) = match user {
        Some(user) => (user.password_hash.clone(), Some(user)),
        None => (state.dummy_hash.as_ref().clone(), None),
    };
    let verified = verify_password_blocking(password, hash).await;

    let user = match user {
        Some(user) if verified => user,
        _ => {
            tracing::warn!(username = %username, "login failed");
            return Err(AppError::InvalidCredentials);
        }
    };

    let token = state.sessions.create(user.id, user.is_admin).await?;
    tracing::info!(user_id = user.id, "user logged in");

    let jar = jar.add(session_cookie(token, state.config.production));
    Ok((jar, success_to_api_response(PublicUser::from(&user))))
}

/// 无论是否已登录都返回成功并清除 cookie
#[axum::debug_handler]
pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> (CookieJar, Json<ApiResponse<()>>) {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        state.sessions.destroy(cookie.value()).await;
    }
    (
        jar.remove(clear_session_cookie()),
        message_to_api_response("logged out"),
    )
}

#[axum::debug_handler]
pub async fn me(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<PublicUser>>, AppError> {
    // 会话还在但用户已不存在，按未登录处理
    let user = UserRepository::find_by_id(&state.store, current.user_id)
        .await?
        .ok_or(AppError::Unauthenticated)?;
    Ok(success_to_api_response(PublicUser::from(&user)))
}
