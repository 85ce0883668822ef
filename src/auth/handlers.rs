//! 账户 API HTTP 处理器

use axum::{
    Extension, Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

use super::middleware::{AuthState, REFRESH_COOKIE_NAME};
use super::types::{
    LoginRequest, LoginResponse, RefreshResponse, RegisterRequest, RegisterResponse,
    UserDetailResponse,
};
use crate::error::ServiceError;
use crate::jwt::IssuedToken;
use crate::store::UserId;

/// 构造 HttpOnly 的 Refresh Token Cookie
fn refresh_cookie(issued: IssuedToken, secure: bool) -> Cookie<'static> {
    Cookie::build((REFRESH_COOKIE_NAME, issued.token))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::None)
        .max_age(time::Duration::seconds(
            i64::try_from(issued.expires_in).unwrap_or(i64::MAX),
        ))
        .path("/")
        .build()
}

/// POST /api/auth/registration/
pub async fn register(
    State(state): State<AuthState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<RegisterResponse>), ServiceError> {
    let Json(req) = payload?;
    let response = state.service.register(req).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// POST /api/auth/login/
///
/// 返回 Access Token，Refresh Token 写入 HttpOnly Cookie
pub async fn login(
    State(state): State<AuthState>,
    jar: CookieJar,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<(CookieJar, Json<LoginResponse>), ServiceError> {
    let Json(req) = payload?;
    let outcome = state.service.login(req).await?;
    let jar = jar.add(refresh_cookie(outcome.refresh, state.cookie_secure));
    Ok((jar, Json(outcome.response)))
}

/// POST /api/auth/token/refresh/
///
/// 只读取 Cookie 中的 Refresh Token，忽略请求体
pub async fn refresh(
    State(state): State<AuthState>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<RefreshResponse>), ServiceError> {
    let token = jar.get(REFRESH_COOKIE_NAME).map(|c| c.value().to_string());
    let outcome = state.service.refresh(token.as_deref()).await?;

    let jar = match outcome.rotated {
        Some(issued) => jar.add(refresh_cookie(issued, state.cookie_secure)),
        None => jar,
    };
    Ok((jar, Json(outcome.response)))
}

/// GET /api/auth/user/
pub async fn user_detail(
    State(state): State<AuthState>,
    Extension(user_id): Extension<UserId>,
) -> Result<Json<UserDetailResponse>, ServiceError> {
    Ok(Json(state.service.user_detail(user_id).await?))
}
