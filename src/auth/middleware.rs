//! 用户认证中间件
//!
//! Input: `Authorization: Bearer <access token>`
//! Output: 请求扩展中的 [`UserId`]
//! Pos: 所有需要登录的路由前置层

use std::sync::Arc;

use axum::{
    Json,
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::service::AuthService;
use crate::common::auth;
use crate::error::ErrorResponse;
use crate::jwt::{JwtManager, TokenType};
use crate::store::UserId;

/// Refresh Token Cookie 名称
pub const REFRESH_COOKIE_NAME: &str = "refreshToken";

/// 账户 API 共享状态
#[derive(Clone)]
pub struct AuthState {
    pub service: Arc<AuthService>,
    /// refreshToken Cookie 是否带 Secure
    pub cookie_secure: bool,
}

impl AuthState {
    pub fn new(service: AuthService, cookie_secure: bool) -> Self {
        Self {
            service: Arc::new(service),
            cookie_secure,
        }
    }
}

fn unauthorized(message: &str) -> Response {
    let error = ErrorResponse::authentication_error(message);
    (StatusCode::UNAUTHORIZED, Json(error)).into_response()
}

/// 校验 Access Token，并把用户 ID 放入请求扩展
pub async fn require_user(
    State(jwt): State<JwtManager>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let Some(token) = auth::extract_bearer_token(&request) else {
        return unauthorized("Authentication credentials were not provided.");
    };

    match jwt
        .verify(&token, TokenType::Access)
        .and_then(|claims| claims.user_id())
    {
        Ok(user_id) => {
            request.extensions_mut().insert::<UserId>(user_id);
            next.run(request).await
        }
        Err(e) => {
            tracing::debug!("Access Token 校验失败: {}", e);
            unauthorized("Given token not valid or expired")
        }
    }
}
