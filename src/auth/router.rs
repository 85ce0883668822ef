//! 账户 API 路由配置

use axum::{
    Router, middleware,
    routing::{get, post},
};

use super::handlers::{login, refresh, register, user_detail};
use super::middleware::{AuthState, require_user};

/// 创建账户 API 路由
///
/// # 端点
/// - `POST /registration/` - 注册
/// - `POST /login/` - 登录，下发 refreshToken Cookie
/// - `POST /token/refresh/` - 用 Cookie 换取新的 Access Token
/// - `GET /user/` - 当前用户信息与累计用量（需要 Bearer Token）
pub fn create_auth_router(state: AuthState) -> Router {
    let jwt = state.service.jwt().clone();

    let protected = Router::new()
        .route("/user/", get(user_detail))
        .route_layer(middleware::from_fn_with_state(jwt, require_user));

    Router::new()
        .route("/registration/", post(register))
        .route("/login/", post(login))
        .route("/token/refresh/", post(refresh))
        .merge(protected)
        .with_state(state)
}
