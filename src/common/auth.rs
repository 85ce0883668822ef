//! 请求认证辅助函数

use axum::{body::Body, http::Request};

/// 从 `Authorization: Bearer <token>` 头中提取 token
pub fn extract_bearer_token(request: &Request<Body>) -> Option<String> {
    request
        .headers()
        .get(http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}
