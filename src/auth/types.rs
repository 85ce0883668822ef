//! 账户 API 类型定义

use serde::{Deserialize, Serialize};

use crate::store::TokenUsage;

/// 注册请求，字段缺失时返回校验错误而不是反序列化错误
#[derive(Debug, Default, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub password2: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub username: String,
    pub email: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserSummary {
    pub username: String,
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access: String,
    pub user: UserSummary,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub access: String,
}

#[derive(Debug, Serialize)]
pub struct UserDetailResponse {
    pub username: String,
    pub email: String,
    pub token_usage: TokenUsage,
}
