//! 账户模块
//!
//! Input: Database, JWT
//! Output: 账户 API 路由、认证中间件
//! Pos: 用户身份的签发和校验；生成接口只从这里拿到 [`UserId`](crate::store::UserId)
//!
//! # 功能
//! - 注册（bcrypt 哈希）
//! - 登录 / Refresh Token Cookie
//! - 当前用户信息

mod handlers;
mod middleware;
mod router;
mod service;
pub mod types;
mod validation;

pub use middleware::{AuthState, require_user};
pub use router::create_auth_router;
pub use service::{AuthService, AuthSettings};
