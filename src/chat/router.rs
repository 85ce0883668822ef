//! 生成接口路由

use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{get, post},
};

use super::handlers::{chat, chat_history, chat_pollinations, vision};
use super::service::ChatService;
use crate::auth::require_user;
use crate::jwt::JwtManager;

#[derive(Clone)]
pub struct ChatState {
    pub service: Arc<ChatService>,
}

/// 创建生成接口路由，所有端点都需要 Bearer Token
///
/// # 端点
/// - `POST /chat/` - 文本生成
/// - `POST /chat_pollinations/` - Pollinations 文本生成
/// - `POST /vision/` - 图像生成
/// - `GET /chat_history/` - 最近的聊天记录
pub fn create_chat_router(service: ChatService, jwt: JwtManager) -> Router {
    let state = ChatState {
        service: Arc::new(service),
    };

    Router::new()
        .route("/chat/", post(chat))
        .route("/chat_pollinations/", post(chat_pollinations))
        .route("/vision/", post(vision))
        .route("/chat_history/", get(chat_history))
        .route_layer(middleware::from_fn_with_state(jwt, require_user))
        .with_state(state)
}
