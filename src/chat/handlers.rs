//! 生成接口 HTTP 处理器

use axum::{
    Extension, Json,
    extract::{State, rejection::JsonRejection},
};

use super::router::ChatState;
use super::types::{
    ChatRequest, ChatResponse, PollinationsTextRequest, PollinationsTextResponse, VisionRequest,
    VisionResponse,
};
use crate::error::ServiceError;
use crate::store::{ChatRecord, UserId};

/// POST /api/gen_ai_models/chat/
pub async fn chat(
    State(state): State<ChatState>,
    Extension(user_id): Extension<UserId>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ServiceError> {
    let Json(req) = payload?;
    Ok(Json(state.service.chat(user_id, req).await?))
}

/// POST /api/gen_ai_models/chat_pollinations/
pub async fn chat_pollinations(
    State(state): State<ChatState>,
    Extension(user_id): Extension<UserId>,
    payload: Result<Json<PollinationsTextRequest>, JsonRejection>,
) -> Result<Json<PollinationsTextResponse>, ServiceError> {
    let Json(req) = payload?;
    Ok(Json(state.service.chat_pollinations(user_id, req).await?))
}

/// POST /api/gen_ai_models/vision/
pub async fn vision(
    State(state): State<ChatState>,
    Extension(user_id): Extension<UserId>,
    payload: Result<Json<VisionRequest>, JsonRejection>,
) -> Result<Json<VisionResponse>, ServiceError> {
    let Json(req) = payload?;
    Ok(Json(state.service.vision(user_id, req).await?))
}

/// GET /api/gen_ai_models/chat_history/
pub async fn chat_history(
    State(state): State<ChatState>,
    Extension(user_id): Extension<UserId>,
) -> Result<Json<Vec<ChatRecord>>, ServiceError> {
    Ok(Json(state.service.history(user_id).await?))
}
