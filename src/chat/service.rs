//! 生成请求业务逻辑
//!
//! 处理顺序固定为：校验输入 → 调用上游 → 记账。
//! 上游失败时直接返回，不写入任何用量或聊天记录。

use crate::common::prompt_preview;
use crate::error::ServiceError;
use crate::provider::{ImageModel, ImageRequest, ProviderRegistry, registry::POLLINATIONS};
use crate::store::{ChatRecord, GenerationLedger, UserId};

use super::types::{
    ChatRequest, ChatResponse, PollinationsTextRequest, PollinationsTextResponse, VisionRequest,
    VisionResponse,
};

/// 日志中 prompt 预览的最大字节数
const PREVIEW_BYTES: usize = 80;

pub struct ChatService {
    registry: ProviderRegistry,
    ledger: GenerationLedger,
}

/// 必填字符串：缺失或去空白后为空都视为缺失
fn required(field: &str, value: Option<String>) -> Result<String, ServiceError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ServiceError::validation(format!(
            "{}: This field is required.",
            field
        ))),
    }
}

impl ChatService {
    pub fn new(registry: ProviderRegistry, ledger: GenerationLedger) -> Self {
        Self { registry, ledger }
    }

    /// 调用文本 Provider，记录用量和聊天记录
    pub async fn chat(&self, user: UserId, req: ChatRequest) -> Result<ChatResponse, ServiceError> {
        let provider = required("provider", req.provider)?;
        let model = required("model", req.model)?;
        let system_prompt = required("system_prompt", req.system_prompt)?;
        let user_prompt = required("user_prompt", req.user_prompt)?;

        let generator = self
            .registry
            .text(&provider)
            .map_err(|e| ServiceError::validation(e.to_string()))?;

        tracing::info!(
            user_id = %user,
            provider = %provider,
            model = %model,
            prompt = %prompt_preview(&user_prompt, PREVIEW_BYTES),
            "文本生成请求"
        );

        let generation = generator
            .generate(&model, &system_prompt, &user_prompt)
            .await
            .inspect_err(|e| {
                tracing::warn!(user_id = %user, provider = %provider, "文本生成失败: {}", e)
            })?;

        let recorded = self
            .ledger
            .record_generation(
                user,
                user_prompt,
                generation.content.clone(),
                generation.usage,
            )
            .await?;
        tracing::info!(
            user_id = %user,
            record_id = recorded.record.id,
            prompt_tokens = generation.usage.prompt_tokens,
            completion_tokens = generation.usage.completion_tokens,
            total_tokens = recorded.usage.total_tokens,
            pruned = recorded.pruned,
            "文本生成完成"
        );

        Ok(ChatResponse {
            content: generation.content,
        })
    }

    /// Pollinations 文本生成；上游不返回用量，按 0 记账
    pub async fn chat_pollinations(
        &self,
        user: UserId,
        req: PollinationsTextRequest,
    ) -> Result<PollinationsTextResponse, ServiceError> {
        let prompt = required("prompt", req.prompt)?;
        let generator = self
            .registry
            .text(POLLINATIONS)
            .map_err(|e| ServiceError::validation(e.to_string()))?;

        tracing::info!(
            user_id = %user,
            prompt = %prompt_preview(&prompt, PREVIEW_BYTES),
            "Pollinations 文本生成请求"
        );

        let generation = generator
            .generate("", "", &prompt)
            .await
            .inspect_err(|e| tracing::warn!(user_id = %user, "Pollinations 文本生成失败: {}", e))?;

        self.ledger
            .record_generation(
                user,
                prompt.clone(),
                generation.content.clone(),
                generation.usage,
            )
            .await?;

        Ok(PollinationsTextResponse {
            prompt,
            text: generation.content,
        })
    }

    /// 图像生成：先校验模型再调用上游，不写聊天记录
    pub async fn vision(
        &self,
        user: UserId,
        req: VisionRequest,
    ) -> Result<VisionResponse, ServiceError> {
        let prompt = required("prompt", req.prompt)?;
        let model = req
            .model
            .parse::<ImageModel>()
            .map_err(|e| ServiceError::validation(e.to_string()))?;
        if req.width == 0 || req.height == 0 {
            return Err(ServiceError::validation(
                "width and height must be greater than 0.",
            ));
        }

        let request = ImageRequest {
            prompt,
            model,
            width: req.width,
            height: req.height,
            seed: req.seed,
        };
        tracing::info!(
            user_id = %user,
            model = %model,
            width = request.width,
            height = request.height,
            prompt = %prompt_preview(&request.prompt, PREVIEW_BYTES),
            "图像生成请求"
        );

        let image_url = self
            .registry
            .image()
            .generate(&request)
            .await
            .inspect_err(|e| tracing::warn!(user_id = %user, "图像生成失败: {}", e))?;

        Ok(VisionResponse {
            prompt: request.prompt,
            image_url,
            model,
            width: request.width,
            height: request.height,
            seed: request.seed,
        })
    }

    /// 最近的聊天记录（新的在前）
    pub async fn history(&self, user: UserId) -> Result<Vec<ChatRecord>, ServiceError> {
        Ok(self.ledger.recent(user).await?)
    }
}
