//! 上游生成服务
//!
//! Input: prompt、模型参数
//! Output: 生成的文本（含用量）或图片 URL
//! Pos: 对外部 HTTP API 的唯一出口
//!
//! # 支持的 Provider
//! - OpenAI 兼容接口：openai、deepseek、groq、gemini
//! - Anthropic Messages API
//! - Pollinations 文本/图像（无需密钥）

pub mod anthropic;
pub mod openai;
pub mod pollinations;
pub mod registry;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::common::truncate_str_safe;
use crate::store::TokenUsageDelta;

pub use registry::ProviderRegistry;

/// 上游调用失败
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("上游请求失败: {0}")]
    Network(#[from] reqwest::Error),
    #[error("上游返回 HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("上游响应无法解析: {0}")]
    InvalidResponse(String),
}

/// 错误响应体最多保留的字节数
const ERROR_BODY_MAX_BYTES: usize = 512;

/// 非 2xx 响应转换为 [`ProviderError::Status`]
pub(crate) async fn ensure_success(
    response: reqwest::Response,
) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ProviderError::Status {
        status: status.as_u16(),
        body: truncate_str_safe(&body, ERROR_BODY_MAX_BYTES).to_string(),
    })
}

/// 文本生成结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextGeneration {
    pub content: String,
    pub usage: TokenUsageDelta,
}

/// 文本生成能力
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(
        &self,
        model: &str,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<TextGeneration, ProviderError>;
}

/// 支持的图像模型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageModel {
    Flux,
    Kontext,
    Turbo,
    Nanobanana,
    Seedream,
}

impl ImageModel {
    pub const ALL: [ImageModel; 5] = [
        ImageModel::Flux,
        ImageModel::Kontext,
        ImageModel::Turbo,
        ImageModel::Nanobanana,
        ImageModel::Seedream,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ImageModel::Flux => "flux",
            ImageModel::Kontext => "kontext",
            ImageModel::Turbo => "turbo",
            ImageModel::Nanobanana => "nanobanana",
            ImageModel::Seedream => "seedream",
        }
    }
}

impl fmt::Display for ImageModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 不支持的图像模型
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid model. Choose one of [flux, kontext, turbo, nanobanana, seedream]")]
pub struct UnknownImageModel(pub String);

impl FromStr for ImageModel {
    type Err = UnknownImageModel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ImageModel::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| UnknownImageModel(s.to_string()))
    }
}

/// 图像生成请求（模型已校验）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRequest {
    pub prompt: String,
    pub model: ImageModel,
    pub width: u32,
    pub height: u32,
    pub seed: i64,
}

/// 图像生成能力，返回可访问的图片 URL
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate(&self, request: &ImageRequest) -> Result<String, ProviderError>;
}
