//! Anthropic Messages API 客户端

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{ProviderError, TextGeneration, TextGenerator, ensure_success};
use crate::store::TokenUsageDelta;

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 4096;

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Usage,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Usage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

pub struct AnthropicClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl AnthropicClient {
    pub fn new(client: Client, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }
}

/// 拼接所有 text 块；Anthropic 不返回 total，按 input + output 计算
pub(crate) fn parse_response(body: &str) -> Result<TextGeneration, ProviderError> {
    let response: MessagesResponse = serde_json::from_str(body)
        .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

    let texts: Vec<String> = response
        .content
        .into_iter()
        .filter(|b| b.block_type == "text")
        .filter_map(|b| b.text)
        .collect();
    if texts.is_empty() {
        return Err(ProviderError::InvalidResponse("响应中没有文本内容".to_string()));
    }

    Ok(TextGeneration {
        content: texts.concat(),
        usage: TokenUsageDelta::new(response.usage.input_tokens, response.usage.output_tokens, 0)
            .normalized(),
    })
}

#[async_trait]
impl TextGenerator for AnthropicClient {
    async fn generate(
        &self,
        model: &str,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<TextGeneration, ProviderError> {
        let request = MessagesRequest {
            model,
            max_tokens: MAX_TOKENS,
            system: system_prompt,
            messages: vec![Message {
                role: "user",
                content: user_prompt,
            }],
        };

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await?;
        let body = ensure_success(response).await?.text().await?;
        parse_response(&body)
    }
}
