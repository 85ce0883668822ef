//! OpenAI 兼容的 Chat Completions 客户端
//!
//! openai、deepseek、groq、gemini 都走这一实现，只是 base URL 不同。

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{ProviderError, TextGeneration, TextGenerator, ensure_success};
use crate::store::TokenUsageDelta;

/// 各 Provider 的默认 API 地址
pub fn default_base_url(provider: &str) -> Option<&'static str> {
    match provider {
        "openai" => Some("https://api.openai.com/v1"),
        "deepseek" => Some("https://api.deepseek.com/v1"),
        "groq" => Some("https://api.groq.com/openai/v1"),
        "gemini" => Some("https://generativelanguage.googleapis.com/v1beta/openai"),
        _ => None,
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<TokenUsageDelta>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

pub struct OpenAiCompatible {
    client: Client,
    base_url: String,
    api_key: String,
}

impl OpenAiCompatible {
    pub fn new(client: Client, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

/// 解析响应：取第一个 choice 的内容，用量缺失时视为 0
pub(crate) fn parse_response(body: &str) -> Result<TextGeneration, ProviderError> {
    let response: ChatCompletionResponse = serde_json::from_str(body)
        .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

    let content = response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| ProviderError::InvalidResponse("响应中没有 choices".to_string()))?;

    Ok(TextGeneration {
        content,
        usage: response.usage.unwrap_or_default().normalized(),
    })
}

#[async_trait]
impl TextGenerator for OpenAiCompatible {
    async fn generate(
        &self,
        model: &str,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<TextGeneration, ProviderError> {
        let request = ChatCompletionRequest {
            model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt,
                },
            ],
        };

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;
        let body = ensure_success(response).await?.text().await?;
        parse_response(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_response_with_usage() {
        let body = r#"{
            "id": "chatcmpl-1",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "Hi!"}}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        }"#;
        let generation = parse_response(body).unwrap();
        assert_eq!(generation.content, "Hi!");
        assert_eq!(generation.usage, TokenUsageDelta::new(10, 5, 15));
    }

    #[test]
    fn test_parse_response_without_usage() {
        let body = r#"{"choices": [{"message": {"content": "ok"}}]}"#;
        let generation = parse_response(body).unwrap();
        assert_eq!(generation.usage, TokenUsageDelta::default());
    }

    #[test]
    fn test_parse_response_fills_missing_total() {
        let body = r#"{"choices": [{"message": {"content": "ok"}}], "usage": {"prompt_tokens": 3, "completion_tokens": 4}}"#;
        assert_eq!(parse_response(body).unwrap().usage.total_tokens, 7);
    }

    #[test]
    fn test_parse_response_without_choices() {
        assert!(matches!(
            parse_response(r#"{"choices": []}"#),
            Err(ProviderError::InvalidResponse(_))
        ));
        assert!(parse_response("not json").is_err());
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let client = Client::new();
        let provider = OpenAiCompatible::new(client, "https://api.groq.com/openai/v1/", "k");
        assert_eq!(
            provider.endpoint(),
            "https://api.groq.com/openai/v1/chat/completions"
        );
    }

    #[test]
    fn test_default_base_urls() {
        assert!(default_base_url("openai").is_some());
        assert!(default_base_url("gemini").unwrap().contains("openai"));
        assert!(default_base_url("anthropic").is_none());
    }
}
