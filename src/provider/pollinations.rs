//! Pollinations 文本/图像生成
//!
//! 两个接口都是 GET，prompt 直接编码进 URL 路径，不需要密钥。

use async_trait::async_trait;
use reqwest::Client;

use super::{
    ImageGenerator, ImageRequest, ProviderError, TextGeneration, TextGenerator, ensure_success,
};
use crate::store::TokenUsageDelta;

/// Pollinations 文本生成，不返回用量
pub struct PollinationsText {
    client: Client,
    base_url: String,
}

impl PollinationsText {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn url_for(&self, prompt: &str) -> String {
        format!("{}/{}", self.base_url, urlencoding::encode(prompt))
    }
}

#[async_trait]
impl TextGenerator for PollinationsText {
    /// `model` 与 `system_prompt` 不被该接口使用
    async fn generate(
        &self,
        _model: &str,
        _system_prompt: &str,
        user_prompt: &str,
    ) -> Result<TextGeneration, ProviderError> {
        let response = self.client.get(self.url_for(user_prompt)).send().await?;
        let content = ensure_success(response).await?.text().await?;
        Ok(TextGeneration {
            content,
            usage: TokenUsageDelta::default(),
        })
    }
}

/// Pollinations 图像生成
///
/// 图片 URL 本身即结果；返回前先 GET 一次确认上游能生成成功。
pub struct PollinationsImage {
    client: Client,
    base_url: String,
}

impl PollinationsImage {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn url_for(&self, request: &ImageRequest) -> String {
        format!(
            "{}/{}?width={}&height={}&seed={}&model={}",
            self.base_url,
            urlencoding::encode(&request.prompt),
            request.width,
            request.height,
            request.seed,
            request.model
        )
    }
}

#[async_trait]
impl ImageGenerator for PollinationsImage {
    async fn generate(&self, request: &ImageRequest) -> Result<String, ProviderError> {
        let url = self.url_for(request);
        let response = self.client.get(&url).send().await?;
        ensure_success(response).await?;
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ImageModel;

    #[test]
    fn test_text_url_encodes_prompt() {
        let text = PollinationsText::new(Client::new(), "https://text.pollinations.ai/");
        assert_eq!(
            text.url_for("what is 1+1?"),
            "https://text.pollinations.ai/what%20is%201%2B1%3F"
        );
    }

    #[test]
    fn test_image_url() {
        let image = PollinationsImage::new(Client::new(), "https://pollinations.ai/p");
        let request = ImageRequest {
            prompt: "a red fox".to_string(),
            model: ImageModel::Turbo,
            width: 512,
            height: 768,
            seed: 7,
        };
        assert_eq!(
            image.url_for(&request),
            "https://pollinations.ai/p/a%20red%20fox?width=512&height=768&seed=7&model=turbo"
        );
    }
}
