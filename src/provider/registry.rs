//! Provider 注册表：按名称查找文本生成器

use std::collections::HashMap;
use std::sync::Arc;

use super::anthropic::{self, AnthropicClient};
use super::openai::{self, OpenAiCompatible};
use super::pollinations::{PollinationsImage, PollinationsText};
use super::{ImageGenerator, TextGenerator};
use crate::http_client::build_client;
use crate::model::config::{Config, TEXT_PROVIDERS};

/// Pollinations 文本 Provider 名称
pub const POLLINATIONS: &str = "pollinations";

/// 查找失败
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderLookupError {
    #[error("Unsupported provider: {0}")]
    Unknown(String),
    #[error("Provider {name} is not configured (set {env_key})")]
    NotConfigured { name: String, env_key: String },
}

/// 所有可用的生成器
#[derive(Clone)]
pub struct ProviderRegistry {
    text: HashMap<String, Arc<dyn TextGenerator>>,
    image: Arc<dyn ImageGenerator>,
}

impl ProviderRegistry {
    pub fn new(image: Arc<dyn ImageGenerator>) -> Self {
        Self {
            text: HashMap::new(),
            image,
        }
    }

    /// 根据配置构建：有密钥的 Provider 才会注册，Pollinations 总是可用
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let client = build_client(config.proxy_url.as_deref(), config.provider_timeout_secs)?;

        let mut registry = Self::new(Arc::new(PollinationsImage::new(
            client.clone(),
            config.pollinations_image_url.clone(),
        )))
        .with_text(
            POLLINATIONS,
            Arc::new(PollinationsText::new(
                client.clone(),
                config.pollinations_text_url.clone(),
            )),
        );

        for name in TEXT_PROVIDERS {
            let Some(provider) = config.provider(name) else {
                continue;
            };
            let Some(api_key) = provider.api_key.as_deref().filter(|k| !k.trim().is_empty())
            else {
                continue;
            };

            let generator: Arc<dyn TextGenerator> = if *name == "anthropic" {
                let base_url = provider
                    .base_url
                    .clone()
                    .unwrap_or_else(|| anthropic::DEFAULT_BASE_URL.to_string());
                Arc::new(AnthropicClient::new(client.clone(), base_url, api_key))
            } else {
                let Some(base_url) = provider
                    .base_url
                    .clone()
                    .or_else(|| openai::default_base_url(name).map(str::to_string))
                else {
                    continue;
                };
                Arc::new(OpenAiCompatible::new(client.clone(), base_url, api_key))
            };
            registry = registry.with_text(name, generator);
        }

        tracing::info!("已注册文本 Provider: {:?}", registry.text_providers());
        Ok(registry)
    }

    /// 注册（或替换）一个文本生成器，名称不区分大小写
    pub fn with_text(mut self, name: &str, generator: Arc<dyn TextGenerator>) -> Self {
        self.text.insert(name.to_lowercase(), generator);
        self
    }

    pub fn text(&self, name: &str) -> Result<Arc<dyn TextGenerator>, ProviderLookupError> {
        let key = name.trim().to_lowercase();
        if let Some(generator) = self.text.get(&key) {
            return Ok(generator.clone());
        }
        if TEXT_PROVIDERS.contains(&key.as_str()) {
            return Err(ProviderLookupError::NotConfigured {
                env_key: format!("{}_API_KEY", key.to_uppercase()),
                name: key,
            });
        }
        Err(ProviderLookupError::Unknown(name.to_string()))
    }

    pub fn image(&self) -> Arc<dyn ImageGenerator> {
        self.image.clone()
    }

    /// 已注册的文本 Provider 名称（排序后）
    pub fn text_providers(&self) -> Vec<String> {
        let mut names: Vec<String> = self.text.keys().cloned().collect();
        names.sort();
        names
    }
}
