//! 生成接口类型定义

use serde::{Deserialize, Serialize};

use crate::provider::ImageModel;

#[derive(Debug, Default, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub user_prompt: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub content: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct PollinationsTextRequest {
    #[serde(default)]
    pub prompt: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PollinationsTextResponse {
    pub prompt: String,
    pub text: String,
}

fn default_image_model() -> String {
    ImageModel::Flux.as_str().to_string()
}

fn default_image_size() -> u32 {
    1024
}

fn default_seed() -> i64 {
    42
}

#[derive(Debug, Deserialize)]
pub struct VisionRequest {
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default = "default_image_model")]
    pub model: String,
    #[serde(default = "default_image_size")]
    pub width: u32,
    #[serde(default = "default_image_size")]
    pub height: u32,
    #[serde(default = "default_seed")]
    pub seed: i64,
}

#[derive(Debug, Serialize)]
pub struct VisionResponse {
    pub prompt: String,
    pub image_url: String,
    pub model: ImageModel,
    pub width: u32,
    pub height: u32,
    pub seed: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vision_request_defaults() {
        let req: VisionRequest = serde_json::from_str(r#"{"prompt": "cat"}"#).unwrap();
        assert_eq!(req.model, "flux");
        assert_eq!((req.width, req.height, req.seed), (1024, 1024, 42));
    }

    #[test]
    fn test_vision_response_serializes_model_lowercase() {
        let response = VisionResponse {
            prompt: "cat".into(),
            image_url: "https://example.com/cat".into(),
            model: ImageModel::Nanobanana,
            width: 1,
            height: 2,
            seed: 3,
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["model"], "nanobanana");
        assert_eq!(json["image_url"], "https://example.com/cat");
    }
}
