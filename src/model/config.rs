use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// 内置文本生成 Provider 名称（小写）
/// Token 有效期上限（十年）
pub const MAX_TOKEN_TTL_SECS: u64 = 10 * 365 * 24 * 60 * 60;

pub const TEXT_PROVIDERS: &[&str] = &["openai", "anthropic", "deepseek", "groq", "gemini"];

/// 单个 Provider 的凭据配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    /// API 密钥（未配置时尝试读取 `<PROVIDER>_API_KEY` 环境变量）
    #[serde(default)]
    pub api_key: Option<String>,

    /// 自定义 API 地址（可选，未配置时使用官方地址）
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// SQLite 数据库文件路径
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// JWT 签名密钥（必填，也可通过 GENAI_HUB_JWT_SECRET 提供）
    #[serde(default)]
    pub jwt_secret: Option<String>,

    /// Access Token 有效期（秒）
    #[serde(default = "default_access_token_ttl_secs")]
    pub access_token_ttl_secs: u64,

    /// Refresh Token 有效期（秒）
    #[serde(default = "default_refresh_token_ttl_secs")]
    pub refresh_token_ttl_secs: u64,

    /// 刷新时是否同时轮换 Refresh Token
    #[serde(default)]
    pub rotate_refresh_tokens: bool,

    /// refreshToken Cookie 是否带 Secure 标记
    #[serde(default = "default_cookie_secure")]
    pub cookie_secure: bool,

    /// 每个用户保留的聊天记录条数
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    /// 所有上游 Provider 请求的超时时间（秒），文本和图像共用
    #[serde(default = "default_provider_timeout_secs")]
    pub provider_timeout_secs: u64,

    /// HTTP 代理地址（可选）
    /// 支持格式: http://host:port, socks5://host:port
    #[serde(default)]
    pub proxy_url: Option<String>,

    /// 允许跨域携带 Cookie 的来源；为空时允许任意来源（不携带凭据）
    #[serde(default)]
    pub cors_origins: Vec<String>,

    /// 文本 Provider 配置，key 为小写 Provider 名称
    #[serde(default)]
    pub providers: BTreeMap<String, ProviderConfig>,

    #[serde(default = "default_pollinations_text_url")]
    pub pollinations_text_url: String,

    #[serde(default = "default_pollinations_image_url")]
    pub pollinations_image_url: String,

    /// 配置文件路径（运行时元数据，不写入 JSON）
    #[serde(skip)]
    config_path: Option<PathBuf>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_db_path() -> String {
    "genai-hub.db".to_string()
}

fn default_access_token_ttl_secs() -> u64 {
    5 * 60
}

fn default_refresh_token_ttl_secs() -> u64 {
    7 * 24 * 60 * 60
}

fn default_cookie_secure() -> bool {
    true
}

fn default_history_limit() -> usize {
    5
}

fn default_provider_timeout_secs() -> u64 {
    60
}

fn default_pollinations_text_url() -> String {
    "https://text.pollinations.ai".to_string()
}

fn default_pollinations_image_url() -> String {
    "https://pollinations.ai/p".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            db_path: default_db_path(),
            jwt_secret: None,
            access_token_ttl_secs: default_access_token_ttl_secs(),
            refresh_token_ttl_secs: default_refresh_token_ttl_secs(),
            rotate_refresh_tokens: false,
            cookie_secure: default_cookie_secure(),
            history_limit: default_history_limit(),
            provider_timeout_secs: default_provider_timeout_secs(),
            proxy_url: None,
            cors_origins: Vec::new(),
            providers: BTreeMap::new(),
            pollinations_text_url: default_pollinations_text_url(),
            pollinations_image_url: default_pollinations_image_url(),
            config_path: None,
        }
    }
}

impl Config {
    /// 获取默认配置文件路径
    pub fn default_config_path() -> &'static str {
        "config.json"
    }

    /// 从文件加载配置
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            // 配置文件不存在，返回默认配置
            let mut config = Self::default();
            config.config_path = Some(path.to_path_buf());
            return Ok(config);
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("读取配置文件失败: {}", path.display()))?;
        let mut config: Config = serde_json::from_str(&content)
            .with_context(|| format!("解析配置文件失败: {}", path.display()))?;
        config.config_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// 获取配置文件路径（如果有）
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// 用环境变量补全配置文件中缺失的密钥
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// 使用自定义查找函数补全密钥，只覆盖为空的字段
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());

        if non_empty(self.jwt_secret.clone()).is_none() {
            if let Some(secret) = non_empty(lookup("GENAI_HUB_JWT_SECRET")) {
                self.jwt_secret = Some(secret);
            }
        }

        for name in TEXT_PROVIDERS {
            let env_key = format!("{}_API_KEY", name.to_uppercase());
            let entry = self.providers.entry((*name).to_string()).or_default();
            if non_empty(entry.api_key.clone()).is_none() {
                entry.api_key = non_empty(lookup(&env_key));
            }
        }
    }

    /// 启动前校验，返回可直接使用的 JWT 密钥
    pub fn validate(&self) -> anyhow::Result<&str> {
        if self.history_limit == 0 || i64::try_from(self.history_limit).is_err() {
            anyhow::bail!("historyLimit 必须在 1..={} 之间", i64::MAX);
        }
        for (key, ttl) in [
            ("accessTokenTtlSecs", self.access_token_ttl_secs),
            ("refreshTokenTtlSecs", self.refresh_token_ttl_secs),
        ] {
            if ttl == 0 || ttl > MAX_TOKEN_TTL_SECS {
                anyhow::bail!("{} 必须在 1..={} 之间", key, MAX_TOKEN_TTL_SECS);
            }
        }
        self.jwt_secret
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| anyhow::anyhow!("未配置 jwtSecret（或 GENAI_HUB_JWT_SECRET 环境变量）"))
    }

    /// 获取指定 Provider 的配置（名称不区分大小写）
    pub fn provider(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.get(&name.to_lowercase())
    }
}
