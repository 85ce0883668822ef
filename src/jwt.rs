//! JWT Token 管理模块
//!
//! Input: jwtSecret、用户 ID
//! Output: Access / Refresh Token
//! Pos: 用户认证的签发与校验

use anyhow::{Result, anyhow};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::store::UserId;

/// Token 类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    Access,
    Refresh,
}

/// JWT Claims 结构
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject（用户 ID）
    pub sub: String,
    pub token_type: TokenType,
    /// 签发时间 (Unix timestamp)
    pub iat: usize,
    /// 过期时间 (Unix timestamp)
    pub exp: usize,
    /// Token 唯一 ID，保证同一秒内签发的 Token 也不相同
    pub jti: String,
}

impl Claims {
    pub fn user_id(&self) -> Result<UserId> {
        self.sub
            .parse::<i64>()
            .map(UserId)
            .map_err(|_| anyhow!("Invalid subject: {}", self.sub))
    }
}

/// 签发的 Token
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_in: u64,
}

/// JWT 管理器
#[derive(Clone)]
pub struct JwtManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_ttl_secs: u64,
    refresh_ttl_secs: u64,
}

/// 从配置的密钥派生 HMAC 密钥
///
/// 使用 SHA256 哈希作为 JWT 签名密钥
fn derive_secret_key(secret: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.finalize().to_vec()
}

impl JwtManager {
    pub fn new(secret: &str, access_ttl_secs: u64, refresh_ttl_secs: u64) -> Self {
        let key = derive_secret_key(secret);
        Self {
            encoding_key: EncodingKey::from_secret(&key),
            decoding_key: DecodingKey::from_secret(&key),
            access_ttl_secs,
            refresh_ttl_secs,
        }
    }

    pub fn issue_access(&self, user: UserId) -> Result<IssuedToken> {
        self.issue(user, TokenType::Access, self.access_ttl_secs)
    }

    pub fn issue_refresh(&self, user: UserId) -> Result<IssuedToken> {
        self.issue(user, TokenType::Refresh, self.refresh_ttl_secs)
    }

    fn issue(&self, user: UserId, token_type: TokenType, ttl_secs: u64) -> Result<IssuedToken> {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)?
            .as_secs();

        let claims = Claims {
            sub: user.to_string(),
            token_type,
            iat: now as usize,
            exp: (now + ttl_secs) as usize,
            jti: uuid::Uuid::new_v4().simple().to_string(),
        };

        let token = encode(&Header::default(), &claims, &self.encoding_key)?;
        Ok(IssuedToken {
            token,
            expires_in: ttl_secs,
        })
    }

    /// 验证 Token 并检查类型
    ///
    /// # Returns
    /// * `Ok(Claims)` - 验证成功
    /// * `Err(_)` - 过期、签名错误或类型不符
    pub fn verify(&self, token: &str, expected: TokenType) -> Result<Claims> {
        let mut validation = Validation::default();
        validation.leeway = 0;
        let token_data = decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|e| anyhow!("Invalid token: {}", e))?;

        if token_data.claims.token_type != expected {
            return Err(anyhow!("Token type mismatch"));
        }
        Ok(token_data.claims)
    }
}
