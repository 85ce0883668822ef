//! 账户业务逻辑

use crate::error::ServiceError;
use crate::jwt::{IssuedToken, JwtManager, TokenType};
use crate::store::{Database, NewUser, UsageTracker, UserId, users};

use super::types::{
    LoginRequest, LoginResponse, RefreshResponse, RegisterRequest, RegisterResponse,
    UserDetailResponse, UserSummary,
};
use super::validation::{self, FIELD_REQUIRED};

/// 账户服务配置
#[derive(Debug, Clone, Copy)]
pub struct AuthSettings {
    /// 刷新时是否轮换 Refresh Token
    pub rotate_refresh_tokens: bool,
    /// bcrypt 代价因子
    pub bcrypt_cost: u32,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            rotate_refresh_tokens: false,
            bcrypt_cost: bcrypt::DEFAULT_COST,
        }
    }
}

/// 登录结果：响应体 + 需要写入 Cookie 的 Refresh Token
pub struct LoginOutcome {
    pub response: LoginResponse,
    pub refresh: IssuedToken,
}

/// 刷新结果：开启轮换时带新的 Refresh Token
pub struct RefreshOutcome {
    pub response: RefreshResponse,
    pub rotated: Option<IssuedToken>,
}

pub struct AuthService {
    db: Database,
    jwt: JwtManager,
    settings: AuthSettings,
}

fn required(value: Option<String>) -> String {
    value.map(|v| v.trim().to_string()).unwrap_or_default()
}

impl AuthService {
    pub fn new(db: Database, jwt: JwtManager, settings: AuthSettings) -> Self {
        Self { db, jwt, settings }
    }

    pub fn jwt(&self) -> &JwtManager {
        &self.jwt
    }

    /// 注册新用户
    ///
    /// 按 用户名 → 邮箱 → 密码强度 → 两次密码一致 的顺序校验，只返回第一个错误。
    /// 不会预先创建用量记录，首次生成时再创建。
    pub async fn register(&self, req: RegisterRequest) -> Result<RegisterResponse, ServiceError> {
        let username = required(req.username);
        let email = required(req.email);
        let password = req.password.unwrap_or_default();
        let password2 = req.password2.unwrap_or_default();

        validation::validate_username(&username).map_err(ServiceError::validation)?;
        let name = username.clone();
        if self.db.run(move |c| users::username_exists(c, &name)).await? {
            return Err(ServiceError::validation(
                "A user with that username already exists.",
            ));
        }

        validation::validate_email(&email).map_err(ServiceError::validation)?;
        let mail = email.clone();
        if self.db.run(move |c| users::email_exists(c, &mail)).await? {
            return Err(ServiceError::validation(
                "A user with that email already exists.",
            ));
        }

        validation::validate_password(&password, &username).map_err(ServiceError::validation)?;
        if password2.is_empty() {
            return Err(ServiceError::validation(FIELD_REQUIRED));
        }
        if password != password2 {
            return Err(ServiceError::validation("Password fields didn't match."));
        }

        let cost = self.settings.bcrypt_cost;
        let password_hash = tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
            .await
            .map_err(|e| ServiceError::Internal(format!("密码哈希任务失败: {}", e)))?
            .map_err(|e| ServiceError::Internal(format!("密码哈希失败: {}", e)))?;

        let (name, mail) = (username.clone(), email.clone());
        let inserted = self
            .db
            .run(move |c| {
                users::insert(
                    c,
                    &NewUser {
                        username: &name,
                        email: &mail,
                        password_hash: &password_hash,
                    },
                )
            })
            .await;

        match inserted {
            Ok(user) => {
                tracing::info!(user_id = %user.id, username = %user.username, "新用户注册");
                Ok(RegisterResponse {
                    username: user.username,
                    email: user.email,
                })
            }
            // 并发注册同名用户时由唯一约束兜底
            Err(e) if e.is_unique_violation() => Err(ServiceError::validation(
                "A user with that username or email already exists.",
            )),
            Err(e) => Err(e.into()),
        }
    }

    /// 校验用户名密码，签发 Access 与 Refresh Token
    pub async fn login(&self, req: LoginRequest) -> Result<LoginOutcome, ServiceError> {
        let invalid = || ServiceError::Unauthorized("Invalid credentials".to_string());

        let username = required(req.username);
        let password = req.password.unwrap_or_default();
        if username.is_empty() || password.is_empty() {
            return Err(invalid());
        }

        let name = username.clone();
        let Some(user) = self.db.run(move |c| users::find_by_username(c, &name)).await? else {
            tracing::info!(username = %username, "登录失败：用户不存在");
            return Err(invalid());
        };

        let hash = user.password_hash.clone();
        let matched = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
            .await
            .map_err(|e| ServiceError::Internal(format!("密码校验任务失败: {}", e)))?
            .unwrap_or(false);
        if !matched {
            tracing::info!(user_id = %user.id, "登录失败：密码错误");
            return Err(invalid());
        }

        let access = self.issue(TokenType::Access, user.id)?;
        let refresh = self.issue(TokenType::Refresh, user.id)?;
        tracing::info!(user_id = %user.id, "用户登录成功");

        Ok(LoginOutcome {
            response: LoginResponse {
                access: access.token,
                user: UserSummary {
                    username: user.username,
                    email: user.email,
                },
            },
            refresh,
        })
    }

    /// 用 Cookie 中的 Refresh Token 换取新的 Access Token
    pub async fn refresh(&self, token: Option<&str>) -> Result<RefreshOutcome, ServiceError> {
        let token = token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ServiceError::Unauthorized("No refresh token provided".to_string()))?;

        let invalid = || ServiceError::Unauthorized("Invalid refresh token".to_string());
        let claims = self
            .jwt
            .verify(token, TokenType::Refresh)
            .map_err(|_| invalid())?;
        let user_id = claims.user_id().map_err(|_| invalid())?;

        // 用户已被删除时 Token 失效
        if self
            .db
            .run(move |c| users::find_by_id(c, user_id))
            .await?
            .is_none()
        {
            return Err(invalid());
        }

        let access = self.issue(TokenType::Access, user_id)?;
        let rotated = if self.settings.rotate_refresh_tokens {
            Some(self.issue(TokenType::Refresh, user_id)?)
        } else {
            None
        };

        Ok(RefreshOutcome {
            response: RefreshResponse {
                access: access.token,
            },
            rotated,
        })
    }

    /// 当前用户信息和累计用量
    pub async fn user_detail(&self, user_id: UserId) -> Result<UserDetailResponse, ServiceError> {
        let found = self
            .db
            .run(move |c| {
                let user = users::find_by_id(c, user_id)?;
                let usage = UsageTracker::get(c, user_id)?;
                Ok(user.map(|u| (u, usage)))
            })
            .await?;

        let (user, usage) =
            found.ok_or_else(|| ServiceError::Unauthorized("User not found".to_string()))?;
        Ok(UserDetailResponse {
            username: user.username,
            email: user.email,
            token_usage: usage,
        })
    }

    fn issue(&self, token_type: TokenType, user_id: UserId) -> Result<IssuedToken, ServiceError> {
        let issued = match token_type {
            TokenType::Access => self.jwt.issue_access(user_id),
            TokenType::Refresh => self.jwt.issue_refresh(user_id),
        };
        issued.map_err(|e| ServiceError::Internal(format!("签发 Token 失败: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::TokenUsageDelta;

    fn service_with(settings: AuthSettings) -> AuthService {
        let db = Database::open_in_memory().unwrap();
        AuthService::new(db, JwtManager::new("test-secret", 300, 3600), settings)
    }

    fn service() -> AuthService {
        service_with(AuthSettings {
            rotate_refresh_tokens: false,
            bcrypt_cost: 4,
        })
    }

    fn register_req(username: &str, email: &str, password: &str, password2: &str) -> RegisterRequest {
        RegisterRequest {
            username: Some(username.to_string()),
            email: Some(email.to_string()),
            password: Some(password.to_string()),
            password2: Some(password2.to_string()),
        }
    }

    async fn register_alice(svc: &AuthService) {
        svc.register(register_req("alice", "alice@example.com", "s3cure-pass", "s3cure-pass"))
            .await
            .unwrap();
    }

    fn login_req(username: &str, password: &str) -> LoginRequest {
        LoginRequest {
            username: Some(username.to_string()),
            password: Some(password.to_string()),
        }
    }

    fn validation_message(err: ServiceError) -> String {
        match err {
            ServiceError::Validation(msg) => msg,
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_register_and_login() {
        let svc = service();
        register_alice(&svc).await;

        let outcome = svc.login(login_req("alice", "s3cure-pass")).await.unwrap();
        assert_eq!(outcome.response.user.username, "alice");
        assert_eq!(outcome.response.user.email, "alice@example.com");
        assert_eq!(outcome.refresh.expires_in, 3600);

        let claims = svc
            .jwt()
            .verify(&outcome.response.access, TokenType::Access)
            .unwrap();
        assert!(claims.user_id().is_ok());
    }

    #[tokio::test]
    async fn test_register_reports_first_error_only() {
        let svc = service();
        register_alice(&svc).await;

        // 用户名重复优先于密码不一致
        let err = svc
            .register(register_req("alice", "other@example.com", "x", "y"))
            .await
            .unwrap_err();
        assert_eq!(
            validation_message(err),
            "A user with that username already exists."
        );

        let err = svc
            .register(register_req("bob", "alice@example.com", "s3cure-pass", "s3cure-pass"))
            .await
            .unwrap_err();
        assert_eq!(validation_message(err), "A user with that email already exists.");

        let err = svc
            .register(register_req("bob", "bob@example.com", "12345678", "12345678"))
            .await
            .unwrap_err();
        assert!(validation_message(err).contains("numeric"));

        let err = svc
            .register(register_req("bob", "bob@example.com", "s3cure-pass", "s3cure-pasz"))
            .await
            .unwrap_err();
        assert_eq!(validation_message(err), "Password fields didn't match.");

        let err = svc.register(RegisterRequest::default()).await.unwrap_err();
        assert_eq!(validation_message(err), FIELD_REQUIRED);
    }

    #[tokio::test]
    async fn test_register_does_not_create_usage_row() {
        let svc = service();
        register_alice(&svc).await;
        let rows: i64 = svc
            .db
            .with_conn(|c| c.query_row("SELECT COUNT(*) FROM token_usage", [], |r| r.get(0)))
            .unwrap();
        assert_eq!(rows, 0);
    }

    #[tokio::test]
    async fn test_login_rejects_bad_credentials() {
        let svc = service();
        register_alice(&svc).await;

        for req in [
            login_req("alice", "wrong-password"),
            login_req("nobody", "s3cure-pass"),
            LoginRequest::default(),
        ] {
            assert!(matches!(
                svc.login(req).await,
                Err(ServiceError::Unauthorized(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_refresh_flow() {
        let svc = service();
        register_alice(&svc).await;
        let login = svc.login(login_req("alice", "s3cure-pass")).await.unwrap();

        let outcome = svc.refresh(Some(&login.refresh.token)).await.unwrap();
        assert!(outcome.rotated.is_none());
        assert!(
            svc.jwt()
                .verify(&outcome.response.access, TokenType::Access)
                .is_ok()
        );

        // Access Token 不能当 Refresh Token 用
        assert!(matches!(
            svc.refresh(Some(&login.response.access)).await,
            Err(ServiceError::Unauthorized(_))
        ));
        assert!(matches!(
            svc.refresh(None).await,
            Err(ServiceError::Unauthorized(msg)) if msg == "No refresh token provided"
        ));
    }

    #[tokio::test]
    async fn test_refresh_rotation() {
        let svc = service_with(AuthSettings {
            rotate_refresh_tokens: true,
            bcrypt_cost: 4,
        });
        register_alice(&svc).await;
        let login = svc.login(login_req("alice", "s3cure-pass")).await.unwrap();

        let outcome = svc.refresh(Some(&login.refresh.token)).await.unwrap();
        let rotated = outcome.rotated.unwrap();
        assert_ne!(rotated.token, login.refresh.token);
    }

    #[tokio::test]
    async fn test_user_detail_reports_usage() {
        let svc = service();
        register_alice(&svc).await;
        let login = svc.login(login_req("alice", "s3cure-pass")).await.unwrap();
        let user_id = svc
            .jwt()
            .verify(&login.response.access, TokenType::Access)
            .unwrap()
            .user_id()
            .unwrap();

        let detail = svc.user_detail(user_id).await.unwrap();
        assert_eq!(detail.token_usage.total_tokens, 0);

        svc.db
            .with_conn(|c| UsageTracker::record(c, user_id, TokenUsageDelta::new(3, 4, 7)))
            .unwrap();
        let detail = svc.user_detail(user_id).await.unwrap();
        assert_eq!(detail.username, "alice");
        assert_eq!(detail.token_usage.prompt_tokens, 3);
        assert_eq!(detail.token_usage.total_tokens, 7);
    }
}
