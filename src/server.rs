//! 应用路由组装

use axum::{Json, Router, http::HeaderValue, routing::get};
use serde_json::{Value, json};
use tower_http::cors::{Any, CorsLayer};

use crate::auth::{AuthService, AuthSettings, AuthState, create_auth_router};
use crate::chat::{ChatService, create_chat_router};
use crate::jwt::JwtManager;
use crate::model::config::Config;
use crate::provider::ProviderRegistry;
use crate::store::{Database, GenerationLedger, HistoryRetention};

/// GET /api/health
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// CORS 中间件层
///
/// 未配置来源时允许任意来源，但浏览器不会携带 Cookie；
/// 前端需要刷新 Token 时必须在 `corsOrigins` 中列出具体来源。
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    use axum::http::{Method, header};

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!("忽略无效的 CORS 来源: {}", o);
                None
            }
        })
        .collect();

    if allowed.is_empty() {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
}

/// 组装所有 API 路由
pub fn create_router(auth: AuthState, chat: ChatService, cors: CorsLayer) -> Router {
    let jwt = auth.service.jwt().clone();
    Router::new()
        .route("/api/health", get(health))
        .nest("/api/auth", create_auth_router(auth))
        .nest("/api/gen_ai_models", create_chat_router(chat, jwt))
        .layer(cors)
}

/// 根据配置构建完整应用
pub fn build_app(config: &Config, db: Database) -> anyhow::Result<Router> {
    let secret = config.validate()?;
    let jwt = JwtManager::new(
        secret,
        config.access_token_ttl_secs,
        config.refresh_token_ttl_secs,
    );

    let auth = AuthService::new(
        db.clone(),
        jwt,
        AuthSettings {
            rotate_refresh_tokens: config.rotate_refresh_tokens,
            ..AuthSettings::default()
        },
    );
    let registry = ProviderRegistry::from_config(config)?;
    let ledger = GenerationLedger::new(db, HistoryRetention::new(config.history_limit));

    Ok(create_router(
        AuthState::new(auth, config.cookie_secure),
        ChatService::new(registry, ledger),
        cors_layer(&config.cors_origins),
    ))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use super::*;
    use crate::provider::{
        ImageGenerator, ImageRequest, ProviderError, TextGeneration, TextGenerator,
    };
    use crate::store::TokenUsageDelta;

    struct EchoText;

    #[async_trait]
    impl TextGenerator for EchoText {
        async fn generate(
            &self,
            _model: &str,
            _system_prompt: &str,
            user_prompt: &str,
        ) -> Result<TextGeneration, ProviderError> {
            Ok(TextGeneration {
                content: format!("echo: {}", user_prompt),
                usage: TokenUsageDelta::new(10, 5, 15),
            })
        }
    }

    struct FixedImage;

    #[async_trait]
    impl ImageGenerator for FixedImage {
        async fn generate(&self, request: &ImageRequest) -> Result<String, ProviderError> {
            Ok(format!("https://img.test/{}", request.model))
        }
    }

    /// 内存数据库 + 假 Provider 的完整应用
    fn app() -> Router {
        let db = Database::open_in_memory().unwrap();
        let jwt = JwtManager::new("router-test-secret", 300, 3600);
        let auth = AuthService::new(
            db.clone(),
            jwt,
            AuthSettings {
                rotate_refresh_tokens: false,
                bcrypt_cost: 4,
            },
        );
        let registry = ProviderRegistry::new(Arc::new(FixedImage)).with_text("openai", Arc::new(EchoText));
        let ledger = GenerationLedger::new(db, HistoryRetention::new(5));
        create_router(
            AuthState::new(auth, false),
            ChatService::new(registry, ledger),
            cors_layer(&[]),
        )
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_json(uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn get_with_token(uri: &str, token: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap()
    }

    /// 注册并登录，返回 (access token, Set-Cookie 头)
    async fn signup(app: &Router) -> (String, String) {
        let response = app
            .clone()
            .oneshot(post_json(
                "/api/auth/registration/",
                None,
                json!({
                    "username": "alice",
                    "email": "alice@example.com",
                    "password": "s3cure-pass",
                    "password2": "s3cure-pass"
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/auth/login/",
                None,
                json!({"username": "alice", "password": "s3cure-pass"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        let json = body_json(response).await;
        assert_eq!(json["user"]["username"], "alice");
        (json["access"].as_str().unwrap().to_string(), cookie)
    }

    #[tokio::test]
    async fn test_health() {
        let response = app()
            .oneshot(Request::builder().uri("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn test_generation_requires_token() {
        let response = app()
            .oneshot(post_json("/api/gen_ai_models/chat/", None, json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let json = body_json(response).await;
        assert_eq!(json["error"]["type"], "authentication_error");

        let response = app()
            .oneshot(get_with_token("/api/gen_ai_models/chat_history/", "garbage"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_login_sets_refresh_cookie() {
        let app = app();
        let (_, cookie) = signup(&app).await;
        assert!(cookie.starts_with("refreshToken="));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=None"));
        assert!(cookie.contains("Max-Age=3600"));

        let token_pair = cookie.split(';').next().unwrap().to_string();
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/auth/token/refresh/")
                    .header(header::COOKIE, token_pair)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_json(response).await["access"].is_string());

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/auth/token/refresh/")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_chat_flow_updates_usage_and_history() {
        let app = app();
        let (token, _) = signup(&app).await;

        for prompt in ["one", "two"] {
            let response = app
                .clone()
                .oneshot(post_json(
                    "/api/gen_ai_models/chat/",
                    Some(&token),
                    json!({
                        "provider": "openai",
                        "model": "gpt-4o-mini",
                        "system_prompt": "You are a helpful assistant.",
                        "user_prompt": prompt
                    }),
                ))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(body_json(response).await["content"], format!("echo: {}", prompt));
        }

        let response = app
            .clone()
            .oneshot(get_with_token("/api/auth/user/", &token))
            .await
            .unwrap();
        let json = body_json(response).await;
        assert_eq!(json["token_usage"]["prompt_tokens"], 20);
        assert_eq!(json["token_usage"]["completion_tokens"], 10);
        assert_eq!(json["token_usage"]["total_tokens"], 30);

        let response = app
            .oneshot(get_with_token("/api/gen_ai_models/chat_history/", &token))
            .await
            .unwrap();
        let json = body_json(response).await;
        let history = json.as_array().unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0]["question"], "two");
        assert_eq!(history[1]["answer"], "echo: one");
        assert!(history[0]["created_at"].is_string());
        assert!(history[0].get("id").is_none());
    }

    #[tokio::test]
    async fn test_vision_validates_model() {
        let app = app();
        let (token, _) = signup(&app).await;

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/gen_ai_models/vision/",
                Some(&token),
                json!({"prompt": "a cat", "model": "unknown"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"]["type"], "invalid_request");

        let response = app
            .oneshot(post_json(
                "/api/gen_ai_models/vision/",
                Some(&token),
                json!({"prompt": "a cat"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["model"], "flux");
        assert_eq!(json["width"], 1024);
        assert_eq!(json["seed"], 42);
        assert_eq!(json["image_url"], "https://img.test/flux");
    }

    #[tokio::test]
    async fn test_malformed_json_is_bad_request() {
        let app = app();
        let (token, _) = signup(&app).await;
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/gen_ai_models/chat/")
                    .header(header::CONTENT_TYPE, "application/json")
                    .header(header::AUTHORIZATION, format!("Bearer {}", token))
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_build_app_requires_secret() {
        let db = Database::open_in_memory().unwrap();
        assert!(build_app(&Config::default(), db.clone()).is_err());

        let mut config = Config::default();
        config.jwt_secret = Some("secret".into());
        assert!(build_app(&config, db).is_ok());
    }
}
