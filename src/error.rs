//! 服务层错误与统一错误响应

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::provider::ProviderError;
use crate::store::StoreError;

/// 错误响应
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

/// 错误详情
#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    #[serde(rename = "type")]
    pub error_type: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                error_type: error_type.into(),
                message: message.into(),
            },
        }
    }

    pub fn authentication_error(message: impl Into<String>) -> Self {
        Self::new("authentication_error", message)
    }
}

/// 服务层错误
///
/// - `Validation`: 输入缺失或非法，未修改任何状态
/// - `Provider`: 上游生成失败，未写入任何记录
/// - `Persistence`: 数据库不可用，本次请求失败
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Persistence(#[from] StoreError),
    #[error("{0}")]
    Internal(String),
}

impl ServiceError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
            ServiceError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ServiceError::Provider(_) => StatusCode::BAD_GATEWAY,
            ServiceError::Persistence(_) | ServiceError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_type(&self) -> &'static str {
        match self {
            ServiceError::Validation(_) => "invalid_request",
            ServiceError::Unauthorized(_) => "authentication_error",
            ServiceError::Provider(_) => "provider_error",
            ServiceError::Persistence(_) | ServiceError::Internal(_) => "internal_error",
        }
    }

    /// 转换为响应体；内部错误只返回通用信息
    pub fn to_error_response(&self) -> ErrorResponse {
        let message = match self {
            ServiceError::Persistence(_) | ServiceError::Internal(_) => {
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        ErrorResponse::new(self.error_type(), message)
    }
}

impl From<JsonRejection> for ServiceError {
    fn from(rejection: JsonRejection) -> Self {
        ServiceError::Validation(rejection.body_text())
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("请求处理失败: {}", self);
        }
        (status, Json(self.to_error_response())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ServiceError::validation("bad").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::Unauthorized("no".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        let provider = ServiceError::from(ProviderError::Status {
            status: 503,
            body: "down".into(),
        });
        assert_eq!(provider.status_code(), StatusCode::BAD_GATEWAY);
        assert!(provider.to_error_response().error.message.contains("503"));
    }

    #[test]
    fn test_internal_details_hidden() {
        let err = ServiceError::from(StoreError::Sqlite(rusqlite::Error::QueryReturnedNoRows));
        let body = serde_json::to_value(err.to_error_response()).unwrap();
        assert_eq!(body["error"]["type"], "internal_error");
        assert_eq!(body["error"]["message"], "Internal server error");
    }
}
