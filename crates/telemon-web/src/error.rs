//! API 에러 처리.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use telemon_core::error::CoreError;
use thiserror::Error;

/// API 에러
#[derive(Debug, Error)]
pub enum ApiError {
    /// 내부 서버 오류
    #[error("내부 서버 오류: {0}")]
    Internal(String),

    /// 리소스를 찾을 수 없음
    #[error("리소스를 찾을 수 없음: {0}")]
    NotFound(String),

    /// 잘못된 요청 (디코딩/검증 거부 포함)
    #[error("잘못된 요청: {0}")]
    BadRequest(String),
}

/// 에러 응답 본문
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// 에러 메시지
    pub error: String,
    /// HTTP 상태 코드
    pub status: u16,
}

impl ApiError {
    /// 응답 상태 코드
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            ApiError::Internal(msg) | ApiError::NotFound(msg) | ApiError::BadRequest(msg) => msg,
        };

        let body = ErrorResponse {
            error: message,
            status: status.as_u16(),
        };

        (status, Json(body)).into_response()
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            e if e.is_rejection() => ApiError::BadRequest(e.to_string()),
            e => ApiError::Internal(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_errors_map_to_status() {
        let cases = [
            (CoreError::Envelope("짧음".into()), StatusCode::BAD_REQUEST),
            (CoreError::Crypto("키 없음".into()), StatusCode::BAD_REQUEST),
            (CoreError::Integrity("불일치".into()), StatusCode::BAD_REQUEST),
            (CoreError::Protocol("value 누락".into()), StatusCode::BAD_REQUEST),
            (CoreError::Compression("gzip".into()), StatusCode::BAD_REQUEST),
            (
                CoreError::NotFound {
                    resource_type: "gauge".into(),
                    id: "Alloc".into(),
                },
                StatusCode::NOT_FOUND,
            ),
            (CoreError::Storage("잠김".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (core, expected) in cases {
            assert_eq!(ApiError::from(core).status(), expected);
        }
    }

    #[test]
    fn rejection_messages_stay_distinct() {
        let envelope = ApiError::from(CoreError::Envelope("x".into())).to_string();
        let crypto = ApiError::from(CoreError::Crypto("x".into())).to_string();
        let integrity = ApiError::from(CoreError::Integrity("x".into())).to_string();
        assert_ne!(envelope, crypto);
        assert_ne!(crypto, integrity);
        assert_ne!(envelope, integrity);
    }
}
