//! HTTP 핸들러 모음.
//!
//! 모든 본문은 `SecurityCodec` 디코딩 경계를 통과한 뒤에만 파싱된다.

pub mod metrics;
pub mod update;
pub mod value;

use axum::http::{header, HeaderMap, HeaderName, HeaderValue};
use axum::response::{IntoResponse, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use telemon_codec::{WireHeaders, CONTENT_TYPE_JSON, HEADER_HASH};
use telemon_core::error::CoreError;
use tracing::warn;

use crate::error::ApiError;
use crate::AppState;

/// axum 헤더에서 코덱 메타데이터 추출
pub(crate) fn wire_headers(headers: &HeaderMap) -> WireHeaders {
    WireHeaders::from_lookup(|name| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    })
}

/// 요청 본문 디코딩. 거부 사유는 경고 로그로 남긴다
pub(crate) fn decode_body<T: DeserializeOwned>(
    state: &AppState,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<T, ApiError> {
    state
        .codec
        .decode(body, &wire_headers(headers))
        .map_err(|e| {
            warn!(body = body.len(), "요청 본문 거부: {e}");
            ApiError::from(e)
        })
}

/// JSON 응답. 무결성 키가 있으면 `HashSHA256` 헤더를 붙인다
pub(crate) fn signed_json<T: Serialize>(state: &AppState, payload: &T) -> Result<Response, ApiError> {
    let body = serde_json::to_vec(payload).map_err(CoreError::from)?;
    let hash = state.codec.sign(&body)?;

    let mut response = ([(header::CONTENT_TYPE, CONTENT_TYPE_JSON)], body).into_response();
    if let Some(hash) = hash {
        let name = HeaderName::from_bytes(HEADER_HASH.as_bytes())
            .map_err(|e| ApiError::Internal(format!("해시 헤더 이름 오류: {e}")))?;
        let value = HeaderValue::from_str(&hash)
            .map_err(|e| ApiError::Internal(format!("해시 헤더 생성 실패: {e}")))?;
        response.headers_mut().insert(name, value);
    }
    Ok(response)
}
