//! 메트릭 조회 핸들러.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::Response;
use telemon_core::error::CoreError;
use telemon_core::models::metric::{MetricDto, MetricKind, MetricSample};

use super::{decode_body, signed_json};
use crate::error::ApiError;
use crate::AppState;

/// JSON 조회: `{"id": .., "type": ..}` → 저장된 메트릭
///
/// POST /value/
pub async fn value_json(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let query: MetricDto = decode_body(&state, &headers, &body)?;
    if query.id.is_empty() {
        return Err(CoreError::Protocol("메트릭 id 누락".to_string()).into());
    }

    let value = state.storage.get(query.kind, &query.id).await?;
    signed_json(
        &state,
        &MetricDto::from(MetricSample {
            name: query.id,
            value,
        }),
    )
}

/// 텍스트 조회
///
/// GET /value/{kind}/{name}
pub async fn value_path(
    State(state): State<AppState>,
    Path((kind, name)): Path<(String, String)>,
) -> Result<String, ApiError> {
    let kind: MetricKind = kind.parse()?;
    let value = state.storage.get(kind, &name).await?;
    Ok(value.to_string())
}
