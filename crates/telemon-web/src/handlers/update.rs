//! 메트릭 갱신 핸들러.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;
use telemon_core::models::metric::{
    samples_from_batch, Batch, MetricDto, MetricKind, MetricSample, MetricValue,
};
use tracing::debug;

use super::{decode_body, signed_json};
use crate::error::ApiError;
use crate::AppState;

/// 배치 갱신. 하나라도 검증에 실패하면 아무것도 저장하지 않는다
///
/// POST /updates/
pub async fn update_batch(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let batch: Batch = decode_body(&state, &headers, &body)?;
    if batch.is_empty() {
        return Err(ApiError::BadRequest("빈 배치".to_string()));
    }

    let samples = samples_from_batch(&batch)?;
    state.storage.update_batch(&samples).await?;

    debug!("배치 저장: {}개", samples.len());
    Ok(StatusCode::OK)
}

/// 단건 갱신. 저장된 최종 값을 돌려준다
///
/// POST /update/
pub async fn update_metric(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let dto: MetricDto = decode_body(&state, &headers, &body)?;
    let sample = MetricSample::try_from(&dto)?;

    state.storage.apply(&sample).await?;
    let stored = state.storage.get(sample.kind(), &sample.name).await?;

    signed_json(
        &state,
        &MetricDto::from(MetricSample {
            name: sample.name,
            value: stored,
        }),
    )
}

/// 경로 기반 갱신
///
/// POST /update/{kind}/{name}/{value}
pub async fn update_path(
    State(state): State<AppState>,
    Path((kind, name, raw)): Path<(String, String, String)>,
) -> Result<StatusCode, ApiError> {
    let kind: MetricKind = kind.parse()?;
    let value = MetricValue::parse(kind, &raw)?;

    state.storage.apply(&MetricSample { name, value }).await?;
    Ok(StatusCode::OK)
}
