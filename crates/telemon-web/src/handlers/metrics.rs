//! 전체 목록과 상태 확인.

use axum::extract::State;
use axum::Json;
use telemon_core::models::metric::MetricDto;

use crate::error::ApiError;
use crate::AppState;

/// 저장된 전체 메트릭 (이름순)
///
/// GET /
pub async fn list_metrics(State(state): State<AppState>) -> Result<Json<Vec<MetricDto>>, ApiError> {
    let all = state.storage.get_all().await?;
    Ok(Json(all.iter().map(MetricDto::from).collect()))
}

/// 저장소 상태 확인
///
/// GET /ping
pub async fn ping(State(state): State<AppState>) -> Result<&'static str, ApiError> {
    state.storage.ping().await?;
    Ok("OK")
}
