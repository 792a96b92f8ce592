//! 메트릭 저장소 포트.
//!
//! 구현: `telemon-storage` crate (인메모리 + JSON 스냅샷, rusqlite)

use async_trait::async_trait;

use crate::error::CoreError;
use crate::models::metric::{MetricKind, MetricSample, MetricValue};

/// 수신 측 메트릭 저장소.
///
/// 게이지는 덮어쓰고 카운터는 합산한다.
#[async_trait]
pub trait MetricsStorage: Send + Sync {
    /// 게이지 갱신
    async fn update_gauge(&self, name: &str, value: f64) -> Result<(), CoreError>;

    /// 카운터 증분 적용
    async fn update_counter(&self, name: &str, delta: i64) -> Result<(), CoreError>;

    /// 배열 순서대로 한 트랜잭션에 적용
    async fn update_batch(&self, batch: &[MetricSample]) -> Result<(), CoreError>;

    /// 단건 조회. 없으면 `CoreError::NotFound`
    async fn get(&self, kind: MetricKind, name: &str) -> Result<MetricValue, CoreError>;

    /// 전체 조회 (이름순)
    async fn get_all(&self) -> Result<Vec<MetricSample>, CoreError>;

    /// 스냅샷 저장 (임시 파일 기록 후 rename)
    async fn save(&self) -> Result<(), CoreError>;

    /// 스냅샷 복원
    async fn load(&self) -> Result<(), CoreError>;

    /// 상태 확인
    async fn ping(&self) -> Result<(), CoreError>;

    /// 리소스 정리
    async fn close(&self) -> Result<(), CoreError>;

    /// 샘플 하나 적용
    async fn apply(&self, sample: &MetricSample) -> Result<(), CoreError> {
        match sample.value {
            MetricValue::Gauge(v) => self.update_gauge(&sample.name, v).await,
            MetricValue::Counter(d) => self.update_counter(&sample.name, d).await,
        }
    }
}
