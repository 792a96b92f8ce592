//! 메트릭 전송 포트.
//!
//! 구현: `telemon-network` crate (reqwest)

use async_trait::async_trait;

use crate::error::CoreError;
use crate::models::metric::MetricDto;

/// 수집 서버로의 단일 전송 시도. 재시도는 호출 측 책임이다.
#[async_trait]
pub trait MetricSender: Send + Sync {
    /// 배치 전송 (`/updates/`)
    async fn send_batch(&self, batch: &[MetricDto]) -> Result<(), CoreError>;

    /// 단건 전송 (`/update/`)
    async fn send_metric(&self, metric: &MetricDto) -> Result<(), CoreError>;
}
