//! 메트릭 샘플러 포트.
//!
//! 구현: `telemon-monitor` crate (sysinfo)

use async_trait::async_trait;

use crate::error::CoreError;
use crate::models::metric::MetricSample;

/// 주기적으로 호출되어 순서가 보장된 스냅샷을 만든다
#[async_trait]
pub trait Sampler: Send + Sync {
    /// 로그용 샘플러 이름
    fn name(&self) -> &'static str;

    /// 현재 측정값 스냅샷
    async fn sample(&self) -> Result<Vec<MetricSample>, CoreError>;
}
