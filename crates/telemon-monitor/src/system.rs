//! OS 리소스 샘플러.
//!
//! `TotalMemory`, `FreeMemory`와 논리 CPU마다 `CPUutilization{n}`(1부터)을 보고한다.

use async_trait::async_trait;
use std::sync::Mutex;
use sysinfo::System;
use telemon_core::error::CoreError;
use telemon_core::models::metric::MetricSample;
use telemon_core::ports::sampler::Sampler;
use tracing::debug;

/// sysinfo 기반 OS 샘플러: `Sampler` 포트 구현
pub struct OsSampler {
    sys: Mutex<System>,
}

impl OsSampler {
    /// 새 OS 샘플러 생성
    pub fn new() -> Self {
        Self {
            sys: Mutex::new(System::new_all()),
        }
    }
}

impl Default for OsSampler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Sampler for OsSampler {
    fn name(&self) -> &'static str {
        "os"
    }

    async fn sample(&self) -> Result<Vec<MetricSample>, CoreError> {
        let mut sys = self
            .sys
            .lock()
            .map_err(|e| CoreError::Internal(format!("시스템 잠금 실패: {e}")))?;
        sys.refresh_memory();
        sys.refresh_cpu_usage();

        let mut samples = Vec::with_capacity(2 + sys.cpus().len());
        samples.push(MetricSample::gauge("TotalMemory", sys.total_memory() as f64));
        samples.push(MetricSample::gauge("FreeMemory", sys.free_memory() as f64));
        for (i, cpu) in sys.cpus().iter().enumerate() {
            samples.push(MetricSample::gauge(
                format!("CPUutilization{}", i + 1),
                f64::from(cpu.cpu_usage()),
            ));
        }

        debug!(
            "OS 샘플: 메모리 {}/{}MB, CPU {}개",
            sys.free_memory() / 1024 / 1024,
            sys.total_memory() / 1024 / 1024,
            sys.cpus().len()
        );
        Ok(samples)
    }
}
