//! 프로세스 런타임 샘플러.
//!
//! 현재 프로세스의 메모리/CPU/디스크 I/O와 `RandomValue`, `PollCount`를 보고한다.

use async_trait::async_trait;
use std::sync::Mutex;
use sysinfo::{Pid, ProcessesToUpdate, System};
use telemon_core::error::CoreError;
use telemon_core::models::metric::MetricSample;
use telemon_core::ports::sampler::Sampler;
use tracing::debug;

/// 프로세스 런타임 샘플러: `Sampler` 포트 구현
pub struct RuntimeSampler {
    sys: Mutex<System>,
    pid: Pid,
}

impl RuntimeSampler {
    /// 현재 프로세스 대상으로 생성
    pub fn new() -> Result<Self, CoreError> {
        let pid = sysinfo::get_current_pid()
            .map_err(|e| CoreError::Internal(format!("현재 PID 조회 실패: {e}")))?;
        Ok(Self::for_pid(pid))
    }

    /// 지정 프로세스 대상으로 생성
    pub fn for_pid(pid: Pid) -> Self {
        Self {
            sys: Mutex::new(System::new()),
            pid,
        }
    }
}

#[async_trait]
impl Sampler for RuntimeSampler {
    fn name(&self) -> &'static str {
        "runtime"
    }

    async fn sample(&self) -> Result<Vec<MetricSample>, CoreError> {
        let mut sys = self
            .sys
            .lock()
            .map_err(|e| CoreError::Internal(format!("시스템 잠금 실패: {e}")))?;
        sys.refresh_processes(ProcessesToUpdate::Some(&[self.pid]), true);

        let process = sys.process(self.pid).ok_or_else(|| CoreError::NotFound {
            resource_type: "process".to_string(),
            id: self.pid.to_string(),
        })?;
        let disk = process.disk_usage();

        let samples = vec![
            MetricSample::gauge("ResidentMemory", process.memory() as f64),
            MetricSample::gauge("VirtualMemory", process.virtual_memory() as f64),
            MetricSample::gauge("ProcessCpuUsage", f64::from(process.cpu_usage())),
            MetricSample::gauge("RunTime", process.run_time() as f64),
            MetricSample::gauge("DiskReadBytes", disk.total_read_bytes as f64),
            MetricSample::gauge("DiskWrittenBytes", disk.total_written_bytes as f64),
            MetricSample::gauge("RandomValue", rand::random::<f64>()),
            MetricSample::counter("PollCount", 1),
        ];

        debug!(
            "런타임 샘플: RSS {}KB, CPU {:.1}%",
            process.memory() / 1024,
            process.cpu_usage()
        );
        Ok(samples)
    }
}
