//! 에이전트/서버 설정 구조체.
//!
//! 기본값 → JSON 설정 파일 → 환경변수 → CLI 플래그 순으로 덮어쓴다.
//! 계층 병합은 앱 crate가 `config` crate로 수행하고, 여기서는 타입과 기본값만 정의한다.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::CoreError;

// ============================================================
// 재시도 설정
// ============================================================

/// 재시도 실행기 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// 최대 시도 횟수
    #[serde(default = "default_retry_attempts")]
    pub attempts: u32,
    /// 시도 실패 후 대기 시간 목록 (ms)
    #[serde(default = "default_retry_delays_ms")]
    pub delays_ms: Vec<u64>,
    /// 목록을 벗어난 시도의 대기 시간 (ms)
    #[serde(default = "default_fallback_delay_ms")]
    pub fallback_delay_ms: u64,
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_delays_ms() -> Vec<u64> {
    vec![1_000, 3_000, 5_000]
}

fn default_fallback_delay_ms() -> u64 {
    1_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: default_retry_attempts(),
            delays_ms: default_retry_delays_ms(),
            fallback_delay_ms: default_fallback_delay_ms(),
        }
    }
}

// ============================================================
// 에이전트 설정
// ============================================================

/// 전송 정책
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryModeSetting {
    /// 윈도우 단위 배치 전송
    #[default]
    Windowed,
    /// 스냅샷마다 즉시 전송, 동시 전송 수는 `rate_limit`로 제한
    Bounded,
}

/// 에이전트 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// 수집 서버 주소 (host:port 또는 URL)
    #[serde(default = "default_address")]
    pub address: String,
    /// 윈도우 플러시 주기 (초)
    #[serde(default = "default_report_interval_secs")]
    pub report_interval_secs: u64,
    /// 샘플링 주기 (초)
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// HMAC 서명 키
    #[serde(default)]
    pub key: Option<String>,
    /// 동시 전송 한도 (bounded 모드)
    #[serde(default = "default_rate_limit")]
    pub rate_limit: usize,
    /// 수집 서버 RSA 공개 키 (PEM) 경로
    #[serde(default)]
    pub crypto_key: Option<PathBuf>,
    /// 전송 정책
    #[serde(default)]
    pub delivery_mode: DeliveryModeSetting,
    /// gzip 압축 여부
    #[serde(default = "default_true")]
    pub compression: bool,
    /// 요청당 타임아웃 (초)
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// 샘플 채널 용량
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    /// 재시도 설정
    #[serde(default)]
    pub retry: RetryConfig,
    /// 로그 레벨 (RUST_LOG가 없을 때)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_address() -> String {
    "localhost:8080".to_string()
}

fn default_report_interval_secs() -> u64 {
    10
}

fn default_poll_interval_secs() -> u64 {
    2
}

fn default_rate_limit() -> usize {
    1
}

fn default_true() -> bool {
    true
}

fn default_request_timeout_secs() -> u64 {
    5
}

fn default_channel_capacity() -> usize {
    100
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            report_interval_secs: default_report_interval_secs(),
            poll_interval_secs: default_poll_interval_secs(),
            key: None,
            rate_limit: default_rate_limit(),
            crypto_key: None,
            delivery_mode: DeliveryModeSetting::default(),
            compression: true,
            request_timeout_secs: default_request_timeout_secs(),
            channel_capacity: default_channel_capacity(),
            retry: RetryConfig::default(),
            log_level: default_log_level(),
        }
    }
}

impl AgentConfig {
    /// 윈도우 플러시 주기
    pub fn report_interval(&self) -> Duration {
        Duration::from_secs(self.report_interval_secs)
    }

    /// 샘플링 주기
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// 요청 타임아웃
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// 값 범위 검증
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.report_interval_secs == 0 {
            return Err(CoreError::Config("report_interval_secs는 0보다 커야 함".into()));
        }
        if self.poll_interval_secs == 0 {
            return Err(CoreError::Config("poll_interval_secs는 0보다 커야 함".into()));
        }
        if self.rate_limit == 0 {
            return Err(CoreError::Config("rate_limit는 1 이상이어야 함".into()));
        }
        if self.channel_capacity == 0 {
            return Err(CoreError::Config("channel_capacity는 1 이상이어야 함".into()));
        }
        if self.retry.attempts == 0 {
            return Err(CoreError::Config("retry.attempts는 1 이상이어야 함".into()));
        }
        if self.address.trim().is_empty() {
            return Err(CoreError::Config("address가 비어 있음".into()));
        }
        Ok(())
    }
}

// ============================================================
// 서버 설정
// ============================================================

/// 수집 서버 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// 바인드 주소
    #[serde(default = "default_address")]
    pub address: String,
    /// 스냅샷 저장 주기 (초). 0이면 갱신마다 즉시 저장
    #[serde(default = "default_store_interval_secs")]
    pub store_interval_secs: u64,
    /// 스냅샷 파일 경로
    #[serde(default = "default_file_storage_path")]
    pub file_storage_path: PathBuf,
    /// 시작 시 스냅샷 복원 여부
    #[serde(default = "default_true")]
    pub restore: bool,
    /// SQLite DB 경로. 지정하면 인메모리 저장소 대신 사용
    #[serde(default)]
    pub database_path: Option<PathBuf>,
    /// HMAC 검증 키
    #[serde(default)]
    pub key: Option<String>,
    /// RSA 개인 키 (PEM) 경로
    #[serde(default)]
    pub crypto_key: Option<PathBuf>,
    /// 저장소 재시도 설정
    #[serde(default)]
    pub retry: RetryConfig,
    /// 로그 레벨 (RUST_LOG가 없을 때)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_store_interval_secs() -> u64 {
    10
}

fn default_file_storage_path() -> PathBuf {
    PathBuf::from("/tmp/metrics-db.json")
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            store_interval_secs: default_store_interval_secs(),
            file_storage_path: default_file_storage_path(),
            restore: true,
            database_path: None,
            key: None,
            crypto_key: None,
            retry: RetryConfig::default(),
            log_level: default_log_level(),
        }
    }
}

impl ServerConfig {
    /// 스냅샷 저장 주기. 0이면 `None` (동기 저장)
    pub fn store_interval(&self) -> Option<Duration> {
        (self.store_interval_secs > 0).then(|| Duration::from_secs(self.store_interval_secs))
    }

    /// 값 범위 검증
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.address.trim().is_empty() {
            return Err(CoreError::Config("address가 비어 있음".into()));
        }
        if self.retry.attempts == 0 {
            return Err(CoreError::Config("retry.attempts는 1 이상이어야 함".into()));
        }
        Ok(())
    }
}
