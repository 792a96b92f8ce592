//! CLI 인자와 계층형 설정 병합.
//!
//! 기본값 → JSON 설정 파일(`-c`) → 환경변수 → CLI 플래그 순으로 덮어쓴다.
//! 환경변수는 `TELEMON_AGENT_` / `TELEMON_SERVER_` 접두사를 쓰고,
//! 중첩 필드는 `__`로 구분한다 (예: `TELEMON_AGENT_RETRY__ATTEMPTS=5`).

use anyhow::{Context, Result};
use clap::Parser;
use config::{Config, Environment, File, FileFormat};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use telemon_core::config::{AgentConfig, DeliveryModeSetting, ServerConfig};

/// 에이전트 환경변수 접두사
pub const AGENT_ENV_PREFIX: &str = "TELEMON_AGENT";
/// 서버 환경변수 접두사
pub const SERVER_ENV_PREFIX: &str = "TELEMON_SERVER";

/// telemon 메트릭 에이전트
#[derive(Parser, Debug, Default)]
#[command(name = "telemon-agent")]
#[command(author, version, about, long_about = None)]
pub struct AgentArgs {
    /// JSON 설정 파일
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,

    /// 수집 서버 주소 (host:port)
    #[arg(long, short = 'a')]
    pub address: Option<String>,

    /// 플러시 주기 (초)
    #[arg(long, short = 'r')]
    pub report_interval: Option<u64>,

    /// 샘플링 주기 (초)
    #[arg(long, short = 'p')]
    pub poll_interval: Option<u64>,

    /// HMAC 무결성 키
    #[arg(long, short = 'k')]
    pub key: Option<String>,

    /// 동시 전송 상한 (bounded 모드)
    #[arg(long, short = 'l')]
    pub rate_limit: Option<usize>,

    /// 서버 공개 키 PEM 경로
    #[arg(long)]
    pub crypto_key: Option<PathBuf>,

    /// 전송 정책
    #[arg(long, value_parser = ["windowed", "bounded"])]
    pub delivery_mode: Option<String>,

    /// gzip 압축 끄기
    #[arg(long)]
    pub no_compression: bool,

    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,
}

impl AgentArgs {
    fn apply(&self, config: &mut AgentConfig) {
        if let Some(address) = &self.address {
            config.address = address.clone();
        }
        if let Some(secs) = self.report_interval {
            config.report_interval_secs = secs;
        }
        if let Some(secs) = self.poll_interval {
            config.poll_interval_secs = secs;
        }
        if let Some(key) = &self.key {
            config.key = Some(key.clone());
        }
        if let Some(limit) = self.rate_limit {
            config.rate_limit = limit;
        }
        if let Some(path) = &self.crypto_key {
            config.crypto_key = Some(path.clone());
        }
        match self.delivery_mode.as_deref() {
            Some("bounded") => config.delivery_mode = DeliveryModeSetting::Bounded,
            Some("windowed") => config.delivery_mode = DeliveryModeSetting::Windowed,
            _ => {}
        }
        if self.no_compression {
            config.compression = false;
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
    }
}

/// telemon 메트릭 수집 서버
#[derive(Parser, Debug, Default)]
#[command(name = "telemon-server")]
#[command(author, version, about, long_about = None)]
pub struct ServerArgs {
    /// JSON 설정 파일
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,

    /// 수신 주소 (host:port)
    #[arg(long, short = 'a')]
    pub address: Option<String>,

    /// 스냅샷 저장 주기 (초, 0이면 갱신마다 저장)
    #[arg(long, short = 'i')]
    pub store_interval: Option<u64>,

    /// 스냅샷 파일 경로
    #[arg(long, short = 'f')]
    pub file_storage_path: Option<PathBuf>,

    /// 시작 시 스냅샷 복원
    #[arg(long, short = 'r')]
    pub restore: Option<bool>,

    /// SQLite 데이터베이스 경로 (지정하면 SQLite 저장소 사용)
    #[arg(long, short = 'd')]
    pub database_path: Option<PathBuf>,

    /// HMAC 무결성 키
    #[arg(long, short = 'k')]
    pub key: Option<String>,

    /// 서버 개인 키 PEM 경로
    #[arg(long)]
    pub crypto_key: Option<PathBuf>,

    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,
}

impl ServerArgs {
    fn apply(&self, config: &mut ServerConfig) {
        if let Some(address) = &self.address {
            config.address = address.clone();
        }
        if let Some(secs) = self.store_interval {
            config.store_interval_secs = secs;
        }
        if let Some(path) = &self.file_storage_path {
            config.file_storage_path = path.clone();
        }
        if let Some(restore) = self.restore {
            config.restore = restore;
        }
        if let Some(path) = &self.database_path {
            config.database_path = Some(path.clone());
        }
        if let Some(key) = &self.key {
            config.key = Some(key.clone());
        }
        if let Some(path) = &self.crypto_key {
            config.crypto_key = Some(path.clone());
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
    }
}

/// 기본값, 파일, 환경변수를 병합한다
fn layered<T>(defaults: &T, file: Option<&Path>, env_prefix: &str) -> Result<T>
where
    T: Serialize + DeserializeOwned,
{
    let mut builder =
        Config::builder().add_source(Config::try_from(defaults).context("기본 설정 직렬화 실패")?);

    if let Some(path) = file {
        builder = builder.add_source(File::from(path).format(FileFormat::Json).required(true));
    }

    builder
        .add_source(
            Environment::with_prefix(env_prefix)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .context("설정 병합 실패")?
        .try_deserialize()
        .context("설정 해석 실패")
}

/// 에이전트 설정 로드
pub fn load_agent_config(args: &AgentArgs) -> Result<AgentConfig> {
    let mut config: AgentConfig =
        layered(&AgentConfig::default(), args.config.as_deref(), AGENT_ENV_PREFIX)?;
    args.apply(&mut config);
    config.validate().context("에이전트 설정 검증 실패")?;
    Ok(config)
}

/// 서버 설정 로드
pub fn load_server_config(args: &ServerArgs) -> Result<ServerConfig> {
    let mut config: ServerConfig =
        layered(&ServerConfig::default(), args.config.as_deref(), SERVER_ENV_PREFIX)?;
    args.apply(&mut config);
    config.validate().context("서버 설정 검증 실패")?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_sources() {
        let config = load_agent_config(&AgentArgs::default()).unwrap();
        assert_eq!(config.address, "localhost:8080");
        assert_eq!(config.report_interval_secs, 10);
        assert_eq!(config.poll_interval_secs, 2);
        assert_eq!(config.channel_capacity, 100);
        assert_eq!(config.retry.delays_ms, vec![1_000, 3_000, 5_000]);
        assert_eq!(config.delivery_mode, DeliveryModeSetting::Windowed);
        assert!(config.key.is_none());

        let server = load_server_config(&ServerArgs::default()).unwrap();
        assert_eq!(server.store_interval_secs, 10);
        assert!(server.restore);
        assert!(server.database_path.is_none());
    }

    #[test]
    fn file_then_flags() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent.json");
        std::fs::write(
            &path,
            r#"{"address": "collector:9000", "rate_limit": 4, "delivery_mode": "bounded",
                "retry": {"attempts": 5}}"#,
        )
        .unwrap();

        let args = AgentArgs::try_parse_from([
            "telemon-agent",
            "-c",
            path.to_str().unwrap(),
            "-a",
            "override:7000",
            "-p",
            "1",
        ])
        .unwrap();
        let config = load_agent_config(&args).unwrap();

        assert_eq!(config.address, "override:7000");
        assert_eq!(config.poll_interval_secs, 1);
        assert_eq!(config.rate_limit, 4);
        assert_eq!(config.delivery_mode, DeliveryModeSetting::Bounded);
        assert_eq!(config.retry.attempts, 5);
        assert_eq!(config.retry.delays_ms, vec![1_000, 3_000, 5_000]);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let args = AgentArgs::try_parse_from(["telemon-agent", "-r", "0"]).unwrap();
        assert!(load_agent_config(&args).is_err());

        assert!(AgentArgs::try_parse_from(["telemon-agent", "--delivery-mode", "burst"]).is_err());
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let args = ServerArgs::try_parse_from(["telemon-server", "-c", "/nonexistent/telemon.json"])
            .unwrap();
        assert!(load_server_config(&args).is_err());
    }

    #[test]
    fn server_flags_override() {
        let args = ServerArgs::try_parse_from([
            "telemon-server",
            "-i",
            "0",
            "-r",
            "false",
            "-d",
            "/var/lib/telemon/metrics.db",
            "-k",
            "secret",
        ])
        .unwrap();
        let config = load_server_config(&args).unwrap();
        assert_eq!(config.store_interval(), None);
        assert!(!config.restore);
        assert_eq!(
            config.database_path.as_deref(),
            Some(Path::new("/var/lib/telemon/metrics.db"))
        );
        assert_eq!(config.key.as_deref(), Some("secret"));
    }
}
