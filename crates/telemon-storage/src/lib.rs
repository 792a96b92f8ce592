//! # telemon-storage
//!
//! `MetricsStorage` 포트 구현.
//!
//! ## 모듈
//! - `memory`: 인메모리 저장소 + 원자적 JSON 스냅샷
//! - `sqlite`: SQLite 저장소 (재시도 분류 포함)
//! - `migration`: 스키마 마이그레이션

pub mod memory;
pub mod migration;
pub mod sqlite;

use std::sync::Arc;

use telemon_core::config::ServerConfig;
use telemon_core::error::CoreError;
use telemon_core::ports::storage::MetricsStorage;
use telemon_core::retry::RetryPolicy;
use tracing::{info, warn};

use crate::memory::MemStorage;
use crate::sqlite::SqliteStorage;

/// 서버 설정에 맞는 저장소를 연다.
///
/// `database_path`가 있으면 SQLite, 없으면 인메모리 저장소를 쓰고
/// `restore`가 켜져 있으면 스냅샷을 복원한다.
pub async fn open_storage(config: &ServerConfig) -> Result<Arc<dyn MetricsStorage>, CoreError> {
    if let Some(path) = &config.database_path {
        let retry = RetryPolicy::from(&config.retry)
            .with_span(tracing::info_span!("storage", backend = "sqlite"));
        let storage = SqliteStorage::open(path, retry).await?;
        return Ok(Arc::new(storage));
    }

    let storage = MemStorage::new()
        .with_snapshot_path(config.file_storage_path.clone())
        .with_sync_save(config.store_interval().is_none());

    if config.restore {
        if let Err(e) = storage.load().await {
            warn!("스냅샷 복원 실패, 빈 상태로 시작: {e}");
        }
    }
    info!(
        "인메모리 저장소 사용: {}",
        config.file_storage_path.display()
    );
    Ok(Arc::new(storage))
}

#[cfg(test)]
mod tests {
    use super::*;
    use telemon_core::models::metric::{MetricKind, MetricValue};

    #[tokio::test]
    async fn memory_backend_restores_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.json");
        std::fs::write(&path, r#"{"gauges":{"Alloc":3.5},"counters":{"PollCount":7}}"#).unwrap();

        let config = ServerConfig {
            file_storage_path: path,
            ..ServerConfig::default()
        };
        let storage = open_storage(&config).await.unwrap();
        assert_eq!(
            storage.get(MetricKind::Counter, "PollCount").await.unwrap(),
            MetricValue::Counter(7)
        );
    }

    #[tokio::test]
    async fn corrupt_snapshot_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.json");
        std::fs::write(&path, "{broken").unwrap();

        let config = ServerConfig {
            file_storage_path: path,
            ..ServerConfig::default()
        };
        let storage = open_storage(&config).await.unwrap();
        assert!(storage.get_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn sqlite_backend_when_database_path_set() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig {
            database_path: Some(dir.path().join("metrics.db")),
            ..ServerConfig::default()
        };
        let storage = open_storage(&config).await.unwrap();
        storage.update_gauge("Alloc", 1.0).await.unwrap();
        storage.ping().await.unwrap();
    }
}
