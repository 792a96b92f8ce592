//! 인메모리 메트릭 저장소.
//!
//! 게이지는 덮어쓰고 카운터는 합산한다. 스냅샷 경로가 있으면
//! `{"gauges":{..},"counters":{..}}` JSON을 `<path>.tmp`에 쓴 뒤 rename한다.
//! 저장은 `save_lock`으로 직렬화되어 임시 파일을 공유하는 동시 저장이 서로를 덮지 않는다.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use telemon_core::error::CoreError;
use telemon_core::models::metric::{MetricKind, MetricSample, MetricValue};
use telemon_core::ports::storage::MetricsStorage;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// 스냅샷 파일 형식
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct Snapshot {
    #[serde(default)]
    gauges: BTreeMap<String, f64>,
    #[serde(default)]
    counters: BTreeMap<String, i64>,
}

impl Snapshot {
    fn apply(&mut self, sample: &MetricSample) {
        match sample.value {
            MetricValue::Gauge(v) => {
                self.gauges.insert(sample.name.clone(), v);
            }
            MetricValue::Counter(d) => {
                let counter = self.counters.entry(sample.name.clone()).or_insert(0);
                *counter = counter.saturating_add(d);
            }
        }
    }
}

/// 인메모리 저장소: `MetricsStorage` 포트 구현
#[derive(Debug, Default)]
pub struct MemStorage {
    state: RwLock<Snapshot>,
    snapshot_path: Option<PathBuf>,
    sync_save: bool,
    save_lock: Mutex<()>,
}

impl MemStorage {
    /// 스냅샷 없이 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// 스냅샷 파일 경로 설정
    pub fn with_snapshot_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot_path = Some(path.into());
        self
    }

    /// 갱신마다 즉시 저장
    pub fn with_sync_save(mut self, enabled: bool) -> Self {
        self.sync_save = enabled;
        self
    }

    /// 스냅샷 경로
    pub fn snapshot_path(&self) -> Option<&Path> {
        self.snapshot_path.as_deref()
    }

    async fn after_update(&self) -> Result<(), CoreError> {
        if self.sync_save {
            self.save().await?;
        }
        Ok(())
    }
}

/// NaN/inf 게이지는 스냅샷에 null로 기록되어 복원이 실패하므로 저장 전에 거부
fn ensure_finite(sample: &MetricSample) -> Result<(), CoreError> {
    match sample.value {
        MetricValue::Gauge(v) if !v.is_finite() => Err(CoreError::Storage(format!(
            "유한하지 않은 게이지 값: {} = {v}",
            sample.name
        ))),
        _ => Ok(()),
    }
}

/// `metrics.json` → `metrics.json.tmp`
fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

#[async_trait]
impl MetricsStorage for MemStorage {
    async fn update_gauge(&self, name: &str, value: f64) -> Result<(), CoreError> {
        let sample = MetricSample::gauge(name, value);
        ensure_finite(&sample)?;
        self.state.write().apply(&sample);
        self.after_update().await
    }

    async fn update_counter(&self, name: &str, delta: i64) -> Result<(), CoreError> {
        self.state.write().apply(&MetricSample::counter(name, delta));
        self.after_update().await
    }

    async fn update_batch(&self, batch: &[MetricSample]) -> Result<(), CoreError> {
        batch.iter().try_for_each(ensure_finite)?;
        {
            let mut state = self.state.write();
            for sample in batch {
                state.apply(sample);
            }
        }
        debug!("배치 적용: {}개", batch.len());
        self.after_update().await
    }

    async fn get(&self, kind: MetricKind, name: &str) -> Result<MetricValue, CoreError> {
        let state = self.state.read();
        let found = match kind {
            MetricKind::Gauge => state.gauges.get(name).copied().map(MetricValue::Gauge),
            MetricKind::Counter => state.counters.get(name).copied().map(MetricValue::Counter),
        };
        found.ok_or_else(|| CoreError::NotFound {
            resource_type: kind.to_string(),
            id: name.to_string(),
        })
    }

    async fn get_all(&self) -> Result<Vec<MetricSample>, CoreError> {
        let state = self.state.read();
        let mut all: Vec<MetricSample> = state
            .gauges
            .iter()
            .map(|(name, v)| MetricSample::gauge(name.clone(), *v))
            .chain(
                state
                    .counters
                    .iter()
                    .map(|(name, d)| MetricSample::counter(name.clone(), *d)),
            )
            .collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(all)
    }

    async fn save(&self) -> Result<(), CoreError> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };
        let _guard = self.save_lock.lock().await;
        let json = {
            let state = self.state.read();
            serde_json::to_vec_pretty(&*state)?
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = temp_path(path);
        tokio::fs::write(&tmp, &json).await?;
        tokio::fs::rename(&tmp, path).await?;
        debug!("스냅샷 저장: {} ({} bytes)", path.display(), json.len());
        Ok(())
    }

    async fn load(&self) -> Result<(), CoreError> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("스냅샷 없음, 복원 생략: {}", path.display());
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };
        let snapshot: Snapshot = serde_json::from_slice(&bytes)?;
        info!(
            "스냅샷 복원: 게이지 {}개, 카운터 {}개",
            snapshot.gauges.len(),
            snapshot.counters.len()
        );
        *self.state.write() = snapshot;
        Ok(())
    }

    async fn ping(&self) -> Result<(), CoreError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), CoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[tokio::test]
    async fn gauge_overwrites_counter_adds() {
        let storage = MemStorage::new();
        storage.update_gauge("Alloc", 1.0).await.unwrap();
        storage.update_gauge("Alloc", 2.5).await.unwrap();
        storage.update_counter("PollCount", 2).await.unwrap();
        storage.update_counter("PollCount", 3).await.unwrap();

        assert_eq!(
            storage.get(MetricKind::Gauge, "Alloc").await.unwrap(),
            MetricValue::Gauge(2.5)
        );
        assert_eq!(
            storage.get(MetricKind::Counter, "PollCount").await.unwrap(),
            MetricValue::Counter(5)
        );
    }

    #[tokio::test]
    async fn kinds_have_separate_namespaces() {
        let storage = MemStorage::new();
        storage.update_gauge("x", 1.0).await.unwrap();
        assert_matches!(
            storage.get(MetricKind::Counter, "x").await,
            Err(CoreError::NotFound { .. })
        );
    }

    #[tokio::test]
    async fn save_is_atomic_and_load_restores() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("metrics-db.json");

        let storage = MemStorage::new().with_snapshot_path(&path);
        storage.update_gauge("Alloc", 4.0).await.unwrap();
        storage.update_counter("PollCount", 9).await.unwrap();
        storage.save().await.unwrap();

        assert!(path.exists());
        assert!(!temp_path(&path).exists());
        let raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(raw["gauges"]["Alloc"], 4.0);
        assert_eq!(raw["counters"]["PollCount"], 9);

        let restored = MemStorage::new().with_snapshot_path(&path);
        restored.load().await.unwrap();
        assert_eq!(restored.get_all().await.unwrap(), storage.get_all().await.unwrap());
    }

    #[tokio::test]
    async fn load_missing_file_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let storage = MemStorage::new().with_snapshot_path(dir.path().join("absent.json"));
        storage.load().await.unwrap();
        assert!(storage.get_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn sync_save_writes_on_every_update() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.json");
        let storage = MemStorage::new()
            .with_snapshot_path(&path)
            .with_sync_save(true);

        storage.update_counter("c", 1).await.unwrap();
        let raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(raw["counters"]["c"], 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_sync_saves_all_succeed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.json");
        let storage = std::sync::Arc::new(
            MemStorage::new()
                .with_snapshot_path(&path)
                .with_sync_save(true),
        );

        let mut tasks = tokio::task::JoinSet::new();
        for i in 0..200 {
            let storage = storage.clone();
            tasks.spawn(async move {
                storage.update_counter("PollCount", 1).await?;
                storage.update_gauge("Alloc", i as f64).await
            });
        }
        while let Some(joined) = tasks.join_next().await {
            joined.unwrap().unwrap();
        }

        assert_eq!(
            storage.get(MetricKind::Counter, "PollCount").await.unwrap(),
            MetricValue::Counter(200)
        );
        assert!(!temp_path(&path).exists());
        let restored = MemStorage::new().with_snapshot_path(&path);
        restored.load().await.unwrap();
        assert_eq!(
            restored.get(MetricKind::Counter, "PollCount").await.unwrap(),
            MetricValue::Counter(200)
        );
    }

    #[tokio::test]
    async fn non_finite_gauge_is_rejected_and_snapshot_survives() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.json");
        let storage = MemStorage::new()
            .with_snapshot_path(&path)
            .with_sync_save(true);
        storage.update_counter("PollCount", 42).await.unwrap();

        assert_matches!(
            storage.update_gauge("x", f64::NAN).await,
            Err(CoreError::Storage(_))
        );
        assert_matches!(
            storage
                .update_batch(&[MetricSample::counter("c", 1), MetricSample::gauge("y", f64::INFINITY)])
                .await,
            Err(CoreError::Storage(_))
        );
        assert_matches!(
            storage.get(MetricKind::Counter, "c").await,
            Err(CoreError::NotFound { .. })
        );

        let restored = MemStorage::new().with_snapshot_path(&path);
        restored.load().await.unwrap();
        assert_eq!(
            restored.get(MetricKind::Counter, "PollCount").await.unwrap(),
            MetricValue::Counter(42)
        );
    }

    #[test]
    fn temp_path_appends_suffix() {
        assert_eq!(
            temp_path(Path::new("/tmp/metrics-db.json")),
            PathBuf::from("/tmp/metrics-db.json.tmp")
        );
    }
}
