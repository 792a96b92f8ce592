//! SQLite 저장소 어댑터.
//!
//! `MetricsStorage` 포트 구현. 모든 쿼리는 `RetryPolicy::run_classified`를 거치며
//! busy/locked/cannot-open만 재시도하고 나머지 에러는 그대로 올려보낸다.

use async_trait::async_trait;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;
use telemon_core::error::CoreError;
use telemon_core::models::metric::{MetricKind, MetricSample, MetricValue};
use telemon_core::ports::storage::MetricsStorage;
use telemon_core::retry::{Attempt, RetryPolicy};
use tracing::{debug, info};

use crate::migration;

const UPSERT_GAUGE: &str = "INSERT INTO gauges (name, value) VALUES (?1, ?2)
     ON CONFLICT(name) DO UPDATE SET value = excluded.value";

const UPSERT_COUNTER: &str = "INSERT INTO counters (name, value) VALUES (?1, ?2)
     ON CONFLICT(name) DO UPDATE SET value = counters.value + excluded.value";

/// SQLite 저장소: `MetricsStorage` 포트 구현
pub struct SqliteStorage {
    conn: Mutex<Connection>,
    retry: RetryPolicy,
}

/// 다시 시도하면 풀릴 수 있는 에러인가
fn is_transient(e: &rusqlite::Error) -> bool {
    matches!(
        e.sqlite_error_code(),
        Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked | ErrorCode::CannotOpen)
    )
}

fn classify<T>(op: &str, result: rusqlite::Result<T>) -> Attempt<T> {
    match result {
        Ok(v) => Attempt::Success(v),
        Err(e) if is_transient(&e) => {
            Attempt::Retryable(CoreError::Storage(format!("{op} 실패 (일시적): {e}")))
        }
        Err(e) => Attempt::Permanent(CoreError::Storage(format!("{op} 실패: {e}"))),
    }
}

fn open_connection(path: &Path) -> rusqlite::Result<Connection> {
    let conn = Connection::open(path)?;
    conn.execute_batch(
        "
        PRAGMA journal_mode=WAL;
        PRAGMA synchronous=NORMAL;
        PRAGMA temp_store=MEMORY;
        ",
    )?;
    migration::run_migrations(&conn)?;
    Ok(conn)
}

impl SqliteStorage {
    /// 파일 기반 SQLite 저장소 생성. 연결과 마이그레이션도 재시도 대상이다
    pub async fn open(path: impl AsRef<Path>, retry: RetryPolicy) -> Result<Self, CoreError> {
        let path = path.as_ref();
        let conn = retry
            .run_classified(|| std::future::ready(classify("SQLite 열기", open_connection(path))))
            .await?;

        info!("SQLite 저장소 초기화: {}", path.display());

        Ok(Self {
            conn: Mutex::new(conn),
            retry,
        })
    }

    /// 인메모리 SQLite 저장소 생성 (테스트용)
    pub fn open_in_memory(retry: RetryPolicy) -> Result<Self, CoreError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| CoreError::Storage(format!("인메모리 SQLite 생성 실패: {e}")))?;

        migration::run_migrations(&conn)
            .map_err(|e| CoreError::Storage(format!("마이그레이션 실패: {e}")))?;

        Ok(Self {
            conn: Mutex::new(conn),
            retry,
        })
    }

    /// 잠금 대기 시간 설정
    pub fn with_busy_timeout(self, timeout: Duration) -> Result<Self, CoreError> {
        self.conn
            .lock()
            .map_err(|e| CoreError::Internal(format!("Lock 실패: {e}")))?
            .busy_timeout(timeout)
            .map_err(|e| CoreError::Storage(format!("busy_timeout 설정 실패: {e}")))?;
        Ok(self)
    }

    fn attempt<T, F>(&self, op: &str, f: &F) -> Attempt<T>
    where
        F: Fn(&mut Connection) -> rusqlite::Result<T>,
    {
        let mut conn = match self.conn.lock() {
            Ok(conn) => conn,
            Err(e) => return Attempt::Permanent(CoreError::Internal(format!("Lock 실패: {e}"))),
        };
        classify(op, f(&mut conn))
    }

    async fn execute<T, F>(&self, op: &'static str, f: F) -> Result<T, CoreError>
    where
        T: Send,
        F: Fn(&mut Connection) -> rusqlite::Result<T> + Send + Sync,
    {
        self.retry
            .run_classified(|| std::future::ready(self.attempt(op, &f)))
            .await
    }
}

#[async_trait]
impl MetricsStorage for SqliteStorage {
    async fn update_gauge(&self, name: &str, value: f64) -> Result<(), CoreError> {
        self.execute("게이지 갱신", |conn| {
            conn.execute(UPSERT_GAUGE, params![name, value]).map(|_| ())
        })
        .await
    }

    async fn update_counter(&self, name: &str, delta: i64) -> Result<(), CoreError> {
        self.execute("카운터 갱신", |conn| {
            conn.execute(UPSERT_COUNTER, params![name, delta]).map(|_| ())
        })
        .await
    }

    async fn update_batch(&self, batch: &[MetricSample]) -> Result<(), CoreError> {
        if batch.is_empty() {
            return Ok(());
        }
        self.execute("배치 갱신", |conn| {
            let tx = conn.transaction()?;
            {
                let mut gauge = tx.prepare_cached(UPSERT_GAUGE)?;
                let mut counter = tx.prepare_cached(UPSERT_COUNTER)?;
                for sample in batch {
                    match sample.value {
                        MetricValue::Gauge(v) => gauge.execute(params![sample.name, v])?,
                        MetricValue::Counter(d) => counter.execute(params![sample.name, d])?,
                    };
                }
            }
            tx.commit()
        })
        .await?;
        debug!("배치 커밋: {}개", batch.len());
        Ok(())
    }

    async fn get(&self, kind: MetricKind, name: &str) -> Result<MetricValue, CoreError> {
        let found = self
            .execute("메트릭 조회", |conn| match kind {
                MetricKind::Gauge => conn
                    .query_row("SELECT value FROM gauges WHERE name = ?1", [name], |row| {
                        row.get::<_, f64>(0).map(MetricValue::Gauge)
                    })
                    .optional(),
                MetricKind::Counter => conn
                    .query_row("SELECT value FROM counters WHERE name = ?1", [name], |row| {
                        row.get::<_, i64>(0).map(MetricValue::Counter)
                    })
                    .optional(),
            })
            .await?;

        found.ok_or_else(|| CoreError::NotFound {
            resource_type: kind.to_string(),
            id: name.to_string(),
        })
    }

    async fn get_all(&self) -> Result<Vec<MetricSample>, CoreError> {
        let mut all = self
            .execute("전체 조회", |conn| {
                let mut all = Vec::new();
                let mut stmt = conn.prepare("SELECT name, value FROM gauges")?;
                let gauges = stmt.query_map([], |row| {
                    Ok(MetricSample::gauge(row.get::<_, String>(0)?, row.get(1)?))
                })?;
                for sample in gauges {
                    all.push(sample?);
                }
                let mut stmt = conn.prepare("SELECT name, value FROM counters")?;
                let counters = stmt.query_map([], |row| {
                    Ok(MetricSample::counter(row.get::<_, String>(0)?, row.get(1)?))
                })?;
                for sample in counters {
                    all.push(sample?);
                }
                Ok(all)
            })
            .await?;
        all.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(all)
    }

    async fn save(&self) -> Result<(), CoreError> {
        Ok(())
    }

    async fn load(&self) -> Result<(), CoreError> {
        Ok(())
    }

    async fn ping(&self) -> Result<(), CoreError> {
        self.execute("ping", |conn| conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0)))
            .await
            .map(|_| ())
    }

    async fn close(&self) -> Result<(), CoreError> {
        info!("SQLite 저장소 종료");
        Ok(())
    }
}
