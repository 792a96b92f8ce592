//! 스키마 마이그레이션.
//!
//! 버전 기반 SQLite 스키마 관리.

use rusqlite::Connection;
use tracing::{debug, info};

/// 현재 스키마 버전
const CURRENT_VERSION: u32 = 1;

/// 스키마 마이그레이션 실행
pub fn run_migrations(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    let current = get_version(conn)?;
    info!("현재 스키마 버전: {current}, 목표: {CURRENT_VERSION}");

    if current < 1 {
        migrate_v1(conn)?;
    }

    Ok(())
}

/// 현재 스키마 버전 조회
fn get_version(conn: &Connection) -> Result<u32, rusqlite::Error> {
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )
}

/// V1: gauges + counters 테이블
fn migrate_v1(conn: &Connection) -> Result<(), rusqlite::Error> {
    debug!("마이그레이션 V1 실행: gauges + counters 테이블");

    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS gauges (
            name TEXT PRIMARY KEY CHECK (name <> ''),
            value REAL NOT NULL
        );

        CREATE TABLE IF NOT EXISTS counters (
            name TEXT PRIMARY KEY CHECK (name <> ''),
            value INTEGER NOT NULL
        );

        INSERT INTO schema_version (version) VALUES (1);
        ",
    )?;

    Ok(())
}
