//! 빌드 메타데이터.
//!
//! 릴리스 빌드는 `TELEMON_BUILD_VERSION`, `TELEMON_BUILD_DATE`, `TELEMON_BUILD_COMMIT`
//! 환경변수를 컴파일 시점에 주입한다. 값이 없으면 `N/A`로 표시한다.

use std::fmt;
use tracing::info;

const UNKNOWN: &str = "N/A";

/// 바이너리에 포함된 빌드 정보
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildInfo {
    pub version: &'static str,
    pub date: &'static str,
    pub commit: &'static str,
}

impl BuildInfo {
    /// 컴파일 시점 값 읽기. 버전은 패키지 버전으로 대체한다.
    #[must_use]
    pub fn current() -> Self {
        Self {
            version: option_env!("TELEMON_BUILD_VERSION").unwrap_or(env!("CARGO_PKG_VERSION")),
            date: option_env!("TELEMON_BUILD_DATE").unwrap_or(UNKNOWN),
            commit: option_env!("TELEMON_BUILD_COMMIT").unwrap_or(UNKNOWN),
        }
    }

    /// 시작 배너 로그
    pub fn log(&self, component: &str) {
        info!(
            version = self.version,
            date = self.date,
            commit = self.commit,
            "telemon {component} 시작"
        );
    }
}

impl fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Build version: {}", self.version)?;
        writeln!(f, "Build date: {}", self.date)?;
        write!(f, "Build commit: {}", self.commit)
    }
}
