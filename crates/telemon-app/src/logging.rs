//! tracing 구독자 초기화.

use tracing_subscriber::EnvFilter;

const CRATES: [&str; 7] = [
    "telemon_app",
    "telemon_core",
    "telemon_codec",
    "telemon_monitor",
    "telemon_network",
    "telemon_storage",
    "telemon_web",
];

/// `RUST_LOG`가 없을 때 쓰는 필터. 모든 telemon crate에 같은 레벨을 준다
pub fn default_filter(level: &str) -> String {
    let mut directives: Vec<String> = CRATES.iter().map(|c| format!("{c}={level}")).collect();
    directives.push(format!("tower_http={level}"));
    directives.join(",")
}

/// 전역 구독자 설치. 바이너리 시작 시 한 번만 호출한다
pub fn init_tracing(level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_filter(level))),
        )
        .init();
}
