//! # telemon-app
//!
//! 에이전트/서버 바이너리가 공유하는 조립 코드.
//! 설정 병합, 로깅 초기화, 라이프사이클, 컴포넌트 연결.

pub mod agent;
pub mod build_info;
pub mod lifecycle;
pub mod logging;
pub mod server;
pub mod settings;
