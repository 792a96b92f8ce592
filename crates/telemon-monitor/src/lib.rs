//! # telemon-monitor
//!
//! `Sampler` 포트 구현.
//!
//! - [`runtime::RuntimeSampler`]: 에이전트 자신의 프로세스 통계
//! - [`system::OsSampler`]: 호스트 메모리와 CPU별 사용률

pub mod runtime;
pub mod system;
