//! # telemon-core
//!
//! telemon 도메인 모델, 포트(trait) 정의, 에러 타입.
//! 에이전트와 수집 서버가 공유하는 핵심 타입과 인터페이스를 제공한다.
//!
//! ## 구조
//!
//! - [`models`]: 메트릭 샘플, 와이어 DTO, 배치
//! - [`ports`]: 포트 인터페이스 (async_trait)
//! - [`error`]: 핵심 에러 타입 (thiserror)
//! - [`config`]: 에이전트/서버 설정 구조체
//! - [`retry`]: 고정 지연 재시도 실행기

pub mod config;
pub mod error;
pub mod models;
pub mod ports;
pub mod retry;
