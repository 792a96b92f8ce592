//! 포트 인터페이스.
//!
//! 어댑터 crate가 구현하고 앱 crate가 `Arc<dyn Trait>`로 조립한다.

pub mod sampler;
pub mod sender;
pub mod storage;
