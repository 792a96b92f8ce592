//! 도메인 모델.

pub mod metric;
