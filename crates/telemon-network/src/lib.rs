//! # telemon-network
//!
//! 에이전트 측 전송 계층.
//!
//! - [`http_client::HttpMetricSender`]: `MetricSender` 포트의 reqwest 구현
//! - [`pipeline::DeliveryPipeline`]: 샘플러 루프, 채널, 윈도우, 플러시, 단건 폴백

pub mod http_client;
pub mod pipeline;
