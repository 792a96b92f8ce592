//! 에이전트 조립: 코덱 → HTTP 송신기 → 전송 파이프라인.

use anyhow::{Context, Result};
use std::sync::Arc;
use telemon_codec::keys::load_public_key;
use telemon_codec::SecurityCodec;
use telemon_core::config::AgentConfig;
use telemon_core::error::CoreError;
use telemon_core::ports::sampler::Sampler;
use telemon_monitor::runtime::RuntimeSampler;
use telemon_monitor::system::OsSampler;
use telemon_network::http_client::HttpMetricSender;
use telemon_network::pipeline::DeliveryPipeline;
use tokio::sync::watch;
use tracing::{info, info_span};

/// 설정에 맞는 송신 측 코덱
pub fn build_codec(config: &AgentConfig) -> Result<SecurityCodec, CoreError> {
    let mut codec = SecurityCodec::new()
        .with_compression(config.compression)
        .with_span(info_span!("codec", side = "agent"));

    if let Some(key) = config.key.as_deref().filter(|k| !k.is_empty()) {
        codec = codec.with_integrity_key(key);
    }
    if let Some(path) = &config.crypto_key {
        codec = codec.with_public_key(load_public_key(path)?);
    }
    Ok(codec)
}

/// 기본 샘플러: 프로세스 통계 + OS 통계
pub fn default_samplers() -> Result<Vec<Arc<dyn Sampler>>, CoreError> {
    Ok(vec![
        Arc::new(RuntimeSampler::new()?),
        Arc::new(OsSampler::new()),
    ])
}

/// 기본 샘플러로 에이전트 실행
pub async fn run(config: AgentConfig, shutdown: watch::Receiver<bool>) -> Result<()> {
    let samplers = default_samplers().context("샘플러 초기화 실패")?;
    run_with_samplers(config, samplers, shutdown).await
}

/// 주어진 샘플러로 에이전트 실행. 종료 신호 후 마지막 플러시까지 마치고 반환한다
pub async fn run_with_samplers(
    config: AgentConfig,
    samplers: Vec<Arc<dyn Sampler>>,
    shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let codec = build_codec(&config).context("코덱 구성 실패")?;
    let sender = HttpMetricSender::new(&config.address, Arc::new(codec), config.request_timeout())
        .context("HTTP 송신기 생성 실패")?;

    info!(
        "에이전트 시작: {} (샘플러 {}개, 무결성 {}, 암호화 {})",
        sender.base_url(),
        samplers.len(),
        config.key.is_some(),
        config.crypto_key.is_some()
    );

    let span = info_span!("pipeline", address = %config.address);
    DeliveryPipeline::from_config(Arc::new(sender), &config)
        .with_span(span)
        .run(samplers, shutdown)
        .await;

    info!("에이전트 종료");
    Ok(())
}
