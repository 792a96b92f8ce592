//! 수집 서버 조립: 저장소 → 코덱 → axum 서버, 주기 저장과 종료 시 정리.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use telemon_codec::keys::load_private_key;
use telemon_codec::SecurityCodec;
use telemon_core::config::ServerConfig;
use telemon_core::error::CoreError;
use telemon_core::ports::storage::MetricsStorage;
use telemon_storage::open_storage;
use telemon_web::CollectorServer;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, info_span, warn};

/// 설정에 맞는 수신 측 코덱
pub fn build_codec(config: &ServerConfig) -> Result<SecurityCodec, CoreError> {
    let mut codec = SecurityCodec::new().with_span(info_span!("codec", side = "server"));

    if let Some(key) = config.key.as_deref().filter(|k| !k.is_empty()) {
        codec = codec.with_integrity_key(key);
    }
    if let Some(path) = &config.crypto_key {
        codec = codec.with_private_key(load_private_key(path)?);
    }
    Ok(codec)
}

/// 설정된 주소에 바인드 후 실행
pub async fn run(config: ServerConfig, shutdown: watch::Receiver<bool>) -> Result<()> {
    let listener = TcpListener::bind(&config.address)
        .await
        .with_context(|| format!("주소 바인드 실패: {}", config.address))?;
    serve(config, listener, shutdown).await
}

/// 바인드된 리스너로 실행. 종료 시 마지막 스냅샷을 저장하고 저장소를 닫는다
pub async fn serve(
    config: ServerConfig,
    listener: TcpListener,
    shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let storage = open_storage(&config).await.context("저장소 열기 실패")?;
    let codec = build_codec(&config).context("코덱 구성 실패")?;

    let saver = config.store_interval().map(|period| {
        info!("주기 저장 시작: {period:?}");
        tokio::spawn(save_loop(Arc::clone(&storage), period, shutdown.clone()))
    });

    let result = CollectorServer::new(config.address.clone(), Arc::clone(&storage), codec)
        .serve(listener, shutdown)
        .await;

    if let Some(saver) = saver {
        saver.abort();
    }

    if let Err(e) = storage.save().await {
        error!("종료 스냅샷 저장 실패: {e}");
    }
    if let Err(e) = storage.close().await {
        warn!("저장소 종료 실패: {e}");
    }

    result.context("수집 서버 실행 실패")
}

async fn save_loop(
    storage: Arc<dyn MetricsStorage>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = async { let _ = shutdown.wait_for(|stop| *stop).await; } => break,
            _ = ticker.tick() => {
                match storage.save().await {
                    Ok(()) => debug!("주기 스냅샷 저장"),
                    Err(e) => warn!("주기 스냅샷 저장 실패: {e}"),
                }
            }
        }
    }
}
