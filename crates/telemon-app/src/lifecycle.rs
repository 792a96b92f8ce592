//! 종료 신호 전파.
//!
//! OS 시그널을 `watch` 채널의 `true`로 바꿔 에이전트/서버 태스크에 전달한다.

use tokio::sync::watch;
use tracing::{info, warn};

/// 종료 신호 송신 측. 태스크는 [`subscribe`](Self::subscribe)로 받은 수신기를 감시한다.
pub struct LifecycleManager {
    shutdown_tx: watch::Sender<bool>,
}

impl LifecycleManager {
    pub fn new() -> Self {
        Self {
            shutdown_tx: watch::Sender::new(false),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    /// SIGINT/SIGTERM (윈도우는 Ctrl+C)을 기다린 뒤 종료 신호를 보낸다.
    /// 핸들러 등록에 실패해도 종료 신호는 보낸다.
    pub async fn wait_for_signal(&self) {
        match wait_os_signal().await {
            Ok(name) => info!("{name} 수신, 종료 시작"),
            Err(e) => warn!("시그널 핸들러 등록 실패: {e}"),
        }
        self.shutdown_tx.send_replace(true);
    }
}

#[cfg(unix)]
async fn wait_os_signal() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    Ok(tokio::select! {
        _ = sigint.recv() => "SIGINT",
        _ = sigterm.recv() => "SIGTERM",
    })
}

#[cfg(not(unix))]
async fn wait_os_signal() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    Ok("Ctrl+C")
}
