//! # telemon-web
//!
//! 메트릭 수집 서버.
//! axum 기반 HTTP 엔드포인트 + `SecurityCodec` 디코딩 경계.
//!
//! ## 엔드포인트
//! - `POST /updates/`: 배치 갱신
//! - `POST /update/`: 단건 갱신 (JSON)
//! - `POST /update/{kind}/{name}/{value}`: 단건 갱신 (경로)
//! - `POST /value/`, `GET /value/{kind}/{name}`: 조회
//! - `GET /ping`, `GET /`

pub mod error;
pub mod handlers;
pub mod routes;

use axum::Router;
use std::sync::Arc;
use telemon_codec::SecurityCodec;
use telemon_core::ports::storage::MetricsStorage;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing::info;

/// 수집 서버 애플리케이션 상태
#[derive(Clone)]
pub struct AppState {
    /// 메트릭 저장소
    pub storage: Arc<dyn MetricsStorage>,
    /// 요청 디코딩 / 응답 서명
    pub codec: Arc<SecurityCodec>,
}

/// 라우터 구성 (테스트에서 직접 사용)
pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(routes::collector_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// 메트릭 수집 서버
pub struct CollectorServer {
    address: String,
    state: AppState,
}

impl CollectorServer {
    /// 새 수집 서버 생성
    pub fn new(address: impl Into<String>, storage: Arc<dyn MetricsStorage>, codec: SecurityCodec) -> Self {
        Self {
            address: address.into(),
            state: AppState {
                storage,
                codec: Arc::new(codec),
            },
        }
    }

    /// 수신 주소
    pub fn address(&self) -> &str {
        &self.address
    }

    /// 설정된 주소에 바인드 후 실행
    pub async fn run(self, shutdown_rx: watch::Receiver<bool>) -> Result<(), std::io::Error> {
        let listener = TcpListener::bind(&self.address).await?;
        self.serve(listener, shutdown_rx).await
    }

    /// 이미 바인드된 리스너로 실행. 종료 신호를 받으면 진행 중인 요청을 마치고 반환한다
    pub async fn serve(
        self,
        listener: TcpListener,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> Result<(), std::io::Error> {
        info!("수집 서버 시작: http://{}", listener.local_addr()?);

        axum::serve(listener, router(self.state))
            .with_graceful_shutdown(async move {
                loop {
                    if *shutdown_rx.borrow() {
                        info!("수집 서버 종료 신호 수신");
                        break;
                    }
                    if shutdown_rx.changed().await.is_err() {
                        break;
                    }
                }
            })
            .await?;

        info!("수집 서버 종료");
        Ok(())
    }
}
