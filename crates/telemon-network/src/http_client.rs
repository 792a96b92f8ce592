//! HTTP 메트릭 송신기.
//!
//! `MetricSender` 포트 구현. 본문은 [`SecurityCodec`]으로 인코딩하고
//! 코덱이 만든 헤더를 그대로 싣는다. 재시도는 파이프라인이 담당한다.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use telemon_codec::{EncodedBody, SecurityCodec};
use telemon_core::error::CoreError;
use telemon_core::models::metric::MetricDto;
use telemon_core::ports::sender::MetricSender;
use tracing::{debug, warn};

/// 배치 엔드포인트
pub const BATCH_PATH: &str = "/updates/";
/// 단건 엔드포인트
pub const SINGLE_PATH: &str = "/update/";

/// 스킴이 없으면 `http://`를 붙인다
fn normalize_base_url(address: &str) -> String {
    let address = address.trim().trim_end_matches('/');
    if address.starts_with("http://") || address.starts_with("https://") {
        address.to_string()
    } else {
        format!("http://{address}")
    }
}

/// reqwest 기반 송신기: `MetricSender` 포트 구현
pub struct HttpMetricSender {
    client: reqwest::Client,
    base_url: String,
    codec: Arc<SecurityCodec>,
}

impl HttpMetricSender {
    /// 새 송신기 생성
    pub fn new(
        address: &str,
        codec: Arc<SecurityCodec>,
        timeout: Duration,
    ) -> Result<Self, CoreError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CoreError::Network(format!("HTTP 클라이언트 빌드 실패: {e}")))?;

        Ok(Self {
            client,
            base_url: normalize_base_url(address),
            codec,
        })
    }

    /// 기준 URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post(&self, path: &str, encoded: EncodedBody) -> Result<(), CoreError> {
        let url = format!("{}{}", self.base_url, path);
        let mut req = self.client.post(&url);
        for (name, value) in encoded.headers.pairs() {
            req = req.header(name, value);
        }

        let resp = req
            .body(encoded.body)
            .send()
            .await
            .map_err(|e| CoreError::Network(format!("{path} 요청 실패: {e}")))?;

        check_response(resp).await
    }
}

/// 응답 상태 코드 확인 및 에러 매핑
///
/// 5xx는 `ServerError`, 그 밖의 200 이외 응답은 `UnexpectedStatus`.
async fn check_response(resp: reqwest::Response) -> Result<(), CoreError> {
    let status = resp.status();
    if status == reqwest::StatusCode::OK {
        return Ok(());
    }

    let status_code = status.as_u16();
    let body = resp.text().await.unwrap_or_else(|e| {
        warn!("응답 본문 읽기 실패: {e}");
        String::new()
    });

    if status.is_server_error() {
        Err(CoreError::ServerError {
            status: status_code,
            body,
        })
    } else {
        Err(CoreError::UnexpectedStatus {
            status: status_code,
            body,
        })
    }
}

#[async_trait]
impl MetricSender for HttpMetricSender {
    async fn send_batch(&self, batch: &[MetricDto]) -> Result<(), CoreError> {
        debug!("배치 전송: {}개 메트릭", batch.len());
        let encoded = self.codec.encode(batch)?;
        self.post(BATCH_PATH, encoded).await
    }

    async fn send_metric(&self, metric: &MetricDto) -> Result<(), CoreError> {
        debug!("단건 전송: {} ({})", metric.id, metric.kind);
        let encoded = self.codec.encode(metric)?;
        self.post(SINGLE_PATH, encoded).await
    }
}
