//! 고정 지연 재시도 실행기.
//!
//! 지수 백오프가 아니라 설정된 지연 목록(기본 1s, 3s, 5s)을 순서대로 사용한다.
//! 목록보다 시도가 많으면 `fallback_delay`(기본 1s)를 쓴다.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, warn, Instrument, Span};

use crate::config::RetryConfig;
use crate::error::CoreError;

/// 한 번의 시도 결과를 세 갈래로 분류한다.
///
/// `Permanent`는 재시도를 멈추되 원래 에러를 호출자에게 그대로 돌려준다.
#[derive(Debug)]
pub enum Attempt<T> {
    /// 성공
    Success(T),
    /// 재시도하면 성공할 수 있는 실패
    Retryable(CoreError),
    /// 재시도해도 결과가 바뀌지 않는 실패
    Permanent(CoreError),
}

impl<T> Attempt<T> {
    /// `Result`를 분류기로 변환한다. 에러는 `classify`가 재시도 여부를 판단한다.
    pub fn classify<F>(result: Result<T, CoreError>, is_retryable: F) -> Self
    where
        F: FnOnce(&CoreError) -> bool,
    {
        match result {
            Ok(v) => Attempt::Success(v),
            Err(e) if is_retryable(&e) => Attempt::Retryable(e),
            Err(e) => Attempt::Permanent(e),
        }
    }
}

/// 재시도 정책
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    attempts: u32,
    delays: Vec<Duration>,
    fallback_delay: Duration,
    cancel: Option<watch::Receiver<bool>>,
    span: Span,
}

impl RetryPolicy {
    /// 시도 횟수와 지연 목록으로 생성
    pub fn new(attempts: u32, delays: Vec<Duration>) -> Self {
        Self {
            attempts: attempts.max(1),
            delays,
            fallback_delay: Duration::from_secs(1),
            cancel: None,
            span: Span::none(),
        }
    }

    /// 지연 목록을 벗어난 시도의 대기 시간
    pub fn with_fallback_delay(mut self, delay: Duration) -> Self {
        self.fallback_delay = delay;
        self
    }

    /// 종료 신호 연결. 신호 이후에는 새 시도를 시작하지 않는다
    pub fn with_cancellation(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// 로그를 남길 span 주입
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// 최대 시도 횟수
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// `attempt`번째(0부터) 시도가 실패한 뒤 대기할 시간
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.delays
            .get(attempt as usize)
            .copied()
            .unwrap_or(self.fallback_delay)
    }

    /// 모든 에러를 재시도 대상으로 보고 실행한다.
    ///
    /// 마지막 시도까지 실패하면 `CoreError::RetriesExhausted`를 반환한다.
    pub async fn run<F, Fut, T>(&self, mut operation: F) -> Result<T, CoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CoreError>>,
    {
        self.run_classified(|| {
            let fut = operation();
            async move {
                match fut.await {
                    Ok(v) => Attempt::Success(v),
                    Err(e) => Attempt::Retryable(e),
                }
            }
        })
        .await
    }

    /// 호출자가 분류한 결과로 실행한다.
    ///
    /// `Permanent`는 즉시 원래 에러로 반환되고, `Retryable`이 한도를 넘으면
    /// `CoreError::RetriesExhausted`가 된다.
    pub async fn run_classified<F, Fut, T>(&self, mut operation: F) -> Result<T, CoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Attempt<T>>,
    {
        for attempt in 0..self.attempts {
            match operation().instrument(self.span.clone()).await {
                Attempt::Success(v) => {
                    if attempt > 0 {
                        debug!(parent: &self.span, attempt = attempt + 1, "재시도 후 성공");
                    }
                    return Ok(v);
                }
                Attempt::Permanent(e) => {
                    warn!(parent: &self.span, attempt = attempt + 1, "영구 실패, 재시도 중단: {e}");
                    return Err(e);
                }
                Attempt::Retryable(e) => {
                    if attempt + 1 == self.attempts {
                        warn!(
                            parent: &self.span,
                            attempts = self.attempts,
                            "마지막 시도 실패: {e}"
                        );
                        break;
                    }
                    let delay = self.delay_after(attempt);
                    warn!(
                        parent: &self.span,
                        "시도 실패 ({}/{}): {e}, {delay:?} 후 재시도",
                        attempt + 1,
                        self.attempts
                    );
                    if !self.pause(delay).await {
                        warn!(parent: &self.span, "종료 신호로 재시도 중단");
                        return Err(CoreError::Cancelled);
                    }
                }
            }
        }

        Err(CoreError::RetriesExhausted {
            attempts: self.attempts,
        })
    }

    /// 시도 사이 대기. 종료 신호가 오면 `false`
    async fn pause(&self, delay: Duration) -> bool {
        let Some(cancel) = &self.cancel else {
            tokio::time::sleep(delay).await;
            return true;
        };
        let mut cancel = cancel.clone();
        if *cancel.borrow_and_update() {
            return false;
        }
        tokio::select! {
            _ = tokio::time::sleep(delay) => true,
            _ = async { cancel.wait_for(|stop| *stop).await.is_ok() } => false,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(
            3,
            vec![
                Duration::from_secs(1),
                Duration::from_secs(3),
                Duration::from_secs(5),
            ],
        )
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self::new(
            config.attempts,
            config
                .delays_ms
                .iter()
                .map(|ms| Duration::from_millis(*ms))
                .collect(),
        )
        .with_fallback_delay(Duration::from_millis(config.fallback_delay_ms))
    }
}
