//! 메트릭 전송 파이프라인.
//!
//! 샘플러 루프 → 용량 제한 채널 → 윈도우 버퍼 → 플러시 → 재시도 실행기 → 송신기.
//! 배치 전송이 재시도 후에도 실패하면 메트릭 단건 전송으로 내려간다.
//!
//! 윈도우 버퍼는 소비 루프만 소유한다. 샘플러와의 공유 지점은 채널 하나뿐이다.

use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use telemon_core::config::{AgentConfig, DeliveryModeSetting};
use telemon_core::error::CoreError;
use telemon_core::models::metric::{Batch, MetricDto, MetricSample};
use telemon_core::ports::sampler::Sampler;
use telemon_core::ports::sender::MetricSender;
use telemon_core::retry::RetryPolicy;
use tokio::sync::{mpsc, watch, Semaphore};
use tokio::task::JoinSet;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn, Instrument, Span};

/// 기본 채널 용량
pub const DEFAULT_CHANNEL_CAPACITY: usize = 100;

/// 전송 정책
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    /// `report_interval`마다 윈도우 전체를 한 배치로 전송
    Windowed,
    /// 스냅샷을 받는 즉시 전송, 동시 전송은 최대 `max_in_flight`
    BoundedConcurrent {
        /// 동시 전송 한도
        max_in_flight: usize,
    },
}

impl DeliveryMode {
    /// 설정값으로부터 구성
    pub fn from_setting(setting: DeliveryModeSetting, rate_limit: usize) -> Self {
        match setting {
            DeliveryModeSetting::Windowed => DeliveryMode::Windowed,
            DeliveryModeSetting::Bounded => DeliveryMode::BoundedConcurrent {
                max_in_flight: rate_limit.max(1),
            },
        }
    }
}

/// 한 번의 플러시 결과
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// 배치 크기
    pub metrics: usize,
    /// 배치 전송 성공 여부
    pub batch_delivered: bool,
    /// 폴백으로 전달된 메트릭 수
    pub fallback_delivered: usize,
    /// 폴백에서도 실패한 메트릭 id
    pub dropped: Vec<String>,
}

// ============================================================
// 윈도우 버퍼
// ============================================================

/// 두 플러시 사이에 쌓이는 메트릭. 수신 순서를 유지한다.
#[derive(Debug, Default)]
struct Window {
    buffer: Vec<MetricDto>,
}

impl Window {
    fn extend(&mut self, samples: Vec<MetricSample>) {
        self.buffer.extend(samples.into_iter().map(MetricDto::from));
    }

    /// 버퍼를 비우며 배치를 꺼낸다
    fn take(&mut self) -> Option<Batch> {
        (!self.buffer.is_empty()).then(|| std::mem::take(&mut self.buffer))
    }
}

// ============================================================
// 전송 단계
// ============================================================

/// 배치 전송 + 단건 폴백
struct Transport {
    sender: Arc<dyn MetricSender>,
    retry: RetryPolicy,
    span: Span,
}

impl Transport {
    async fn deliver(&self, batch: Batch) -> FlushReport {
        let mut report = FlushReport {
            metrics: batch.len(),
            ..FlushReport::default()
        };

        let sent = self.retry.run(|| self.sender.send_batch(&batch)).await;
        match sent {
            Ok(()) => {
                debug!(parent: &self.span, "배치 전송 완료: {}개", batch.len());
                report.batch_delivered = true;
                return report;
            }
            Err(CoreError::Cancelled) => {
                // 종료 중에는 단건 폴백을 시작하지 않는다
                warn!(parent: &self.span, "종료 신호로 배치 {}개 폐기", batch.len());
                report.dropped = batch.iter().map(|metric| metric.id.clone()).collect();
                return report;
            }
            Err(e) => {
                warn!(parent: &self.span, "배치 전송 실패, 단건 전송으로 전환: {e}");
            }
        }

        let results = join_all(batch.iter().map(|metric| async move {
            let result = self.retry.run(|| self.sender.send_metric(metric)).await;
            (metric, result)
        }))
        .await;

        for (metric, result) in results {
            match result {
                Ok(()) => report.fallback_delivered += 1,
                Err(e) => {
                    error!(parent: &self.span, "메트릭 {} ({}) 전송 포기: {e}", metric.id, metric.kind);
                    report.dropped.push(metric.id.clone());
                }
            }
        }

        info!(
            parent: &self.span,
            "단건 전송 결과: 성공 {}, 실패 {}",
            report.fallback_delivered,
            report.dropped.len()
        );
        report
    }
}

/// 종료 신호 대기. 송신 측이 사라져도 종료로 본다
async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    while !*shutdown.borrow_and_update() {
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

/// 첫 틱이 한 주기 뒤에 오는 타이머
fn ticker(period: Duration) -> tokio::time::Interval {
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

/// 샘플러 하나를 주기적으로 호출해 채널로 보낸다.
///
/// 채널이 가득 차면 전송이 막히지만 종료 신호와 함께 대기하므로 즉시 풀려난다.
pub async fn run_sampler(
    sampler: Arc<dyn Sampler>,
    poll_interval: Duration,
    tx: mpsc::Sender<Vec<MetricSample>>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticks = ticker(poll_interval);
    loop {
        tokio::select! {
            biased;
            _ = wait_for_shutdown(&mut shutdown) => break,
            _ = ticks.tick() => {}
        }

        let samples = match sampler.sample().await {
            Ok(samples) if samples.is_empty() => continue,
            Ok(samples) => samples,
            Err(e) => {
                warn!("{} 샘플링 실패: {e}", sampler.name());
                continue;
            }
        };

        tokio::select! {
            biased;
            _ = wait_for_shutdown(&mut shutdown) => {
                debug!("{} 채널 대기 중 종료", sampler.name());
                break;
            }
            sent = tx.send(samples) => {
                if sent.is_err() {
                    debug!("{} 채널 닫힘", sampler.name());
                    break;
                }
            }
        }
    }
    debug!("{} 샘플러 종료", sampler.name());
}

// ============================================================
// 파이프라인
// ============================================================

/// 전송 파이프라인
pub struct DeliveryPipeline {
    transport: Arc<Transport>,
    mode: DeliveryMode,
    poll_interval: Duration,
    report_interval: Duration,
    channel_capacity: usize,
    span: Span,
}

impl DeliveryPipeline {
    /// 기본값(윈도우 모드, 2초 샘플링, 10초 플러시, 채널 100)으로 생성
    pub fn new(sender: Arc<dyn MetricSender>) -> Self {
        Self {
            transport: Arc::new(Transport {
                sender,
                retry: RetryPolicy::default(),
                span: Span::none(),
            }),
            mode: DeliveryMode::Windowed,
            poll_interval: Duration::from_secs(2),
            report_interval: Duration::from_secs(10),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            span: Span::none(),
        }
    }

    /// 에이전트 설정으로 생성
    pub fn from_config(sender: Arc<dyn MetricSender>, config: &AgentConfig) -> Self {
        Self::new(sender)
            .with_mode(DeliveryMode::from_setting(
                config.delivery_mode,
                config.rate_limit,
            ))
            .with_poll_interval(config.poll_interval())
            .with_report_interval(config.report_interval())
            .with_channel_capacity(config.channel_capacity)
            .with_retry(RetryPolicy::from(&config.retry))
    }

    /// 전송 정책
    pub fn with_mode(mut self, mode: DeliveryMode) -> Self {
        self.mode = mode;
        self
    }

    /// 재시도 정책
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.transport_mut(|t| t.retry = retry);
        self
    }

    /// 샘플링 주기
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// 플러시 주기
    pub fn with_report_interval(mut self, interval: Duration) -> Self {
        self.report_interval = interval;
        self
    }

    /// 채널 용량
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    /// 로그를 남길 span 주입 (재시도 실행기에도 전달)
    pub fn with_span(mut self, span: Span) -> Self {
        let transport_span = span.clone();
        self.transport_mut(move |t| {
            t.retry = t.retry.clone().with_span(transport_span.clone());
            t.span = transport_span;
        });
        self.span = span;
        self
    }

    fn transport_mut(&mut self, f: impl FnOnce(&mut Transport)) {
        match Arc::get_mut(&mut self.transport) {
            Some(transport) => f(transport),
            None => {
                let mut transport = Transport {
                    sender: Arc::clone(&self.transport.sender),
                    retry: self.transport.retry.clone(),
                    span: self.transport.span.clone(),
                };
                f(&mut transport);
                self.transport = Arc::new(transport);
            }
        }
    }

    /// 현재 전송 정책
    pub fn mode(&self) -> DeliveryMode {
        self.mode
    }

    /// 샘플러 루프와 소비 루프를 실행한다. 종료 신호를 받으면 마지막 플러시 후 반환한다.
    pub async fn run(self, samplers: Vec<Arc<dyn Sampler>>, shutdown: watch::Receiver<bool>) {
        let (tx, rx) = mpsc::channel(self.channel_capacity);

        let mut sampler_tasks = JoinSet::new();
        for sampler in samplers {
            let task = run_sampler(sampler, self.poll_interval, tx.clone(), shutdown.clone())
                .instrument(self.span.clone());
            sampler_tasks.spawn(task);
        }
        drop(tx);

        info!(
            parent: &self.span,
            "전송 파이프라인 시작: {:?}, 샘플링 {:?}, 플러시 {:?}",
            self.mode, self.poll_interval, self.report_interval
        );

        self.consume(rx, shutdown).await;

        while let Some(joined) = sampler_tasks.join_next().await {
            if let Err(e) = joined {
                error!(parent: &self.span, "샘플러 태스크 비정상 종료: {e}");
            }
        }
        info!(parent: &self.span, "전송 파이프라인 종료");
    }

    /// 채널을 소비한다. 채널이 닫히거나 종료 신호가 오면 마지막 플러시 후 반환한다.
    pub async fn consume(
        &self,
        rx: mpsc::Receiver<Vec<MetricSample>>,
        shutdown: watch::Receiver<bool>,
    ) -> Vec<FlushReport> {
        let cancel = shutdown.clone();
        let transport = Transport {
            sender: Arc::clone(&self.transport.sender),
            retry: self.transport.retry.clone().with_cancellation(cancel),
            span: self.transport.span.clone(),
        };
        let transport = Arc::new(transport);

        match self.mode {
            DeliveryMode::Windowed => self.consume_windowed(transport, rx, shutdown).await,
            DeliveryMode::BoundedConcurrent { max_in_flight } => {
                self.consume_bounded(transport, max_in_flight, rx, shutdown)
                    .await
            }
        }
    }

    async fn consume_windowed(
        &self,
        transport: Arc<Transport>,
        mut rx: mpsc::Receiver<Vec<MetricSample>>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Vec<FlushReport> {
        let mut window = Window::default();
        let mut flushes = ticker(self.report_interval);
        let mut reports = Vec::new();

        loop {
            tokio::select! {
                biased;
                _ = wait_for_shutdown(&mut shutdown) => break,
                received = rx.recv() => match received {
                    Some(samples) => window.extend(samples),
                    None => break,
                },
                _ = flushes.tick() => {
                    if let Some(batch) = window.take() {
                        reports.push(transport.deliver(batch).await);
                    }
                }
            }
        }

        while let Ok(samples) = rx.try_recv() {
            window.extend(samples);
        }
        if let Some(batch) = window.take() {
            info!(parent: &self.span, "종료 전 마지막 플러시: {}개", batch.len());
            reports.push(transport.deliver(batch).await);
        }
        reports
    }

    async fn consume_bounded(
        &self,
        transport: Arc<Transport>,
        max_in_flight: usize,
        mut rx: mpsc::Receiver<Vec<MetricSample>>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Vec<FlushReport> {
        let slots = Arc::new(Semaphore::new(max_in_flight.max(1)));
        let mut workers: JoinSet<FlushReport> = JoinSet::new();
        let mut reports = Vec::new();
        let mut leftover = Window::default();

        loop {
            tokio::select! {
                biased;
                _ = wait_for_shutdown(&mut shutdown) => break,
                Some(joined) = workers.join_next(), if !workers.is_empty() => {
                    collect_worker(joined, &mut reports, &self.span);
                }
                received = rx.recv() => {
                    let Some(samples) = received else { break };
                    if samples.is_empty() {
                        continue;
                    }
                    let permit = tokio::select! {
                        biased;
                        _ = wait_for_shutdown(&mut shutdown) => {
                            leftover.extend(samples);
                            break;
                        }
                        permit = Arc::clone(&slots).acquire_owned() => permit,
                    };
                    let Ok(permit) = permit else {
                        leftover.extend(samples);
                        break;
                    };
                    let batch: Batch = samples.into_iter().map(MetricDto::from).collect();
                    let transport = Arc::clone(&transport);
                    workers.spawn(
                        async move {
                            let _permit = permit;
                            transport.deliver(batch).await
                        }
                        .instrument(self.span.clone()),
                    );
                }
            }
        }

        while let Ok(samples) = rx.try_recv() {
            leftover.extend(samples);
        }
        if let Some(batch) = leftover.take() {
            info!(parent: &self.span, "종료 전 마지막 플러시: {}개", batch.len());
            reports.push(transport.deliver(batch).await);
        }
        while let Some(joined) = workers.join_next().await {
            collect_worker(joined, &mut reports, &self.span);
        }
        reports
    }
}

fn collect_worker(
    joined: Result<FlushReport, tokio::task::JoinError>,
    reports: &mut Vec<FlushReport>,
    span: &Span,
) {
    match joined {
        Ok(report) => reports.push(report),
        Err(e) => error!(parent: span, "전송 워커 비정상 종료: {e}"),
    }
}
