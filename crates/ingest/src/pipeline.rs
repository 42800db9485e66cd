//! 파이프라인 오케스트레이션 -- 읽기/집계/보강/발행/체크포인트의 전체 흐름을 관리합니다.
//!
//! [`IngestPipeline`]은 core의 [`Pipeline`](u2post_core::pipeline::Pipeline) trait을 구현하여
//! `u2post-daemon`에서 시작/정지/상태 확인을 받습니다.
//!
//! # 내부 아키텍처
//! ```text
//! SpoolReader -> EventAggregator -> AlertBuilder --mpsc(spool_size)--> AlertBuffer -> Publisher
//!      |                                                                   |
//!      +-- ClosedFile ------------------(같은 채널, 순서 유지)------------> Registrar
//!                                                                          |
//!                                                                          +--> Archiver
//! ```
//!
//! - 리더 태스크만 스풀을 읽고, 플러시 태스크만 버퍼와 레지스트라를 갱신합니다.
//! - 체크포인트는 발행이 성공한 배치의 마지막 알림 위치로만 전진합니다.
//! - 닫힘 알림은 그 파일의 알림 뒤에 같은 채널로 흐르므로, 보관은 항상
//!   해당 파일의 알림이 모두 발행된 뒤에 일어납니다.
//! - 정지 요청을 받으면 리더는 현재 레코드를 마친 뒤 보류 중인 알림 단위를
//!   내보내고 채널을 닫습니다. 플러시 태스크는 남은 배치를 발행하고
//!   체크포인트를 마지막으로 저장한 뒤 끝납니다.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use u2post_core::SpoolPosition;
use u2post_core::error::{PipelineError, U2PostError};
use u2post_core::metrics as m;
use u2post_core::pipeline::{HealthStatus, Pipeline};
use u2post_unified2::{AlertUnit, EventAggregator, Record};

use crate::alert::{AlertBuilder, AlertEvent};
use crate::buffer::AlertBuffer;
use crate::collector::{Archiver, ClosedFile, SpoolReader};
use crate::config::IngestConfig;
use crate::error::IngestError;
use crate::publish::{ChannelPublisher, Publisher};
use crate::registrar::Registrar;
use crate::rule::{RuleIndex, RuleLoader};

/// 파이프라인 실행 상태
#[derive(Debug, Clone, PartialEq, Eq)]
enum PipelineState {
    /// 초기화됨, 아직 시작하지 않음
    Initialized,
    /// 실행 중
    Running,
    /// 정지됨
    Stopped,
}

/// 리더 태스크 → 플러시 태스크 메시지
#[derive(Debug)]
enum SpoolMessage {
    /// 보강된 알림
    Alert(AlertEvent),
    /// 파일 하나를 끝까지 읽고 다음 파일로 넘어감
    Closed(ClosedFile),
}

/// 태스크 간 공유 카운터
#[derive(Debug, Default)]
struct PipelineStats {
    records_read: AtomicU64,
    decode_errors: AtomicU64,
    alerts_published: AtomicU64,
    publish_failures: AtomicU64,
    checkpoint_failures: AtomicU64,
    publish_failing: AtomicBool,
}

/// unified2 스풀 수집 파이프라인
///
/// # 사용 예시
/// ```ignore
/// use u2post_ingest::{IngestConfig, IngestPipelineBuilder};
///
/// let (mut pipeline, alert_rx) = IngestPipelineBuilder::new()
///     .config(config)
///     .build()?;
///
/// pipeline.start().await?;
/// ```
pub struct IngestPipeline {
    /// 파이프라인 설정
    config: IngestConfig,
    /// 현재 상태
    state: PipelineState,
    /// 다운스트림 발행기
    publisher: Arc<dyn Publisher>,
    /// 외부에서 주입한 룰 인덱스 (없으면 시작 시 로드)
    preloaded_rules: Option<Arc<RuleIndex>>,
    /// 시작 후 사용 중인 룰 인덱스
    rules: Option<Arc<RuleIndex>>,
    /// 체크포인트 저장소
    registrar: Option<Arc<Registrar>>,
    /// 협조적 정지 신호
    cancel: CancellationToken,
    /// 백그라운드 태스크 핸들 (리더, 플러시, 보관 순)
    tasks: Vec<JoinHandle<()>>,
    /// 공유 카운터
    stats: Arc<PipelineStats>,
}

impl IngestPipeline {
    /// 현재 상태를 반환합니다.
    pub fn state_name(&self) -> &str {
        match self.state {
            PipelineState::Initialized => "initialized",
            PipelineState::Running => "running",
            PipelineState::Stopped => "stopped",
        }
    }

    /// 파이프라인 설정
    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// 발행기 이름
    pub fn publisher_name(&self) -> &str {
        self.publisher.name()
    }

    /// 읽은 레코드 수
    pub fn records_read(&self) -> u64 {
        self.stats.records_read.load(Ordering::Relaxed)
    }

    /// 디코딩 에러 수
    pub fn decode_errors(&self) -> u64 {
        self.stats.decode_errors.load(Ordering::Relaxed)
    }

    /// 발행된 알림 수
    pub fn alerts_published(&self) -> u64 {
        self.stats.alerts_published.load(Ordering::Relaxed)
    }

    /// 발행 실패 횟수
    pub fn publish_failures(&self) -> u64 {
        self.stats.publish_failures.load(Ordering::Relaxed)
    }

    /// 로드된 룰 수 (시작 전에는 주입된 인덱스 기준)
    pub fn rule_count(&self) -> usize {
        self.rules
            .as_ref()
            .or(self.preloaded_rules.as_ref())
            .map_or(0, |rules| rules.len())
    }

    /// 레지스트라의 현재 체크포인트 (시작 전에는 `None`)
    pub async fn checkpoint(&self) -> Option<SpoolPosition> {
        match &self.registrar {
            Some(registrar) => Some(registrar.state().await),
            None => None,
        }
    }

    async fn spawn_tasks(&mut self) -> Result<(), IngestError> {
        // 1. 룰 인덱스와 레지스트라 (leaf 먼저)
        let rules = match &self.preloaded_rules {
            Some(rules) => Arc::clone(rules),
            None => Arc::new(
                RuleLoader::load(&self.config.gen_msg_map_path, &self.config.rule_paths).await?,
            ),
        };
        let registrar = Arc::new(Registrar::new(&self.config.registry_file).await?);
        let position = registrar.load().await;

        // 2. 체크포인트 위치로 리더 준비
        let (mut reader, closed_rx) = SpoolReader::new(
            &self.config.spool_dir,
            self.config.prefix.clone(),
            self.config.max_record_bytes,
        )?;
        reader.seek(&position).await?;

        // 3. 채널과 태스크
        let cancel = CancellationToken::new();
        let (spool_tx, spool_rx) = mpsc::channel(self.config.spool_size);
        let (archive_tx, archive_rx) = mpsc::unbounded_channel();

        let reader_task = ReaderTask {
            reader,
            closed_rx,
            aggregator: EventAggregator::new(),
            builder: AlertBuilder::new(Arc::clone(&rules), self.config.fields.clone()),
            tx: spool_tx,
            cancel: cancel.clone(),
            poll_interval: self.config.poll_interval(),
            aggregate_flush: self.config.aggregate_flush(),
            origin: None,
            last_record: Instant::now(),
            stats: Arc::clone(&self.stats),
        };
        let flush_task = FlushTask {
            rx: spool_rx,
            buffer: AlertBuffer::new(self.config.spool_size),
            publisher: Arc::clone(&self.publisher),
            registrar: Arc::clone(&registrar),
            archive_tx,
            cancel: cancel.clone(),
            idle_timeout: self.config.idle_timeout(),
            retry_backoff: self.config.publish_retry_backoff(),
            abandoned: false,
            stats: Arc::clone(&self.stats),
        };
        let archiver = Archiver::new(self.config.archive_prefix.clone(), self.config.archive);

        self.tasks.push(tokio::spawn(reader_task.run()));
        self.tasks.push(tokio::spawn(flush_task.run()));
        self.tasks.push(tokio::spawn(archiver.run(archive_rx)));

        tracing::info!(
            spool_dir = %self.config.spool_dir.display(),
            prefix = %self.config.prefix,
            resume = %position,
            rules = rules.len(),
            publisher = self.publisher.name(),
            "ingest tasks spawned"
        );

        self.rules = Some(rules);
        self.registrar = Some(registrar);
        self.cancel = cancel;
        Ok(())
    }
}

impl Pipeline for IngestPipeline {
    async fn start(&mut self) -> Result<(), U2PostError> {
        if self.state == PipelineState::Running {
            return Err(PipelineError::AlreadyRunning.into());
        }

        tracing::info!("starting ingest pipeline");
        self.spawn_tasks().await.map_err(U2PostError::from)?;

        self.state = PipelineState::Running;
        tracing::info!("ingest pipeline started");
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), U2PostError> {
        if self.state != PipelineState::Running {
            return Err(PipelineError::NotRunning.into());
        }

        tracing::info!("stopping ingest pipeline");
        self.cancel.cancel();

        // 리더가 채널을 닫아야 플러시 태스크가, 플러시 태스크가 끝나야 보관기가 끝난다
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "ingest task terminated abnormally");
            }
        }

        if let Some(registrar) = &self.registrar {
            let checkpoint = registrar.state().await;
            tracing::info!(checkpoint = %checkpoint, "final checkpoint");
        }

        self.state = PipelineState::Stopped;
        tracing::info!(
            published = self.alerts_published(),
            decode_errors = self.decode_errors(),
            "ingest pipeline stopped"
        );
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        match self.state {
            PipelineState::Running => {
                if self.tasks.iter().any(JoinHandle::is_finished) {
                    HealthStatus::Unhealthy("ingest task exited unexpectedly".to_owned())
                } else if self.stats.publish_failing.load(Ordering::Relaxed) {
                    HealthStatus::Degraded(format!(
                        "publisher '{}' is failing",
                        self.publisher.name()
                    ))
                } else {
                    HealthStatus::Healthy
                }
            }
            PipelineState::Initialized => HealthStatus::Unhealthy("not started".to_owned()),
            PipelineState::Stopped => HealthStatus::Unhealthy("stopped".to_owned()),
        }
    }
}

/// 보류 중인 알림 단위의 출처
struct UnitOrigin {
    path: PathBuf,
    offset: u64,
}

/// 스풀을 읽어 알림을 만드는 태스크
struct ReaderTask {
    reader: SpoolReader,
    closed_rx: mpsc::UnboundedReceiver<ClosedFile>,
    aggregator: EventAggregator,
    builder: AlertBuilder,
    tx: mpsc::Sender<SpoolMessage>,
    cancel: CancellationToken,
    poll_interval: Duration,
    aggregate_flush: Duration,
    origin: Option<UnitOrigin>,
    last_record: Instant,
    stats: Arc<PipelineStats>,
}

impl ReaderTask {
    async fn run(mut self) {
        tracing::debug!("spool reader task started");

        while !self.cancel.is_cancelled() {
            let before = self.reader.position();
            let result = self.reader.next().await;

            // 파일이 넘어갔으면 보류 중인 단위는 이전 파일 소속이다
            while let Ok(closed) = self.closed_rx.try_recv() {
                if !self.flush_pending(before.clone()).await
                    || !self.send(SpoolMessage::Closed(closed)).await
                {
                    return;
                }
            }

            match result {
                Ok(Some(record)) => {
                    if !self.on_record(record).await {
                        return;
                    }
                }
                Ok(None) => {
                    if self.aggregator.has_pending()
                        && self.last_record.elapsed() >= self.aggregate_flush
                    {
                        let position = self.reader.position();
                        if !self.flush_pending(position).await {
                            return;
                        }
                    }
                    self.idle().await;
                }
                Err(e) if e.is_record_local() => {
                    self.stats.decode_errors.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(
                        position = %self.reader.position(),
                        error = %e,
                        "skipping undecodable record"
                    );
                    // 깨진 이벤트 뒤의 패킷이 이전 묶음에 붙지 않도록 여기서 끊는다
                    if e.is_event_decode() {
                        let start = self.reader.record_start();
                        if !self.flush_pending(start).await {
                            return;
                        }
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "spool read failed, retrying");
                    self.idle().await;
                }
            }
        }

        let position = self.reader.position();
        self.flush_pending(position).await;
        tracing::debug!("spool reader task stopped");
    }

    async fn on_record(&mut self, record: Record) -> bool {
        self.stats.records_read.fetch_add(1, Ordering::Relaxed);
        self.last_record = Instant::now();

        let start = self.reader.record_start();
        let is_event = matches!(record, Record::Event(_));

        if let Some(unit) = self.aggregator.add(record) {
            // 다시 읽을 위치는 방금 읽은 새 이벤트의 시작
            if !self.emit(unit, start.clone()).await {
                return false;
            }
        }
        if is_event {
            self.origin = Some(UnitOrigin {
                path: self.reader.current_path().map(Path::to_path_buf).unwrap_or_default(),
                offset: start.offset,
            });
        }
        true
    }

    async fn flush_pending(&mut self, checkpoint: SpoolPosition) -> bool {
        match self.aggregator.flush() {
            Some(unit) => self.emit(unit, checkpoint).await,
            None => true,
        }
    }

    async fn emit(&mut self, unit: AlertUnit, checkpoint: SpoolPosition) -> bool {
        let Some(origin) = self.origin.take() else {
            return true;
        };
        let alert = self
            .builder
            .build(&unit, &origin.path, origin.offset, checkpoint);
        tracing::debug!(
            event_id = alert.alert.event_id,
            signature_id = alert.alert.signature_id,
            attachments = unit.len().saturating_sub(1),
            "alert unit completed"
        );
        self.send(SpoolMessage::Alert(alert)).await
    }

    async fn send(&self, message: SpoolMessage) -> bool {
        if self.tx.send(message).await.is_err() {
            tracing::error!("flush task is gone, stopping spool reader");
            return false;
        }
        true
    }

    async fn idle(&self) {
        tokio::select! {
            () = self.cancel.cancelled() => {}
            () = tokio::time::sleep(self.poll_interval) => {}
        }
    }
}

/// 배치를 모아 발행하고 체크포인트를 전진시키는 태스크
struct FlushTask {
    rx: mpsc::Receiver<SpoolMessage>,
    buffer: AlertBuffer,
    publisher: Arc<dyn Publisher>,
    registrar: Arc<Registrar>,
    archive_tx: mpsc::UnboundedSender<ClosedFile>,
    cancel: CancellationToken,
    idle_timeout: Duration,
    retry_backoff: Duration,
    /// 정지 중 발행을 포기했으면 이후 체크포인트를 전진시키지 않는다
    abandoned: bool,
    stats: Arc<PipelineStats>,
}

impl FlushTask {
    async fn run(mut self) {
        tracing::debug!(publisher = self.publisher.name(), "flush task started");
        let mut ticker = tokio::time::interval(self.idle_timeout);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                message = self.rx.recv() => match message {
                    Some(SpoolMessage::Alert(alert)) => {
                        if self.buffer.push(alert) {
                            self.flush().await;
                        }
                    }
                    Some(SpoolMessage::Closed(closed)) => self.on_closed(closed).await,
                    None => break,
                },
                _ = ticker.tick() => {
                    if self.buffer.idle_expired(self.idle_timeout) {
                        self.flush().await;
                    }
                }
            }
        }

        self.flush().await;
        if !self.abandoned && self.registrar.persist().await.is_err() {
            self.stats.checkpoint_failures.fetch_add(1, Ordering::Relaxed);
        }
        tracing::debug!(
            received = self.buffer.total_received(),
            "flush task stopped"
        );
    }

    /// 버퍼를 발행합니다. 발행이 확인되지 않았으면 `false`.
    async fn flush(&mut self) -> bool {
        if self.buffer.is_empty() {
            return !self.abandoned;
        }
        let batch = self.buffer.take_batch();
        if self.abandoned {
            tracing::debug!(count = batch.len(), "dropping batch after abandoned publish");
            return false;
        }

        if !self.publish_with_retry(&batch).await {
            self.abandoned = true;
            tracing::warn!(
                count = batch.len(),
                "shutdown interrupted publishing, unpublished alerts will be re-read on restart"
            );
            return false;
        }

        if let Some(last) = batch.last() {
            self.checkpoint(last.position.clone()).await;
        }
        true
    }

    async fn on_closed(&mut self, closed: ClosedFile) {
        if !self.flush().await {
            return;
        }
        self.checkpoint(SpoolPosition::new(closed.successor.clone(), 0))
            .await;
        if self.archive_tx.send(closed).is_err() {
            tracing::warn!("archiver is gone, leaving consumed spool file in place");
        }
    }

    async fn checkpoint(&self, position: SpoolPosition) {
        if self.registrar.checkpoint(position).await.is_err() {
            self.stats.checkpoint_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    async fn publish_with_retry(&self, batch: &[AlertEvent]) -> bool {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let started = Instant::now();
            match self.publisher.publish(batch).await {
                Ok(()) => {
                    metrics::histogram!(m::PUBLISH_DURATION_SECONDS)
                        .record(started.elapsed().as_secs_f64());
                    for event in batch {
                        metrics::counter!(
                            m::PUBLISH_ALERTS_TOTAL,
                            m::LABEL_SEVERITY => event.alert.severity.as_str()
                        )
                        .increment(1);
                    }
                    self.stats
                        .alerts_published
                        .fetch_add(batch.len() as u64, Ordering::Relaxed);
                    if self.stats.publish_failing.swap(false, Ordering::Relaxed) {
                        tracing::info!(attempt, "publisher recovered");
                    }
                    tracing::debug!(count = batch.len(), "published alert batch");
                    return true;
                }
                Err(e) => {
                    metrics::counter!(m::PUBLISH_FAILURES_TOTAL).increment(1);
                    self.stats.publish_failures.fetch_add(1, Ordering::Relaxed);
                    self.stats.publish_failing.store(true, Ordering::Relaxed);
                    tracing::error!(
                        publisher = self.publisher.name(),
                        attempt,
                        count = batch.len(),
                        error = %e,
                        "failed to publish alert batch"
                    );

                    tokio::select! {
                        () = self.cancel.cancelled() => return false,
                        () = tokio::time::sleep(self.retry_backoff) => {}
                    }
                }
            }
        }
    }
}

/// 수집 파이프라인 빌더
pub struct IngestPipelineBuilder {
    config: IngestConfig,
    publisher: Option<Arc<dyn Publisher>>,
    rules: Option<Arc<RuleIndex>>,
    alert_channel_capacity: usize,
}

impl IngestPipelineBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self {
            config: IngestConfig::default(),
            publisher: None,
            rules: None,
            alert_channel_capacity: 1024,
        }
    }

    /// 파이프라인 설정을 지정합니다.
    pub fn config(mut self, config: IngestConfig) -> Self {
        self.config = config;
        self
    }

    /// 발행기를 지정합니다.
    ///
    /// 지정하지 않으면 빌더가 [`ChannelPublisher`]를 만들고 수신 채널을 돌려줍니다.
    pub fn publisher(mut self, publisher: Arc<dyn Publisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    /// 미리 로드한 룰 인덱스를 사용합니다.
    ///
    /// 지정하지 않으면 `start` 시 설정의 룰 경로에서 로드합니다.
    pub fn rules(mut self, rules: Arc<RuleIndex>) -> Self {
        self.rules = Some(rules);
        self
    }

    /// 알림 채널 용량을 설정합니다 (발행기 미지정 시).
    pub fn alert_channel_capacity(mut self, capacity: usize) -> Self {
        self.alert_channel_capacity = capacity;
        self
    }

    /// 파이프라인을 빌드합니다.
    ///
    /// # Returns
    /// - `IngestPipeline`: 파이프라인 인스턴스
    /// - `Option<mpsc::Receiver<AlertEvent>>`: 알림 수신 채널
    ///   (발행기를 지정한 경우 None)
    pub fn build(
        self,
    ) -> Result<(IngestPipeline, Option<mpsc::Receiver<AlertEvent>>), IngestError> {
        self.config.validate()?;

        let (publisher, alert_rx) = match self.publisher {
            Some(publisher) => (publisher, None),
            None => {
                if self.alert_channel_capacity == 0 {
                    return Err(IngestError::Config {
                        field: "alert_channel_capacity".to_owned(),
                        reason: "must be greater than 0".to_owned(),
                    });
                }
                let (publisher, rx) = ChannelPublisher::new(self.alert_channel_capacity);
                (Arc::new(publisher) as Arc<dyn Publisher>, Some(rx))
            }
        };

        let pipeline = IngestPipeline {
            config: self.config,
            state: PipelineState::Initialized,
            publisher,
            preloaded_rules: self.rules,
            rules: None,
            registrar: None,
            cancel: CancellationToken::new(),
            tasks: Vec::new(),
            stats: Arc::new(PipelineStats::default()),
        };

        Ok((pipeline, alert_rx))
    }
}

impl Default for IngestPipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
