use crate::accumulator::BatchAccumulator;
use crate::policy::{BoundedRetry, RetryDecision, RetryPolicy};
use candleflow_core::config::{ConfigError, PipelineConfig};
use candleflow_core::notify::port::Notifier;
use candleflow_core::sink::entity::FeatureRecord;
use candleflow_core::sink::error::SinkError;
use candleflow_core::sink::port::RecordSink;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// 触发刷新的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushTrigger {
    Size,
    Timeout,
    Shutdown,
}

/// 一次刷新检查的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlushOutcome {
    // 未触发，或批次为空
    Idle,
    // 整批写入成功
    Flushed { records: usize },
    // 写入失败，批次已放回队首等待下一次触发
    Requeued { records: usize, failed_attempts: u32 },
}

/// 刷新控制器的累计统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushStats {
    pub flushes: u64,
    pub records_written: u64,
    pub failures: u64,
    pub dropped_batches: u64,
    pub dropped_records: u64,
}

/// # Summary
/// 双触发批量刷新控制器：数量达到阈值，或距上次刷新超过超时，二者先到先刷。
///
/// # Invariants
/// - 每个批次全有或全无地交给 `RecordSink`。
/// - 失败批次放回队首，重试次数受 `RetryPolicy` 约束。
/// - 重试耗尽时发出致命告警、丢弃批次并返回 `SinkError::RetriesExhausted`。
/// - 空批次永远不会调用 Sink。
pub struct FlushController {
    accumulator: BatchAccumulator<FeatureRecord>,
    threshold: usize,
    // 0 表示关闭超时触发
    flush_timeout_ms: i64,
    last_flush_at_ms: i64,
    // 当前队首批次连续失败次数
    failed_attempts: u32,
    policy: Box<dyn RetryPolicy>,
    sink: Arc<dyn RecordSink>,
    notifier: Option<Arc<dyn Notifier>>,
    label: String,
    stats: FlushStats,
}

impl FlushController {
    /// # Summary
    /// 创建刷新控制器，默认使用 `BoundedRetry::default()` 且不发送告警。
    ///
    /// # Arguments
    /// * `threshold`: 批量阈值，必须 >= 1。
    /// * `flush_timeout_ms`: 超时，0 为关闭，负数非法。
    /// * `sink`: 下游写入目标。
    /// * `now_ms`: 当前时间，作为 `last_flush_at` 初值。
    pub fn new(
        threshold: i64,
        flush_timeout_ms: i64,
        sink: Arc<dyn RecordSink>,
        now_ms: i64,
    ) -> Result<Self, ConfigError> {
        if threshold <= 0 {
            return Err(ConfigError::InvalidBatchThreshold(threshold));
        }
        if flush_timeout_ms < 0 {
            return Err(ConfigError::InvalidFlushTimeout(flush_timeout_ms));
        }
        let threshold =
            usize::try_from(threshold).map_err(|_| ConfigError::InvalidBatchThreshold(threshold))?;

        Ok(Self {
            accumulator: BatchAccumulator::new(),
            threshold,
            flush_timeout_ms,
            last_flush_at_ms: now_ms,
            failed_attempts: 0,
            policy: Box::new(BoundedRetry::default()),
            sink,
            notifier: None,
            label: "sink".to_string(),
            stats: FlushStats::default(),
        })
    }

    /// 由管线配置构造，重试上限取 `sink_max_retries`
    pub fn from_config(
        config: &PipelineConfig,
        sink: Arc<dyn RecordSink>,
        now_ms: i64,
    ) -> Result<Self, ConfigError> {
        Ok(Self::new(
            config.batch_size_threshold,
            config.flush_timeout_ms,
            sink,
            now_ms,
        )?
        .with_policy(Box::new(BoundedRetry::new(config.sink_max_retries))))
    }

    pub fn with_policy(mut self, policy: Box<dyn RetryPolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// 日志与告警中使用的名字，通常是分片编号
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn pending(&self) -> usize {
        self.accumulator.size()
    }

    pub fn stats(&self) -> FlushStats {
        self.stats
    }

    /// # Summary
    /// 追加一条记录，达到数量阈值时立即刷新。
    ///
    /// # Returns
    /// 未触发返回 `Idle`；重试耗尽返回 `SinkError::RetriesExhausted`。
    pub async fn add(
        &mut self,
        record: FeatureRecord,
        now_ms: i64,
    ) -> Result<FlushOutcome, SinkError> {
        self.accumulator.add(record, now_ms);
        if self.accumulator.size() >= self.threshold {
            return self.flush(FlushTrigger::Size, now_ms).await;
        }
        Ok(FlushOutcome::Idle)
    }

    /// # Summary
    /// 空闲检查：批次非空且超时到期时刷新。
    ///
    /// # Logic
    /// 1. 超时关闭或批次为空时直接返回 `Idle`。
    /// 2. 计时起点取上次刷新时间与当前批次开始时间中较晚者。
    /// 3. 到期则刷新。
    pub async fn poll_idle(&mut self, now_ms: i64) -> Result<FlushOutcome, SinkError> {
        if self.flush_timeout_ms == 0 || self.accumulator.is_empty() {
            return Ok(FlushOutcome::Idle);
        }
        let since = self
            .accumulator
            .created_at()
            .map_or(self.last_flush_at_ms, |created| {
                created.max(self.last_flush_at_ms)
            });
        if now_ms.saturating_sub(since) >= self.flush_timeout_ms {
            return self.flush(FlushTrigger::Timeout, now_ms).await;
        }
        Ok(FlushOutcome::Idle)
    }

    /// # Summary
    /// 停机时强制刷新全部剩余记录，失败时立即重试直到成功或策略放弃。
    pub async fn force_flush(&mut self, now_ms: i64) -> Result<FlushOutcome, SinkError> {
        let mut written = 0;
        loop {
            match self.flush(FlushTrigger::Shutdown, now_ms).await? {
                FlushOutcome::Flushed { records } => written += records,
                FlushOutcome::Idle => break,
                FlushOutcome::Requeued { .. } => continue,
            }
        }
        if written == 0 {
            return Ok(FlushOutcome::Idle);
        }
        Ok(FlushOutcome::Flushed { records: written })
    }

    async fn flush(
        &mut self,
        trigger: FlushTrigger,
        now_ms: i64,
    ) -> Result<FlushOutcome, SinkError> {
        if self.accumulator.is_empty() {
            return Ok(FlushOutcome::Idle);
        }
        let created_at = self.accumulator.created_at();
        let batch = self.accumulator.drain();
        let records = batch.len();
        self.last_flush_at_ms = now_ms;

        match self.sink.write(&batch).await {
            Ok(()) => {
                self.failed_attempts = 0;
                self.stats.flushes += 1;
                self.stats.records_written += u64::try_from(records).unwrap_or(u64::MAX);
                debug!(sink = %self.label, ?trigger, records, "Batch flushed");
                Ok(FlushOutcome::Flushed { records })
            }
            Err(e) => {
                self.failed_attempts = self.failed_attempts.saturating_add(1);
                self.stats.failures += 1;
                match self.policy.on_failure(self.failed_attempts) {
                    RetryDecision::Retry => {
                        warn!(
                            sink = %self.label,
                            ?trigger,
                            records,
                            attempt = self.failed_attempts,
                            error = %e,
                            "Batch write failed, requeued"
                        );
                        self.accumulator.requeue_front(batch, created_at);
                        Ok(FlushOutcome::Requeued {
                            records,
                            failed_attempts: self.failed_attempts,
                        })
                    }
                    RetryDecision::GiveUp => {
                        let attempts = self.failed_attempts;
                        self.failed_attempts = 0;
                        self.stats.dropped_batches += 1;
                        self.stats.dropped_records += u64::try_from(records).unwrap_or(u64::MAX);
                        error!(
                            sink = %self.label,
                            records,
                            attempts,
                            error = %e,
                            "Batch dropped after retries exhausted"
                        );
                        self.alert(records, attempts, &e).await;
                        Err(SinkError::RetriesExhausted {
                            attempts,
                            records,
                            last_error: e.to_string(),
                        })
                    }
                }
            }
        }
    }

    async fn alert(&self, records: usize, attempts: u32, last_error: &SinkError) {
        let Some(notifier) = &self.notifier else {
            return;
        };
        let subject = format!("[candleflow] batch dropped on {}", self.label);
        let content = format!(
            "{records} records dropped after {attempts} failed attempts. Last error: {last_error}"
        );
        match notifier.notify(&subject, &content).await {
            Ok(()) => info!(sink = %self.label, "Drop alert sent"),
            Err(e) => error!(sink = %self.label, error = %e, "Failed to send drop alert"),
        }
    }
}
