use crate::error::PipelineError;
use crate::runtime::Pipeline;
use crate::stats::{PipelineStats, ShardStats};
use crate::worker::ShardWorker;
use async_trait::async_trait;
use candleflow_batch::flush::FlushController;
use candleflow_core::common::time::TimeProvider;
use candleflow_core::config::PipelineConfig;
use candleflow_core::notify::port::Notifier;
use candleflow_core::sink::entity::{FeatureGroup, FeatureRecord};
use candleflow_core::sink::port::RecordSink;
use candleflow_core::stream::entity::SourceMessage;
use candleflow_core::stream::error::StreamError;
use candleflow_core::stream::port::StreamSource;
use candleflow_feed::decode::decode_record;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

/// # Summary
/// 特征记录直写分片：记录只经过批次，不做窗口聚合。
pub struct IngestWorker {
    shard: usize,
    flush: FlushController,
    clock: Arc<dyn TimeProvider>,
    stats: Arc<ShardStats>,
}

impl IngestWorker {
    pub fn new(
        shard: usize,
        flush: FlushController,
        clock: Arc<dyn TimeProvider>,
        stats: Arc<ShardStats>,
    ) -> Self {
        Self {
            shard,
            flush,
            clock,
            stats,
        }
    }
}

#[async_trait]
impl ShardWorker for IngestWorker {
    type Input = FeatureRecord;

    async fn on_input(&mut self, record: FeatureRecord) {
        self.stats.record_input();
        let now = self.clock.now_ms();
        if let Err(e) = self.flush.add(record, now).await {
            warn!(shard = self.shard, error = %e, "Continuing after dropped batch");
        }
        self.stats.sync_flush(&self.flush);
    }

    async fn on_tick(&mut self) {
        let now = self.clock.now_ms();
        if let Err(e) = self.flush.poll_idle(now).await {
            warn!(shard = self.shard, error = %e, "Continuing after dropped batch");
        }
        self.stats.sync_flush(&self.flush);
    }

    async fn shutdown(&mut self) {
        let now = self.clock.now_ms();
        if let Err(e) = self.flush.force_flush(now).await {
            warn!(shard = self.shard, error = %e, "Final flush dropped a batch");
        }
        self.stats.sync_flush(&self.flush);
        info!(shard = self.shard, "Shard drained");
    }
}

/// # Summary
/// 构造特征记录解码器。
///
/// # Logic
/// 1. 解码为扁平记录。
/// 2. 在输入边界校验主键与事件时间，缺失即视为解码失败，避免坏记录拖垮整个批次。
/// 3. 以主键值为路由键，同一主键的更新保持顺序。
pub fn record_router(
    group: FeatureGroup,
) -> impl Fn(&SourceMessage) -> Result<(String, FeatureRecord), StreamError> {
    move |msg| {
        let record = decode_record(msg)?;
        let invalid = |reason: String| StreamError::Decode {
            offset: msg.offset,
            key: msg.key.clone(),
            reason,
        };
        let key = group
            .primary_key_of(&record)
            .map_err(|e| invalid(e.to_string()))?;
        group
            .event_time_of(&record)
            .map_err(|e| invalid(e.to_string()))?;
        Ok((key, record))
    }
}

/// 按配置构建特征直写管线
pub fn build_ingest(
    config: &PipelineConfig,
    sink: Arc<dyn RecordSink>,
    notifier: Option<Arc<dyn Notifier>>,
    clock: Arc<dyn TimeProvider>,
) -> Result<Pipeline<IngestWorker>, PipelineError> {
    config.validate()?;
    let stats = Arc::new(PipelineStats::new(config.shard_count));
    let now = clock.now_ms();

    let mut workers = Vec::with_capacity(config.shard_count);
    for (shard, shard_stats) in stats.shards().iter().enumerate() {
        let mut flush = FlushController::from_config(config, sink.clone(), now)?
            .with_label(format!("shard-{}", shard));
        if let Some(notifier) = &notifier {
            flush = flush.with_notifier(notifier.clone());
        }
        workers.push(IngestWorker::new(
            shard,
            flush,
            clock.clone(),
            shard_stats.clone(),
        ));
    }

    Pipeline::new(workers, Duration::from_millis(config.poll_timeout_ms), stats)
}

impl Pipeline<IngestWorker> {
    /// 以特征记录解码器运行
    pub async fn run_records<S: StreamSource>(
        self,
        source: S,
        group: FeatureGroup,
        shutdown: watch::Receiver<bool>,
    ) -> Result<(), PipelineError> {
        self.run(source, record_router(group), shutdown).await
    }
}
