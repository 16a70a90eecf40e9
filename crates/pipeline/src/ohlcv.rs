use crate::error::PipelineError;
use crate::runtime::Pipeline;
use crate::stats::{PipelineStats, ShardStats};
use crate::worker::ShardWorker;
use async_trait::async_trait;
use candleflow_batch::flush::{FlushController, FlushOutcome};
use candleflow_core::common::time::TimeProvider;
use candleflow_core::config::PipelineConfig;
use candleflow_core::market::entity::Trade;
use candleflow_core::notify::port::Notifier;
use candleflow_core::sink::entity::FeatureRecord;
use candleflow_core::sink::error::SinkError;
use candleflow_core::sink::port::RecordSink;
use candleflow_core::stream::entity::SourceMessage;
use candleflow_core::stream::error::StreamError;
use candleflow_core::stream::port::{CandlePublisher, StreamSource};
use candleflow_core::window::entity::WindowEmission;
use candleflow_core::window::error::WindowError;
use candleflow_feed::decode::decode_trade;
use candleflow_window::lifecycle::WindowController;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

/// OHLCV 管线的外部依赖，由应用层注入
#[derive(Clone)]
pub struct OhlcvDeps {
    pub sink: Arc<dyn RecordSink>,
    pub publisher: Option<Arc<dyn CandlePublisher>>,
    pub notifier: Option<Arc<dyn Notifier>>,
    pub clock: Arc<dyn TimeProvider>,
}

/// # Summary
/// 成交 -> K 线分片：窗口聚合、发布中间结果、批量写入特征存储。
pub struct CandleWorker {
    shard: usize,
    windows: WindowController,
    flush: FlushController,
    publisher: Option<Arc<dyn CandlePublisher>>,
    clock: Arc<dyn TimeProvider>,
    stats: Arc<ShardStats>,
}

impl CandleWorker {
    pub fn new(
        shard: usize,
        windows: WindowController,
        flush: FlushController,
        publisher: Option<Arc<dyn CandlePublisher>>,
        clock: Arc<dyn TimeProvider>,
        stats: Arc<ShardStats>,
    ) -> Self {
        Self {
            shard,
            windows,
            flush,
            publisher,
            clock,
            stats,
        }
    }

    /// # Summary
    /// 下发一次窗口发射。
    ///
    /// # Logic
    /// 1. 发布到中间主题，失败只记录。
    /// 2. 转为特征记录进入批次，可能触发数量刷新。
    async fn emit(&mut self, emission: WindowEmission) {
        self.stats.record_candle();
        let candle = emission.candle;
        if let Some(publisher) = &self.publisher
            && let Err(e) = publisher.publish(&candle).await
        {
            self.stats.record_publish_error();
            warn!(
                shard = self.shard,
                product_id = %candle.product_id,
                window_start = emission.bounds.start_ms,
                error = %e,
                "Candle publish failed"
            );
        }
        let now = self.clock.now_ms();
        let result = self.flush.add(FeatureRecord::from(&candle), now).await;
        self.after_flush(result);
    }

    fn after_flush(&self, result: Result<FlushOutcome, SinkError>) {
        if let Err(e) = result {
            // 批次已丢弃并告警，分片继续运行
            warn!(shard = self.shard, error = %e, "Continuing after dropped batch");
        }
        self.stats.sync_flush(&self.flush);
    }
}

#[async_trait]
impl ShardWorker for CandleWorker {
    type Input = Trade;

    async fn on_input(&mut self, trade: Trade) {
        self.stats.record_input();
        match self.windows.process(&trade) {
            Ok(emissions) => {
                for emission in emissions {
                    self.emit(emission).await;
                }
            }
            Err(WindowError::LateEvent { .. }) => self.stats.record_late(),
            Err(WindowError::TimestampOutOfRange { .. }) => self.stats.record_rejected(),
        }
        self.stats.set_open_windows(self.windows.open_window_count());
    }

    async fn on_tick(&mut self) {
        let now = self.clock.now_ms();
        let result = self.flush.poll_idle(now).await;
        self.after_flush(result);
    }

    async fn shutdown(&mut self) {
        let closing = self.windows.close_all();
        let closed = closing.len();
        for emission in closing {
            self.emit(emission).await;
        }
        self.stats.set_open_windows(0);

        let now = self.clock.now_ms();
        let result = self.flush.force_flush(now).await;
        self.after_flush(result);
        info!(shard = self.shard, closed_windows = closed, "Shard drained");
    }
}

/// 解码成交并以品种代码为路由键
pub fn route_trade(msg: &SourceMessage) -> Result<(String, Trade), StreamError> {
    let trade = decode_trade(msg)?;
    Ok((trade.product_id.clone(), trade))
}

/// # Summary
/// 按配置构建 OHLCV 管线。
///
/// # Logic
/// 1. 校验配置。
/// 2. 为每个分片创建独立的窗口控制器与刷新控制器。
///
/// # Returns
/// 配置非法时返回 `PipelineError::Config`。
pub fn build_ohlcv(
    config: &PipelineConfig,
    deps: OhlcvDeps,
) -> Result<Pipeline<CandleWorker>, PipelineError> {
    config.validate()?;
    let stats = Arc::new(PipelineStats::new(config.shard_count));
    let now = deps.clock.now_ms();

    let mut workers = Vec::with_capacity(config.shard_count);
    for (shard, shard_stats) in stats.shards().iter().enumerate() {
        let mut flush = FlushController::from_config(config, deps.sink.clone(), now)?
            .with_label(format!("shard-{}", shard));
        if let Some(notifier) = &deps.notifier {
            flush = flush.with_notifier(notifier.clone());
        }
        workers.push(CandleWorker::new(
            shard,
            WindowController::from_config(config)?,
            flush,
            deps.publisher.clone(),
            deps.clock.clone(),
            shard_stats.clone(),
        ));
    }

    Pipeline::new(workers, Duration::from_millis(config.poll_timeout_ms), stats)
}

impl Pipeline<CandleWorker> {
    /// 以成交解码器运行
    pub async fn run_trades<S: StreamSource>(
        self,
        source: S,
        shutdown: watch::Receiver<bool>,
    ) -> Result<(), PipelineError> {
        self.run(source, route_trade, shutdown).await
    }
}
