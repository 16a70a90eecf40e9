use crate::error::PipelineError;
use crate::router::shard_for;
use crate::stats::PipelineStats;
use crate::worker::ShardWorker;
use candleflow_core::config::ConfigError;
use candleflow_core::stream::entity::SourceMessage;
use candleflow_core::stream::error::StreamError;
use candleflow_core::stream::port::StreamSource;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, trace, warn};

/// 每个分片输入队列的容量
const SHARD_QUEUE: usize = 1024;

/// # Summary
/// 分片管线运行时。
///
/// # Invariants
/// - 读取循环是唯一的输入消费者，每次拉取都以 `poll_timeout` 为上界。
/// - 同一个路由键的输入总是进入同一个分片，保持键内顺序。
/// - 停机顺序：停止读取 -> 关闭分片队列 -> 各分片关窗并强制刷新 -> 等待全部分片退出。
pub struct Pipeline<W: ShardWorker> {
    workers: Vec<W>,
    poll_timeout: Duration,
    stats: Arc<PipelineStats>,
}

impl<W: ShardWorker> Pipeline<W> {
    /// # Summary
    /// 由已构建的分片工作者创建运行时。
    ///
    /// # Returns
    /// 没有工作者或拉取超时为 0 时返回 `ConfigError`。
    pub fn new(
        workers: Vec<W>,
        poll_timeout: Duration,
        stats: Arc<PipelineStats>,
    ) -> Result<Self, PipelineError> {
        if workers.is_empty() {
            return Err(ConfigError::InvalidShardCount.into());
        }
        if poll_timeout.is_zero() {
            return Err(ConfigError::InvalidPollTimeout.into());
        }
        Ok(Self {
            workers,
            poll_timeout,
            stats,
        })
    }

    pub fn stats(&self) -> Arc<PipelineStats> {
        self.stats.clone()
    }

    pub fn shard_count(&self) -> usize {
        self.workers.len()
    }

    /// # Summary
    /// 运行管线直到输入耗尽或收到停机信号。
    ///
    /// # Logic
    /// 1. 为每个工作者启动专属任务与输入队列。
    /// 2. 读取循环：有界拉取 -> 解码 -> 按键路由。
    ///    解码失败记录并跳过；传输故障记录并跳过本轮；`Closed` 结束循环。
    /// 3. 停机信号到达时立即停止读取。
    /// 4. 关闭全部分片队列并等待分片完成关窗与强制刷新。
    ///
    /// # Arguments
    /// * `source`: 输入源，由运行时独占。
    /// * `decode`: 解码并给出路由键。
    /// * `shutdown`: 值变为 true 时开始停机；发送端丢弃不会触发停机。
    pub async fn run<S, D>(
        self,
        mut source: S,
        decode: D,
        shutdown: watch::Receiver<bool>,
    ) -> Result<(), PipelineError>
    where
        S: StreamSource,
        D: Fn(&SourceMessage) -> Result<(String, W::Input), StreamError>,
    {
        let Self {
            workers,
            poll_timeout,
            stats,
        } = self;
        let shard_count = workers.len();

        let mut senders = Vec::with_capacity(shard_count);
        let mut handles = Vec::with_capacity(shard_count);
        for (id, worker) in workers.into_iter().enumerate() {
            let (tx, rx) = mpsc::channel(SHARD_QUEUE);
            senders.push(tx);
            handles.push(tokio::spawn(run_shard(id, worker, rx, poll_timeout)));
        }
        info!(shards = shard_count, ?poll_timeout, "Pipeline started");

        let stop = wait_for_stop(shutdown);
        tokio::pin!(stop);

        let mut outcome = Ok(());
        loop {
            let polled = tokio::select! {
                biased;
                _ = &mut stop => {
                    info!("Shutdown requested, input stopped");
                    break;
                }
                polled = source.poll(poll_timeout) => polled,
            };

            match polled {
                Ok(Some(msg)) => {
                    stats.source.record_message();
                    match decode(&msg) {
                        Ok((key, input)) => {
                            let shard = shard_for(&key, shard_count);
                            if senders[shard].send(input).await.is_err() {
                                error!(shard, "Shard queue closed, stopping pipeline");
                                outcome = Err(PipelineError::ShardStopped(shard));
                                break;
                            }
                        }
                        Err(e) => {
                            stats.source.record_decode_error();
                            warn!(offset = msg.offset, key = ?msg.key, error = %e, "Dropping undecodable record");
                        }
                    }
                }
                Ok(None) => trace!("Poll timed out"),
                Err(StreamError::Closed) => {
                    info!("Input closed");
                    break;
                }
                Err(e) => {
                    stats.source.record_transport_error();
                    warn!(error = %e, "Transport error, skipping cycle");
                    tokio::time::sleep(poll_timeout).await;
                }
            }
        }

        // 关闭队列，分片在排空后进入停机
        drop(senders);
        for (id, handle) in handles.into_iter().enumerate() {
            if let Err(e) = handle.await {
                error!(shard = id, error = %e, "Shard task failed");
                if outcome.is_ok() {
                    outcome = Err(PipelineError::Join(e.to_string()));
                }
            }
        }
        info!(stats = ?stats.snapshot(), "Pipeline stopped");
        outcome
    }
}

async fn wait_for_stop(mut shutdown: watch::Receiver<bool>) {
    let sender_gone = shutdown.wait_for(|stop| *stop).await.is_err();
    if sender_gone {
        std::future::pending::<()>().await;
    }
}

async fn run_shard<W: ShardWorker>(
    id: usize,
    mut worker: W,
    mut rx: mpsc::Receiver<W::Input>,
    poll_timeout: Duration,
) {
    debug!(shard = id, "Shard started");
    loop {
        match tokio::time::timeout(poll_timeout, rx.recv()).await {
            Ok(Some(input)) => {
                worker.on_input(input).await;
                worker.on_tick().await;
            }
            Ok(None) => break,
            Err(_) => worker.on_tick().await,
        }
    }
    worker.shutdown().await;
    debug!(shard = id, "Shard stopped");
}
