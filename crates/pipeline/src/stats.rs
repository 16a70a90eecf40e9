use candleflow_batch::flush::{FlushController, FlushStats};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// # Summary
/// 读取循环 (输入源侧) 的计数器。
#[derive(Debug, Default)]
pub struct SourceStats {
    messages: AtomicU64,
    decode_errors: AtomicU64,
    transport_errors: AtomicU64,
}

/// `SourceStats` 的只读快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SourceStatsSnapshot {
    pub messages: u64,
    pub decode_errors: u64,
    pub transport_errors: u64,
}

impl SourceStats {
    pub fn record_message(&self) {
        self.messages.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_decode_error(&self) {
        self.decode_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_transport_error(&self) {
        self.transport_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> SourceStatsSnapshot {
        SourceStatsSnapshot {
            messages: self.messages.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            transport_errors: self.transport_errors.load(Ordering::Relaxed),
        }
    }
}

/// # Summary
/// 单个分片的计数器，分片任务写、健康检查接口读。
///
/// # Invariants
/// - 只有所属分片任务写入，读取方看到的是最终一致的数值。
#[derive(Debug, Default)]
pub struct ShardStats {
    inputs: AtomicU64,
    late_dropped: AtomicU64,
    rejected: AtomicU64,
    candles_emitted: AtomicU64,
    publish_errors: AtomicU64,
    open_windows: AtomicU64,
    flushes: AtomicU64,
    records_written: AtomicU64,
    sink_failures: AtomicU64,
    dropped_batches: AtomicU64,
    dropped_records: AtomicU64,
    pending_records: AtomicU64,
}

/// `ShardStats` 的只读快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ShardStatsSnapshot {
    pub inputs: u64,
    pub late_dropped: u64,
    pub rejected: u64,
    pub candles_emitted: u64,
    pub publish_errors: u64,
    pub open_windows: u64,
    pub flushes: u64,
    pub records_written: u64,
    pub sink_failures: u64,
    pub dropped_batches: u64,
    pub dropped_records: u64,
    pub pending_records: u64,
}

fn as_u64(n: usize) -> u64 {
    u64::try_from(n).unwrap_or(u64::MAX)
}

impl ShardStats {
    pub fn record_input(&self) {
        self.inputs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_late(&self) {
        self.late_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// 无法进入窗口的输入 (例如时间戳超出可表示范围)
    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_candle(&self) {
        self.candles_emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_publish_error(&self) {
        self.publish_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_open_windows(&self, n: usize) {
        self.open_windows.store(as_u64(n), Ordering::Relaxed);
    }

    /// 同步刷新控制器的累计统计与当前积压
    pub fn sync_flush(&self, flush: &FlushController) {
        let FlushStats {
            flushes,
            records_written,
            failures,
            dropped_batches,
            dropped_records,
        } = flush.stats();
        self.flushes.store(flushes, Ordering::Relaxed);
        self.records_written.store(records_written, Ordering::Relaxed);
        self.sink_failures.store(failures, Ordering::Relaxed);
        self.dropped_batches.store(dropped_batches, Ordering::Relaxed);
        self.dropped_records.store(dropped_records, Ordering::Relaxed);
        self.pending_records
            .store(as_u64(flush.pending()), Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ShardStatsSnapshot {
        ShardStatsSnapshot {
            inputs: self.inputs.load(Ordering::Relaxed),
            late_dropped: self.late_dropped.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            candles_emitted: self.candles_emitted.load(Ordering::Relaxed),
            publish_errors: self.publish_errors.load(Ordering::Relaxed),
            open_windows: self.open_windows.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
            records_written: self.records_written.load(Ordering::Relaxed),
            sink_failures: self.sink_failures.load(Ordering::Relaxed),
            dropped_batches: self.dropped_batches.load(Ordering::Relaxed),
            dropped_records: self.dropped_records.load(Ordering::Relaxed),
            pending_records: self.pending_records.load(Ordering::Relaxed),
        }
    }
}

/// # Summary
/// 整条管线的计数器集合，由运行时创建并共享给健康检查接口。
#[derive(Debug)]
pub struct PipelineStats {
    pub source: SourceStats,
    shards: Vec<Arc<ShardStats>>,
}

/// `PipelineStats` 的只读快照
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineStatsSnapshot {
    pub source: SourceStatsSnapshot,
    pub shards: Vec<ShardStatsSnapshot>,
}

impl PipelineStats {
    pub fn new(shard_count: usize) -> Self {
        Self {
            source: SourceStats::default(),
            shards: (0..shard_count.max(1))
                .map(|_| Arc::new(ShardStats::default()))
                .collect(),
        }
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    pub fn shards(&self) -> &[Arc<ShardStats>] {
        &self.shards
    }

    pub fn shard(&self, id: usize) -> Option<Arc<ShardStats>> {
        self.shards.get(id).cloned()
    }

    pub fn snapshot(&self) -> PipelineStatsSnapshot {
        PipelineStatsSnapshot {
            source: self.source.snapshot(),
            shards: self.shards.iter().map(|s| s.snapshot()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_counters() {
        let stats = PipelineStats::new(2);
        stats.source.record_message();
        stats.source.record_decode_error();
        let shard = stats.shard(1).unwrap();
        shard.record_input();
        shard.record_late();
        shard.set_open_windows(3);

        let snap = stats.snapshot();
        assert_eq!(snap.source.messages, 1);
        assert_eq!(snap.source.decode_errors, 1);
        assert_eq!(snap.shards.len(), 2);
        assert_eq!(snap.shards[1].late_dropped, 1);
        assert_eq!(snap.shards[1].open_windows, 3);
        assert_eq!(snap.shards[0], ShardStatsSnapshot::default());
        assert!(stats.shard(2).is_none());
    }
}
