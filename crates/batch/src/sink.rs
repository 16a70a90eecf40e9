use async_trait::async_trait;
use candleflow_core::sink::entity::{FeatureGroup, FeatureRecord};
use candleflow_core::sink::error::SinkError;
use candleflow_core::sink::port::{FeatureStore, RecordSink};
use std::sync::Arc;
use tracing::debug;

/// # Summary
/// 把刷新控制器的批次写入指定特征组的适配器。
///
/// # Invariants
/// - 每次 `write` 恰好对应一次 `FeatureStore::push`，不做拆分或重试。
pub struct FeatureStoreSink {
    store: Arc<dyn FeatureStore>,
    target: FeatureGroup,
    start_offline_materialization: bool,
}

impl FeatureStoreSink {
    pub fn new(
        store: Arc<dyn FeatureStore>,
        target: FeatureGroup,
        start_offline_materialization: bool,
    ) -> Self {
        Self {
            store,
            target,
            start_offline_materialization,
        }
    }
}

#[async_trait]
impl RecordSink for FeatureStoreSink {
    async fn write(&self, records: &[FeatureRecord]) -> Result<(), SinkError> {
        debug!(
            group = %self.target.table_name(),
            records = records.len(),
            "Pushing batch to feature store"
        );
        self.store
            .push(records, &self.target, self.start_offline_materialization)
            .await
    }
}
