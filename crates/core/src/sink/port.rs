use crate::sink::entity::{FeatureGroup, FeatureRecord};
use crate::sink::error::SinkError;
use async_trait::async_trait;

/// # Summary
/// 外部特征存储的写入契约 (远程 RPC，无事务保证)。
///
/// # Invariants
/// - 实现必须按 `target.primary_keys` 做 upsert，同一批次重复投递不产生重复行。
/// - 结果只有成功或失败两种。
#[async_trait]
pub trait FeatureStore: Send + Sync {
    /// # Summary
    /// 推送一批特征记录到指定特征组。
    ///
    /// # Logic
    /// 1. 获取或创建目标特征组。
    /// 2. 以主键 upsert 全部记录。
    /// 3. 若要求，触发离线物化。
    ///
    /// # Arguments
    /// * `records`: 待写入的记录，顺序即到达顺序。
    /// * `target`: 目标特征组描述。
    /// * `start_offline_materialization`: 是否同时启动离线物化。
    ///
    /// # Returns
    /// 成功返回 Ok，失败返回 `SinkError`。
    async fn push(
        &self,
        records: &[FeatureRecord],
        target: &FeatureGroup,
        start_offline_materialization: bool,
    ) -> Result<(), SinkError>;
}

/// # Summary
/// 刷新控制器面向的窄接口：把一个完整批次交给下游。
///
/// # Invariants
/// - 全有或全无：失败时调用方视整个批次未写入。
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// 写入一个批次
    async fn write(&self, records: &[FeatureRecord]) -> Result<(), SinkError>;
}
