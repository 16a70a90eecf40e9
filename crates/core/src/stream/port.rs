use crate::market::entity::Candle;
use crate::stream::entity::SourceMessage;
use crate::stream::error::StreamError;
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;
use std::time::Duration;

/// # Summary
/// K 线数据流别名，使用动态分发的异步流。
pub type CandleStream = Pin<Box<dyn Stream<Item = Candle> + Send>>;

/// # Summary
/// 输入流消费端契约 (发布/订阅传输的消费者)。
///
/// # Invariants
/// - 单一消费者独占：`poll` 接收 `&mut self`，不支持并发拉取。
/// - 每次等待都必须有上界，不允许无限阻塞。
#[async_trait]
pub trait StreamSource: Send {
    /// # Summary
    /// 拉取下一条消息。
    ///
    /// # Logic
    /// 1. 在 `timeout` 内等待下一条消息。
    /// 2. 超时无消息返回 `Ok(None)`，调用方据此评估超时刷新。
    ///
    /// # Arguments
    /// * `timeout`: 本次等待的上界。
    ///
    /// # Returns
    /// 成功返回消息或 None；传输故障返回 `StreamError::Transport`；
    /// 输入耗尽返回 `StreamError::Closed`。
    async fn poll(&mut self, timeout: Duration) -> Result<Option<SourceMessage>, StreamError>;
}

/// # Summary
/// 中间 K 线主题的发布端契约。
///
/// # Invariants
/// - 实现必须是 `Send` 和 `Sync` 以便多个分片共享。
#[async_trait]
pub trait CandlePublisher: Send + Sync {
    /// # Summary
    /// 发布一根 K 线 (窗口关闭时一次，CURRENT 模式下每次更新一次)。
    ///
    /// # Arguments
    /// * `candle`: 待发布的 K 线。
    ///
    /// # Returns
    /// 成功返回 Ok，失败返回 `StreamError::Publish`。
    async fn publish(&self, candle: &Candle) -> Result<(), StreamError>;
}
