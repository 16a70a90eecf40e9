use crate::notify::error::NotifyError;
use async_trait::async_trait;

/// # Summary
/// 致命告警的外发接口，批次重试耗尽被丢弃时调用。
///
/// # Invariants
/// - 实现必须是 `Send` 和 `Sync` 以支持多个分片并发调用。
/// - 告警失败不得影响管线继续运行，调用方只记录日志。
#[async_trait]
pub trait Notifier: Send + Sync {
    /// # Summary
    /// 发送带有主题和内容的告警。
    ///
    /// # Logic
    /// 1. 根据目标平台要求格式化消息。
    /// 2. 通过底层传输协议发送消息。
    ///
    /// # Arguments
    /// * `subject` - 告警标题。
    /// * `content` - 告警详情 (分片、记录数、最后一次错误)。
    ///
    /// # Returns
    /// * 成功返回 `Ok(())`。
    /// * 失败返回 `Err(NotifyError)`。
    async fn notify(&self, subject: &str, content: &str) -> Result<(), NotifyError>;
}
