use async_trait::async_trait;
use candleflow_core::notify::error::NotifyError;
use candleflow_core::notify::port::Notifier;
use tracing::error;

/// # Summary
/// 把告警写成一条 `error` 级别结构化日志的通知器，未配置外部通道时使用。
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, subject: &str, content: &str) -> Result<(), NotifyError> {
        error!(alert = true, subject, content, "Fatal pipeline alert");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_notifier_never_fails() {
        assert!(LogNotifier.notify("subject", "content").await.is_ok());
    }
}
