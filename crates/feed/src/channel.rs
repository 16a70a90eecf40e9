use async_trait::async_trait;
use candleflow_core::stream::entity::SourceMessage;
use candleflow_core::stream::error::StreamError;
use candleflow_core::stream::port::StreamSource;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;

/// # Summary
/// 创建一个进程内主题，返回生产者与唯一的消费者。
///
/// # Arguments
/// * `capacity`: 通道容量，写满时生产者等待。
pub fn topic(capacity: usize) -> (TopicProducer, ChannelSource) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        TopicProducer {
            tx,
            next_offset: Arc::new(AtomicU64::new(0)),
        },
        ChannelSource { rx },
    )
}

/// # Summary
/// 进程内主题的生产端，可克隆，偏移量在所有克隆之间共享递增。
#[derive(Clone)]
pub struct TopicProducer {
    tx: mpsc::Sender<SourceMessage>,
    next_offset: Arc<AtomicU64>,
}

impl TopicProducer {
    /// # Summary
    /// 发送一条消息。
    ///
    /// # Returns
    /// 成功返回分配的偏移量；消费者已关闭返回 `StreamError::Closed`。
    pub async fn send(
        &self,
        key: Option<&str>,
        payload: impl Into<Vec<u8>>,
    ) -> Result<u64, StreamError> {
        let offset = self.next_offset.fetch_add(1, Ordering::SeqCst);
        let msg = SourceMessage {
            offset,
            key: key.map(str::to_string),
            payload: payload.into(),
        };
        self.tx.send(msg).await.map_err(|_| StreamError::Closed)?;
        Ok(offset)
    }
}

/// # Summary
/// 进程内主题的消费端。
///
/// # Invariants
/// - 所有生产者被丢弃且缓冲耗尽后，`poll` 返回 `StreamError::Closed`。
pub struct ChannelSource {
    rx: mpsc::Receiver<SourceMessage>,
}

#[async_trait]
impl StreamSource for ChannelSource {
    async fn poll(&mut self, timeout: Duration) -> Result<Option<SourceMessage>, StreamError> {
        match tokio::time::timeout(timeout, self.rx.recv()).await {
            Ok(Some(msg)) => Ok(Some(msg)),
            Ok(None) => Err(StreamError::Closed),
            Err(_) => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_topic_delivers_in_order_then_closes() {
        let (producer, mut source) = topic(8);
        assert_eq!(producer.send(Some("BTC/USD"), "a").await.unwrap(), 0);
        assert_eq!(producer.clone().send(None, "b").await.unwrap(), 1);

        let first = source.poll(Duration::from_millis(50)).await.unwrap().unwrap();
        assert_eq!(first.key.as_deref(), Some("BTC/USD"));
        assert_eq!(first.payload, b"a".to_vec());
        let second = source.poll(Duration::from_millis(50)).await.unwrap().unwrap();
        assert_eq!(second.offset, 1);

        // 空闲时按超时返回 None
        assert_eq!(source.poll(Duration::from_millis(10)).await.unwrap(), None);

        drop(producer);
        assert_eq!(
            source.poll(Duration::from_millis(10)).await,
            Err(StreamError::Closed)
        );
    }
}
