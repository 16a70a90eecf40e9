use async_trait::async_trait;
use candleflow_core::market::entity::Candle;
use candleflow_core::stream::error::StreamError;
use candleflow_core::stream::port::{CandlePublisher, CandleStream};
use futures::StreamExt;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing::{trace, warn};

/// # Summary
/// 基于 `tokio::sync::broadcast` 的中间 K 线主题，可被多个下游订阅。
///
/// # Invariants
/// - 没有订阅者时发布成功但消息被丢弃。
/// - 落后过多的订阅者丢失最旧的消息并记录告警，不影响发布端。
#[derive(Clone)]
pub struct BroadcastCandlePublisher {
    tx: broadcast::Sender<Candle>,
}

impl BroadcastCandlePublisher {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// # Summary
    /// 订阅之后发布的 K 线。
    ///
    /// # Returns
    /// 返回异步 K 线流，所有发布端被丢弃后结束。
    pub fn subscribe(&self) -> CandleStream {
        let stream = BroadcastStream::new(self.tx.subscribe()).filter_map(|item| async move {
            match item {
                Ok(candle) => Some(candle),
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    warn!(skipped, "Candle subscriber lagged, messages lost");
                    None
                }
            }
        });
        Box::pin(stream)
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[async_trait]
impl CandlePublisher for BroadcastCandlePublisher {
    async fn publish(&self, candle: &Candle) -> Result<(), StreamError> {
        if self.tx.send(candle.clone()).is_err() {
            trace!(product_id = %candle.product_id, "No candle subscribers");
        }
        Ok(())
    }
}

/// # Summary
/// 把订阅流中的 K 线逐根转发给另一个发布器 (通常是 JSON-lines 输出)，
/// 分片只向主题发布，慢速 I/O 在独立任务中完成。
///
/// # Returns
/// 转发任务句柄，流结束 (全部发布端被丢弃) 后返回成功转发的条数。
pub fn forward(mut stream: CandleStream, target: Arc<dyn CandlePublisher>) -> JoinHandle<u64> {
    tokio::spawn(async move {
        let mut forwarded = 0u64;
        while let Some(candle) = stream.next().await {
            match target.publish(&candle).await {
                Ok(()) => forwarded += 1,
                Err(e) => warn!(product_id = %candle.product_id, error = %e, "Candle forward failed"),
            }
        }
        forwarded
    })
}

/// # Summary
/// 每根 K 线写出一行 JSON 的发布器 (标准输出或文件)。
pub struct JsonLinesCandlePublisher {
    writer: Mutex<Box<dyn AsyncWrite + Send + Unpin>>,
}

impl JsonLinesCandlePublisher {
    pub fn from_writer<W>(writer: W) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            writer: Mutex::new(Box::new(writer)),
        }
    }

    pub fn stdout() -> Self {
        Self::from_writer(tokio::io::stdout())
    }

    /// 以追加方式打开文件，不存在时创建
    pub async fn append_to(path: impl AsRef<Path>) -> Result<Self, StreamError> {
        let path = path.as_ref();
        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(|e| StreamError::Publish(format!("{}: {}", path.display(), e)))?;
        Ok(Self::from_writer(file))
    }
}

#[async_trait]
impl CandlePublisher for JsonLinesCandlePublisher {
    async fn publish(&self, candle: &Candle) -> Result<(), StreamError> {
        let mut line =
            serde_json::to_vec(candle).map_err(|e| StreamError::Publish(e.to_string()))?;
        line.push(b'\n');

        let mut writer = self.writer.lock().await;
        writer
            .write_all(&line)
            .await
            .map_err(|e| StreamError::Publish(e.to_string()))?;
        writer
            .flush()
            .await
            .map_err(|e| StreamError::Publish(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(close: f64) -> Candle {
        Candle {
            product_id: "BTC/USD".into(),
            timestamp_ms: 60_000,
            open: 1.0,
            high: 2.0,
            low: 0.5,
            close,
            volume: 10.0,
        }
    }

    #[tokio::test]
    async fn test_broadcast_delivers_to_every_subscriber() {
        let publisher = BroadcastCandlePublisher::new(16);
        // 无订阅者时发布不报错
        publisher.publish(&candle(0.9)).await.unwrap();

        let mut a = publisher.subscribe();
        let mut b = publisher.subscribe();
        assert_eq!(publisher.subscriber_count(), 2);

        publisher.publish(&candle(1.5)).await.unwrap();
        assert_eq!(a.next().await.unwrap().close, 1.5);
        assert_eq!(b.next().await.unwrap().close, 1.5);

        drop(publisher);
        assert!(a.next().await.is_none());
    }
}
