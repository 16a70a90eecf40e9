use async_trait::async_trait;
use candleflow_core::stream::entity::SourceMessage;
use candleflow_core::stream::error::StreamError;
use candleflow_core::stream::port::StreamSource;
use std::path::Path;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

const READ_AHEAD: usize = 1024;

/// # Summary
/// 按行读取 JSON 消息的输入源 (文件或标准输入)。
///
/// # Invariants
/// - 偏移量为从 0 开始的行号，空行被跳过但仍占用偏移量。
/// - 读到 EOF 后返回 `StreamError::Closed`；读取故障以 `Transport` 报告一次后关闭。
pub struct JsonLinesSource {
    rx: mpsc::Receiver<Result<SourceMessage, StreamError>>,
    reader_task: JoinHandle<()>,
}

impl JsonLinesSource {
    /// # Summary
    /// 在后台任务中逐行读取 `reader`。
    ///
    /// # Logic
    /// 1. 创建有界通道。
    /// 2. 后台任务逐行读取，非空行包装为 `SourceMessage` 发送。
    /// 3. EOF 或读取失败时结束任务并关闭通道。
    pub fn from_reader<R>(reader: R) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(READ_AHEAD);
        let reader_task = tokio::spawn(async move {
            let mut lines = BufReader::new(reader).lines();
            let mut offset = 0u64;
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let current = offset;
                        offset += 1;
                        let line = line.trim();
                        if line.is_empty() {
                            continue;
                        }
                        let msg = SourceMessage::json(current, None, line);
                        if tx.send(Ok(msg)).await.is_err() {
                            return;
                        }
                    }
                    Ok(None) => {
                        debug!(lines = offset, "Input reached EOF");
                        return;
                    }
                    Err(e) => {
                        warn!(offset, error = %e, "Input read failed");
                        if tx.send(Err(StreamError::Transport(e.to_string()))).await.is_err() {
                            debug!("Consumer dropped before read error was delivered");
                        }
                        return;
                    }
                }
            }
        });
        Self { rx, reader_task }
    }

    /// 打开文件作为输入
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StreamError> {
        let path = path.as_ref();
        let file = tokio::fs::File::open(path)
            .await
            .map_err(|e| StreamError::Transport(format!("{}: {}", path.display(), e)))?;
        Ok(Self::from_reader(file))
    }

    /// 以标准输入作为输入
    pub fn stdin() -> Self {
        Self::from_reader(tokio::io::stdin())
    }
}

impl Drop for JsonLinesSource {
    fn drop(&mut self) {
        self.reader_task.abort();
    }
}

#[async_trait]
impl StreamSource for JsonLinesSource {
    async fn poll(&mut self, timeout: Duration) -> Result<Option<SourceMessage>, StreamError> {
        match tokio::time::timeout(timeout, self.rx.recv()).await {
            Ok(Some(Ok(msg))) => Ok(Some(msg)),
            Ok(Some(Err(e))) => Err(e),
            Ok(None) => Err(StreamError::Closed),
            Err(_) => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reads_lines_with_offsets_and_skips_blanks() {
        let input: &[u8] = b"{\"a\":1}\n\n  {\"a\":2}  \n";
        let mut source = JsonLinesSource::from_reader(input);
        let timeout = Duration::from_secs(1);

        let first = source.poll(timeout).await.unwrap().unwrap();
        assert_eq!(first.offset, 0);
        assert_eq!(first.payload, b"{\"a\":1}".to_vec());

        let second = source.poll(timeout).await.unwrap().unwrap();
        assert_eq!(second.offset, 2);
        assert_eq!(second.payload, b"{\"a\":2}".to_vec());

        assert_eq!(source.poll(timeout).await, Err(StreamError::Closed));
    }

    #[tokio::test]
    async fn test_missing_file_is_transport_error() {
        let result = JsonLinesSource::open("/definitely/not/here.jsonl").await;
        assert!(matches!(result, Err(StreamError::Transport(_))));
    }
}
