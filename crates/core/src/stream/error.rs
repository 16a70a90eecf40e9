use thiserror::Error;

/// # Summary
/// 输入/输出流错误枚举，区分传输故障与单条记录解码失败。
///
/// # Invariants
/// - 必须通过 `thiserror` 派生 `Error` trait。
/// - `Transport` 与 `Decode` 均可恢复，调用方不得因此终止循环。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    // 拉取或读取失败，跳过本轮
    #[error("Transport error: {0}")]
    Transport(String),
    // 单条记录格式错误，记录被丢弃
    #[error("Decode error at offset {offset} (key {key:?}): {reason}")]
    Decode {
        offset: u64,
        key: Option<String>,
        reason: String,
    },
    // 中间结果发布失败
    #[error("Publish error: {0}")]
    Publish(String),
    // 输入源已耗尽或被关闭
    #[error("Stream closed")]
    Closed,
}

impl StreamError {
    /// 是否为可恢复错误 (循环应继续)
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, StreamError::Closed)
    }
}
