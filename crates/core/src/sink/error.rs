use thiserror::Error;

/// # Summary
/// 批量投递错误枚举，批次级别，在重试上限内可恢复。
///
/// # Invariants
/// - 必须通过 `thiserror` 派生 `Error` trait。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SinkError {
    // 外部存储写入失败
    #[error("Write error: {0}")]
    Write(String),
    // 记录缺少主键或事件时间字段
    #[error("Missing field: {0}")]
    MissingField(String),
    // 重试耗尽，批次已被丢弃
    #[error("Retries exhausted after {attempts} attempts, dropped {records} records: {last_error}")]
    RetriesExhausted {
        attempts: u32,
        records: usize,
        last_error: String,
    },
}
