use thiserror::Error;

/// # Summary
/// 窗口聚合域错误，均为单条记录级别、可恢复的错误。
///
/// # Invariants
/// - 必须通过 `thiserror` 派生 `Error` trait。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WindowError {
    // 成交落在已关闭的窗口内，被丢弃
    #[error(
        "Late event for {product_id} at {timestamp_ms}: window [{window_start_ms}, {window_end_ms}) is already closed (watermark {watermark_ms})"
    )]
    LateEvent {
        product_id: String,
        timestamp_ms: i64,
        window_start_ms: i64,
        window_end_ms: i64,
        watermark_ms: i64,
    },

    // 事件时间离纪元过远，无法表示所属窗口
    #[error("Timestamp {timestamp_ms} of {product_id} has no representable window")]
    TimestampOutOfRange {
        product_id: String,
        timestamp_ms: i64,
    },
}
