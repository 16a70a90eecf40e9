//! # DTO 层
//!
//! 把管线计数器快照转换为对外的 JSON 结构。
//! 所有 DTO 派生 `utoipa::ToSchema` 以进入 OpenAPI 文档。

use candleflow_pipeline::stats::{ShardStatsSnapshot, SourceStatsSnapshot};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// 统一成功响应包装
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiResponse<T: Serialize + ToSchema> {
    /// 是否成功
    pub success: bool,
    /// 数据载荷 (成功时)
    pub data: Option<T>,
    /// 错误信息 (失败时)
    pub error: Option<String>,
}

impl<T: Serialize + ToSchema> ApiResponse<T> {
    /// 构建成功响应
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

/// 失败响应 (不含泛型载荷)
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ApiErrorResponse {
    /// 固定为 false
    pub success: bool,
    /// 错误描述信息
    pub error: String,
}

impl ApiErrorResponse {
    /// 从错误信息构建
    pub fn from_msg(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            error: msg.into(),
        }
    }
}

/// 存活检查 DTO
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    #[schema(example = "ok")]
    pub status: String,
    /// 运行模式 (ohlcv / feature_ingest)
    #[schema(example = "ohlcv")]
    pub mode: String,
    /// 分片数
    #[schema(example = 4)]
    pub shards: usize,
    /// 进程启动以来的秒数
    pub uptime_secs: u64,
}

/// 输入源计数器 DTO
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SourceStatsResponse {
    pub messages: u64,
    pub decode_errors: u64,
    pub transport_errors: u64,
}

impl From<SourceStatsSnapshot> for SourceStatsResponse {
    fn from(s: SourceStatsSnapshot) -> Self {
        Self {
            messages: s.messages,
            decode_errors: s.decode_errors,
            transport_errors: s.transport_errors,
        }
    }
}

/// 单个分片计数器 DTO
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ShardStatsResponse {
    /// 分片编号
    pub shard: usize,
    pub inputs: u64,
    pub late_dropped: u64,
    /// 时间戳无法分配窗口而被拒绝的成交
    pub rejected: u64,
    pub candles_emitted: u64,
    pub publish_errors: u64,
    pub open_windows: u64,
    pub flushes: u64,
    pub records_written: u64,
    pub sink_failures: u64,
    pub dropped_batches: u64,
    pub dropped_records: u64,
    /// 当前批次中尚未写出的记录数
    pub pending_records: u64,
}

impl From<(usize, ShardStatsSnapshot)> for ShardStatsResponse {
    fn from((shard, s): (usize, ShardStatsSnapshot)) -> Self {
        Self {
            shard,
            inputs: s.inputs,
            late_dropped: s.late_dropped,
            rejected: s.rejected,
            candles_emitted: s.candles_emitted,
            publish_errors: s.publish_errors,
            open_windows: s.open_windows,
            flushes: s.flushes,
            records_written: s.records_written,
            sink_failures: s.sink_failures,
            dropped_batches: s.dropped_batches,
            dropped_records: s.dropped_records,
            pending_records: s.pending_records,
        }
    }
}

/// 全量统计 DTO
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StatsResponse {
    pub source: SourceStatsResponse,
    pub shards: Vec<ShardStatsResponse>,
}
