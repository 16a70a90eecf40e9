//! # `candleflow-pipeline` - 分片运行时
//!
//! 单一读取循环从输入源拉取消息、解码并按键路由到分片；
//! 每个分片是一个独立 tokio 任务，独占自己的窗口表和批次。
//!
//! - `ohlcv`: 成交 -> K 线 -> 发布 + 特征存储。
//! - `ingest`: 特征记录直接批量写入特征存储。

pub mod error;
pub mod ingest;
pub mod ohlcv;
pub mod router;
pub mod runtime;
pub mod stats;
pub mod worker;
