//! # `candleflow-feed` - 输入源与 K 线发布
//!
//! - `decode`: 原始消息到成交/特征记录的解码与校验。
//! - `channel`: 进程内主题 (生产者 + 拉取式消费者)。
//! - `jsonl`: 按行读取 JSON 的文件/标准输入源。
//! - `publisher`: 广播主题与 JSON 行写出两种 K 线发布器。

pub mod channel;
pub mod decode;
pub mod jsonl;
pub mod publisher;
