use candleflow_core::config::ConfigError;
use candleflow_core::sink::error::SinkError;
use candleflow_core::stream::error::StreamError;
use thiserror::Error;

/// # Summary
/// 管线层的统一错误类型，仅用于启动失败与运行时结构性故障。
/// 单条记录与单个批次的错误在分片内部消化，不会出现在这里。
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("Stream error: {0}")]
    Stream(#[from] StreamError),
    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),
    #[error("Shard {0} stopped unexpectedly")]
    ShardStopped(usize),
    #[error("Shard task failed: {0}")]
    Join(String),
}
