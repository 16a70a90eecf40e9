//! # `candleflow-batch` - 批量投递
//!
//! 批次累加器、双触发 (数量/超时) 刷新控制器、可插拔重试策略，
//! 以及把批次写入特征存储的 Sink 适配器。

pub mod accumulator;
pub mod flush;
pub mod policy;
pub mod sink;
