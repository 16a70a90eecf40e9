//! # `candleflow-core` - 领域核心
//!
//! 定义行情聚合管线的实体、端口 (Port) 与错误类型，不包含任何具体 I/O 实现。
//! 其余 crate 均依赖本 crate 提供的抽象进行装配。

pub mod common;
pub mod config;
pub mod market;
pub mod notify;
pub mod sink;
pub mod stream;
pub mod window;

#[cfg(feature = "test-utils")]
pub mod testing;
