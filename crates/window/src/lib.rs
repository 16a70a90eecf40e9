//! # `candleflow-window` - 事件时间滚动窗口聚合
//!
//! 由事件时钟、窗口分配器、K 线折叠器与窗口生命周期控制器组成，
//! 全部为单线程同步代码，由所属分片独占驱动。

pub mod assigner;
pub mod clock;
pub mod lifecycle;
pub mod reducer;
