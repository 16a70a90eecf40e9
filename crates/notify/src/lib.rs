//! # `candleflow-notify` - 致命告警通道
//!
//! `Notifier` 端口的实现：结构化日志 (默认) 与 Telegram Bot。

pub mod log;
pub mod telegram;
