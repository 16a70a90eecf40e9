//! # `candleflow-store` - 特征存储适配器
//!
//! `FeatureStore` 端口的两种实现：本地 SQLite (按特征组分表，主键 upsert)
//! 与远程 HTTP 摄取接口。

pub mod config;
pub mod http;
pub mod sqlite;
