//! # `candleflow-api` - 健康检查接口
//!
//! 使用 `axum` 暴露管线的存活状态与各分片计数器，
//! 通过 `utoipa` 生成 OpenAPI 文档。
//!
//! ## 职责
//! - `GET /health`: 存活检查、运行模式与分片数。
//! - `GET /stats`: 输入源与全部分片的计数器快照。
//! - `GET /stats/shards/{id}`: 单个分片的计数器快照。

pub mod error;
pub mod routes;
pub mod server;
pub mod types;
