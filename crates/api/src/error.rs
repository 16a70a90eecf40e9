//! # API 错误映射
//!
//! 查询类接口只会遇到一种失败：请求的分片不存在。

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::types::ApiErrorResponse;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ApiError {
    /// 分片编号越界 (404)
    #[error("shard {shard} does not exist (pipeline has {shard_count} shards)")]
    ShardNotFound { shard: usize, shard_count: usize },
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::ShardNotFound { .. } => StatusCode::NOT_FOUND,
        };
        tracing::debug!(status = %status, error = %self, "Request rejected");
        (status, Json(ApiErrorResponse::from_msg(self.to_string()))).into_response()
    }
}
