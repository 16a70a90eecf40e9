//! # 运行统计路由
//!
//! 计数器由各分片任务写入，这里只读取快照，不加锁。

use axum::Json;
use axum::extract::{Path, State};

use crate::error::ApiError;
use crate::server::AppState;
use crate::types::{ApiResponse, ShardStatsResponse, StatsResponse};

/// 输入源与全部分片的计数器快照
#[utoipa::path(
    get,
    path = "/stats",
    tag = "运维 (Ops)",
    responses(
        (status = 200, description = "计数器快照", body = ApiResponse<StatsResponse>)
    )
)]
pub async fn get_stats(State(state): State<AppState>) -> Json<ApiResponse<StatsResponse>> {
    let snapshot = state.stats.snapshot();
    Json(ApiResponse::ok(StatsResponse {
        source: snapshot.source.into(),
        shards: snapshot
            .shards
            .into_iter()
            .enumerate()
            .map(ShardStatsResponse::from)
            .collect(),
    }))
}

/// 单个分片的计数器快照
#[utoipa::path(
    get,
    path = "/stats/shards/{shard}",
    tag = "运维 (Ops)",
    params(
        ("shard" = usize, Path, description = "分片编号")
    ),
    responses(
        (status = 200, description = "分片计数器快照", body = ApiResponse<ShardStatsResponse>),
        (status = 404, description = "分片不存在")
    )
)]
pub async fn get_shard_stats(
    State(state): State<AppState>,
    Path(shard): Path<usize>,
) -> Result<Json<ApiResponse<ShardStatsResponse>>, ApiError> {
    let stats = state
        .stats
        .shard(shard)
        .ok_or(ApiError::ShardNotFound {
            shard,
            shard_count: state.stats.shard_count(),
        })?;
    Ok(Json(ApiResponse::ok((shard, stats.snapshot()).into())))
}
