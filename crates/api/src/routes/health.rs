//! # 存活检查路由

use axum::Json;
use axum::extract::State;

use crate::server::AppState;
use crate::types::{ApiResponse, HealthResponse};

/// 存活检查
///
/// 进程与 HTTP 服务正常时返回 200，附带运行模式与分片数。
#[utoipa::path(
    get,
    path = "/health",
    tag = "运维 (Ops)",
    responses(
        (status = 200, description = "服务存活", body = ApiResponse<HealthResponse>)
    )
)]
pub async fn health(State(state): State<AppState>) -> Json<ApiResponse<HealthResponse>> {
    Json(ApiResponse::ok(HealthResponse {
        status: "ok".to_string(),
        mode: state.mode.to_string(),
        shards: state.stats.shard_count(),
        uptime_secs: state.started_at.elapsed().as_secs(),
    }))
}
