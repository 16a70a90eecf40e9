//! # API 服务启动器
//!
//! 组装 axum 路由、挂载 Swagger UI、配置 CORS 并绑定 TCP 端口。
//! 由 `crates/app` 持有并在管线运行期间并行启动。

use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;
use utoipa_swagger_ui::SwaggerUi;

use candleflow_core::config::PipelineMode;
use candleflow_pipeline::stats::PipelineStats;

use crate::routes::{health, stats};

/// 共享应用状态，通过 axum 的 `State` 提取器注入到每个 Handler 中。
#[derive(Clone)]
pub struct AppState {
    /// 管线计数器
    pub stats: Arc<PipelineStats>,
    /// 运行模式
    pub mode: PipelineMode,
    /// 启动时间
    pub started_at: Instant,
}

impl AppState {
    pub fn new(stats: Arc<PipelineStats>, mode: PipelineMode) -> Self {
        Self {
            stats,
            mode,
            started_at: Instant::now(),
        }
    }
}

/// 全局 OpenAPI 文档结构
#[derive(OpenApi)]
#[openapi(
    info(
        title = "candleflow 运维 API",
        version = "0.1.0",
        description = "成交聚合与特征写入管线的健康检查与运行统计。"
    ),
    tags(
        (name = "运维 (Ops)", description = "存活检查与计数器")
    )
)]
pub struct ApiDoc;

/// 构建完整的 axum 应用路由树 (含 Swagger UI 与 CORS)。
pub fn build_router(state: AppState) -> Router {
    let (router, api) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .routes(routes!(health::health))
        .routes(routes!(stats::get_stats))
        .routes(routes!(stats::get_shard_stats))
        .with_state(state)
        .split_for_parts();

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    router
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", api))
        .layer(cors)
}

/// # Summary
/// 绑定端口并提供服务，直到停机信号变为 true。
///
/// # Arguments
/// * `state` - 共享状态
/// * `bind_addr` - 监听地址，如 `"0.0.0.0:8080"`
/// * `shutdown` - 停机信号
pub async fn start_server(
    state: AppState,
    bind_addr: &str,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!("API server listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if shutdown.wait_for(|stop| *stop).await.is_err() {
                tracing::debug!("Shutdown sender dropped, API server stopping");
            }
        })
        .await?;

    tracing::info!("API server stopped");
    Ok(())
}
