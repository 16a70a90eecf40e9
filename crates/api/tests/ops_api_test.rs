use candleflow_api::server::{AppState, build_router};
use candleflow_api::types::{ApiResponse, HealthResponse, ShardStatsResponse, StatsResponse};
use candleflow_core::config::PipelineMode;
use candleflow_pipeline::stats::PipelineStats;
use reqwest::StatusCode;
use std::sync::Arc;
use tokio::net::TcpListener;

// 在随机端口启动测试服务器
async fn spawn_test_server(stats: Arc<PipelineStats>) -> anyhow::Result<String> {
    let state = AppState::new(stats, PipelineMode::Ohlcv);
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = format!("http://{}", listener.local_addr()?);
    let router = build_router(state);
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            eprintln!("test server stopped: {e}");
        }
    });
    Ok(addr)
}

#[tokio::test]
async fn test_health_and_stats_endpoints() -> anyhow::Result<()> {
    let stats = Arc::new(PipelineStats::new(2));
    stats.source.record_message();
    stats.source.record_message();
    stats.source.record_decode_error();
    if let Some(shard) = stats.shard(1) {
        shard.record_input();
        shard.record_late();
    }

    let base_url = spawn_test_server(stats).await?;
    // reqwest 使用 rustls-no-provider，构建 Client 前需安装加密 provider
    rustls::crypto::ring::default_provider()
        .install_default()
        .ok();
    let client = reqwest::Client::new();

    // 存活检查
    let res = client.get(format!("{}/health", base_url)).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: ApiResponse<HealthResponse> = res.json().await?;
    let health = body.data.ok_or_else(|| anyhow::anyhow!("missing data"))?;
    assert_eq!(health.status, "ok");
    assert_eq!(health.mode, "ohlcv");
    assert_eq!(health.shards, 2);

    // 全量统计
    let res = client.get(format!("{}/stats", base_url)).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: ApiResponse<StatsResponse> = res.json().await?;
    let all = body.data.ok_or_else(|| anyhow::anyhow!("missing data"))?;
    assert_eq!(all.source.messages, 2);
    assert_eq!(all.source.decode_errors, 1);
    assert_eq!(all.shards.len(), 2);
    assert_eq!(all.shards[1].shard, 1);
    assert_eq!(all.shards[1].late_dropped, 1);

    // 单个分片
    let res = client
        .get(format!("{}/stats/shards/1", base_url))
        .send()
        .await?;
    let body: ApiResponse<ShardStatsResponse> = res.json().await?;
    assert_eq!(body.data.map(|s| s.inputs), Some(1));

    // 不存在的分片
    let res = client
        .get(format!("{}/stats/shards/9", base_url))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let err: serde_json::Value = res.json().await?;
    assert_eq!(err["success"], false);
    assert_eq!(
        err["error"],
        "shard 9 does not exist (pipeline has 2 shards)"
    );

    // OpenAPI 文档
    let res = client
        .get(format!("{}/api-docs/openapi.json", base_url))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let doc: serde_json::Value = res.json().await?;
    assert!(doc["paths"]["/health"].is_object());
    Ok(())
}
