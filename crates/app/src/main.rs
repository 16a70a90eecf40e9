mod bootstrap;

use std::path::PathBuf;
use std::sync::Arc;

use candleflow_api::server::{AppState, start_server};
use candleflow_batch::sink::FeatureStoreSink;
use candleflow_core::common::time::{RealTimeProvider, TimeProvider};
use candleflow_core::config::{
    AlertConfig, AppConfig, CandleOutputKind, ConfigError, PipelineMode, SinkKind, SourceConfig,
    SourceKind,
};
use candleflow_core::notify::port::Notifier;
use candleflow_core::sink::port::{FeatureStore, RecordSink};
use candleflow_core::stream::port::CandlePublisher;
use candleflow_feed::jsonl::JsonLinesSource;
use candleflow_feed::publisher::{BroadcastCandlePublisher, JsonLinesCandlePublisher, forward};
use candleflow_notify::log::LogNotifier;
use candleflow_notify::telegram::TelegramNotifier;
use candleflow_pipeline::ingest::build_ingest;
use candleflow_pipeline::ohlcv::{OhlcvDeps, build_ohlcv};
use candleflow_pipeline::stats::PipelineStats;
use candleflow_store::http::HttpFeatureStore;
use candleflow_store::sqlite::SqliteFeatureStore;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

const CONFIG_ENV: &str = "CANDLEFLOW_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "candleflow.toml";
// 中间 K 线主题的缓冲，输出端落后超过该数量时丢弃最旧的 K 线
const CANDLE_TOPIC_CAPACITY: usize = 4096;

/// # Summary
/// 应用启动入口，纯粹的 DI 容器。
/// 负责实例化所有具体适配器并通过 Arc<dyn Trait> 注入到分片管线。
///
/// # Logic
/// 1. 加载配置并初始化全局日志。
/// 2. 实例化基础设施层 (特征存储、告警、输入源、K 线输出)。
/// 3. 按运行模式构建管线，可选启动健康检查接口。
/// 4. 运行到输入结束或收到退出信号，排空所有分片后退出。
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. 配置与日志
    let config_path =
        PathBuf::from(std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into()));
    let config = bootstrap::load_config(&config_path)?;
    let _log_guard = bootstrap::init_logging(&config.log);
    info!(mode = %config.mode, config = %config_path.display(), "Candleflow starting...");

    // 2. 基础设施层
    if !candleflow_store::config::set_root_dir(PathBuf::from(&config.sink.data_dir)) {
        warn!("Store root directory was already set");
    }
    let store = build_store(&config).await?;
    let sink: Arc<dyn RecordSink> = Arc::new(FeatureStoreSink::new(
        store,
        config.feature_group.to_group(),
        config.feature_group.start_offline_materialization,
    ));
    let notifier = build_notifier(&config.alert)?;
    let source = open_source(&config.source).await?;
    let clock: Arc<dyn TimeProvider> = Arc::new(RealTimeProvider);

    // 3. 退出信号
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let signal_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown signal received. Draining shards...");
                signal_tx.send_replace(true);
            }
            Err(e) => error!("Failed to listen for shutdown signal: {}", e),
        }
    });

    // 4. 按模式构建并运行管线
    let mut candle_writer = None;
    let result = match config.mode {
        PipelineMode::Ohlcv => {
            let (publisher, writer) = build_candle_topic(&config).await?;
            candle_writer = writer;
            let deps = OhlcvDeps {
                sink,
                publisher,
                notifier: Some(notifier),
                clock,
            };
            let pipeline = build_ohlcv(&config.pipeline, deps)?;
            spawn_api(&config, pipeline.stats(), shutdown_rx.clone());
            pipeline.run_trades(source, shutdown_rx).await
        }
        PipelineMode::FeatureIngest => {
            let pipeline = build_ingest(&config.pipeline, sink, Some(notifier), clock)?;
            spawn_api(&config, pipeline.stats(), shutdown_rx.clone());
            pipeline
                .run_records(source, config.feature_group.to_group(), shutdown_rx)
                .await
        }
    };

    // 输入结束时同样通知健康检查接口退出
    shutdown_tx.send_replace(true);
    // 分片退出后主题发布端全部释放，等待输出任务写完剩余 K 线
    if let Some(writer) = candle_writer {
        match writer.await {
            Ok(forwarded) => info!(forwarded, "Candle output drained"),
            Err(e) => error!("Candle output task failed: {}", e),
        }
    }
    result?;
    info!("Candleflow stopped");
    Ok(())
}

/// 按配置选择 SQLite 或远程 HTTP 特征存储
async fn build_store(
    config: &AppConfig,
) -> Result<Arc<dyn FeatureStore>, Box<dyn std::error::Error>> {
    match config.sink.kind {
        SinkKind::Sqlite => {
            let store = SqliteFeatureStore::new().await?;
            info!(path = %store.db_path().display(), "Using SQLite feature store");
            Ok(Arc::new(store))
        }
        SinkKind::Http => {
            let endpoint = config
                .sink
                .endpoint
                .clone()
                .ok_or_else(|| ConfigError::Missing("sink.endpoint".into()))?;
            info!(endpoint = %endpoint, "Using HTTP feature store");
            Ok(Arc::new(HttpFeatureStore::new(
                endpoint,
                config.sink.api_key.clone(),
            )?))
        }
    }
}

/// 配置了 Telegram 凭据时推送到 Telegram，否则只写错误日志
fn build_notifier(alert: &AlertConfig) -> Result<Arc<dyn Notifier>, Box<dyn std::error::Error>> {
    match (&alert.telegram_bot_token, &alert.telegram_chat_id) {
        (Some(token), Some(chat_id)) => Ok(Arc::new(TelegramNotifier::new(
            token.clone(),
            chat_id.clone(),
        )?)),
        _ => Ok(Arc::new(LogNotifier)),
    }
}

async fn open_source(source: &SourceConfig) -> Result<JsonLinesSource, Box<dyn std::error::Error>> {
    match (source.kind, &source.path) {
        (SourceKind::File, Some(path)) => Ok(JsonLinesSource::open(path).await?),
        (SourceKind::File, None) => Err(ConfigError::Missing("source.path".into()).into()),
        (SourceKind::Stdin, _) => Ok(JsonLinesSource::stdin()),
    }
}

type CandleTopic = (Option<Arc<dyn CandlePublisher>>, Option<JoinHandle<u64>>);

/// # Summary
/// 构建中间 K 线主题。
///
/// # Logic
/// 1. 未配置输出时不发布。
/// 2. 否则分片发布到广播主题，由独立任务订阅并写出 JSON-lines。
///
/// # Returns
/// 分片使用的发布器与输出任务句柄。
async fn build_candle_topic(config: &AppConfig) -> Result<CandleTopic, Box<dyn std::error::Error>> {
    let output = &config.candle_output;
    let writer: Arc<dyn CandlePublisher> = match (output.kind, &output.path) {
        (CandleOutputKind::None, _) => return Ok((None, None)),
        (CandleOutputKind::Stdout, _) => Arc::new(JsonLinesCandlePublisher::stdout()),
        (CandleOutputKind::File, Some(path)) => {
            Arc::new(JsonLinesCandlePublisher::append_to(path).await?)
        }
        (CandleOutputKind::File, None) => {
            return Err(ConfigError::Missing("candle_output.path".into()).into());
        }
    };
    let topic = BroadcastCandlePublisher::new(CANDLE_TOPIC_CAPACITY);
    let handle = forward(topic.subscribe(), writer);
    Ok((Some(Arc::new(topic)), Some(handle)))
}

fn spawn_api(config: &AppConfig, stats: Arc<PipelineStats>, shutdown: watch::Receiver<bool>) {
    if !config.server.enabled {
        return;
    }
    let state = AppState::new(stats, config.mode);
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    tokio::spawn(async move {
        if let Err(e) = start_server(state, &bind_addr, shutdown).await {
            error!("API server failed: {}", e);
        }
    });
}
