use candleflow_core::config::{AppConfig, ConfigError, LogConfig};
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// 环境变量前缀，如 `CANDLEFLOW__PIPELINE__SHARD_COUNT=4`
const ENV_PREFIX: &str = "CANDLEFLOW";
const ENV_SEPARATOR: &str = "__";
const LOG_FILE_PREFIX: &str = "candleflow.log";

/// # Summary
/// 加载并校验应用配置。
///
/// # Logic
/// 1. 读取 TOML 配置文件 (不存在时跳过)。
/// 2. 叠加 `CANDLEFLOW__*` 环境变量，后者优先。
/// 3. 反序列化为 `AppConfig`，缺省字段使用默认值。
/// 4. 启动前完成校验，非法配置直接失败。
///
/// # Arguments
/// * `path` - 配置文件路径。
///
/// # Returns
/// 合法配置或 `ConfigError`。
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::File::from(path).required(false))
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator(ENV_SEPARATOR)
                .separator(ENV_SEPARATOR)
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("feature_group.primary_keys"),
        )
        .build()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    let app_config: AppConfig = settings
        .try_deserialize()
        .map_err(|e| ConfigError::Load(e.to_string()))?;
    app_config.validate()?;
    Ok(app_config)
}

/// # Summary
/// 初始化全局日志。
///
/// # Logic
/// 1. `RUST_LOG` 优先，否则使用配置中的级别。
/// 2. 终端日志写到 stderr，stdout 留给 K 线输出。
/// 3. 配置了日志目录时追加按天滚动的文件日志。
///
/// # Returns
/// 文件日志的后台写入守卫，需在 `main` 中持有到退出。
pub fn init_logging(log: &LogConfig) -> Option<WorkerGuard> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log.level.as_str()));

    let (file_layer, guard) = match &log.dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_ansi(false).with_writer(writer)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();
    guard
}

#[cfg(test)]
mod tests {
    use super::*;
    use candleflow_core::common::EmissionMode;
    use candleflow_core::config::{PipelineMode, SinkKind, SourceKind};
    use std::io::Write;

    fn write_config(content: &str) -> anyhow::Result<tempfile::NamedTempFile> {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile()?;
        file.write_all(content.as_bytes())?;
        Ok(file)
    }

    #[test]
    fn test_load_full_config_file() -> anyhow::Result<()> {
        let file = write_config(
            r#"
mode = "feature_ingest"

[pipeline]
window_duration_ms = 5000
batch_size_threshold = 100
flush_timeout_ms = 2000
emission_mode = "FINAL"
shard_count = 4
idle_window_grace_ms = 10000

[source]
kind = "file"
path = "records.jsonl"

[feature_group]
name = "user_features"
version = 2
primary_keys = ["user_id"]
event_time_field = "ts"

[sink]
kind = "http"
endpoint = "http://localhost:9000/ingest"
"#,
        )?;

        let config = load_config(file.path())?;
        assert_eq!(config.mode, PipelineMode::FeatureIngest);
        assert_eq!(config.pipeline.window_duration_ms, 5_000);
        assert_eq!(config.pipeline.emission_mode, EmissionMode::Final);
        assert_eq!(config.pipeline.shard_count, 4);
        assert_eq!(config.pipeline.idle_window_grace_ms, Some(10_000));
        assert_eq!(config.source.kind, SourceKind::File);
        assert_eq!(config.feature_group.to_group().table_name(), "user_features_v2");
        assert_eq!(config.sink.kind, SinkKind::Http);
        // 未出现的段落保持默认值
        assert!(!config.server.enabled);
        assert_eq!(config.log.level, "info");
        Ok(())
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let config = load_config(&dir.path().join("absent.toml"))?;
        assert_eq!(config.mode, PipelineMode::Ohlcv);
        assert_eq!(config.pipeline.batch_size_threshold, 1);
        Ok(())
    }

    #[test]
    fn test_invalid_values_fail_fast() -> anyhow::Result<()> {
        let file = write_config("[pipeline]\nbatch_size_threshold = 0\n")?;
        assert_eq!(
            load_config(file.path()).unwrap_err(),
            ConfigError::InvalidBatchThreshold(0)
        );

        let file = write_config("[sink]\nkind = \"http\"\n")?;
        assert_eq!(
            load_config(file.path()).unwrap_err(),
            ConfigError::Missing("sink.endpoint".into())
        );
        Ok(())
    }

    #[test]
    fn test_unknown_enum_value_is_load_error() -> anyhow::Result<()> {
        let file = write_config("[pipeline]\nemission_mode = \"SOMETIMES\"\n")?;
        assert!(matches!(
            load_config(file.path()),
            Err(ConfigError::Load(_))
        ));
        Ok(())
    }
}
