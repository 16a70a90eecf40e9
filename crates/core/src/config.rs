use crate::common::EmissionMode;
use crate::sink::entity::FeatureGroup;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// # Summary
/// 配置错误枚举，启动阶段即失败 (fail fast)。
///
/// # Invariants
/// - 必须通过 `thiserror` 派生 `Error` trait。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("window_duration_ms must be > 0, got {0}")]
    InvalidWindowDuration(i64),
    #[error("batch_size_threshold must be >= 1, got {0}")]
    InvalidBatchThreshold(i64),
    #[error("flush_timeout_ms must be >= 0, got {0}")]
    InvalidFlushTimeout(i64),
    #[error("idle_window_grace_ms must be >= 0, got {0}")]
    InvalidGrace(i64),
    #[error("poll_timeout_ms must be > 0")]
    InvalidPollTimeout,
    #[error("shard_count must be >= 1")]
    InvalidShardCount,
    #[error("feature group `{0}` has no primary keys")]
    MissingPrimaryKeys(String),
    #[error("missing config value: {0}")]
    Missing(String),
    #[error("failed to load config: {0}")]
    Load(String),
}

/// 管线运行模式
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PipelineMode {
    // 成交 -> K 线 -> 中间主题 + 特征存储
    #[default]
    Ohlcv,
    // 输入流中的特征记录直接批量写入特征存储
    FeatureIngest,
}

impl std::fmt::Display for PipelineMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineMode::Ohlcv => write!(f, "ohlcv"),
            PipelineMode::FeatureIngest => write!(f, "feature_ingest"),
        }
    }
}

/// 全局应用配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub mode: PipelineMode,
    pub pipeline: PipelineConfig,
    pub source: SourceConfig,
    pub candle_output: CandleOutputConfig,
    pub feature_group: FeatureGroupConfig,
    pub sink: SinkConfig,
    pub alert: AlertConfig,
    pub server: ServerConfig,
    pub log: LogConfig,
}

/// # Summary
/// 聚合与批量投递的核心参数。
///
/// # Invariants
/// - 数值字段保持原始有符号类型，便于 `validate` 报告非法输入而不是在反序列化阶段静默截断。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    // 滚动窗口时长
    pub window_duration_ms: i64,
    // 批量阈值，达到即刷新
    pub batch_size_threshold: i64,
    // 超时刷新间隔，0 表示关闭
    pub flush_timeout_ms: i64,
    // 发射模式
    pub emission_mode: EmissionMode,
    // 单次拉取等待上界
    pub poll_timeout_ms: u64,
    // 写入失败后的最大重试次数
    pub sink_max_retries: u32,
    // 按品种分片的工作协程数量
    pub shard_count: usize,
    // 跨品种空闲水位线的宽限期，None 表示只按品种自身事件时间关窗。
    // 水位线按分片计算：只由同一分片内品种的事件时间推进，
    // 分片内没有活跃品种时其安静品种的窗口要到停机才关闭。
    pub idle_window_grace_ms: Option<i64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            window_duration_ms: 60_000,
            batch_size_threshold: 1,
            flush_timeout_ms: 0,
            emission_mode: EmissionMode::Current,
            poll_timeout_ms: 100,
            sink_max_retries: 3,
            shard_count: 1,
            idle_window_grace_ms: None,
        }
    }
}

/// 输入源类型
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    #[default]
    Stdin,
    File,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SourceConfig {
    pub kind: SourceKind,
    // kind = file 时必填
    pub path: Option<String>,
}

/// 中间 K 线主题的输出方式
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CandleOutputKind {
    #[default]
    None,
    Stdout,
    File,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CandleOutputConfig {
    pub kind: CandleOutputKind,
    pub path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureGroupConfig {
    pub name: String,
    pub version: u32,
    pub primary_keys: Vec<String>,
    pub event_time_field: String,
    pub start_offline_materialization: bool,
}

impl Default for FeatureGroupConfig {
    fn default() -> Self {
        let group = FeatureGroup::ohlcv();
        Self {
            name: group.name,
            version: group.version,
            primary_keys: group.primary_keys,
            event_time_field: group.event_time_field,
            start_offline_materialization: false,
        }
    }
}

impl FeatureGroupConfig {
    /// 转换为推送时携带的特征组描述
    pub fn to_group(&self) -> FeatureGroup {
        FeatureGroup {
            name: self.name.clone(),
            version: self.version,
            primary_keys: self.primary_keys.clone(),
            event_time_field: self.event_time_field.clone(),
        }
    }
}

/// 特征存储类型
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SinkKind {
    #[default]
    Sqlite,
    Http,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    pub kind: SinkKind,
    // SQLite 数据根目录
    pub data_dir: String,
    // 远程特征存储写入地址 (kind = http)
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            kind: SinkKind::Sqlite,
            data_dir: "data".to_string(),
            endpoint: None,
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AlertConfig {
    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    // 日志级别过滤，可被 RUST_LOG 覆盖
    pub level: String,
    // 滚动日志目录，None 表示只输出到终端
    pub dir: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            dir: None,
        }
    }
}

impl PipelineConfig {
    /// # Summary
    /// 校验核心参数。
    ///
    /// # Logic
    /// 1. 窗口时长必须为正。
    /// 2. 批量阈值至少为 1。
    /// 3. 超时与宽限期不能为负，拉取等待与分片数必须为正。
    ///
    /// # Returns
    /// 合法返回 Ok，否则返回第一个发现的 `ConfigError`。
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_duration_ms <= 0 {
            return Err(ConfigError::InvalidWindowDuration(self.window_duration_ms));
        }
        if self.batch_size_threshold <= 0 {
            return Err(ConfigError::InvalidBatchThreshold(self.batch_size_threshold));
        }
        if self.flush_timeout_ms < 0 {
            return Err(ConfigError::InvalidFlushTimeout(self.flush_timeout_ms));
        }
        if let Some(grace) = self.idle_window_grace_ms
            && grace < 0
        {
            return Err(ConfigError::InvalidGrace(grace));
        }
        if self.poll_timeout_ms == 0 {
            return Err(ConfigError::InvalidPollTimeout);
        }
        if self.shard_count == 0 {
            return Err(ConfigError::InvalidShardCount);
        }
        Ok(())
    }
}

impl AppConfig {
    /// # Summary
    /// 校验整份配置。
    ///
    /// # Logic
    /// 1. 校验管线参数。
    /// 2. 校验特征组与各适配器所需的必填项。
    ///
    /// # Returns
    /// 合法返回 Ok，否则返回 `ConfigError`。
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pipeline.validate()?;

        if self.feature_group.primary_keys.is_empty() {
            return Err(ConfigError::MissingPrimaryKeys(
                self.feature_group.name.clone(),
            ));
        }
        if self.feature_group.name.trim().is_empty() {
            return Err(ConfigError::Missing("feature_group.name".into()));
        }
        if self.source.kind == SourceKind::File && self.source.path.is_none() {
            return Err(ConfigError::Missing("source.path".into()));
        }
        if self.candle_output.kind == CandleOutputKind::File && self.candle_output.path.is_none() {
            return Err(ConfigError::Missing("candle_output.path".into()));
        }
        if self.sink.kind == SinkKind::Http && self.sink.endpoint.is_none() {
            return Err(ConfigError::Missing("sink.endpoint".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.mode, PipelineMode::Ohlcv);
        assert_eq!(config.pipeline.window_duration_ms, 60_000);
        assert_eq!(config.pipeline.batch_size_threshold, 1);
        assert_eq!(config.pipeline.flush_timeout_ms, 0);
        assert_eq!(config.pipeline.emission_mode, EmissionMode::Current);
        assert_eq!(config.pipeline.poll_timeout_ms, 100);
        assert_eq!(config.feature_group.primary_keys.len(), 2);
        assert_eq!(config.sink.data_dir, "data");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_pipeline_values() {
        let mut pipeline = PipelineConfig {
            window_duration_ms: 0,
            ..PipelineConfig::default()
        };
        assert_eq!(
            pipeline.validate(),
            Err(ConfigError::InvalidWindowDuration(0))
        );

        pipeline.window_duration_ms = 1_000;
        pipeline.batch_size_threshold = -2;
        assert_eq!(
            pipeline.validate(),
            Err(ConfigError::InvalidBatchThreshold(-2))
        );

        pipeline.batch_size_threshold = 10;
        pipeline.flush_timeout_ms = -1;
        assert_eq!(pipeline.validate(), Err(ConfigError::InvalidFlushTimeout(-1)));

        pipeline.flush_timeout_ms = 0;
        pipeline.shard_count = 0;
        assert_eq!(pipeline.validate(), Err(ConfigError::InvalidShardCount));

        pipeline.shard_count = 2;
        pipeline.idle_window_grace_ms = Some(-5);
        assert_eq!(pipeline.validate(), Err(ConfigError::InvalidGrace(-5)));
    }

    #[test]
    fn test_missing_adapter_settings() {
        let mut config = AppConfig::default();
        config.source.kind = SourceKind::File;
        assert_eq!(
            config.validate(),
            Err(ConfigError::Missing("source.path".into()))
        );

        config.source.path = Some("trades.jsonl".into());
        config.sink.kind = SinkKind::Http;
        assert_eq!(
            config.validate(),
            Err(ConfigError::Missing("sink.endpoint".into()))
        );

        config.sink.endpoint = Some("http://localhost:9000/ingest".into());
        config.feature_group.primary_keys.clear();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingPrimaryKeys(_))
        ));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let json = r#"{"pipeline": {"emission_mode": "FINAL", "batch_size_threshold": 50}}"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.pipeline.emission_mode, EmissionMode::Final);
        assert_eq!(config.pipeline.batch_size_threshold, 50);
        assert_eq!(config.pipeline.window_duration_ms, 60_000);
        assert_eq!(config.server.port, 8080);
    }
}
