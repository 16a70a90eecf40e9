use async_trait::async_trait;
use candleflow_core::sink::entity::{FeatureGroup, FeatureRecord};
use candleflow_core::sink::error::SinkError;
use candleflow_core::sink::port::FeatureStore;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

/// # Summary
/// 远程特征存储实现，把批次以 JSON POST 到摄取接口。
///
/// # Invariants
/// - 使用 `reqwest` 异步客户端，单次请求 10 秒超时。
/// - 非 2xx 响应视为整批失败，由上层决定重试。
pub struct HttpFeatureStore {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

/// 摄取请求体
#[derive(Serialize)]
struct IngestRequest<'a> {
    feature_group: &'a FeatureGroup,
    records: &'a [FeatureRecord],
    write_options: WriteOptions,
}

#[derive(Serialize)]
struct WriteOptions {
    start_offline_materialization: bool,
}

impl HttpFeatureStore {
    /// # Summary
    /// 创建远程特征存储客户端。
    ///
    /// # Arguments
    /// * `endpoint`: 摄取接口完整 URL。
    /// * `api_key`: 可选的 Bearer 令牌。
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>) -> Result<Self, SinkError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| SinkError::Write(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key,
        })
    }
}

#[async_trait]
impl FeatureStore for HttpFeatureStore {
    async fn push(
        &self,
        records: &[FeatureRecord],
        target: &FeatureGroup,
        start_offline_materialization: bool,
    ) -> Result<(), SinkError> {
        let body = IngestRequest {
            feature_group: target,
            records,
            write_options: WriteOptions {
                start_offline_materialization,
            },
        };

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let resp = request
            .send()
            .await
            .map_err(|e| SinkError::Write(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(SinkError::Write(format!("HTTP {}: {}", status, text)));
        }

        debug!(endpoint = %self.endpoint, records = records.len(), "Features pushed");
        Ok(())
    }
}
