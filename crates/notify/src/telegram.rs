use async_trait::async_trait;
use candleflow_core::notify::error::NotifyError;
use candleflow_core::notify::port::Notifier;
use serde::Serialize;
use std::time::Duration;

const TELEGRAM_API: &str = "https://api.telegram.org";

/// # Summary
/// 通过 Telegram Bot API 发送告警的通知器。
///
/// # Invariants
/// * `bot_token` 与 `chat_id` 非空，构造时校验。
/// * 单次请求 10 秒超时，告警不会长时间阻塞分片。
pub struct TelegramNotifier {
    bot_token: String,
    chat_id: String,
    api_base: String,
    client: reqwest::Client,
}

/// `sendMessage` 请求体
#[derive(Serialize)]
struct TelegramMessage<'a> {
    chat_id: &'a str,
    text: String,
    parse_mode: &'static str,
}

impl TelegramNotifier {
    /// # Summary
    /// 创建 TelegramNotifier。
    ///
    /// # Arguments
    /// * `bot_token` - Bot API 令牌。
    /// * `chat_id` - 接收告警的会话 ID。
    ///
    /// # Returns
    /// 凭据为空或 HTTP 客户端构建失败时返回 `NotifyError::Config`。
    pub fn new(bot_token: String, chat_id: String) -> Result<Self, NotifyError> {
        if bot_token.trim().is_empty() || chat_id.trim().is_empty() {
            return Err(NotifyError::Config(
                "telegram bot token and chat id are required".into(),
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| NotifyError::Config(e.to_string()))?;
        Ok(Self {
            bot_token,
            chat_id,
            api_base: TELEGRAM_API.to_string(),
            client,
        })
    }

    /// 替换 API 根地址 (自建 Bot API 服务器)
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    /// # Summary
    /// 向配置的会话发送告警。
    ///
    /// # Logic
    /// 1. 粗体标题 + 换行 + 正文，Markdown 格式。
    /// 2. POST 到 `sendMessage`。
    /// 3. 非 2xx 响应返回 `NotifyError::Platform`。
    async fn notify(&self, subject: &str, content: &str) -> Result<(), NotifyError> {
        let url = format!("{}/bot{}/sendMessage", self.api_base, self.bot_token);
        let payload = TelegramMessage {
            chat_id: &self.chat_id,
            text: format!("*{}*\n{}", subject, content),
            parse_mode: "Markdown",
        };

        let response = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| NotifyError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(NotifyError::Platform(format!(
                "Telegram API error: {}",
                error_text
            )));
        }

        Ok(())
    }
}
