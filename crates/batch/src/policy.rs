/// 批次写入失败后的处理决定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    // 放回队首，在下一次触发时重试
    Retry,
    // 丢弃批次并发出致命告警
    GiveUp,
}

/// # Summary
/// 可插拔的失败处理策略。
///
/// # Invariants
/// - 必须对任意输入在有限次失败后返回 `GiveUp`，保证批次不会被无限重试。
pub trait RetryPolicy: Send + Sync {
    /// # Summary
    /// 根据同一批次已连续失败的次数给出决定。
    ///
    /// # Arguments
    /// * `failed_attempts`: 含本次在内的连续失败次数，从 1 开始。
    fn on_failure(&self, failed_attempts: u32) -> RetryDecision;
}

/// # Summary
/// 有上界的重试：首次失败后最多再重试 `max_retries` 次。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundedRetry {
    max_retries: u32,
}

impl BoundedRetry {
    pub fn new(max_retries: u32) -> Self {
        Self { max_retries }
    }
}

impl Default for BoundedRetry {
    fn default() -> Self {
        Self::new(3)
    }
}

impl RetryPolicy for BoundedRetry {
    fn on_failure(&self, failed_attempts: u32) -> RetryDecision {
        if failed_attempts <= self.max_retries {
            RetryDecision::Retry
        } else {
            RetryDecision::GiveUp
        }
    }
}
