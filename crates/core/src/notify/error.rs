use thiserror::Error;

/// # Summary
/// 告警投递失败的原因。告警失败只记录日志，不会中断管线。
#[derive(Error, Debug)]
pub enum NotifyError {
    // 请求未能到达告警平台
    #[error("alert transport failed: {0}")]
    Network(String),

    // 凭据缺失或客户端无法构建，启动时即报错
    #[error("alert channel misconfigured: {0}")]
    Config(String),

    // 告警平台拒绝了消息
    #[error("alert rejected by platform: {0}")]
    Platform(String),
}
