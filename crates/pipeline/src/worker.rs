use async_trait::async_trait;

/// # Summary
/// 分片工作者：独占一个分片的全部可变状态，由运行时在专属任务中顺序驱动。
///
/// # Invariants
/// - 方法只会被所属分片任务顺序调用，无需内部同步。
/// - 单条输入或单个批次的错误必须在内部记录并消化，不得中断分片。
#[async_trait]
pub trait ShardWorker: Send + 'static {
    /// 路由到本分片的已解码输入
    type Input: Send + 'static;

    /// 处理一条输入
    async fn on_input(&mut self, input: Self::Input);

    /// # Summary
    /// 处理时间推进：每条输入之后，以及每次拉取超时后调用，用于评估超时刷新。
    async fn on_tick(&mut self);

    /// # Summary
    /// 停机：关闭所有未完成工作并强制刷新。调用后不会再有输入。
    async fn shutdown(&mut self);
}
