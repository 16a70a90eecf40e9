/// # Summary
/// 事件时钟：取已观察到的记录时间戳的最大值，与到达时间无关。
///
/// # Invariants
/// - `now()` 单调不减。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventClock {
    current_ms: Option<i64>,
}

impl EventClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// 观察一个事件时间戳，返回推进后的时钟值
    pub fn observe(&mut self, timestamp_ms: i64) -> i64 {
        let next = self
            .current_ms
            .map_or(timestamp_ms, |current| current.max(timestamp_ms));
        self.current_ms = Some(next);
        next
    }

    /// 当前事件时间，尚未观察到任何事件时为 None
    pub fn now(&self) -> Option<i64> {
        self.current_ms
    }
}
