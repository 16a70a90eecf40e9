use crate::market::entity::Candle;
use serde::{Deserialize, Serialize};

/// # Summary
/// 滚动窗口的半开区间 `[start_ms, end_ms)`。
///
/// # Invariants
/// - `end_ms - start_ms` 恒等于配置的窗口时长。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WindowBounds {
    // 区间起点 (包含)
    pub start_ms: i64,
    // 区间终点 (不包含)
    pub end_ms: i64,
}

impl WindowBounds {
    /// 判断时间戳是否落在区间内
    pub fn contains(&self, timestamp_ms: i64) -> bool {
        self.start_ms <= timestamp_ms && timestamp_ms < self.end_ms
    }
}

/// # Summary
/// 活跃窗口表的复合键 `(key, start_ms)`。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowKey {
    // 分区键，即品种代码
    pub key: String,
    // 窗口起点
    pub start_ms: i64,
}

/// 窗口状态，CLOSED 为终态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WindowStatus {
    Open,
    Closed,
}

/// # Summary
/// 聚合单元：一个分区键在一个时间区间内的进行中或已完成的 K 线。
///
/// # Invariants
/// - 同一 `(key, start_ms)` 同时至多存在一个 OPEN 窗口。
/// - 关闭后不会再次打开。
#[derive(Debug, Clone, PartialEq)]
pub struct Window {
    pub key: String,
    pub bounds: WindowBounds,
    pub state: Candle,
    pub status: WindowStatus,
}

/// # Summary
/// 生命周期控制器发射的一条结果。
///
/// # Invariants
/// - `candle.timestamp_ms == bounds.end_ms`。
/// - `is_final == true` 的发射对每个窗口恰好一次。
#[derive(Debug, Clone, PartialEq)]
pub struct WindowEmission {
    pub candle: Candle,
    pub bounds: WindowBounds,
    pub is_final: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_half_open() {
        let bounds = WindowBounds {
            start_ms: 0,
            end_ms: 60_000,
        };
        assert!(bounds.contains(0));
        assert!(bounds.contains(59_999));
        assert!(!bounds.contains(60_000));
        assert!(!bounds.contains(-1));
    }
}
