use candleflow_core::config::ConfigError;
use candleflow_core::window::entity::WindowBounds;

/// # Summary
/// 滚动窗口分配器：把事件时间映射到所属的半开区间。
///
/// # Invariants
/// - `duration_ms > 0`，在构造时校验。
/// - 无内部状态，`assign` 为纯函数。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowAssigner {
    duration_ms: i64,
}

impl WindowAssigner {
    /// # Summary
    /// 创建分配器。
    ///
    /// # Arguments
    /// * `duration_ms`: 窗口时长 (毫秒)。
    ///
    /// # Returns
    /// 时长非正时返回 `ConfigError::InvalidWindowDuration`。
    pub fn new(duration_ms: i64) -> Result<Self, ConfigError> {
        if duration_ms <= 0 {
            return Err(ConfigError::InvalidWindowDuration(duration_ms));
        }
        Ok(Self { duration_ms })
    }

    pub fn duration_ms(&self) -> i64 {
        self.duration_ms
    }

    /// # Summary
    /// 计算时间戳所属窗口。
    ///
    /// # Logic
    /// 1. `start = floor(t / d) * d`，负时间戳同样向下取整。
    /// 2. `end = start + d`。
    ///
    /// # Returns
    /// 窗口边界超出 `i64` 范围时返回 None。
    pub fn assign(&self, timestamp_ms: i64) -> Option<WindowBounds> {
        let start_ms = timestamp_ms
            .div_euclid(self.duration_ms)
            .checked_mul(self.duration_ms)?;
        let end_ms = start_ms.checked_add(self.duration_ms)?;
        Some(WindowBounds { start_ms, end_ms })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_positive_duration() {
        assert_eq!(
            WindowAssigner::new(0),
            Err(ConfigError::InvalidWindowDuration(0))
        );
        assert_eq!(
            WindowAssigner::new(-60_000),
            Err(ConfigError::InvalidWindowDuration(-60_000))
        );
    }

    #[test]
    fn test_partition_property() {
        for duration in [1_i64, 7, 1_000, 60_000] {
            let assigner = WindowAssigner::new(duration).unwrap();
            for t in (-130_000_i64..130_000).step_by(997) {
                let w = assigner.assign(t).unwrap();
                assert!(w.start_ms <= t && t < w.end_ms, "t={} d={}", t, duration);
                assert_eq!(w.end_ms - w.start_ms, duration);
                assert_eq!(w.start_ms.rem_euclid(duration), 0);
            }
        }
    }

    #[test]
    fn test_boundaries() {
        let assigner = WindowAssigner::new(60_000).unwrap();
        assert_eq!(assigner.assign(0).unwrap().start_ms, 0);
        assert_eq!(assigner.assign(59_999).unwrap().end_ms, 60_000);
        assert_eq!(assigner.assign(60_000).unwrap().start_ms, 60_000);
        assert_eq!(assigner.assign(-1).unwrap().start_ms, -60_000);
    }

    #[test]
    fn test_extreme_timestamps_do_not_overflow() {
        let assigner = WindowAssigner::new(60_000).unwrap();
        assert_eq!(assigner.assign(i64::MIN), None);
        assert_eq!(assigner.assign(i64::MAX), None);

        // 单位时长下 i64::MIN 自身就是窗口起点，但结束时间仍可表示
        let unit = WindowAssigner::new(1).unwrap();
        let w = unit.assign(i64::MIN).unwrap();
        assert_eq!(w.start_ms, i64::MIN);
        assert_eq!(w.end_ms, i64::MIN + 1);
        assert_eq!(unit.assign(i64::MAX), None);
    }
}
