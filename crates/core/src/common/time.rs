use chrono::Utc;
use std::sync::RwLock;

/// # Summary
/// 处理时间 (wall-clock) 供给器接口，用于隔离物理系统时钟。
/// 刷新控制器的超时判断必须通过此接口取时，测试中可替换为虚拟时钟。
///
/// # Invariants
/// - 返回值单位为 Unix 毫秒。
/// - 与事件时间无关：事件时间只来自记录自身携带的时间戳。
pub trait TimeProvider: Send + Sync {
    /// 获取当前处理时间 (毫秒)
    fn now_ms(&self) -> i64;
}

/// # Summary
/// 实际运行使用的真实时钟，直接返回操作系统当前时间。
pub struct RealTimeProvider;

impl TimeProvider for RealTimeProvider {
    fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// # Summary
/// 测试专用虚拟时钟，允许主动拨快时间以触发超时刷新。
///
/// # Invariants
/// - 并发安全：内部利用 `RwLock` 提供多线程安全的读写。
pub struct FakeClockProvider {
    current_ms: RwLock<i64>,
}

impl FakeClockProvider {
    /// 使用指定的初始毫秒时间创建虚拟时钟
    pub fn new(initial_ms: i64) -> Self {
        Self {
            current_ms: RwLock::new(initial_ms),
        }
    }

    /// 强制修改时钟的当前时间
    pub fn set_time(&self, new_ms: i64) {
        let mut time = self.current_ms.write().unwrap_or_else(|e| e.into_inner());
        *time = new_ms;
    }

    /// 将时钟向前拨动指定毫秒数
    pub fn advance(&self, delta_ms: i64) {
        let mut time = self.current_ms.write().unwrap_or_else(|e| e.into_inner());
        *time = time.saturating_add(delta_ms);
    }
}

impl TimeProvider for FakeClockProvider {
    fn now_ms(&self) -> i64 {
        *self.current_ms.read().unwrap_or_else(|e| e.into_inner())
    }
}
