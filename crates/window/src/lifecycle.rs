use crate::assigner::WindowAssigner;
use crate::clock::EventClock;
use crate::reducer::CandleReducer;
use candleflow_core::common::EmissionMode;
use candleflow_core::config::{ConfigError, PipelineConfig};
use candleflow_core::market::entity::{Candle, Trade};
use candleflow_core::window::entity::{
    Window, WindowBounds, WindowEmission, WindowKey, WindowStatus,
};
use candleflow_core::window::error::WindowError;
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, warn};

/// 单个分区键的进度：事件时钟、已关闭水位与按起点排序的活跃窗口。
#[derive(Debug, Default)]
struct KeyProgress {
    clock: EventClock,
    // 已关闭窗口的最大结束时间
    closed_until_ms: Option<i64>,
    open_starts: BTreeSet<i64>,
}

impl KeyProgress {
    /// 该键的水位线：早于此时间结束的窗口均不可再写入
    fn watermark(&self) -> Option<i64> {
        match (self.clock.now(), self.closed_until_ms) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        }
    }
}

/// # Summary
/// 窗口生命周期控制器，独占一个分片内全部窗口状态。
///
/// # Invariants
/// - 活跃窗口表以 `(key, start_ms)` 为键，同一键至多一个 OPEN 窗口。
/// - 窗口在事件时钟越过 `end_ms` 时关闭并立即从表中移除，关闭后不再打开。
/// - 每个窗口的最终 K 线恰好发射一次，`timestamp_ms` 为窗口结束时间。
/// - `open_ends` 与活跃窗口表一一对应，按 `(end_ms, key)` 排序。
/// - 单线程独占使用，不做任何内部同步。
pub struct WindowController {
    assigner: WindowAssigner,
    mode: EmissionMode,
    idle_grace_ms: Option<i64>,
    active: HashMap<WindowKey, Window>,
    keys: HashMap<String, KeyProgress>,
    // 跨键水位线只需查看最早结束的窗口
    open_ends: BTreeSet<(i64, WindowKey)>,
    global_clock: EventClock,
}

impl WindowController {
    /// # Summary
    /// 创建控制器。
    ///
    /// # Arguments
    /// * `assigner`: 窗口分配器。
    /// * `mode`: 发射模式。
    /// * `idle_grace_ms`: 跨键水位线宽限期，None 表示关闭该机制。
    ///
    /// # Returns
    /// 宽限期为负时返回 `ConfigError::InvalidGrace`。
    pub fn new(
        assigner: WindowAssigner,
        mode: EmissionMode,
        idle_grace_ms: Option<i64>,
    ) -> Result<Self, ConfigError> {
        if let Some(grace) = idle_grace_ms
            && grace < 0
        {
            return Err(ConfigError::InvalidGrace(grace));
        }
        Ok(Self {
            assigner,
            mode,
            idle_grace_ms,
            active: HashMap::new(),
            keys: HashMap::new(),
            open_ends: BTreeSet::new(),
            global_clock: EventClock::new(),
        })
    }

    /// 按管线配置构造
    pub fn from_config(config: &PipelineConfig) -> Result<Self, ConfigError> {
        let assigner = WindowAssigner::new(config.window_duration_ms)?;
        Self::new(assigner, config.emission_mode, config.idle_window_grace_ms)
    }

    /// # Summary
    /// 处理一笔成交。
    ///
    /// # Logic
    /// 1. 分配窗口；若窗口已被该键水位线或跨键水位线越过，作为迟到事件丢弃。
    /// 2. 推进该键与全局的事件时钟，关闭所有被越过的窗口并发射最终 K 线。
    /// 3. 打开或折叠当前窗口；CURRENT 模式下发射进行中快照。
    ///
    /// # Arguments
    /// * `trade`: 已在边界校验过的成交。
    ///
    /// # Returns
    /// 成功返回按时间顺序排列的发射列表 (先关闭的旧窗口，后当前快照)；
    /// 迟到事件返回 `WindowError::LateEvent`，无法分配窗口的时间戳返回
    /// `WindowError::TimestampOutOfRange`，两种情况下状态都不发生任何变化。
    pub fn process(&mut self, trade: &Trade) -> Result<Vec<WindowEmission>, WindowError> {
        let bounds = self.assigner.assign(trade.timestamp_ms).ok_or_else(|| {
            warn!(
                product_id = %trade.product_id,
                timestamp_ms = trade.timestamp_ms,
                "Dropping trade with out-of-range timestamp"
            );
            WindowError::TimestampOutOfRange {
                product_id: trade.product_id.clone(),
                timestamp_ms: trade.timestamp_ms,
            }
        })?;
        self.check_late(trade, bounds)?;

        let mut emissions = Vec::new();

        let key_clock = {
            let progress = self.keys.entry(trade.product_id.clone()).or_default();
            progress.clock.observe(trade.timestamp_ms)
        };
        self.global_clock.observe(trade.timestamp_ms);
        emissions.extend(self.close_key_until(&trade.product_id, key_clock));
        if let Some(watermark) = self.idle_watermark() {
            emissions.extend(self.close_all_until(watermark));
        }

        let window_key = WindowKey {
            key: trade.product_id.clone(),
            start_ms: bounds.start_ms,
        };
        let window = match self.active.remove(&window_key) {
            Some(mut window) => {
                window.state = CandleReducer::fold(window.state, trade);
                window
            }
            None => {
                debug!(
                    product_id = %trade.product_id,
                    window_start = bounds.start_ms,
                    "Opening window"
                );
                if let Some(progress) = self.keys.get_mut(&trade.product_id) {
                    progress.open_starts.insert(bounds.start_ms);
                }
                self.open_ends.insert((bounds.end_ms, window_key.clone()));
                Window {
                    key: trade.product_id.clone(),
                    bounds,
                    state: CandleReducer::initialize(trade),
                    status: WindowStatus::Open,
                }
            }
        };

        if self.mode.emits_updates() {
            emissions.push(Self::emission(&window, false));
        }
        self.active.insert(window_key, window);

        Ok(emissions)
    }

    /// # Summary
    /// 关闭全部活跃窗口 (停机时调用)。
    ///
    /// # Logic
    /// 1. 按 `(key, start_ms)` 排序依次关闭，发射最终 K 线。
    /// 2. 记录各键的已关闭水位，之后的同窗口成交按迟到处理。
    ///
    /// # Returns
    /// 所有部分窗口的最终发射。
    pub fn close_all(&mut self) -> Vec<WindowEmission> {
        let mut keys: Vec<WindowKey> = self.active.keys().cloned().collect();
        keys.sort();
        keys.into_iter()
            .filter_map(|k| self.close_window(&k))
            .collect()
    }

    /// 当前活跃窗口数
    pub fn open_window_count(&self) -> usize {
        self.active.len()
    }

    /// 指定键当前最新窗口的进行中快照
    pub fn latest_candle(&self, product_id: &str) -> Option<Candle> {
        let progress = self.keys.get(product_id)?;
        let start_ms = *progress.open_starts.last()?;
        self.active
            .get(&WindowKey {
                key: product_id.to_string(),
                start_ms,
            })
            .map(|w| Self::emission(w, false).candle)
    }

    /// 跨键水位线 (全局事件时间减去宽限期)
    fn idle_watermark(&self) -> Option<i64> {
        let grace = self.idle_grace_ms?;
        self.global_clock
            .now()
            .map(|now| now.saturating_sub(grace))
    }

    fn check_late(&self, trade: &Trade, bounds: WindowBounds) -> Result<(), WindowError> {
        let key_watermark = self
            .keys
            .get(&trade.product_id)
            .and_then(KeyProgress::watermark);
        let watermark = match (key_watermark, self.idle_watermark()) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };

        match watermark {
            Some(watermark_ms) if bounds.end_ms <= watermark_ms => {
                warn!(
                    product_id = %trade.product_id,
                    timestamp_ms = trade.timestamp_ms,
                    window_start = bounds.start_ms,
                    watermark_ms,
                    "Dropping late trade for closed window"
                );
                Err(WindowError::LateEvent {
                    product_id: trade.product_id.clone(),
                    timestamp_ms: trade.timestamp_ms,
                    window_start_ms: bounds.start_ms,
                    window_end_ms: bounds.end_ms,
                    watermark_ms,
                })
            }
            _ => Ok(()),
        }
    }

    /// 关闭某个键下所有 `end_ms <= watermark` 的窗口
    fn close_key_until(&mut self, product_id: &str, watermark_ms: i64) -> Vec<WindowEmission> {
        let duration = self.assigner.duration_ms();
        let starts: Vec<i64> = match self.keys.get(product_id) {
            Some(progress) => progress
                .open_starts
                .iter()
                .copied()
                .take_while(|start| start.saturating_add(duration) <= watermark_ms)
                .collect(),
            None => return Vec::new(),
        };
        starts
            .into_iter()
            .filter_map(|start_ms| {
                self.close_window(&WindowKey {
                    key: product_id.to_string(),
                    start_ms,
                })
            })
            .collect()
    }

    /// # Summary
    /// 在所有键上应用跨键水位线。
    ///
    /// # Logic
    /// 从最早结束的窗口开始关闭，遇到第一个 `end_ms > watermark` 即停止；
    /// 水位线未越过任何窗口时只做一次比较。
    ///
    /// # Returns
    /// 按 `(end_ms, key)` 顺序排列的最终发射。
    fn close_all_until(&mut self, watermark_ms: i64) -> Vec<WindowEmission> {
        let mut emissions = Vec::new();
        while self
            .open_ends
            .first()
            .is_some_and(|(end_ms, _)| *end_ms <= watermark_ms)
        {
            let Some((_, key)) = self.open_ends.pop_first() else {
                break;
            };
            emissions.extend(self.close_window(&key));
        }
        emissions
    }

    /// OPEN -> CLOSED：移出活跃表、更新水位并生成最终发射
    fn close_window(&mut self, key: &WindowKey) -> Option<WindowEmission> {
        let mut window = self.active.remove(key)?;
        window.status = WindowStatus::Closed;
        self.open_ends.remove(&(window.bounds.end_ms, key.clone()));
        if let Some(progress) = self.keys.get_mut(&key.key) {
            progress.open_starts.remove(&key.start_ms);
            progress.closed_until_ms = Some(
                progress
                    .closed_until_ms
                    .map_or(window.bounds.end_ms, |c| c.max(window.bounds.end_ms)),
            );
        }
        debug!(
            product_id = %window.key,
            window_start = window.bounds.start_ms,
            window_end = window.bounds.end_ms,
            "Closing window"
        );
        Some(Self::emission(&window, true))
    }

    fn emission(window: &Window, is_final: bool) -> WindowEmission {
        let mut candle = window.state.clone();
        candle.timestamp_ms = window.bounds.end_ms;
        WindowEmission {
            candle,
            bounds: window.bounds,
            is_final,
        }
    }
}
