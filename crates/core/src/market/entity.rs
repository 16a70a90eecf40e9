use serde::{Deserialize, Serialize};

/// 可接受的事件时间绝对值上界 (毫秒)，约为纪元前后 27.5 万年
pub const MAX_EVENT_TIME_MS: i64 = 8_640_000_000_000_000;

/// # Summary
/// 单笔成交事件，由上游生产者写入输入流，核心只读不改。
///
/// # Invariants
/// - `timestamp_ms` 为事件时间，同一品种内单调，不同品种之间不保证有序。
/// - 通过 `validate` 校验后才允许进入聚合逻辑。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    // 品种代码 (例如: BTC/USD)
    pub product_id: String,
    // 成交价
    pub price: f64,
    // 成交量
    pub quantity: f64,
    // 事件时间 (Unix 毫秒)
    pub timestamp_ms: i64,
}

impl Trade {
    /// # Summary
    /// 在输入边界校验成交字段。
    ///
    /// # Logic
    /// 1. 品种代码不能为空。
    /// 2. 价格必须为有限正数。
    /// 3. 数量必须为有限非负数。
    /// 4. 事件时间不超过 `MAX_EVENT_TIME_MS`。
    ///
    /// # Returns
    /// 合法返回 Ok，否则返回描述原因的字符串。
    pub fn validate(&self) -> Result<(), String> {
        if self.product_id.trim().is_empty() {
            return Err("product_id is empty".to_string());
        }
        if !self.price.is_finite() || self.price <= 0.0 {
            return Err(format!("invalid price {}", self.price));
        }
        if !self.quantity.is_finite() || self.quantity < 0.0 {
            return Err(format!("invalid quantity {}", self.quantity));
        }
        if !(-MAX_EVENT_TIME_MS..=MAX_EVENT_TIME_MS).contains(&self.timestamp_ms) {
            return Err(format!("timestamp_ms {} out of range", self.timestamp_ms));
        }
        Ok(())
    }
}

/// # Summary
/// 单根 OHLCV K 线，窗口聚合的结果载荷。
///
/// # Invariants
/// - `low <= open, close <= high`。
/// - `volume` 在窗口生命周期内单调不减。
/// - `timestamp_ms` 取窗口的结束时间 `end_ms`，而非开始时间。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    // 品种代码，取最后一笔折叠进来的成交
    pub product_id: String,
    // 窗口结束时间 (Unix 毫秒)
    pub timestamp_ms: i64,
    // 开盘价
    pub open: f64,
    // 最高价
    pub high: f64,
    // 最低价
    pub low: f64,
    // 收盘价
    pub close: f64,
    // 成交量累计
    pub volume: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trade(product_id: &str, price: f64, quantity: f64) -> Trade {
        Trade {
            product_id: product_id.to_string(),
            price,
            quantity,
            timestamp_ms: 0,
        }
    }

    #[test]
    fn test_trade_validate() {
        assert!(trade("BTC/USD", 100.0, 0.5).validate().is_ok());
        assert!(trade("BTC/USD", 100.0, 0.0).validate().is_ok());
        assert!(trade("", 100.0, 1.0).validate().is_err());
        assert!(trade("BTC/USD", 0.0, 1.0).validate().is_err());
        assert!(trade("BTC/USD", f64::NAN, 1.0).validate().is_err());
        assert!(trade("BTC/USD", 1.0, -1.0).validate().is_err());
        assert!(trade("BTC/USD", 1.0, f64::INFINITY).validate().is_err());
    }

    #[test]
    fn test_trade_timestamp_bounds() {
        let mut t = trade("BTC/USD", 1.0, 1.0);
        for ts in [-MAX_EVENT_TIME_MS, -1, MAX_EVENT_TIME_MS] {
            t.timestamp_ms = ts;
            assert!(t.validate().is_ok(), "ts={}", ts);
        }
        for ts in [i64::MIN, -MAX_EVENT_TIME_MS - 1, MAX_EVENT_TIME_MS + 1, i64::MAX] {
            t.timestamp_ms = ts;
            assert!(t.validate().is_err(), "ts={}", ts);
        }
    }

    #[test]
    fn test_candle_wire_format() {
        let candle = Candle {
            product_id: "BTC/USD".into(),
            timestamp_ms: 60_000,
            open: 10.0,
            high: 12.0,
            low: 9.0,
            close: 9.0,
            volume: 4.0,
        };
        let value = serde_json::to_value(&candle).unwrap();
        let obj = value.as_object().unwrap();
        assert_eq!(obj.len(), 7);
        assert_eq!(obj["timestamp_ms"], 60_000);
        assert_eq!(obj["product_id"], "BTC/USD");
    }
}
