use candleflow_core::market::entity::{Candle, Trade};

/// # Summary
/// K 线折叠器，两个纯函数：首笔初始化与后续折叠。
///
/// # Invariants
/// - 无副作用，结果只依赖输入。
/// - 只有 `close` 与 `product_id` 对到达顺序敏感 (后写者胜)。
pub struct CandleReducer;

impl CandleReducer {
    /// 窗口内第一笔成交生成初始 K 线。`timestamp_ms` 在发射时由控制器改写为窗口结束时间。
    pub fn initialize(trade: &Trade) -> Candle {
        Candle {
            product_id: trade.product_id.clone(),
            timestamp_ms: trade.timestamp_ms,
            open: trade.price,
            high: trade.price,
            low: trade.price,
            close: trade.price,
            volume: trade.quantity,
        }
    }

    /// 把一笔成交折叠进已有 K 线
    pub fn fold(mut candle: Candle, trade: &Trade) -> Candle {
        candle.high = candle.high.max(trade.price);
        candle.low = candle.low.min(trade.price);
        candle.close = trade.price;
        candle.volume += trade.quantity;
        candle.product_id.clone_from(&trade.product_id);
        candle
    }
}
