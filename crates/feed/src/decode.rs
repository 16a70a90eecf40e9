use candleflow_core::market::entity::Trade;
use candleflow_core::sink::entity::FeatureRecord;
use candleflow_core::stream::entity::SourceMessage;
use candleflow_core::stream::error::StreamError;

fn decode_error(msg: &SourceMessage, reason: impl Into<String>) -> StreamError {
    StreamError::Decode {
        offset: msg.offset,
        key: msg.key.clone(),
        reason: reason.into(),
    }
}

/// # Summary
/// 把一条原始消息解码为经过校验的成交。
///
/// # Logic
/// 1. 按 `{product_id, price, quantity, timestamp_ms}` 解析 JSON。
/// 2. 调用 `Trade::validate` 做边界校验。
///
/// # Returns
/// 失败时返回带偏移量和键的 `StreamError::Decode`。
pub fn decode_trade(msg: &SourceMessage) -> Result<Trade, StreamError> {
    let trade: Trade =
        serde_json::from_slice(&msg.payload).map_err(|e| decode_error(msg, e.to_string()))?;
    trade.validate().map_err(|reason| decode_error(msg, reason))?;
    Ok(trade)
}

/// 把一条原始消息解码为扁平特征记录
pub fn decode_record(msg: &SourceMessage) -> Result<FeatureRecord, StreamError> {
    let value: serde_json::Value =
        serde_json::from_slice(&msg.payload).map_err(|e| decode_error(msg, e.to_string()))?;
    FeatureRecord::from_value(value).map_err(|reason| decode_error(msg, reason))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_valid_trade() {
        let msg = SourceMessage::json(
            7,
            Some("BTC/USD"),
            r#"{"product_id":"BTC/USD","price":64000.5,"quantity":0.01,"timestamp_ms":1700000000000}"#,
        );
        let trade = decode_trade(&msg).unwrap();
        assert_eq!(trade.product_id, "BTC/USD");
        assert_eq!(trade.price, 64000.5);
        assert_eq!(trade.timestamp_ms, 1_700_000_000_000);
    }

    #[test]
    fn test_decode_errors_carry_offset_and_key() {
        let garbage = SourceMessage::json(3, Some("ETH/USD"), "{not json");
        let err = decode_trade(&garbage).unwrap_err();
        assert!(matches!(
            err,
            StreamError::Decode { offset: 3, ref key, .. } if key.as_deref() == Some("ETH/USD")
        ));

        let negative = SourceMessage::json(
            4,
            None,
            r#"{"product_id":"ETH/USD","price":-1.0,"quantity":1.0,"timestamp_ms":0}"#,
        );
        assert!(matches!(
            decode_trade(&negative),
            Err(StreamError::Decode { offset: 4, .. })
        ));

        let missing = SourceMessage::json(5, None, r#"{"product_id":"ETH/USD","price":1.0}"#);
        assert!(decode_trade(&missing).is_err());
    }

    #[test]
    fn test_decode_record_rejects_nested_values() {
        let flat = SourceMessage::json(0, None, r#"{"product_id":"A","close":1.5}"#);
        assert_eq!(decode_record(&flat).unwrap().len(), 2);

        let nested = SourceMessage::json(1, None, r#"{"product_id":"A","tags":[1,2]}"#);
        assert!(matches!(
            decode_record(&nested),
            Err(StreamError::Decode { offset: 1, .. })
        ));

        let scalar = SourceMessage::json(2, None, "42");
        assert!(decode_record(&scalar).is_err());
    }
}
