use crate::market::entity::Candle;
use crate::sink::error::SinkError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// # Summary
/// 写入特征存储的一条扁平特征记录 (字符串键到标量 JSON 值)。
///
/// # Invariants
/// - 值只能是标量 (字符串、数字、布尔或 null)，不允许嵌套对象或数组。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureRecord(Map<String, Value>);

impl FeatureRecord {
    /// # Summary
    /// 从任意 JSON 值构造特征记录。
    ///
    /// # Logic
    /// 1. 顶层必须为 JSON 对象。
    /// 2. 所有字段值必须为标量。
    ///
    /// # Returns
    /// 合法返回记录，否则返回原因描述。
    pub fn from_value(value: Value) -> Result<Self, String> {
        let Value::Object(map) = value else {
            return Err("feature record must be a JSON object".to_string());
        };
        if let Some((field, _)) = map
            .iter()
            .find(|(_, v)| matches!(v, Value::Object(_) | Value::Array(_)))
        {
            return Err(format!("field `{}` is not a scalar", field));
        }
        Ok(Self(map))
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&Candle> for FeatureRecord {
    fn from(candle: &Candle) -> Self {
        let mut map = Map::new();
        map.insert("product_id".into(), Value::from(candle.product_id.clone()));
        map.insert("timestamp_ms".into(), Value::from(candle.timestamp_ms));
        map.insert("open".into(), Value::from(candle.open));
        map.insert("high".into(), Value::from(candle.high));
        map.insert("low".into(), Value::from(candle.low));
        map.insert("close".into(), Value::from(candle.close));
        map.insert("volume".into(), Value::from(candle.volume));
        Self(map)
    }
}

/// # Summary
/// 特征组描述，随每次推送一并交给特征存储。
///
/// # Invariants
/// - `primary_keys` 非空，存储方以其做幂等 upsert。
/// - `event_time_field` 指向记录中的毫秒时间戳字段。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureGroup {
    // 特征组名称
    pub name: String,
    // 特征组版本
    pub version: u32,
    // 主键字段列表
    pub primary_keys: Vec<String>,
    // 事件时间字段
    pub event_time_field: String,
}

impl FeatureGroup {
    /// OHLCV 特征组的默认描述：以 (product_id, timestamp_ms) 为自然键。
    pub fn ohlcv() -> Self {
        Self {
            name: "ohlcv".to_string(),
            version: 1,
            primary_keys: vec!["product_id".to_string(), "timestamp_ms".to_string()],
            event_time_field: "timestamp_ms".to_string(),
        }
    }

    /// 物理表名，形如 `ohlcv_v1`
    pub fn table_name(&self) -> String {
        let safe: String = self
            .name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        format!("{}_v{}", safe, self.version)
    }

    /// # Summary
    /// 计算记录的主键值。
    ///
    /// # Logic
    /// 1. 按 `primary_keys` 顺序取值。
    /// 2. 编码为 JSON 数组文本，如 `["ETH/USD",120000]`，不同的键元组不会得到相同的主键。
    ///
    /// # Returns
    /// 缺失任一主键字段时返回 `SinkError::MissingField`。
    pub fn primary_key_of(&self, record: &FeatureRecord) -> Result<String, SinkError> {
        let mut parts = Vec::with_capacity(self.primary_keys.len());
        for field in &self.primary_keys {
            let value = record
                .get(field)
                .filter(|v| !v.is_null())
                .ok_or_else(|| SinkError::MissingField(field.clone()))?;
            parts.push(value.clone());
        }
        Ok(Value::Array(parts).to_string())
    }

    /// 读取记录的事件时间 (毫秒)
    pub fn event_time_of(&self, record: &FeatureRecord) -> Result<i64, SinkError> {
        record
            .get(&self.event_time_field)
            .and_then(Value::as_i64)
            .ok_or_else(|| SinkError::MissingField(self.event_time_field.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_rejects_nested_values() {
        assert!(FeatureRecord::from_value(json!({"a": 1, "b": "x"})).is_ok());
        assert!(FeatureRecord::from_value(json!({"a": {"b": 1}})).is_err());
        assert!(FeatureRecord::from_value(json!({"a": [1, 2]})).is_err());
        assert!(FeatureRecord::from_value(json!([1, 2])).is_err());
    }

    #[test]
    fn test_candle_record_primary_key() {
        let candle = Candle {
            product_id: "ETH/USD".into(),
            timestamp_ms: 120_000,
            open: 1.0,
            high: 2.0,
            low: 0.5,
            close: 1.5,
            volume: 7.0,
        };
        let record = FeatureRecord::from(&candle);
        let group = FeatureGroup::ohlcv();
        assert_eq!(
            group.primary_key_of(&record).unwrap(),
            r#"["ETH/USD",120000]"#
        );
        assert_eq!(group.event_time_of(&record).unwrap(), 120_000);
        assert_eq!(group.table_name(), "ohlcv_v1");
    }

    #[test]
    fn test_composite_key_values_containing_separators_stay_distinct() {
        let group = FeatureGroup {
            name: "pairs".into(),
            version: 1,
            primary_keys: vec!["a".into(), "b".into()],
            event_time_field: "ts".into(),
        };
        let first = FeatureRecord::from_value(json!({"a": "x|y", "b": "z", "ts": 1})).unwrap();
        let second = FeatureRecord::from_value(json!({"a": "x", "b": "y|z", "ts": 1})).unwrap();
        let quoted = FeatureRecord::from_value(json!({"a": "x\",\"y", "b": "z", "ts": 1})).unwrap();

        let k1 = group.primary_key_of(&first).unwrap();
        let k2 = group.primary_key_of(&second).unwrap();
        let k3 = group.primary_key_of(&quoted).unwrap();
        assert_ne!(k1, k2);
        assert_ne!(k1, k3);
        assert_ne!(k2, k3);
        // 字符串 "1" 与数字 1 也是不同的键
        let text = FeatureRecord::from_value(json!({"a": "1", "b": "z"})).unwrap();
        let number = FeatureRecord::from_value(json!({"a": 1, "b": "z"})).unwrap();
        assert_ne!(
            group.primary_key_of(&text).unwrap(),
            group.primary_key_of(&number).unwrap()
        );
    }

    #[test]
    fn test_missing_primary_key() {
        let record = FeatureRecord::from_value(json!({"product_id": "X"})).unwrap();
        let err = FeatureGroup::ohlcv().primary_key_of(&record).unwrap_err();
        assert_eq!(err, SinkError::MissingField("timestamp_ms".into()));
    }
}
