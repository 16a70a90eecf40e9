use candleflow_core::market::entity::Candle;
use candleflow_core::sink::entity::{FeatureGroup, FeatureRecord};
use candleflow_core::sink::error::SinkError;
use candleflow_core::sink::port::FeatureStore;
use candleflow_store::sqlite::SqliteFeatureStore;
use serde_json::json;
use tempfile::tempdir;

fn candle(product_id: &str, timestamp_ms: i64, close: f64) -> FeatureRecord {
    FeatureRecord::from(&Candle {
        product_id: product_id.to_string(),
        timestamp_ms,
        open: 1.0,
        high: close.max(1.0),
        low: close.min(1.0),
        close,
        volume: 2.0,
    })
}

/// # Summary
/// 重复推送同一主键只保留最新值，离线表按需追加完整历史。
#[tokio::test]
async fn test_upsert_is_idempotent_and_offline_appends() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let store = SqliteFeatureStore::open_in(dir.path()).await?;
    let group = FeatureGroup::ohlcv();
    assert!(store.db_path().starts_with(dir.path()));

    let batch = vec![candle("BTC/USD", 60_000, 10.0), candle("ETH/USD", 60_000, 2.0)];
    store.push(&batch, &group, false).await?;
    // 同一批次重放
    store.push(&batch, &group, false).await?;
    // CURRENT 模式下的更新覆盖旧值
    store
        .push(&[candle("BTC/USD", 60_000, 11.0)], &group, true)
        .await?;

    let online = store.load_features(&group).await?;
    assert_eq!(online.len(), 2);
    let btc = online
        .iter()
        .find(|r| r.get("product_id") == Some(&json!("BTC/USD")))
        .ok_or_else(|| anyhow::anyhow!("BTC row missing"))?;
    assert_eq!(btc.get("close"), Some(&json!(11.0)));

    let offline = store.load_offline_features(&group).await?;
    assert_eq!(offline.len(), 1);
    Ok(())
}

/// # Summary
/// 批次中任一记录缺少主键时整批拒绝，已有数据不受影响。
#[tokio::test]
async fn test_missing_primary_key_rejects_whole_batch() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let store = SqliteFeatureStore::open_in(dir.path()).await?;
    let group = FeatureGroup::ohlcv();

    let broken = FeatureRecord::from_value(json!({"product_id": "SOL/USD", "close": 3.0}))
        .map_err(anyhow::Error::msg)?;
    let err = store
        .push(&[candle("SOL/USD", 60_000, 3.0), broken], &group, false)
        .await
        .unwrap_err();
    assert_eq!(err, SinkError::MissingField("timestamp_ms".into()));
    assert!(store.load_features(&group).await?.is_empty());
    Ok(())
}

/// # Summary
/// 不同特征组 (名称或版本不同) 写入不同的表。
#[tokio::test]
async fn test_groups_are_isolated_by_version() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let store = SqliteFeatureStore::open_in(dir.path()).await?;
    let v1 = FeatureGroup::ohlcv();
    let v2 = FeatureGroup {
        version: 2,
        ..FeatureGroup::ohlcv()
    };

    store.push(&[candle("BTC/USD", 60_000, 1.0)], &v1, false).await?;
    store.push(&[candle("BTC/USD", 120_000, 1.0)], &v2, false).await?;
    store.push(&[candle("ETH/USD", 120_000, 1.0)], &v2, false).await?;

    assert_eq!(store.load_features(&v1).await?.len(), 1);
    assert_eq!(store.load_features(&v2).await?.len(), 2);
    Ok(())
}

/// # Summary
/// 主键值中含有分隔符时，不同的键元组仍写入不同的行。
#[tokio::test]
async fn test_composite_keys_with_separator_do_not_overwrite() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let store = SqliteFeatureStore::open_in(dir.path()).await?;
    let group = FeatureGroup {
        name: "pairs".into(),
        version: 1,
        primary_keys: vec!["a".into(), "b".into()],
        event_time_field: "ts".into(),
    };

    let first = FeatureRecord::from_value(json!({"a": "x|y", "b": "z", "ts": 1, "v": 1}))
        .map_err(anyhow::Error::msg)?;
    let second = FeatureRecord::from_value(json!({"a": "x", "b": "y|z", "ts": 1, "v": 2}))
        .map_err(anyhow::Error::msg)?;
    store.push(&[first, second], &group, false).await?;

    let rows = store.load_features(&group).await?;
    assert_eq!(rows.len(), 2);
    Ok(())
}
