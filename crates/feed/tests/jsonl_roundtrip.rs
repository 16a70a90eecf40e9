use candleflow_core::market::entity::Candle;
use candleflow_core::stream::error::StreamError;
use candleflow_core::stream::port::{CandlePublisher, StreamSource};
use candleflow_feed::decode::decode_trade;
use candleflow_feed::jsonl::JsonLinesSource;
use candleflow_feed::publisher::{BroadcastCandlePublisher, JsonLinesCandlePublisher, forward};
use std::sync::Arc;
use std::time::Duration;

/// # Summary
/// 从文件读取成交：合法行被解码，坏行只影响自身，EOF 后返回 Closed。
#[tokio::test]
async fn test_trade_file_decode_skips_bad_lines() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("trades.jsonl");
    std::fs::write(
        &path,
        concat!(
            r#"{"product_id":"BTC/USD","price":10.0,"quantity":1.0,"timestamp_ms":1000}"#,
            "\n",
            "garbage\n",
            r#"{"product_id":"BTC/USD","price":12.0,"quantity":2.0,"timestamp_ms":30000}"#,
            "\n",
        ),
    )?;

    let mut source = JsonLinesSource::open(&path).await?;
    let mut trades = Vec::new();
    let mut bad_offsets = Vec::new();
    loop {
        match source.poll(Duration::from_secs(1)).await {
            Ok(Some(msg)) => match decode_trade(&msg) {
                Ok(trade) => trades.push(trade),
                Err(_) => bad_offsets.push(msg.offset),
            },
            Ok(None) => continue,
            Err(StreamError::Closed) => break,
            Err(e) => return Err(e.into()),
        }
    }

    assert_eq!(trades.len(), 2);
    assert_eq!(trades[1].timestamp_ms, 30_000);
    assert_eq!(bad_offsets, vec![1]);
    Ok(())
}

/// # Summary
/// K 线按行追加写入文件，每行都能反序列化回同一根 K 线。
#[tokio::test]
async fn test_candle_file_publisher_appends_lines() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("candles.jsonl");
    let publisher = JsonLinesCandlePublisher::append_to(&path).await?;

    let candle = Candle {
        product_id: "ETH/USD".into(),
        timestamp_ms: 120_000,
        open: 2.0,
        high: 3.0,
        low: 1.0,
        close: 2.5,
        volume: 7.0,
    };
    publisher.publish(&candle).await?;
    publisher.publish(&candle).await?;

    let written = std::fs::read_to_string(&path)?;
    let lines: Vec<&str> = written.lines().collect();
    assert_eq!(lines.len(), 2);
    let parsed: Candle = serde_json::from_str(lines[0])?;
    assert_eq!(parsed, candle);
    Ok(())
}

/// # Summary
/// 广播主题经转发任务写入 JSON-lines 文件，发布端全部丢弃后任务结束。
#[tokio::test]
async fn test_broadcast_topic_forwards_to_file() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("candles.jsonl");
    let topic = BroadcastCandlePublisher::new(16);
    let writer = Arc::new(JsonLinesCandlePublisher::append_to(&path).await?);
    let handle = forward(topic.subscribe(), writer);

    for (i, close) in [1.0, 2.0, 3.0].into_iter().enumerate() {
        let end = 60_000 * (i64::try_from(i)? + 1);
        topic
            .publish(&Candle {
                product_id: "ETH/USD".into(),
                timestamp_ms: end,
                open: 1.0,
                high: 3.0,
                low: 1.0,
                close,
                volume: 1.0,
            })
            .await?;
    }
    drop(topic);

    assert_eq!(handle.await?, 3);
    let content = std::fs::read_to_string(&path)?;
    let closes: Vec<f64> = content
        .lines()
        .map(|l| serde_json::from_str::<Candle>(l).map(|c| c.close))
        .collect::<Result<_, _>>()?;
    assert_eq!(closes, vec![1.0, 2.0, 3.0]);
    Ok(())
}
