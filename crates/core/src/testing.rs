//! 测试替身：内存特征存储、脚本化输入源、记录型通知器与发布器。
//! 仅在 `test-utils` feature 下编译，供各 crate 的测试复用。

use crate::market::entity::Candle;
use crate::notify::error::NotifyError;
use crate::notify::port::Notifier;
use crate::sink::entity::{FeatureGroup, FeatureRecord};
use crate::sink::error::SinkError;
use crate::sink::port::{FeatureStore, RecordSink};
use crate::stream::entity::SourceMessage;
use crate::stream::error::StreamError;
use crate::stream::port::{CandlePublisher, StreamSource};
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// # Summary
/// 基于 DashMap 的内存特征存储，按 `(表名, 主键)` upsert。
///
/// # Invariants
/// - `fail_next` 设定的次数内，每次 `push` 都返回失败且不写入任何记录。
#[derive(Default)]
pub struct MemFeatureStore {
    rows: DashMap<(String, String), FeatureRecord>,
    pushes: Mutex<Vec<usize>>,
    failures_left: AtomicUsize,
}

impl MemFeatureStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 让接下来的 `n` 次推送失败
    pub fn fail_next(&self, n: usize) {
        self.failures_left.store(n, Ordering::SeqCst);
    }

    /// 每次成功推送的批次大小
    pub fn push_sizes(&self) -> Vec<usize> {
        self.pushes.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// 去重后的行数
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn get(&self, table: &str, primary_key: &str) -> Option<FeatureRecord> {
        self.rows
            .get(&(table.to_string(), primary_key.to_string()))
            .map(|r| r.value().clone())
    }
}

#[async_trait]
impl FeatureStore for MemFeatureStore {
    async fn push(
        &self,
        records: &[FeatureRecord],
        target: &FeatureGroup,
        _start_offline_materialization: bool,
    ) -> Result<(), SinkError> {
        let left = self.failures_left.load(Ordering::SeqCst);
        if left > 0 {
            self.failures_left.store(left - 1, Ordering::SeqCst);
            return Err(SinkError::Write("injected failure".into()));
        }
        let table = target.table_name();
        let mut keyed = Vec::with_capacity(records.len());
        for record in records {
            keyed.push((target.primary_key_of(record)?, record.clone()));
        }
        for (pk, record) in keyed {
            self.rows.insert((table.clone(), pk), record);
        }
        self.pushes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(records.len());
        Ok(())
    }
}

/// # Summary
/// 记录每次写入批次的 `RecordSink`，可注入失败。
#[derive(Default)]
pub struct RecordingSink {
    batches: Mutex<Vec<Vec<FeatureRecord>>>,
    failures_left: AtomicUsize,
    attempts: AtomicUsize,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// 让接下来的 `n` 次写入失败
    pub fn fail_next(&self, n: usize) {
        self.failures_left.store(n, Ordering::SeqCst);
    }

    /// 成功写入的批次
    pub fn batches(&self) -> Vec<Vec<FeatureRecord>> {
        self.batches.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// 写入调用总次数 (含失败)
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecordSink for RecordingSink {
    async fn write(&self, records: &[FeatureRecord]) -> Result<(), SinkError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let left = self.failures_left.load(Ordering::SeqCst);
        if left > 0 {
            self.failures_left.store(left - 1, Ordering::SeqCst);
            return Err(SinkError::Write("injected failure".into()));
        }
        self.batches
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(records.to_vec());
        Ok(())
    }
}

/// 脚本化输入源的单步动作
#[derive(Debug, Clone)]
pub enum ScriptStep {
    Message(SourceMessage),
    Timeout,
    TransportError(String),
}

/// # Summary
/// 按脚本依次返回消息、超时或传输错误的输入源，脚本耗尽后返回 `Closed`。
pub struct ScriptedSource {
    steps: VecDeque<ScriptStep>,
}

impl ScriptedSource {
    pub fn new(steps: Vec<ScriptStep>) -> Self {
        Self {
            steps: steps.into(),
        }
    }

    /// 由 JSON 文本序列构造，偏移量从 0 开始递增
    pub fn from_json_lines(lines: &[&str]) -> Self {
        let steps = lines
            .iter()
            .zip(0u64..)
            .map(|(line, offset)| ScriptStep::Message(SourceMessage::json(offset, None, line)))
            .collect();
        Self::new(steps)
    }
}

#[async_trait]
impl StreamSource for ScriptedSource {
    async fn poll(&mut self, _timeout: Duration) -> Result<Option<SourceMessage>, StreamError> {
        match self.steps.pop_front() {
            Some(ScriptStep::Message(msg)) => Ok(Some(msg)),
            Some(ScriptStep::Timeout) => Ok(None),
            Some(ScriptStep::TransportError(reason)) => Err(StreamError::Transport(reason)),
            None => Err(StreamError::Closed),
        }
    }
}

/// 记录所有告警的通知器
#[derive(Default)]
pub struct RecordingNotifier {
    alerts: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alerts(&self) -> Vec<(String, String)> {
        self.alerts.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, subject: &str, content: &str) -> Result<(), NotifyError> {
        self.alerts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((subject.to_string(), content.to_string()));
        Ok(())
    }
}

/// 收集所有发布 K 线的发布器
#[derive(Default)]
pub struct RecordingPublisher {
    candles: Mutex<Vec<Candle>>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn candles(&self) -> Vec<Candle> {
        self.candles.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl CandlePublisher for RecordingPublisher {
    async fn publish(&self, candle: &Candle) -> Result<(), StreamError> {
        self.candles
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(candle.clone());
        Ok(())
    }
}
