use std::collections::VecDeque;

/// # Summary
/// 按到达顺序缓存待投递记录的批次累加器。
///
/// # Invariants
/// - `drain` 原子地取走全部记录，不存在部分取出。
/// - `created_at` 为上次清空后第一条记录加入的时间，空批次时为 None。
/// - 单一所有者使用 (`&mut self`)，不做内部同步。
#[derive(Debug)]
pub struct BatchAccumulator<T> {
    // 按到达顺序排列的记录
    records: VecDeque<T>,
    // 当前批次的开始时间
    created_at_ms: Option<i64>,
}

impl<T> Default for BatchAccumulator<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> BatchAccumulator<T> {
    pub fn new() -> Self {
        Self {
            records: VecDeque::new(),
            created_at_ms: None,
        }
    }

    /// # Summary
    /// 追加一条记录。
    ///
    /// # Logic
    /// 1. 追加到队尾。
    /// 2. 若这是清空后的第一条，记录批次开始时间。
    pub fn add(&mut self, record: T, now_ms: i64) {
        if self.records.is_empty() {
            self.created_at_ms = Some(now_ms);
        }
        self.records.push_back(record);
    }

    pub fn size(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn created_at(&self) -> Option<i64> {
        self.created_at_ms
    }

    /// 取走全部记录并清空
    pub fn drain(&mut self) -> Vec<T> {
        self.created_at_ms = None;
        self.records.drain(..).collect()
    }

    /// # Summary
    /// 把投递失败的批次放回队首，排在之后到达的记录之前。
    ///
    /// # Logic
    /// 1. 逆序逐条插入队首，保持原批次内部顺序。
    /// 2. 批次开始时间取失败批次原有的开始时间与当前值中较早者。
    ///
    /// # Arguments
    /// * `records`: 失败的批次。
    /// * `created_at_ms`: 失败批次原先的开始时间。
    pub fn requeue_front(&mut self, records: Vec<T>, created_at_ms: Option<i64>) {
        if records.is_empty() {
            return;
        }
        for record in records.into_iter().rev() {
            self.records.push_front(record);
        }
        self.created_at_ms = match (created_at_ms, self.created_at_ms) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_drain_preserve_order() {
        let mut acc = BatchAccumulator::new();
        assert_eq!(acc.created_at(), None);
        acc.add(1, 10);
        acc.add(2, 20);
        acc.add(3, 30);
        assert_eq!(acc.size(), 3);
        assert_eq!(acc.created_at(), Some(10));

        assert_eq!(acc.drain(), vec![1, 2, 3]);
        assert!(acc.is_empty());
        assert_eq!(acc.created_at(), None);
        assert!(acc.drain().is_empty());
    }

    #[test]
    fn test_requeue_goes_before_newer_records() {
        let mut acc = BatchAccumulator::new();
        acc.add("a", 1);
        acc.add("b", 2);
        let failed = acc.drain();
        acc.add("c", 5);
        acc.requeue_front(failed, Some(1));
        assert_eq!(acc.created_at(), Some(1));
        assert_eq!(acc.drain(), vec!["a", "b", "c"]);
    }
}
