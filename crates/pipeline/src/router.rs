const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// # Summary
/// 按分区键选择分片。
///
/// # Invariants
/// - 同一个键在任何进程、任何版本中都落到同一个分片 (FNV-1a，不依赖随机种子)。
/// - `shard_count` 为 0 时视为 1。
pub fn shard_for(key: &str, shard_count: usize) -> usize {
    let count = u64::try_from(shard_count.max(1)).unwrap_or(1);
    let hash = key
        .bytes()
        .fold(FNV_OFFSET, |h, b| (h ^ u64::from(b)).wrapping_mul(FNV_PRIME));
    usize::try_from(hash % count).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routing_is_stable_and_in_range() {
        for key in ["BTC/USD", "ETH/USD", "SOL/USD", ""] {
            let shard = shard_for(key, 4);
            assert!(shard < 4);
            assert_eq!(shard, shard_for(key, 4));
        }
        assert_eq!(shard_for("BTC/USD", 1), 0);
        assert_eq!(shard_for("BTC/USD", 0), 0);
    }

    #[test]
    fn test_known_hash_value() {
        // FNV-1a("a") = 0xaf63dc4c8601ec8c
        assert_eq!(shard_for("a", 1 << 16), 0xec8c);
    }
}
