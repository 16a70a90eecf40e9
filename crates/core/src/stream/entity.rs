/// # Summary
/// 从输入流拉取到的一条原始消息，尚未解码。
///
/// # Invariants
/// - `offset` 在同一输入源内单调递增，用于定位问题记录。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceMessage {
    // 消息在输入源中的偏移量
    pub offset: u64,
    // 消息键 (通常为品种代码)，可缺省
    pub key: Option<String>,
    // 原始字节载荷 (JSON)
    pub payload: Vec<u8>,
}

impl SourceMessage {
    /// 以 JSON 文本构造消息，主要用于测试与内存主题。
    pub fn json(offset: u64, key: Option<&str>, payload: &str) -> Self {
        Self {
            offset,
            key: key.map(str::to_string),
            payload: payload.as_bytes().to_vec(),
        }
    }
}
