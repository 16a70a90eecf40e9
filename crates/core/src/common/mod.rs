use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub mod time;

/// # Summary
/// 窗口结果的发射模式。
///
/// # Invariants
/// - 两种模式共用同一套折叠逻辑，仅发射时机不同。
/// - 任何模式下，每个窗口的最终 K 线都只发射一次。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EmissionMode {
    // 每次更新后都发射进行中的快照，收盘时再发射最终值
    #[default]
    Current,
    // 仅在窗口关闭时发射一次
    Final,
}

impl EmissionMode {
    /// 是否需要在每次更新后发射快照
    pub fn emits_updates(self) -> bool {
        matches!(self, EmissionMode::Current)
    }
}

impl FromStr for EmissionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "current" => Ok(EmissionMode::Current),
            "final" => Ok(EmissionMode::Final),
            _ => Err(format!("Unknown EmissionMode: {}", s)),
        }
    }
}

impl std::fmt::Display for EmissionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmissionMode::Current => write!(f, "CURRENT"),
            EmissionMode::Final => write!(f, "FINAL"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emission_mode_parse() {
        assert_eq!("current".parse::<EmissionMode>(), Ok(EmissionMode::Current));
        assert_eq!("FINAL".parse::<EmissionMode>(), Ok(EmissionMode::Final));
        assert!("hopping".parse::<EmissionMode>().is_err());
        assert_eq!(EmissionMode::Final.to_string(), "FINAL");
    }

    #[test]
    fn test_emission_mode_serde() {
        let mode: EmissionMode = serde_json::from_str("\"FINAL\"").unwrap();
        assert_eq!(mode, EmissionMode::Final);
        assert!(EmissionMode::Current.emits_updates());
        assert!(!mode.emits_updates());
    }
}
