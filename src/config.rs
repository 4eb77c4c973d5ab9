//! Engine configuration
//!
//! Construction-time parameters for a terminal session. Loading these
//! from disk (and everything else about application startup) belongs to
//! the embedder; the engine only consumes the values.

use serde::{Deserialize, Serialize};

use crate::core::Attribute;

/// Configuration for a [`TerminalEngine`](crate::TerminalEngine)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Viewport width in columns
    pub columns: u16,
    /// Viewport height in lines
    pub lines: u16,
    /// Maximum retained lines, scrollback and viewport together.
    /// Clamped up to the viewport height.
    pub scrollback_lines: usize,
    /// Attribute used wherever no run applies
    pub default_attribute: Attribute,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            columns: 80,
            lines: 24,
            scrollback_lines: 1000,
            default_attribute: Attribute::default(),
        }
    }
}

impl EngineConfig {
    /// Configuration with explicit dimensions and default retention
    pub fn with_size(columns: u16, lines: u16) -> Self {
        Self {
            columns,
            lines,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = EngineConfig::default();
        assert_eq!(config.columns, 80);
        assert_eq!(config.lines, 24);
        assert_eq!(config.scrollback_lines, 1000);
    }

    #[test]
    fn test_config_json_roundtrip() {
        let config = EngineConfig::with_size(120, 40);
        let json = serde_json::to_string(&config).unwrap();
        let restored: EngineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, restored);
    }
}
