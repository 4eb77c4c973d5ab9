//! Deterministic snapshot generation
//!
//! An owned, serializable capture of the visible screen. Given the same
//! byte stream, the engine must produce identical snapshots; tests and
//! the headless runner rely on this.

use serde::{Deserialize, Serialize};

use super::attr::{Attribute, AttributeRun};
use super::cursor::ModeFlags;
use crate::engine::ScreenView;

/// One visible row: its text plus the attribute runs overlaying it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowSnapshot {
    pub text: String,
    pub runs: Vec<AttributeRun>,
}

/// Cursor state as seen by the renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorSnapshot {
    /// 1-based column
    pub column: u16,
    /// 1-based viewport line
    pub line: u16,
    pub visible: bool,
}

/// A complete snapshot of the visible terminal state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub columns: u16,
    pub lines: u16,
    /// Absolute index of the viewport's top line
    pub top_index: u64,
    /// Visible rows, top to bottom
    pub rows: Vec<RowSnapshot>,
    pub cursor: CursorSnapshot,
    pub title: String,
    pub modes: ModeFlags,
    pub default_attribute: Attribute,
}

impl Snapshot {
    /// Capture the screen from a scoped view
    pub fn from_view(view: &ScreenView<'_>) -> Self {
        let lines = view.lines();
        let mut rows = Vec::with_capacity(usize::from(lines));
        for row in 1..=lines {
            rows.push(RowSnapshot {
                text: view.row_text(row),
                runs: view.row_runs(row).to_vec(),
            });
        }
        let (column, line, visible) = view.cursor();
        Self {
            columns: view.columns(),
            lines,
            top_index: view.top_index(),
            rows,
            cursor: CursorSnapshot {
                column,
                line,
                visible,
            },
            title: view.title().to_string(),
            modes: view.modes(),
            default_attribute: view.default_attribute(),
        }
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Parse a snapshot from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Plain-text rendering of the screen for debugging and golden tests
    pub fn to_text(&self) -> String {
        let mut result = String::new();
        for row in &self.rows {
            result.push_str(row.text.trim_end());
            result.push('\n');
        }
        while result.ends_with("\n\n") {
            result.pop();
        }
        result
    }
}
