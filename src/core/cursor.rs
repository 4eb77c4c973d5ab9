//! Cursor state and terminal mode flags
//!
//! The cursor tracks position and visibility, with a saved slot for
//! DECSC/DECRC-style save/restore. Coordinates are 1-based and always
//! clamped inside the viewport; the tracker never moves the cursor out of
//! range. Autowrap overflow is sequenced by the engine, not here.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use super::attr::Attribute;

bitflags! {
    /// Independent boolean terminal modes.
    ///
    /// Set and cleared by the decoder; read by the engine and, at session
    /// start-up, by the session layer to establish initial behavior.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct ModeFlags: u8 {
        /// Wrap to the next line when printing past the right edge (DECAWM)
        const AUTO_WRAP = 1 << 0;
        /// Line feed implies carriage return (LNM)
        const NEWLINE = 1 << 1;
        /// Cursor keys send application sequences (DECCKM); read by the
        /// session layer's input mapping
        const APPLICATION_CURSOR = 1 << 2;
    }
}

impl Default for ModeFlags {
    fn default() -> Self {
        ModeFlags::AUTO_WRAP
    }
}

/// Cursor position saved by DECSC / CSI s
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedCursor {
    pub column: u16,
    pub line: u16,
    pub attr: Attribute,
}

/// Cursor state: 1-based position within the viewport plus visibility
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    pub column: u16,
    pub line: u16,
    pub visible: bool,
    saved: Option<SavedCursor>,
}

impl Default for Cursor {
    fn default() -> Self {
        Self {
            column: 1,
            line: 1,
            visible: true,
            saved: None,
        }
    }
}

impl Cursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move to an absolute position, clamped into [1,width]×[1,height]
    pub fn move_to(&mut self, column: u16, line: u16, width: u16, height: u16) {
        self.column = column.clamp(1, width.max(1));
        self.line = line.clamp(1, height.max(1));
    }

    /// Move by a delta, clamped into the viewport
    pub fn move_by(&mut self, dx: i32, dy: i32, width: u16, height: u16) {
        let column = (i32::from(self.column) + dx).clamp(1, i32::from(width.max(1)));
        let line = (i32::from(self.line) + dy).clamp(1, i32::from(height.max(1)));
        self.column = column as u16;
        self.line = line as u16;
    }

    /// Re-clamp after a viewport resize
    pub fn clamp(&mut self, width: u16, height: u16) {
        self.column = self.column.clamp(1, width.max(1));
        self.line = self.line.clamp(1, height.max(1));
    }

    pub fn carriage_return(&mut self) {
        self.column = 1;
    }

    /// Record position and the given active attribute for later restore
    pub fn save(&mut self, attr: Attribute) {
        self.saved = Some(SavedCursor {
            column: self.column,
            line: self.line,
            attr,
        });
    }

    /// Restore a previously saved position; returns the saved attribute
    /// so the engine can reinstate it. Without a prior save this homes
    /// the cursor.
    pub fn restore(&mut self, width: u16, height: u16) -> Option<Attribute> {
        match self.saved {
            Some(saved) => {
                self.move_to(saved.column, saved.line, width, height);
                Some(saved.attr)
            }
            None => {
                self.move_to(1, 1, width, height);
                None
            }
        }
    }

    /// Reset to the home position, dropping saved state
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
