//! Line store: scrollback plus visible viewport
//!
//! Retained lines live in one deque addressed by a monotonically
//! increasing absolute line index. The viewport is a window over the
//! newest lines; everything above it is scrollback. Once the retained
//! count exceeds the retention bound, the oldest lines are evicted and
//! their indices are never reused.
//!
//! Lines inside the viewport are edited in place; lines above it are only
//! ever read or evicted.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use super::line::Line;
use crate::engine::EngineError;

/// Bounded store of terminal lines addressed by absolute index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineStore {
    lines: VecDeque<Line>,
    /// Absolute index of `lines[0]`
    base: u64,
    /// Absolute index of the viewport's top line
    top: u64,
    width: u16,
    height: u16,
    /// Maximum retained lines (scrollback + viewport)
    retention: usize,
}

impl LineStore {
    /// Create a store with a blank viewport of `height` lines.
    ///
    /// The retention bound is clamped so the viewport itself always fits.
    pub fn new(width: u16, height: u16, retention: usize) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        let mut lines = VecDeque::with_capacity(height as usize);
        for _ in 0..height {
            lines.push_back(Line::new());
        }
        Self {
            lines,
            base: 0,
            top: 0,
            width,
            height,
            retention: retention.max(height as usize),
        }
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    /// Absolute index of the oldest retained line
    pub fn base_index(&self) -> u64 {
        self.base
    }

    /// Absolute index of the viewport's top line
    pub fn top_index(&self) -> u64 {
        self.top
    }

    /// Absolute index of the newest committed line (viewport bottom)
    pub fn last_index(&self) -> u64 {
        self.base + self.lines.len() as u64 - 1
    }

    /// Number of retained lines
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Absolute index of the line at a 1-based viewport row
    pub fn index_of_row(&self, row: u16) -> u64 {
        self.top + u64::from(row.min(self.height).max(1) - 1)
    }

    /// Read access to a line by absolute index
    pub fn line_at(&self, index: u64) -> Option<&Line> {
        let offset = index.checked_sub(self.base)?;
        self.lines.get(offset as usize)
    }

    fn line_mut(&mut self, index: u64) -> Option<&mut Line> {
        let offset = index.checked_sub(self.base)?;
        self.lines.get_mut(offset as usize)
    }

    /// Write a character at (absolute line, 1-based column).
    ///
    /// Writes to evicted lines or past the width are silent no-ops;
    /// far-scrolled-back data is never resurrected. Returns whether the
    /// write landed.
    pub fn write(&mut self, index: u64, column: u16, c: char) -> bool {
        if column == 0 || column > self.width {
            return false;
        }
        match self.line_mut(index) {
            Some(line) => {
                line.write(usize::from(column - 1), c);
                true
            }
            None => false,
        }
    }

    /// Commit the top viewport line(s) to scrollback and open `n` blank
    /// lines at the bottom. Returns the number of lines evicted from the
    /// front so the caller can keep parallel tables in lockstep.
    pub fn scroll_up(&mut self, n: usize) -> Result<usize, EngineError> {
        self.lines.try_reserve(n)?;
        for _ in 0..n {
            self.lines.push_back(Line::new());
        }
        self.top += n as u64;

        let mut evicted = 0;
        while self.lines.len() > self.retention {
            self.lines.pop_front();
            self.base += 1;
            evicted += 1;
        }
        Ok(evicted)
    }

    /// Shift viewport content down by `n` rows; the top `n` rows become
    /// blank and the bottom `n` rows fall off. Absolute indices are not
    /// renumbered: this edits viewport lines in place.
    pub fn scroll_down(&mut self, n: usize) {
        let n = n.min(self.height as usize);
        for row in (0..self.height as usize).rev() {
            let dst = self.top + row as u64;
            if row >= n {
                let src = self.top + (row - n) as u64;
                if let Some(line) = self.line_at(src).cloned() {
                    if let Some(slot) = self.line_mut(dst) {
                        *slot = line;
                    }
                }
            } else if let Some(slot) = self.line_mut(dst) {
                slot.clear();
            }
        }
    }

    /// Blank a line region without touching absolute indices.
    /// `from`/`to` are 1-based columns.
    pub fn clear_line_from(&mut self, index: u64, from: u16) {
        if let Some(line) = self.line_mut(index) {
            line.clear_from(usize::from(from.max(1) - 1));
        }
    }

    pub fn clear_line_to(&mut self, index: u64, to: u16) {
        if let Some(line) = self.line_mut(index) {
            line.clear_to(usize::from(to.max(1) - 1));
        }
    }

    pub fn clear_line(&mut self, index: u64) {
        if let Some(line) = self.line_mut(index) {
            line.clear();
        }
    }

    /// Reclip the viewport to new dimensions. Stored lines are neither
    /// destroyed nor truncated; the window is re-anchored so its bottom
    /// row stays on the newest committed line, clamping to the earliest
    /// retained line while content is shorter than one viewport.
    pub fn resize(&mut self, width: u16, height: u16) -> Result<(), EngineError> {
        self.width = width.max(1);
        self.height = height.max(1);
        self.retention = self.retention.max(self.height as usize);

        let needed = self.height as usize;
        if self.lines.len() < needed {
            let missing = needed - self.lines.len();
            self.lines.try_reserve(missing)?;
            for _ in 0..missing {
                self.lines.push_back(Line::new());
            }
        }
        self.top = self.last_index() + 1 - self.height as u64;
        Ok(())
    }
}
