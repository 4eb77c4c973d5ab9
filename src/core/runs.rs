//! Attribute run table
//!
//! Per-line records of display-attribute runs overlaid on line store
//! content. The table mirrors the store's retained range: the engine
//! appends, evicts, and rotates both in lockstep, so a line's runs are
//! always addressed by the same absolute index as its text.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use super::attr::{Attribute, AttributeRun};
use crate::engine::EngineError;

/// Runs for every retained line, addressed by absolute line index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunTable {
    runs: VecDeque<Vec<AttributeRun>>,
    /// Absolute index of `runs[0]`; kept equal to the store's base
    base: u64,
}

impl RunTable {
    /// Create a table covering `lines` initial blank lines
    pub fn new(lines: u16) -> Self {
        let mut runs = VecDeque::with_capacity(lines as usize);
        for _ in 0..lines.max(1) {
            runs.push_back(Vec::new());
        }
        Self { runs, base: 0 }
    }

    /// Ordered runs for a line; empty means the engine default applies
    pub fn runs_for_line(&self, index: u64) -> &[AttributeRun] {
        index
            .checked_sub(self.base)
            .and_then(|offset| self.runs.get(offset as usize))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn line_mut(&mut self, index: u64) -> Option<&mut Vec<AttributeRun>> {
        let offset = index.checked_sub(self.base)?;
        self.runs.get_mut(offset as usize)
    }

    /// Append empty run lists for `n` freshly opened lines
    pub fn push_lines(&mut self, n: usize) -> Result<(), EngineError> {
        self.runs.try_reserve(n)?;
        for _ in 0..n {
            self.runs.push_back(Vec::new());
        }
        Ok(())
    }

    /// Drop run lists for `n` evicted lines (oldest first)
    pub fn evict_front(&mut self, n: usize) {
        for _ in 0..n {
            if self.runs.pop_front().is_some() {
                self.base += 1;
            }
        }
    }

    /// Mirror a viewport scroll-down: rows shift toward the bottom of the
    /// window starting at absolute index `top`, the first `n` rows lose
    /// their runs.
    pub fn scroll_down(&mut self, top: u64, height: u16, n: usize) {
        let n = n.min(height as usize);
        for row in (0..height as usize).rev() {
            let dst = top + row as u64;
            if row >= n {
                let src = top + (row - n) as u64;
                let moved = self.line_mut(src).map(std::mem::take).unwrap_or_default();
                if let Some(slot) = self.line_mut(dst) {
                    *slot = moved;
                }
            } else if let Some(slot) = self.line_mut(dst) {
                slot.clear();
            }
        }
    }

    /// The attribute in effect at a 1-based column, given the engine
    /// default for run-less spans
    pub fn attr_at(&self, index: u64, column: u16, default: Attribute) -> Attribute {
        let runs = self.runs_for_line(index);
        let pos = runs.partition_point(|r| r.start_column <= column);
        if pos == 0 {
            default
        } else {
            runs[pos - 1].attr
        }
    }

    /// Record that a character was written at (line, column) with the
    /// active attribute.
    ///
    /// A new run is opened only where the attribute actually changes:
    /// writing with the attribute already in effect extends the covering
    /// run instead of duplicating it, so run count stays bounded by
    /// attribute changes rather than character count.
    pub fn note_write(&mut self, index: u64, column: u16, active: Attribute, default: Attribute) {
        let Some(runs) = self.line_mut(index) else {
            return;
        };
        let pos = runs.partition_point(|r| r.start_column < column);
        let prev = if pos > 0 { runs[pos - 1].attr } else { default };
        let exact = runs.get(pos).map(|r| r.start_column == column).unwrap_or(false);

        if exact {
            if prev == active {
                // the covering attribute already matches; the boundary
                // run at this column is now redundant
                runs.remove(pos);
            } else {
                runs[pos].attr = active;
            }
        } else if prev != active {
            runs.insert(
                pos,
                AttributeRun {
                    start_column: column,
                    attr: active,
                },
            );
        }
    }

    /// Reset columns `from..` of a line to the default attribute
    pub fn clear_from(&mut self, index: u64, from: u16, default: Attribute) {
        let effect = self.attr_at(index, from, default);
        let Some(runs) = self.line_mut(index) else {
            return;
        };
        runs.retain(|r| r.start_column < from);
        if effect != default {
            runs.push(AttributeRun {
                start_column: from,
                attr: default,
            });
        }
    }

    /// Reset columns `..=to` of a line to the default attribute
    pub fn clear_to(&mut self, index: u64, to: u16, default: Attribute) {
        // the attribute the first surviving column used to carry
        let after = self.attr_at(index, to.saturating_add(1), default);
        let Some(runs) = self.line_mut(index) else {
            return;
        };
        runs.retain(|r| r.start_column > to);
        if after != default && runs.first().map(|r| r.start_column > to + 1).unwrap_or(true) {
            runs.insert(
                0,
                AttributeRun {
                    start_column: to + 1,
                    attr: after,
                },
            );
        }
    }

    /// Drop every run on a line
    pub fn clear_line(&mut self, index: u64) {
        if let Some(runs) = self.line_mut(index) {
            runs.clear();
        }
    }
}
