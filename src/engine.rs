//! Terminal state engine
//!
//! The façade coordinating the line store, attribute run table, and
//! cursor tracker under one mutual-exclusion discipline. Two threads
//! interact with it: the session layer's reader thread feeds bytes
//! through [`TerminalEngine::insert`], and the render thread reads a
//! consistent snapshot through [`TerminalEngine::with_snapshot`]. Both
//! serialize on a single coarse lock; a printed character touches all
//! three stores in one logical edit, so finer locking would only buy
//! multi-lock ordering problems.
//!
//! Neither path blocks on I/O while holding the lock: `insert` decodes
//! and applies in memory, and the snapshot closure is expected to copy
//! what it needs and return before any slow rendering work.

use std::collections::TryReserveError;
use std::sync::{Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tracing::trace;
use unicode_width::UnicodeWidthChar;

use crate::config::EngineConfig;
use crate::core::{
    Attribute, AttributeRun, Cursor, Line, LineStore, ModeFlags, RunTable, Snapshot,
};
use crate::parser::{ClearKind, Decoder, EditOp, GraphicsOp};

/// Failures reported by the engine.
///
/// Malformed sequences, out-of-range coordinates, and scrollback
/// eviction are all handled internally and are not errors; the only
/// reportable failure is an allocation failure while growing the screen
/// buffers. Operations applied before the failure point stand, and the
/// engine remains usable afterward.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to grow screen buffers: {0}")]
    OutOfMemory(#[from] TryReserveError),
}

/// Everything the lock guards
#[derive(Debug)]
struct EngineState {
    store: LineStore,
    runs: RunTable,
    cursor: Cursor,
    modes: ModeFlags,
    /// Attribute applied to subsequently printed characters
    active: Attribute,
    default_attr: Attribute,
    decoder: Decoder,
    title: String,
    changed: bool,
}

/// The terminal state engine.
///
/// Owned by the session object; shared between the reader and render
/// threads by reference (typically inside an `Arc`). All public methods
/// take `&self` and serialize internally.
#[derive(Debug)]
pub struct TerminalEngine {
    state: Mutex<EngineState>,
}

/// Scoped read access to the screen for the renderer.
///
/// Borrowed from the engine inside [`TerminalEngine::with_snapshot`];
/// the borrow cannot outlive the closure, so no reference escapes the
/// lock's scope.
pub struct ScreenView<'a> {
    state: &'a EngineState,
}

impl<'a> ScreenView<'a> {
    pub fn columns(&self) -> u16 {
        self.state.store.width()
    }

    pub fn lines(&self) -> u16 {
        self.state.store.height()
    }

    /// Cursor position (1-based) and visibility
    pub fn cursor(&self) -> (u16, u16, bool) {
        let c = &self.state.cursor;
        (c.column, c.line, c.visible)
    }

    /// Absolute index of the viewport's top line
    pub fn top_index(&self) -> u64 {
        self.state.store.top_index()
    }

    /// Absolute index of the oldest retained scrollback line
    pub fn base_index(&self) -> u64 {
        self.state.store.base_index()
    }

    /// Text of a 1-based viewport row, padded to the viewport width
    pub fn row_text(&self, row: u16) -> String {
        let index = self.state.store.index_of_row(row);
        self.state
            .store
            .line_at(index)
            .map(|line| line.text(usize::from(self.state.store.width())))
            .unwrap_or_else(|| " ".repeat(usize::from(self.state.store.width())))
    }

    /// Attribute runs of a 1-based viewport row
    pub fn row_runs(&self, row: u16) -> &[AttributeRun] {
        self.state
            .runs
            .runs_for_line(self.state.store.index_of_row(row))
    }

    /// Read a retained line (scrollback included) by absolute index
    pub fn line_at(&self, index: u64) -> Option<&Line> {
        self.state.store.line_at(index)
    }

    /// Runs for a retained line by absolute index
    pub fn runs_for_line(&self, index: u64) -> &[AttributeRun] {
        self.state.runs.runs_for_line(index)
    }

    pub fn title(&self) -> &str {
        &self.state.title
    }

    pub fn modes(&self) -> ModeFlags {
        self.state.modes
    }

    pub fn default_attribute(&self) -> Attribute {
        self.state.default_attr
    }
}

impl TerminalEngine {
    /// Create an engine with a blank viewport
    pub fn new(config: EngineConfig) -> Self {
        let columns = config.columns.max(1);
        let lines = config.lines.max(1);
        Self {
            state: Mutex::new(EngineState {
                store: LineStore::new(columns, lines, config.scrollback_lines),
                runs: RunTable::new(lines),
                cursor: Cursor::new(),
                modes: ModeFlags::default(),
                active: config.default_attribute,
                default_attr: config.default_attribute,
                decoder: Decoder::new(),
                title: String::new(),
                changed: true,
            }),
        }
    }

    /// Acquire the state lock. A poisoned lock means the peer thread
    /// panicked mid-read; every mutation completes under the lock, so the
    /// state itself is still consistent and we keep serving.
    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Feed raw pseudo-terminal bytes into the engine.
    ///
    /// The whole batch is decoded and applied under one lock
    /// acquisition, in byte order. On allocation failure the operations
    /// applied so far stand and the engine stays usable.
    pub fn insert(&self, bytes: &[u8]) -> Result<(), EngineError> {
        let mut state = self.lock();
        let ops = state.decoder.feed(bytes);
        trace!(bytes = bytes.len(), ops = ops.len(), "applying decoded batch");
        for op in ops {
            state.apply(op)?;
        }
        Ok(())
    }

    /// Run `f` with scoped read access to the screen.
    ///
    /// The lock is held for exactly the duration of the closure: copy out
    /// what the frame needs and return before any slow backend work.
    pub fn with_snapshot<R>(&self, f: impl FnOnce(&ScreenView<'_>) -> R) -> R {
        let state = self.lock();
        f(&ScreenView { state: &state })
    }

    /// Capture an owned, serializable snapshot of the visible screen
    pub fn snapshot(&self) -> Snapshot {
        self.with_snapshot(Snapshot::from_view)
    }

    /// Reflow the viewport to new dimensions.
    ///
    /// Existing lines are neither destroyed nor corrupted; the viewport
    /// reclips around the newest content and the cursor is clamped back
    /// into range. Non-positive dimensions are clamped to 1.
    pub fn resize(&self, columns: u16, lines: u16) -> Result<(), EngineError> {
        let mut state = self.lock();
        let before = state.store.len();
        state.store.resize(columns.max(1), lines.max(1))?;
        let grown = state.store.len() - before;
        state.runs.push_lines(grown)?;
        let (w, h) = (state.store.width(), state.store.height());
        state.cursor.clamp(w, h);
        state.changed = true;
        Ok(())
    }

    /// Replace the attribute used where no run applies
    pub fn set_default_attribute(&self, attr: Attribute) {
        let mut state = self.lock();
        state.default_attr = attr;
        state.active = attr;
        state.changed = true;
    }

    /// Enable mode flags, e.g. autowrap at session start-up
    pub fn add_mode_flags(&self, flags: ModeFlags) {
        let mut state = self.lock();
        state.modes.insert(flags);
    }

    /// Disable mode flags
    pub fn remove_mode_flags(&self, flags: ModeFlags) {
        let mut state = self.lock();
        state.modes.remove(flags);
    }

    /// Current mode flags
    pub fn mode_flags(&self) -> ModeFlags {
        self.lock().modes
    }

    /// Cursor position, 1-based (column, line)
    pub fn cursor_position(&self) -> (u16, u16) {
        let state = self.lock();
        (state.cursor.column, state.cursor.line)
    }

    /// Absolute index of the viewport's top line
    pub fn viewport_top_index(&self) -> u64 {
        self.lock().store.top_index()
    }

    /// Window title set by the child process, if any
    pub fn title(&self) -> String {
        self.lock().title.clone()
    }

    /// Observe and clear the content-changed flag. The renderer polls
    /// this to skip frames where nothing happened.
    pub fn take_content_changed(&self) -> bool {
        let mut state = self.lock();
        std::mem::take(&mut state.changed)
    }
}

impl EngineState {
    fn apply(&mut self, op: EditOp) -> Result<(), EngineError> {
        match op {
            EditOp::Print(c) => self.print_char(c)?,
            EditOp::LineFeed => {
                self.line_feed()?;
                if self.modes.contains(ModeFlags::NEWLINE) {
                    self.cursor.carriage_return();
                }
            }
            EditOp::CarriageReturn => self.cursor.carriage_return(),
            EditOp::Backspace => {
                let (w, h) = self.dims();
                self.cursor.move_by(-1, 0, w, h);
            }
            EditOp::Tab => {
                let width = self.store.width();
                let next = ((self.cursor.column - 1) / 8 + 1) * 8 + 1;
                self.cursor.column = next.min(width);
            }
            EditOp::ReverseLineFeed => {
                if self.cursor.line == 1 {
                    self.scroll_down(1);
                } else {
                    self.cursor.line -= 1;
                }
            }
            EditOp::MoveBy { dx, dy } => {
                let (w, h) = self.dims();
                self.cursor.move_by(dx, dy, w, h);
            }
            EditOp::MoveTo { column, line } => {
                let (w, h) = self.dims();
                let column = column.unwrap_or(self.cursor.column);
                let line = line.unwrap_or(self.cursor.line);
                self.cursor.move_to(column, line, w, h);
            }
            EditOp::ClearScreen(kind) => self.clear_screen(kind),
            EditOp::ClearLine(kind) => self.clear_line(kind),
            EditOp::SetGraphics(ops) => {
                for op in ops {
                    self.apply_graphics(op);
                }
            }
            EditOp::SetMode { flag, on } => {
                if on {
                    self.modes.insert(flag);
                } else {
                    self.modes.remove(flag);
                }
            }
            EditOp::SetCursorVisible(visible) => self.cursor.visible = visible,
            EditOp::Scroll(n) => {
                if n >= 0 {
                    self.scroll_up(n as usize)?;
                } else {
                    self.scroll_down(n.unsigned_abs() as usize);
                }
            }
            EditOp::SaveCursor => {
                let attr = self.active;
                self.cursor.save(attr);
            }
            EditOp::RestoreCursor => {
                let (w, h) = self.dims();
                if let Some(attr) = self.cursor.restore(w, h) {
                    self.active = attr;
                }
            }
            EditOp::SetTitle(title) => self.title = title,
            EditOp::FullReset => self.full_reset(),
        }
        self.changed = true;
        Ok(())
    }

    fn dims(&self) -> (u16, u16) {
        (self.store.width(), self.store.height())
    }

    fn print_char(&mut self, c: char) -> Result<(), EngineError> {
        let char_width = UnicodeWidthChar::width(c).unwrap_or(0) as u16;
        if char_width == 0 {
            // combining marks and other zero-width input occupy no cell
            return Ok(());
        }
        let width = self.store.width();

        // a wide character that no longer fits wraps (or clamps) first
        if self.cursor.column + char_width - 1 > width {
            if self.modes.contains(ModeFlags::AUTO_WRAP) {
                self.cursor.carriage_return();
                self.line_feed()?;
            } else {
                self.cursor.column = width.saturating_sub(char_width - 1).max(1);
            }
        }

        let index = self.store.index_of_row(self.cursor.line);
        let column = self.cursor.column;
        self.store.write(index, column, c);
        self.runs.note_write(index, column, self.active, self.default_attr);
        if char_width == 2 && column < width {
            // blank the cell shadowed by the wide character
            self.store.write(index, column + 1, ' ');
            self.runs
                .note_write(index, column + 1, self.active, self.default_attr);
        }

        let next = column + char_width;
        if next > width {
            if self.modes.contains(ModeFlags::AUTO_WRAP) {
                self.cursor.carriage_return();
                self.line_feed()?;
            } else {
                self.cursor.column = width;
            }
        } else {
            self.cursor.column = next;
        }
        Ok(())
    }

    /// Move down one line, committing the top line to scrollback when the
    /// cursor is already on the bottom row
    fn line_feed(&mut self) -> Result<(), EngineError> {
        if self.cursor.line >= self.store.height() {
            self.scroll_up(1)?;
        } else {
            self.cursor.line += 1;
        }
        Ok(())
    }

    /// Open `n` blank lines at the bottom, advancing the viewport and
    /// evicting past the retention bound. The run table mirrors every
    /// step so text and attributes stay addressed by the same indices.
    fn scroll_up(&mut self, n: usize) -> Result<(), EngineError> {
        if n == 0 {
            return Ok(());
        }
        let evicted = self.store.scroll_up(n)?;
        self.runs.push_lines(n)?;
        self.runs.evict_front(evicted);
        Ok(())
    }

    fn scroll_down(&mut self, n: usize) {
        if n == 0 {
            return;
        }
        self.store.scroll_down(n);
        let top = self.store.top_index();
        let height = self.store.height();
        self.runs.scroll_down(top, height, n);
    }

    fn clear_screen(&mut self, kind: ClearKind) {
        let height = self.store.height();
        let cursor_line = self.cursor.line;
        match kind {
            ClearKind::All => {
                for row in 1..=height {
                    self.blank_row(row);
                }
            }
            ClearKind::ToEnd => {
                self.clear_line(ClearKind::ToEnd);
                for row in cursor_line + 1..=height {
                    self.blank_row(row);
                }
            }
            ClearKind::ToStart => {
                for row in 1..cursor_line {
                    self.blank_row(row);
                }
                self.clear_line(ClearKind::ToStart);
            }
        }
    }

    fn blank_row(&mut self, row: u16) {
        let index = self.store.index_of_row(row);
        self.store.clear_line(index);
        self.runs.clear_line(index);
    }

    fn clear_line(&mut self, kind: ClearKind) {
        let index = self.store.index_of_row(self.cursor.line);
        let column = self.cursor.column;
        match kind {
            ClearKind::All => {
                self.store.clear_line(index);
                self.runs.clear_line(index);
            }
            ClearKind::ToEnd => {
                self.store.clear_line_from(index, column);
                self.runs.clear_from(index, column, self.default_attr);
            }
            ClearKind::ToStart => {
                self.store.clear_line_to(index, column);
                self.runs.clear_to(index, column, self.default_attr);
            }
        }
    }

    fn apply_graphics(&mut self, op: GraphicsOp) {
        match op {
            GraphicsOp::Reset => self.active = self.default_attr,
            GraphicsOp::Set(mode) => self.active.mode.insert(mode),
            GraphicsOp::Clear(mode) => self.active.mode.remove(mode),
            GraphicsOp::Foreground(color) => self.active.fg = color,
            GraphicsOp::Background(color) => self.active.bg = color,
        }
    }

    fn full_reset(&mut self) {
        for row in 1..=self.store.height() {
            self.blank_row(row);
        }
        self.cursor.reset();
        self.modes = ModeFlags::default();
        self.active = self.default_attr;
        self.decoder.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Color;

    fn engine(columns: u16, lines: u16) -> TerminalEngine {
        TerminalEngine::new(EngineConfig::with_size(columns, lines))
    }

    #[test]
    fn test_engine_print() {
        let term = engine(80, 24);
        term.insert(b"Hello, World!").unwrap();
        term.with_snapshot(|view| {
            assert!(view.row_text(1).starts_with("Hello, World!"));
            assert_eq!(view.cursor(), (14, 1, true));
        });
    }

    #[test]
    fn test_engine_autowrap_on() {
        let term = engine(10, 4);
        term.insert(b"ABCDEFGHIJKL").unwrap();
        term.with_snapshot(|view| {
            assert_eq!(view.row_text(1).trim_end(), "ABCDEFGHIJ");
            assert_eq!(view.row_text(2).trim_end(), "KL");
            assert_eq!(view.cursor(), (3, 2, true));
        });
    }

    #[test]
    fn test_engine_autowrap_off_overwrites_last_column() {
        let term = engine(10, 4);
        term.insert(b"\x1b[?7l").unwrap();
        term.insert(b"ABCDEFGHIJKL").unwrap();
        term.with_snapshot(|view| {
            assert_eq!(view.row_text(1).trim_end(), "ABCDEFGHIL");
            assert_eq!(view.row_text(2).trim_end(), "");
            assert_eq!(view.cursor(), (10, 1, true));
        });
    }

    #[test]
    fn test_engine_newline_mode_scenario() {
        let term = engine(10, 4);
        term.add_mode_flags(ModeFlags::NEWLINE);
        term.insert(b"A\nB").unwrap();
        term.with_snapshot(|view| {
            assert_eq!(view.row_text(1).trim_end(), "A");
            assert_eq!(view.row_text(2).trim_end(), "B");
            assert_eq!(view.cursor(), (2, 2, true));
        });
    }

    #[test]
    fn test_engine_red_hello_single_run() {
        let term = engine(80, 24);
        term.insert(b"\x1b[31mHELLO\x1b[0m").unwrap();
        term.with_snapshot(|view| {
            let runs = view.row_runs(1);
            assert_eq!(runs.len(), 1);
            assert_eq!(runs[0].start_column, 1);
            assert_eq!(runs[0].attr.fg, Color::RED);
            assert_eq!(view.cursor(), (6, 1, true));
        });
    }

    #[test]
    fn test_engine_scrollback_advances_top() {
        let term = engine(10, 3);
        for i in 0..5 {
            term.insert(format!("line{}\r\n", i).as_bytes()).unwrap();
        }
        // 5 line feeds in a 3-line viewport: top advanced by 3
        assert_eq!(term.viewport_top_index(), 3);
        term.with_snapshot(|view| {
            // scrolled-out lines still addressable by absolute index
            assert_eq!(view.line_at(0).unwrap().trimmed_text(), "line0");
            assert_eq!(view.line_at(4).unwrap().trimmed_text(), "line4");
            assert_eq!(view.row_text(1).trim_end(), "line3");
        });
    }

    #[test]
    fn test_engine_move_to_clamps() {
        let term = engine(80, 24);
        term.insert(b"\x1b[0;0H").unwrap();
        assert_eq!(term.cursor_position(), (1, 1));
        term.insert(b"\x1b[29;85H").unwrap();
        assert_eq!(term.cursor_position(), (80, 24));
    }

    #[test]
    fn test_engine_snapshot_idempotent() {
        let term = engine(20, 5);
        term.insert(b"\x1b[31mred\x1b[0m text\r\nmore").unwrap();
        let first = term.snapshot();
        let second = term.snapshot();
        assert_eq!(first.to_text(), second.to_text());
        assert_eq!(first.rows, second.rows);
    }

    #[test]
    fn test_engine_unrecognized_sequence_then_text() {
        let term = engine(80, 24);
        term.insert(b"\x1b[9999zXYZ").unwrap();
        term.with_snapshot(|view| {
            assert_eq!(view.row_text(1).trim_end(), "XYZ");
        });
    }

    #[test]
    fn test_engine_clear_line_to_end() {
        let term = engine(10, 3);
        term.insert(b"XXXXXXXXXX\x1b[1;5H\x1b[K").unwrap();
        term.with_snapshot(|view| {
            assert_eq!(view.row_text(1).trim_end(), "XXXX");
        });
    }

    #[test]
    fn test_engine_clear_screen() {
        let term = engine(10, 3);
        term.insert(b"AAAA\r\nBBBB\r\nCCCC").unwrap();
        term.insert(b"\x1b[2J").unwrap();
        term.with_snapshot(|view| {
            for row in 1..=3 {
                assert_eq!(view.row_text(row).trim_end(), "");
            }
        });
    }

    #[test]
    fn test_engine_cursor_visibility() {
        let term = engine(80, 24);
        term.insert(b"\x1b[?25l").unwrap();
        term.with_snapshot(|view| assert!(!view.cursor().2));
        term.insert(b"\x1b[?25h").unwrap();
        term.with_snapshot(|view| assert!(view.cursor().2));
    }

    #[test]
    fn test_engine_content_changed_flag() {
        let term = engine(80, 24);
        assert!(term.take_content_changed());
        assert!(!term.take_content_changed());
        term.insert(b"x").unwrap();
        assert!(term.take_content_changed());
        assert!(!term.take_content_changed());
    }

    #[test]
    fn test_engine_resize_preserves_content() {
        let term = engine(10, 4);
        term.insert(b"hello").unwrap();
        term.resize(20, 2).unwrap();
        term.with_snapshot(|view| {
            assert_eq!(view.columns(), 20);
            assert_eq!(view.lines(), 2);
            // the written line is still retained
            assert_eq!(view.line_at(0).unwrap().trimmed_text(), "hello");
        });
    }

    #[test]
    fn test_engine_title() {
        let term = engine(80, 24);
        term.insert(b"\x1b]0;session\x07").unwrap();
        assert_eq!(term.title(), "session");
    }

    #[test]
    fn test_engine_wide_char() {
        let term = engine(10, 3);
        term.insert("中A".as_bytes()).unwrap();
        term.with_snapshot(|view| {
            assert_eq!(view.cursor(), (4, 1, true));
            assert!(view.row_text(1).starts_with("中 A"));
        });
    }

    #[test]
    fn test_engine_save_restore_cursor() {
        let term = engine(80, 24);
        term.insert(b"\x1b[5;10H\x1b7\x1b[H\x1b8").unwrap();
        assert_eq!(term.cursor_position(), (10, 5));
    }

    #[test]
    fn test_engine_full_reset() {
        let term = engine(10, 3);
        term.insert(b"\x1b[31mhello\x1bc").unwrap();
        term.with_snapshot(|view| {
            assert_eq!(view.row_text(1).trim_end(), "");
            assert!(view.row_runs(1).is_empty());
            assert_eq!(view.cursor(), (1, 1, true));
        });
    }

    #[test]
    fn test_engine_reverse_line_feed_at_top() {
        let term = engine(10, 3);
        term.insert(b"AAA\r\nBBB").unwrap();
        term.insert(b"\x1b[H\x1bM").unwrap();
        term.with_snapshot(|view| {
            assert_eq!(view.row_text(1).trim_end(), "");
            assert_eq!(view.row_text(2).trim_end(), "AAA");
            assert_eq!(view.row_text(3).trim_end(), "BBB");
        });
    }
}
