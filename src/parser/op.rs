//! Edit operations produced by the decoder
//!
//! These are the semantic commands the engine applies to the line store,
//! run table, and cursor tracker. The decoder never touches those stores
//! directly.

use serde::{Deserialize, Serialize};

use crate::core::{Color, GraphicsMode, ModeFlags};

/// Which part of a screen or line a clear targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClearKind {
    /// From the cursor to the end
    ToEnd,
    /// From the start to the cursor (inclusive)
    ToStart,
    /// Everything
    All,
}

/// One step of a graphics rendition (SGR) change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GraphicsOp {
    /// Return to the default attribute
    Reset,
    Set(GraphicsMode),
    Clear(GraphicsMode),
    Foreground(Color),
    Background(Color),
}

/// A decoded edit operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EditOp {
    /// Print a character at the cursor, advancing it
    Print(char),
    LineFeed,
    CarriageReturn,
    Backspace,
    Tab,
    /// Move up one line, scrolling the viewport down at the top margin
    ReverseLineFeed,
    /// Relative cursor motion, clamped by the tracker
    MoveBy { dx: i32, dy: i32 },
    /// Absolute cursor motion (1-based); `None` keeps that axis
    MoveTo {
        column: Option<u16>,
        line: Option<u16>,
    },
    ClearScreen(ClearKind),
    ClearLine(ClearKind),
    /// One SGR sequence's worth of attribute changes, applied in order
    SetGraphics(Vec<GraphicsOp>),
    SetMode { flag: ModeFlags, on: bool },
    SetCursorVisible(bool),
    /// Positive scrolls content up (new blank lines at the bottom),
    /// negative scrolls it down
    Scroll(i32),
    SaveCursor,
    RestoreCursor,
    /// Window title from an OSC 0/2 string sequence
    SetTitle(String),
    /// RIS: clear the viewport, home the cursor, drop modes and attributes
    FullReset,
}

/// Translate SGR parameters into attribute changes.
///
/// Handles the common rendition codes plus 256-color (38/48;5;n) and
/// truecolor (38/48;2;r;g;b) forms. Unknown codes are skipped, matching
/// the discard-silently policy for unrecognized sequences.
pub fn parse_sgr(params: &[u16]) -> Vec<GraphicsOp> {
    let mut ops = Vec::new();
    if params.is_empty() {
        ops.push(GraphicsOp::Reset);
        return ops;
    }

    let mut i = 0;
    while i < params.len() {
        let p = params[i];
        match p {
            0 => ops.push(GraphicsOp::Reset),
            1 => ops.push(GraphicsOp::Set(GraphicsMode::BOLD)),
            2 => ops.push(GraphicsOp::Set(GraphicsMode::FAINT)),
            3 => ops.push(GraphicsOp::Set(GraphicsMode::ITALIC)),
            4 => ops.push(GraphicsOp::Set(GraphicsMode::UNDERLINE)),
            5 | 6 => ops.push(GraphicsOp::Set(GraphicsMode::BLINK)),
            7 => ops.push(GraphicsOp::Set(GraphicsMode::NEGATIVE)),
            8 => ops.push(GraphicsOp::Set(GraphicsMode::HIDDEN)),
            22 => ops.push(GraphicsOp::Clear(GraphicsMode::BOLD | GraphicsMode::FAINT)),
            23 => ops.push(GraphicsOp::Clear(GraphicsMode::ITALIC)),
            24 => ops.push(GraphicsOp::Clear(GraphicsMode::UNDERLINE)),
            25 => ops.push(GraphicsOp::Clear(GraphicsMode::BLINK)),
            27 => ops.push(GraphicsOp::Clear(GraphicsMode::NEGATIVE)),
            28 => ops.push(GraphicsOp::Clear(GraphicsMode::HIDDEN)),
            30..=37 => ops.push(GraphicsOp::Foreground(Color::Indexed((p - 30) as u8))),
            39 => ops.push(GraphicsOp::Foreground(Color::Default)),
            40..=47 => ops.push(GraphicsOp::Background(Color::Indexed((p - 40) as u8))),
            49 => ops.push(GraphicsOp::Background(Color::Default)),
            90..=97 => ops.push(GraphicsOp::Foreground(Color::Indexed((p - 90 + 8) as u8))),
            100..=107 => ops.push(GraphicsOp::Background(Color::Indexed((p - 100 + 8) as u8))),
            38 | 48 => {
                let (color, consumed) = parse_extended_color(&params[i + 1..]);
                match color {
                    Some(color) if p == 38 => ops.push(GraphicsOp::Foreground(color)),
                    Some(color) => ops.push(GraphicsOp::Background(color)),
                    None => {}
                }
                i += consumed;
            }
            _ => {}
        }
        i += 1;
    }
    ops
}

/// Parse the tail of a 38/48 extended-color introducer. Returns the color
/// (if well-formed) and the number of parameters consumed.
fn parse_extended_color(rest: &[u16]) -> (Option<Color>, usize) {
    match rest.first() {
        Some(5) => {
            if let Some(&index) = rest.get(1) {
                (Some(Color::Indexed(index.min(255) as u8)), 2)
            } else {
                (None, rest.len())
            }
        }
        Some(2) => {
            if rest.len() >= 4 {
                let clamp = |v: u16| v.min(255) as u8;
                (
                    Some(Color::Rgb(clamp(rest[1]), clamp(rest[2]), clamp(rest[3]))),
                    4,
                )
            } else {
                (None, rest.len())
            }
        }
        _ => (None, rest.len()),
    }
}
