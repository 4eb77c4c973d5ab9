//! vtstate: a terminal state engine
//!
//! This crate interprets the byte stream produced by a child process on a
//! pseudo-terminal and maintains the resulting screen state: visible
//! lines, scrollback, cursor, and per-character display attributes. It
//! contains no rendering, font, PTY, or windowing code; those collaborate
//! through the interfaces exposed here:
//!
//! - `core`: line store with scrollback, attribute run table, cursor and
//!   mode tracking, serializable snapshots
//! - `parser`: escape/control sequence decoder producing edit operations
//! - `engine`: the mutex-guarded façade tying the above together for a
//!   producer (PTY reader) thread and a consumer (render) thread
//!
//! # Example
//!
//! ```
//! use vtstate::{EngineConfig, TerminalEngine};
//!
//! let term = TerminalEngine::new(EngineConfig::with_size(80, 24));
//! term.insert(b"\x1b[1;31mhello\x1b[0m").unwrap();
//! term.with_snapshot(|view| {
//!     assert!(view.row_text(1).starts_with("hello"));
//!     assert_eq!(view.row_runs(1).len(), 1);
//! });
//! ```

pub mod config;
pub mod core;
pub mod engine;
pub mod parser;

pub use config::EngineConfig;
pub use core::{Attribute, AttributeRun, Color, GraphicsMode, ModeFlags, Snapshot};
pub use engine::{EngineError, ScreenView, TerminalEngine};
