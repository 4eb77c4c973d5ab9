//! Terminal core module
//!
//! The state the engine coordinates: the line store with scrollback, the
//! attribute run table overlaid on it, the cursor and mode tracker, and
//! serializable snapshots of the visible screen.
//!
//! The core is completely deterministic: given the same sequence of edit
//! operations it always produces the same state.

mod attr;
mod cursor;
mod line;
mod runs;
mod snapshot;
mod store;

pub use attr::{Attribute, AttributeRun, Color, GraphicsMode};
pub use cursor::{Cursor, ModeFlags, SavedCursor};
pub use line::Line;
pub use runs::RunTable;
pub use snapshot::{CursorSnapshot, RowSnapshot, Snapshot};
pub use store::LineStore;
