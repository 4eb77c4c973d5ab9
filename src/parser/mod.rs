//! Terminal escape sequence decoder
//!
//! A stateful decoder that converts the raw byte stream into edit
//! operations applied by the engine.

mod decoder;
mod op;

pub use decoder::Decoder;
pub use op::{parse_sgr, ClearKind, EditOp, GraphicsOp};
