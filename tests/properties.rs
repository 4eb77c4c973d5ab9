//! Property-based tests
//!
//! Randomized inputs probing the invariants the engine promises: chunk
//! boundaries never change decoding, hostile bytes never panic, the
//! cursor never leaves the viewport, and attribute runs stay ordered.

use proptest::prelude::*;

use vtstate::{EngineConfig, TerminalEngine};

fn engine(columns: u16, lines: u16) -> TerminalEngine {
    TerminalEngine::new(EngineConfig::with_size(columns, lines))
}

proptest! {
    /// Feeding a stream in two chunks produces the same screen as feeding
    /// it whole, wherever the split lands, including inside escape
    /// sequences and multi-byte characters.
    #[test]
    fn split_feed_matches_whole_feed(
        bytes in proptest::collection::vec(any::<u8>(), 0..256),
        split in 0usize..256,
    ) {
        let split = split.min(bytes.len());

        let whole = {
            let term = engine(40, 10);
            term.insert(&bytes).unwrap();
            term.snapshot()
        };
        let halves = {
            let term = engine(40, 10);
            term.insert(&bytes[..split]).unwrap();
            term.insert(&bytes[split..]).unwrap();
            term.snapshot()
        };
        prop_assert_eq!(whole, halves);
    }

    /// Arbitrary byte soup must never panic, hang, or push the cursor out
    /// of the viewport.
    #[test]
    fn hostile_input_never_escapes_bounds(
        bytes in proptest::collection::vec(any::<u8>(), 0..512),
    ) {
        let term = engine(20, 6);
        term.insert(&bytes).unwrap();
        let (column, line) = term.cursor_position();
        prop_assert!((1..=20).contains(&column));
        prop_assert!((1..=6).contains(&line));
    }

    /// Printable ASCII with no escapes fills the line left to right and
    /// wraps at the width.
    #[test]
    fn printable_text_lands_where_expected(
        text in "[ -~]{1,39}",
    ) {
        let term = engine(40, 10);
        term.insert(text.as_bytes()).unwrap();
        term.with_snapshot(|view| {
            let row = view.row_text(1);
            prop_assert_eq!(row.trim_end(), text.trim_end());
            prop_assert_eq!(view.cursor().0, text.len() as u16 + 1);
            Ok(())
        })?;
    }

    /// However SGR sequences interleave with text, every line's runs are
    /// strictly increasing in start column.
    #[test]
    fn runs_stay_strictly_ordered(
        pieces in proptest::collection::vec(
            prop_oneof![
                "[a-z]{1,8}".prop_map(|s| s.into_bytes()),
                (0u16..108).prop_map(|p| format!("\x1b[{}m", p).into_bytes()),
                Just(b"\r".to_vec()),
                Just(b"\n".to_vec()),
            ],
            0..40,
        ),
    ) {
        let term = engine(24, 5);
        for piece in &pieces {
            term.insert(piece).unwrap();
        }
        term.with_snapshot(|view| {
            for row in 1..=view.lines() {
                let runs = view.row_runs(row);
                for pair in runs.windows(2) {
                    prop_assert!(pair[0].start_column < pair[1].start_column);
                }
            }
            Ok(())
        })?;
    }
}
