//! Escape sequence decoder
//!
//! A byte-at-a-time state machine turning the raw pseudo-terminal stream
//! into [`EditOp`]s. The machine has four states:
//!
//! - `Ground`: bytes print or act as control characters
//! - `EscapeSeen`: ESC received, awaiting the introducer byte
//! - `CsiCollecting`: collecting numeric parameters and a final byte
//! - `StringCollecting`: collecting bytes until a string terminator
//!
//! ESC re-enters `EscapeSeen` from any state, abandoning whatever was
//! being collected: a malformed sequence is recoverable by the next
//! escape. Unrecognized sequences are discarded silently. The decoder
//! keeps partial state across `feed` calls, so sequences split at chunk
//! boundaries (including multi-byte UTF-8) decode identically to the
//! unsplit stream.

use tracing::trace;

use super::op::{parse_sgr, ClearKind, EditOp};
use crate::core::ModeFlags;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Ground,
    EscapeSeen,
    CsiCollecting,
    StringCollecting,
}

/// The terminal byte-stream decoder
#[derive(Debug)]
pub struct Decoder {
    state: State,
    /// Completed CSI parameters
    params: Vec<u16>,
    /// Parameter currently being accumulated
    current_param: u16,
    param_has_digit: bool,
    /// Sequence began with the `?` private marker
    private_marker: bool,
    /// Sequence contained bytes we do not handle; swallow it at the final
    discard_csi: bool,
    /// OSC command number (before the first `;`)
    osc_command: u16,
    osc_in_command: bool,
    osc_payload: Vec<u8>,
    /// ESC arrived inside a string sequence; `\` completes it as ST
    osc_pending: bool,
    utf8_buffer: Vec<u8>,
    utf8_remaining: u8,
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder {
    /// Create a decoder in the ground state
    pub fn new() -> Self {
        Self {
            state: State::Ground,
            params: Vec::with_capacity(16),
            current_param: 0,
            param_has_digit: false,
            private_marker: false,
            discard_csi: false,
            osc_command: 0,
            osc_in_command: false,
            osc_payload: Vec::with_capacity(64),
            osc_pending: false,
            utf8_buffer: Vec::with_capacity(4),
            utf8_remaining: 0,
        }
    }

    /// Reset to the ground state, dropping any partial sequence
    pub fn reset(&mut self) {
        self.state = State::Ground;
        self.clear_params();
        self.osc_payload.clear();
        self.osc_pending = false;
        self.utf8_buffer.clear();
        self.utf8_remaining = 0;
    }

    fn clear_params(&mut self) {
        self.params.clear();
        self.current_param = 0;
        self.param_has_digit = false;
        self.private_marker = false;
        self.discard_csi = false;
    }

    /// Decode a chunk of bytes into edit operations
    pub fn feed(&mut self, data: &[u8]) -> Vec<EditOp> {
        let mut ops = Vec::new();
        for &byte in data {
            self.process_byte(byte, &mut ops);
        }
        ops
    }

    fn process_byte(&mut self, byte: u8, out: &mut Vec<EditOp>) {
        // UTF-8 continuation takes priority in ground state
        if self.state == State::Ground && self.utf8_remaining > 0 {
            self.process_utf8_continuation(byte, out);
            return;
        }

        if byte == 0x1B {
            // An escape always restarts decoding. A string payload is
            // held until we know whether the next byte is ST.
            self.osc_pending = self.state == State::StringCollecting;
            self.state = State::EscapeSeen;
            self.clear_params();
            return;
        }

        if byte < 0x20 {
            self.process_c0(byte, out);
            return;
        }

        if byte == 0x7F {
            // DEL is ignored
            return;
        }

        match self.state {
            State::Ground => self.process_ground(byte, out),
            State::EscapeSeen => self.process_escape(byte, out),
            State::CsiCollecting => self.process_csi(byte, out),
            State::StringCollecting => self.process_string(byte),
        }
    }

    fn process_c0(&mut self, byte: u8, out: &mut Vec<EditOp>) {
        match byte {
            0x18 | 0x1A => {
                // CAN, SUB cancel any in-progress sequence
                self.state = State::Ground;
            }
            0x07 if self.state == State::StringCollecting => {
                // BEL terminates OSC (xterm extension)
                self.finish_string(out);
            }
            _ if self.state == State::StringCollecting => {
                // other controls are ignored inside string sequences
            }
            0x08 => out.push(EditOp::Backspace),
            0x09 => out.push(EditOp::Tab),
            0x0A | 0x0B | 0x0C => out.push(EditOp::LineFeed),
            0x0D => out.push(EditOp::CarriageReturn),
            _ => {
                // BEL and the remaining C0 controls have no screen effect
            }
        }
    }

    fn process_ground(&mut self, byte: u8, out: &mut Vec<EditOp>) {
        if byte >= 0xC0 {
            self.start_utf8(byte, out);
        } else if byte >= 0x80 {
            // stray continuation byte
            out.push(EditOp::Print('\u{FFFD}'));
        } else {
            out.push(EditOp::Print(byte as char));
        }
    }

    fn start_utf8(&mut self, byte: u8, out: &mut Vec<EditOp>) {
        self.utf8_buffer.clear();
        self.utf8_buffer.push(byte);
        if byte < 0xE0 {
            self.utf8_remaining = 1;
        } else if byte < 0xF0 {
            self.utf8_remaining = 2;
        } else if byte < 0xF8 {
            self.utf8_remaining = 3;
        } else {
            self.utf8_buffer.clear();
            out.push(EditOp::Print('\u{FFFD}'));
        }
    }

    fn process_utf8_continuation(&mut self, byte: u8, out: &mut Vec<EditOp>) {
        if (0x80..=0xBF).contains(&byte) {
            self.utf8_buffer.push(byte);
            self.utf8_remaining -= 1;
            if self.utf8_remaining == 0 {
                let s = String::from_utf8_lossy(&self.utf8_buffer);
                let c = s.chars().next().unwrap_or('\u{FFFD}');
                self.utf8_buffer.clear();
                out.push(EditOp::Print(c));
            }
        } else {
            // invalid continuation: emit a replacement and reprocess the
            // byte from scratch
            self.utf8_buffer.clear();
            self.utf8_remaining = 0;
            out.push(EditOp::Print('\u{FFFD}'));
            self.process_byte(byte, out);
        }
    }

    fn process_escape(&mut self, byte: u8, out: &mut Vec<EditOp>) {
        let had_pending = std::mem::take(&mut self.osc_pending);
        match byte {
            b'[' => {
                self.state = State::CsiCollecting;
                return;
            }
            b']' => {
                self.state = State::StringCollecting;
                self.osc_command = 0;
                self.osc_in_command = true;
                self.osc_payload.clear();
                return;
            }
            b'\\' => {
                // ST: completes the string sequence the preceding ESC
                // interrupted
                if had_pending {
                    self.finish_string(out);
                    return;
                }
            }
            b'D' => out.push(EditOp::LineFeed),
            b'E' => {
                out.push(EditOp::CarriageReturn);
                out.push(EditOp::LineFeed);
            }
            b'M' => out.push(EditOp::ReverseLineFeed),
            b'7' => out.push(EditOp::SaveCursor),
            b'8' => out.push(EditOp::RestoreCursor),
            b'c' => out.push(EditOp::FullReset),
            _ => {
                trace!(byte, "discarding unrecognized escape");
            }
        }
        self.osc_payload.clear();
        self.state = State::Ground;
    }

    fn process_csi(&mut self, byte: u8, out: &mut Vec<EditOp>) {
        match byte {
            b'0'..=b'9' => {
                self.current_param = self
                    .current_param
                    .saturating_mul(10)
                    .saturating_add(u16::from(byte - b'0'));
                self.param_has_digit = true;
            }
            b';' => {
                self.params.push(self.current_param);
                self.current_param = 0;
                self.param_has_digit = false;
            }
            b'?' if self.params.is_empty() && !self.param_has_digit => {
                self.private_marker = true;
            }
            0x40..=0x7E => {
                if self.param_has_digit || !self.params.is_empty() {
                    self.params.push(self.current_param);
                }
                if self.discard_csi {
                    trace!(final_byte = byte, "discarding unsupported control sequence");
                } else {
                    self.dispatch_csi(byte, out);
                }
                self.clear_params();
                self.state = State::Ground;
            }
            _ => {
                // intermediates, colons, misplaced markers: we decode none
                // of these forms, so swallow the whole sequence
                self.discard_csi = true;
            }
        }
    }

    /// Parameter at `idx`, or `default` when absent or zero. Zero means
    /// "use the default" for every command we decode; zero-as-distance
    /// does not exist in this repertoire.
    fn param_or(&self, idx: usize, default: u16) -> u16 {
        match self.params.get(idx).copied() {
            Some(0) | None => default,
            Some(v) => v,
        }
    }

    fn dispatch_csi(&mut self, final_byte: u8, out: &mut Vec<EditOp>) {
        if self.private_marker {
            match final_byte {
                b'h' | b'l' => {
                    let on = final_byte == b'h';
                    for &param in &self.params {
                        match param {
                            1 => out.push(EditOp::SetMode {
                                flag: ModeFlags::APPLICATION_CURSOR,
                                on,
                            }),
                            7 => out.push(EditOp::SetMode {
                                flag: ModeFlags::AUTO_WRAP,
                                on,
                            }),
                            25 => out.push(EditOp::SetCursorVisible(on)),
                            _ => trace!(param, on, "ignoring unknown private mode"),
                        }
                    }
                }
                _ => trace!(final_byte, "discarding unknown private sequence"),
            }
            return;
        }

        match final_byte {
            b'A' => out.push(EditOp::MoveBy {
                dx: 0,
                dy: -i32::from(self.param_or(0, 1)),
            }),
            b'B' => out.push(EditOp::MoveBy {
                dx: 0,
                dy: i32::from(self.param_or(0, 1)),
            }),
            b'C' => out.push(EditOp::MoveBy {
                dx: i32::from(self.param_or(0, 1)),
                dy: 0,
            }),
            b'D' => out.push(EditOp::MoveBy {
                dx: -i32::from(self.param_or(0, 1)),
                dy: 0,
            }),
            b'E' => {
                out.push(EditOp::MoveBy {
                    dx: 0,
                    dy: i32::from(self.param_or(0, 1)),
                });
                out.push(EditOp::CarriageReturn);
            }
            b'F' => {
                out.push(EditOp::MoveBy {
                    dx: 0,
                    dy: -i32::from(self.param_or(0, 1)),
                });
                out.push(EditOp::CarriageReturn);
            }
            b'G' => out.push(EditOp::MoveTo {
                column: Some(self.param_or(0, 1)),
                line: None,
            }),
            b'd' => out.push(EditOp::MoveTo {
                column: None,
                line: Some(self.param_or(0, 1)),
            }),
            b'H' | b'f' => out.push(EditOp::MoveTo {
                column: Some(self.param_or(1, 1)),
                line: Some(self.param_or(0, 1)),
            }),
            b'J' => {
                if let Some(kind) = clear_kind(self.params.first().copied().unwrap_or(0)) {
                    out.push(EditOp::ClearScreen(kind));
                }
            }
            b'K' => {
                if let Some(kind) = clear_kind(self.params.first().copied().unwrap_or(0)) {
                    out.push(EditOp::ClearLine(kind));
                }
            }
            b'S' => out.push(EditOp::Scroll(i32::from(self.param_or(0, 1)))),
            b'T' => out.push(EditOp::Scroll(-i32::from(self.param_or(0, 1)))),
            b'm' => out.push(EditOp::SetGraphics(parse_sgr(&self.params))),
            b'h' | b'l' => {
                let on = final_byte == b'h';
                for &param in &self.params {
                    match param {
                        20 => out.push(EditOp::SetMode {
                            flag: ModeFlags::NEWLINE,
                            on,
                        }),
                        _ => trace!(param, on, "ignoring unknown mode"),
                    }
                }
            }
            b's' if self.params.is_empty() => out.push(EditOp::SaveCursor),
            b'u' if self.params.is_empty() => out.push(EditOp::RestoreCursor),
            _ => {
                trace!(final_byte, params = ?self.params, "discarding unrecognized control sequence");
            }
        }
    }

    fn process_string(&mut self, byte: u8) {
        if self.osc_in_command && byte.is_ascii_digit() {
            self.osc_command = self
                .osc_command
                .saturating_mul(10)
                .saturating_add(u16::from(byte - b'0'));
        } else if self.osc_in_command && byte == b';' {
            self.osc_in_command = false;
        } else {
            self.osc_in_command = false;
            self.osc_payload.push(byte);
        }
    }

    fn finish_string(&mut self, out: &mut Vec<EditOp>) {
        self.state = State::Ground;
        self.osc_pending = false;
        let payload = String::from_utf8_lossy(&self.osc_payload).into_owned();
        self.osc_payload.clear();
        match self.osc_command {
            0 | 2 => out.push(EditOp::SetTitle(payload)),
            command => trace!(command, "ignoring unknown string sequence"),
        }
    }
}

/// Map an erase parameter to a clear kind. Parameter 3 (the xterm
/// scrollback-erase extension) clears the full region like 2; history
/// disposal is the retention bound's job, not an erase command's.
fn clear_kind(param: u16) -> Option<ClearKind> {
    match param {
        0 => Some(ClearKind::ToEnd),
        1 => Some(ClearKind::ToStart),
        2 | 3 => Some(ClearKind::All),
        _ => None,
    }
}
