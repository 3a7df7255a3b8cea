//! Command-stream pattern decoding.
//!
//! Several formats store one pattern per channel as a variable-length
//! stream of 16-bit words instead of a fixed grid. This module is the
//! interpreter that replays such a stream into a column of cells.
//!
//! Bit 15 of each word selects its class. Set: a command word with a
//! 7-bit opcode and 7-bit parameter, mapped through the format's
//! `Dialect`. Clear: a note word, in one of two shapes -- the compact
//! form (12-bit period, no row advance of its own) or the legacy
//! two-word form (immediate delay in the first word, period in the
//! second). Channels are decoded independently: each has its own
//! stream, cursor and latched-effect state, matching the per-voice
//! architecture of the source hardware.

use exo_ir::{Cell, Effect, PersistentEffect};

use crate::periods::period_to_note;
use crate::reader::Reader;

/// What a command word means, as resolved by a format's opcode map.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    /// One-shot effect written at the current row only.
    Row(Effect),
    /// Write the effect at the current row, then terminate the stream
    /// (position-jump style opcodes).
    RowThenEnd(Effect),
    /// Update the latched-effect register; nothing is written until a
    /// delay advances the cursor.
    Persistent(PersistentEffect),
    /// Select the sticky instrument (1-based). No row write.
    Instrument(u8),
    /// Advance the row cursor by n rows, re-applying any latched
    /// effect into every row passed through.
    Delay(u8),
    /// Terminate the stream.
    End,
    /// Opcode with no meaning in this dialect; consumed and ignored.
    Ignore,
}

/// Format-specific constants for the interpreter: opcode semantics,
/// terminator words, and which note-word shape the format uses. The
/// abstract machine itself is shared by every stream format.
pub struct Dialect {
    /// Words that end the stream immediately regardless of position.
    pub sentinels: &'static [u16],
    /// True for the legacy two-word note form; false for the compact
    /// single-word form.
    pub legacy_note_words: bool,
    /// Opcode + parameter to command mapping.
    pub map_command: fn(opcode: u8, param: u8) -> Command,
}

/// Replay one channel's stream into exactly `rows` cells.
///
/// Total over arbitrary input: a malformed or truncated stream halts
/// this channel's decode, leaving its remaining rows empty. Real-world
/// captures are often truncated, so this is recovery, not failure.
pub fn decode_channel(stream: &[u8], dialect: &Dialect, rows: u16) -> Vec<Cell> {
    let mut cells = vec![Cell::empty(); rows as usize];
    let mut r = Reader::new(stream);
    let mut row: u16 = 0;
    let mut instrument: u8 = 0;
    let mut latched = PersistentEffect::NoEffect;

    loop {
        if row >= rows {
            break;
        }
        let word = match r.read_u16_be() {
            Ok(w) => w,
            Err(_) => {
                log::debug!("stream truncated at row {}, halting channel", row);
                break;
            }
        };

        if dialect.sentinels.contains(&word) {
            break;
        }

        if word & 0x8000 != 0 {
            let opcode = ((word >> 7) & 0x7F) as u8;
            let param = (word & 0x7F) as u8;
            match (dialect.map_command)(opcode, param) {
                Command::Persistent(p) => latched = p,
                Command::Delay(n) => {
                    // The latch survives a delay: this is the command
                    // that applies it, re-writing the effect into each
                    // row advanced through like the hardware re-latch.
                    for _ in 0..n {
                        if row >= rows {
                            break;
                        }
                        if latched.is_active() {
                            cells[row as usize].push_effect(latched.to_effect());
                        }
                        row += 1;
                    }
                }
                Command::Row(effect) => {
                    cells[row as usize].push_effect(effect);
                    latched = PersistentEffect::NoEffect;
                }
                Command::RowThenEnd(effect) => {
                    cells[row as usize].push_effect(effect);
                    break;
                }
                Command::Instrument(n) => {
                    instrument = n;
                    latched = PersistentEffect::NoEffect;
                }
                Command::End => break,
                Command::Ignore => latched = PersistentEffect::NoEffect,
            }
        } else if dialect.legacy_note_words {
            // Two-word form: low byte is an immediate row delay, the
            // second word carries the period.
            let delay = (word & 0x00FF) as u16;
            let second = match r.read_u16_be() {
                Ok(w) => w,
                Err(_) => {
                    log::debug!("stream truncated inside note pair, halting channel");
                    break;
                }
            };
            if second == 0 && delay == 0 {
                // End-of-stream pair.
                break;
            }
            let period = second & 0x0FFF;
            if period != 0 {
                // Note lands before the advance; this form carries its
                // own timing.
                write_note(&mut cells[row as usize], period, instrument);
            }
            row += delay;
        } else {
            // Compact form: 12-bit period, no implicit advance. A
            // following delay command moves the cursor; note-trigger
            // and row-timing are independent signals on the hardware.
            let period = word & 0x0FFF;
            if period != 0 {
                write_note(&mut cells[row as usize], period, instrument);
            }
        }
    }

    cells
}

fn write_note(cell: &mut Cell, period: u16, instrument: u8) {
    cell.note = period_to_note(period);
    cell.instrument = instrument;
}

/// Tempo parameter to ticks-per-row conversion used by the stream
/// formats: `max(1, round(100/t))`.
pub(crate) fn tempo_to_speed(t: u8) -> u8 {
    if t == 0 {
        return 1;
    }
    let speed = (100.0 / t as f32).round() as u32;
    speed.clamp(1, u8::MAX as u32) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use exo_ir::{Note, NOTE_COUNT};

    // A minimal dialect for exercising the machine.
    fn test_map(opcode: u8, param: u8) -> Command {
        match opcode {
            0x01 => Command::Row(Effect::PortaUp(param)),
            0x07 => Command::Row(Effect::SetSpeed(tempo_to_speed(param))),
            0x08 => Command::RowThenEnd(Effect::PositionJump(param)),
            0x10 => Command::Persistent(PersistentEffect::Arpeggio {
                x: (param >> 4) & 0x07,
                y: param & 0x0F,
            }),
            0x20 => Command::Instrument(param),
            0x30 => Command::Delay(param),
            0x7F => Command::End,
            _ => Command::Ignore,
        }
    }

    const COMPACT: Dialect = Dialect {
        sentinels: &[0xFFFF],
        legacy_note_words: false,
        map_command: test_map,
    };

    const LEGACY: Dialect = Dialect {
        sentinels: &[],
        legacy_note_words: true,
        map_command: test_map,
    };

    fn words(ws: &[u16]) -> Vec<u8> {
        ws.iter().flat_map(|w| w.to_be_bytes()).collect()
    }

    fn cmd(opcode: u8, param: u8) -> u16 {
        0x8000 | ((opcode as u16) << 7) | param as u16
    }

    #[test]
    fn persistent_effect_fills_every_delayed_row() {
        // arpeggio(5) then delay(3): all three rows carry the effect.
        let stream = words(&[cmd(0x10, 5), cmd(0x30, 3)]);
        let cells = decode_channel(&stream, &COMPACT, 64);
        for row in 0..3 {
            assert_eq!(
                cells[row].effects[0],
                Effect::Arpeggio { x: 0, y: 5 },
                "row {}",
                row
            );
        }
        assert!(cells[3].is_empty());
    }

    #[test]
    fn bare_delay_skips_rows_writing_nothing() {
        let stream = words(&[cmd(0x30, 3), cmd(0x01, 2)]);
        let cells = decode_channel(&stream, &COMPACT, 64);
        for row in 0..3 {
            assert!(cells[row].is_empty(), "row {}", row);
        }
        assert_eq!(cells[3].effects[0], Effect::PortaUp(2));
    }

    #[test]
    fn latch_survives_consecutive_delays() {
        let stream = words(&[cmd(0x10, 5), cmd(0x30, 2), cmd(0x30, 2)]);
        let cells = decode_channel(&stream, &COMPACT, 64);
        for row in 0..4 {
            assert_eq!(cells[row].effects[0], Effect::Arpeggio { x: 0, y: 5 });
        }
    }

    #[test]
    fn unrelated_command_clears_the_latch() {
        let stream = words(&[cmd(0x10, 5), cmd(0x01, 2), cmd(0x30, 2)]);
        let cells = decode_channel(&stream, &COMPACT, 64);
        assert_eq!(cells[0].effects[0], Effect::PortaUp(2));
        // The delay after the one-shot writes nothing: latch was cleared.
        assert_eq!(cells[0].effects[1], Effect::None);
        assert!(cells[1].is_empty());
    }

    #[test]
    fn sentinel_first_produces_empty_channel() {
        let stream = words(&[0xFFFF, cmd(0x01, 9)]);
        let cells = decode_channel(&stream, &COMPACT, 64);
        assert_eq!(cells.len(), 64);
        assert!(cells.iter().all(Cell::is_empty));
    }

    #[test]
    fn compact_note_does_not_advance() {
        // Instrument, note, then a one-row delay; note and a second
        // note land on consecutive rows only because of the delay.
        let stream = words(&[cmd(0x20, 2), 428, cmd(0x30, 1), 404, 0xFFFF]);
        let cells = decode_channel(&stream, &COMPACT, 64);
        assert!(matches!(cells[0].note, Note::On(_)));
        assert_eq!(cells[0].instrument, 2);
        assert!(matches!(cells[1].note, Note::On(_)));
        assert_eq!(cells[1].instrument, 2);
        assert!(cells[2].is_empty());
    }

    #[test]
    fn legacy_pair_writes_then_advances() {
        // (delay=2, period=428): note at row 0, cursor lands on row 2.
        let stream = words(&[0x0002, 428, 0x0000, 404, 0x0000, 0x0000]);
        let cells = decode_channel(&stream, &LEGACY, 64);
        assert!(matches!(cells[0].note, Note::On(_)));
        assert!(cells[1].is_empty());
        assert!(matches!(cells[2].note, Note::On(_)));
    }

    #[test]
    fn legacy_zero_pair_terminates_without_write() {
        let stream = words(&[0x0000, 0x0000, 0x0002, 428]);
        let cells = decode_channel(&stream, &LEGACY, 64);
        assert!(cells.iter().all(Cell::is_empty));
    }

    #[test]
    fn truncated_stream_halts_silently() {
        // A lone command byte cannot form a word.
        let cells = decode_channel(&[0x81], &COMPACT, 16);
        assert_eq!(cells.len(), 16);
        assert!(cells.iter().all(Cell::is_empty));

        // Legacy pair cut in half.
        let cells = decode_channel(&words(&[0x0001]), &LEGACY, 16);
        assert!(cells.iter().all(Cell::is_empty));
    }

    #[test]
    fn cursor_never_escapes_the_grid() {
        // Delay far past the end, then commands that would write.
        let stream = words(&[cmd(0x30, 100), cmd(0x01, 1), 428]);
        let cells = decode_channel(&stream, &COMPACT, 8);
        assert_eq!(cells.len(), 8);
        assert!(cells.iter().all(Cell::is_empty));
    }

    #[test]
    fn row_then_end_writes_and_stops() {
        let stream = words(&[cmd(0x08, 3), cmd(0x01, 9)]);
        let cells = decode_channel(&stream, &COMPACT, 64);
        assert_eq!(cells[0].effects[0], Effect::PositionJump(3));
        assert!(cells[1..].iter().all(Cell::is_empty));
    }

    #[test]
    fn notes_stay_inside_the_chromatic_space() {
        for period in [1u16, 57, 428, 1712, 4095] {
            let stream = words(&[period, 0xFFFF]);
            let cells = decode_channel(&stream, &COMPACT, 4);
            if let Note::On(n) = cells[0].note {
                assert!(n >= 1 && n <= NOTE_COUNT);
            } else {
                panic!("period {} produced no note", period);
            }
        }
    }

    #[test]
    fn tempo_transform() {
        assert_eq!(tempo_to_speed(0), 1);
        assert_eq!(tempo_to_speed(16), 6);
        assert_eq!(tempo_to_speed(100), 1);
        assert_eq!(tempo_to_speed(255), 1);
        assert_eq!(tempo_to_speed(1), 100);
    }
}
