//! The Musical Enlightment decoder.
//!
//! Packed TME songs: a fixed header with counts and play order, a
//! table of 32-bit offsets (relative to the table's end) locating one
//! command stream per channel per pattern, and 22-byte instrument name
//! records. Sample audio lives in companion files, so instruments are
//! placeholders; the patterns decode natively through the
//! command-stream interpreter.

use exo_ir::{Effect, Instrument, Origin, Pattern, PersistentEffect, Song};

use crate::assemble::{assemble, instrument_name};
use crate::command_stream::{decode_channel, tempo_to_speed, Command, Dialect};
use crate::reader::Reader;
use crate::registry::FormatUnit;
use crate::sections::{resolve_offset_table, RawSection};
use crate::FormatError;

const MAGIC: &[u8; 4] = b"TME1";
const HEADER_LEN: usize = 10;
const CHANNELS: u8 = 4;
const ROWS: u16 = 64;
const NAME_LEN: usize = 22;

pub struct Enlightment;

impl FormatUnit for Enlightment {
    fn name(&self) -> &'static str {
        "The Musical Enlightment"
    }

    /// Structural detection: the magic alone is four bytes of ASCII,
    /// so the offset-table walk is replayed and must complete without
    /// contradiction.
    fn detect(&self, data: &[u8], _hint: Option<&str>) -> bool {
        locate_streams(data).is_ok()
    }

    fn decode(&self, data: &[u8], hint: Option<&str>) -> Result<Song, FormatError> {
        let located = locate_streams(data)?;
        let mut song = Song::new("", CHANNELS);
        song.initial_speed = located.speed;
        song.positions = located.positions.iter().map(|&p| p as u16).collect();
        song.restart = located.restart as u16;

        let origin = Origin {
            format: "The Musical Enlightment",
            file: hint.unwrap_or_default().to_string(),
            source_channels: CHANNELS,
            source_patterns: located.num_patterns as u16,
            source_instruments: located.num_instruments as u16,
        };

        for (pat_idx, offsets) in located.streams.chunks_exact(CHANNELS as usize).enumerate() {
            let mut pattern = Pattern::new(pat_idx as u16, ROWS, CHANNELS);
            pattern.origin = origin.clone();
            for (ch, &start) in offsets.iter().enumerate() {
                let section = RawSection::to_end(start, data.len())?;
                pattern.channels[ch].cells =
                    decode_channel(section.slice(data)?, &TME_DIALECT, ROWS);
            }
            song.patterns.push(pattern);
        }

        let mut r = Reader::at(data, located.names_at);
        for id in 1..=located.num_instruments as u16 {
            let raw = r.read_fixed_str(NAME_LEN)?;
            song.instruments
                .push(Instrument::placeholder(id, &instrument_name(&raw, id)));
        }

        assemble(&mut song);
        Ok(song)
    }
}

struct Located {
    num_patterns: u8,
    num_instruments: u8,
    speed: u8,
    restart: u8,
    positions: Vec<u8>,
    names_at: usize,
    /// Absolute stream start per (pattern, channel), pattern-major.
    streams: Vec<usize>,
}

/// Parse the header and resolve every stream offset. Shared verbatim
/// between detection and decoding.
fn locate_streams(data: &[u8]) -> Result<Located, FormatError> {
    let mut r = Reader::new(data);
    if r.read_bytes(4)? != MAGIC {
        return Err(FormatError::StructuralMismatch("missing TME1 magic".into()));
    }
    let num_patterns = r.read_u8()?;
    let num_instruments = r.read_u8()?;
    let song_length = r.read_u8()?;
    let restart = r.read_u8()?;
    let speed = r.read_u8()?;
    r.skip(1)?;

    if num_patterns == 0 || song_length == 0 {
        return Err(FormatError::StructuralMismatch(
            "empty pattern or position table".into(),
        ));
    }

    let positions = r.read_bytes(song_length as usize)?.to_vec();
    let names_at = r.pos();
    r.skip(num_instruments as usize * NAME_LEN)?;

    let table_entries = num_patterns as usize * CHANNELS as usize;
    let anchor = r.pos() + table_entries * 4;
    let streams = resolve_offset_table(&mut r, table_entries, anchor)?;

    Ok(Located {
        num_patterns,
        num_instruments,
        speed,
        restart,
        positions,
        names_at,
        streams,
    })
}

fn map_command(opcode: u8, param: u8) -> Command {
    match opcode {
        0x01 => Command::Row(Effect::PortaUp(param)),
        0x02 => Command::Row(Effect::PortaDown(param)),
        0x03 => Command::Row(Effect::SetVolume(param.min(64))),
        0x04 => Command::Row(Effect::StopEffects),
        0x05 => Command::Row(Effect::PatternLoop(param)),
        0x06 => Command::Row(Effect::SetFilter(param != 0)),
        0x07 => Command::Row(Effect::SetSpeed(tempo_to_speed(param))),
        0x08 => Command::RowThenEnd(Effect::PositionJump(param)),
        0x10 => Command::Persistent(PersistentEffect::Arpeggio {
            x: (param >> 4) & 0x07,
            y: param & 0x0F,
        }),
        0x11 => Command::Persistent(PersistentEffect::TonePorta(param)),
        0x12 => Command::Persistent(PersistentEffect::Vibrato {
            speed: (param >> 4) & 0x07,
            depth: param & 0x0F,
        }),
        0x13 => Command::Persistent(PersistentEffect::VolumeSlide(sign_extend_7(param))),
        0x20 => Command::Instrument(param),
        0x30 => Command::Delay(param),
        0x7F => Command::End,
        _ => Command::Ignore,
    }
}

/// Treat the 7-bit parameter as signed.
fn sign_extend_7(param: u8) -> i8 {
    ((param << 1) as i8) >> 1
}

static TME_DIALECT: Dialect = Dialect {
    sentinels: &[0xFFFF],
    legacy_note_words: false,
    map_command,
};

#[cfg(test)]
mod tests {
    use super::*;
    use exo_ir::Note;

    fn cmd(opcode: u8, param: u8) -> u16 {
        0x8000 | ((opcode as u16) << 7) | param as u16
    }

    /// Build a one-pattern TME file whose four channel streams are
    /// given as word slices.
    fn make_tme(streams: [&[u16]; 4]) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(MAGIC);
        data.push(1); // patterns
        data.push(2); // instruments
        data.push(1); // song length
        data.push(0); // restart
        data.push(6); // speed
        data.push(0);
        data.push(0); // position 0

        let mut names = [0u8; NAME_LEN * 2];
        names[..4].copy_from_slice(b"bass");
        data.extend_from_slice(&names);

        let table_at = data.len();
        let anchor = table_at + 4 * 4;
        let mut rel = 0u32;
        for stream in &streams {
            data.extend_from_slice(&rel.to_be_bytes());
            rel += stream.len() as u32 * 2;
        }
        assert_eq!(data.len(), anchor);
        for stream in &streams {
            for w in *stream {
                data.extend_from_slice(&w.to_be_bytes());
            }
        }
        data
    }

    #[test]
    fn detect_requires_a_clean_walk() {
        let data = make_tme([&[0xFFFF], &[0xFFFF], &[0xFFFF], &[0xFFFF]]);
        assert!(Enlightment.detect(&data, None));

        // Same file with a corrupted offset entry.
        let mut bad = data.clone();
        let table_at = HEADER_LEN + 1 + 2 * NAME_LEN;
        bad[table_at..table_at + 4].copy_from_slice(&0x00FF_FFFFu32.to_be_bytes());
        assert!(!Enlightment.detect(&bad, None));

        assert!(!Enlightment.detect(b"TME1", None));
        assert!(!Enlightment.detect(&[], None));
    }

    #[test]
    fn decodes_notes_and_latched_effects() {
        let ch0 = [
            cmd(0x20, 1), // instrument 1
            428,          // note, no advance
            cmd(0x30, 1), // one row down
            cmd(0x10, 5), // latch arpeggio
            cmd(0x30, 2), // two rows carrying it
            0xFFFF,
        ];
        let data = make_tme([&ch0, &[0xFFFF], &[0xFFFF], &[0xFFFF]]);
        let song = Enlightment.decode(&data, Some("tme.intro")).unwrap();

        assert_eq!(song.patterns.len(), 1);
        let pattern = &song.patterns[0];
        assert!(matches!(pattern.cell(0, 0).note, Note::On(_)));
        assert_eq!(pattern.cell(0, 0).instrument, 1);
        assert_eq!(pattern.cell(1, 0).effects[0], Effect::Arpeggio { x: 0, y: 5 });
        assert_eq!(pattern.cell(2, 0).effects[0], Effect::Arpeggio { x: 0, y: 5 });
        assert!(pattern.cell(3, 0).is_empty());

        assert_eq!(song.instruments.len(), 2);
        assert_eq!(song.instruments[0].name.as_str(), "bass");
        assert_eq!(song.instruments[1].name.as_str(), "Sample 2");
        assert_eq!(song.positions, vec![0]);
        assert_eq!(song.initial_speed, 6);
    }

    #[test]
    fn implausible_offset_fails_decode_without_reading() {
        let data = make_tme([&[0xFFFF], &[0xFFFF], &[0xFFFF], &[0xFFFF]]);
        let mut bad = data;
        let table_at = HEADER_LEN + 1 + 2 * NAME_LEN;
        bad[table_at..table_at + 4].copy_from_slice(&0x00FF_FFFFu32.to_be_bytes());
        match Enlightment.decode(&bad, None) {
            Err(FormatError::StructuralMismatch(_)) => {}
            other => panic!("expected StructuralMismatch, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn sign_extension() {
        assert_eq!(sign_extend_7(0x05), 5);
        assert_eq!(sign_extend_7(0x7F), -1);
        assert_eq!(sign_extend_7(0x40), -64);
    }
}
