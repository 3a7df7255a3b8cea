//! Music Maker V8 decoder.
//!
//! The oldest stream format in the registry: each pattern is four
//! per-voice streams in the legacy two-word note shape, where the
//! first word carries an immediate row delay and the second the pitch
//! period. A (0, 0) word pair ends a stream. The header embeds the
//! offset table directly after the counts; 20-byte instrument name
//! records sit between the table and the stream data.

use exo_ir::{Effect, Instrument, Origin, Pattern, PersistentEffect, Song};

use crate::assemble::{assemble, instrument_name};
use crate::command_stream::{decode_channel, Command, Dialect};
use crate::reader::Reader;
use crate::registry::FormatUnit;
use crate::sections::{resolve_offset_table, RawSection};
use crate::FormatError;

const MAGIC: &[u8; 4] = b"MMV8";
const HEADER_LEN: usize = 8;
const CHANNELS: u8 = 4;
const ROWS: u16 = 64;
const NAME_LEN: usize = 20;

pub struct MusicMaker;

impl FormatUnit for MusicMaker {
    fn name(&self) -> &'static str {
        "Music Maker V8"
    }

    fn detect(&self, data: &[u8], _hint: Option<&str>) -> bool {
        locate_streams(data).is_ok()
    }

    fn decode(&self, data: &[u8], hint: Option<&str>) -> Result<Song, FormatError> {
        let located = locate_streams(data)?;
        let mut song = Song::new("", CHANNELS);
        song.initial_speed = located.speed.max(1);
        // Patterns play straight through in storage order.
        song.positions = (0..located.num_patterns as u16).collect();

        let origin = Origin {
            format: "Music Maker V8",
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
                    decode_channel(section.slice(data)?, &MMV8_DIALECT, ROWS);
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
    names_at: usize,
    streams: Vec<usize>,
}

fn locate_streams(data: &[u8]) -> Result<Located, FormatError> {
    let mut r = Reader::new(data);
    if r.read_bytes(4)? != MAGIC {
        return Err(FormatError::StructuralMismatch("missing MMV8 magic".into()));
    }
    let num_patterns = r.read_u8()?;
    let num_instruments = r.read_u8()?;
    let speed = r.read_u8()?;
    r.skip(1)?;

    if num_patterns == 0 {
        return Err(FormatError::StructuralMismatch("no patterns declared".into()));
    }

    let table_entries = num_patterns as usize * CHANNELS as usize;
    let names_at = HEADER_LEN + table_entries * 4;
    let anchor = names_at + num_instruments as usize * NAME_LEN;
    let streams = resolve_offset_table(&mut r, table_entries, anchor)?;
    // The name block must actually fit between table and streams.
    Reader::at(data, names_at).skip(num_instruments as usize * NAME_LEN)?;

    Ok(Located {
        num_patterns,
        num_instruments,
        speed,
        names_at,
        streams,
    })
}

fn map_command(opcode: u8, param: u8) -> Command {
    match opcode {
        0x01 => Command::Row(Effect::PortaUp(param)),
        0x02 => Command::Row(Effect::PortaDown(param)),
        0x03 => Command::Row(Effect::SetVolume(param.min(64))),
        // V8 stores ticks per row directly, unlike the later formats.
        0x04 => Command::Row(Effect::SetSpeed(param.max(1))),
        0x13 => Command::Persistent(PersistentEffect::VolumeSlide(((param << 1) as i8) >> 1)),
        0x20 => Command::Instrument(param),
        0x30 => Command::Delay(param),
        0x7F => Command::End,
        _ => Command::Ignore,
    }
}

static MMV8_DIALECT: Dialect = Dialect {
    sentinels: &[],
    legacy_note_words: true,
    map_command,
};

#[cfg(test)]
mod tests {
    use super::*;
    use exo_ir::Note;

    fn cmd(opcode: u8, param: u8) -> u16 {
        0x8000 | ((opcode as u16) << 7) | param as u16
    }

    fn make_mmv8(streams: [&[u16]; 4], num_instruments: u8) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(MAGIC);
        data.push(1); // patterns
        data.push(num_instruments);
        data.push(4); // speed
        data.push(0);

        let names_at = HEADER_LEN + 4 * 4;
        let anchor = names_at + num_instruments as usize * NAME_LEN;
        let mut rel = 0u32;
        for stream in &streams {
            data.extend_from_slice(&rel.to_be_bytes());
            rel += stream.len() as u32 * 2;
        }
        assert_eq!(data.len(), names_at);
        for i in 0..num_instruments {
            let mut record = [0u8; NAME_LEN];
            let name = format!("voice {}", i + 1);
            record[..name.len()].copy_from_slice(name.as_bytes());
            data.extend_from_slice(&record);
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
    fn detect_replays_the_table_walk() {
        let data = make_mmv8([&[0, 0], &[0, 0], &[0, 0], &[0, 0]], 2);
        assert!(MusicMaker.detect(&data, None));
        assert!(!MusicMaker.detect(b"MMV8", None));
        assert!(!MusicMaker.detect(&[], None));
    }

    #[test]
    fn two_word_notes_write_then_advance() {
        let ch0 = [
            cmd(0x20, 3), // instrument 3
            0x0002, 428,  // note at row 0, then +2
            0x0001, 404,  // note at row 2, then +1
            0x0000, 0x0000,
        ];
        let data = make_mmv8([&ch0, &[0, 0], &[0, 0], &[0, 0]], 1);
        let song = MusicMaker.decode(&data, None).unwrap();

        let pattern = &song.patterns[0];
        assert!(matches!(pattern.cell(0, 0).note, Note::On(_)));
        assert_eq!(pattern.cell(0, 0).instrument, 3);
        assert!(pattern.cell(1, 0).is_empty());
        assert!(matches!(pattern.cell(2, 0).note, Note::On(_)));
        assert!(pattern.cell(3, 0).is_empty());

        assert_eq!(song.instruments[0].name.as_str(), "voice 1");
        assert_eq!(song.positions, vec![0]);
        assert_eq!(song.initial_speed, 4);
    }

    #[test]
    fn zero_pair_ends_the_stream_cleanly() {
        let data = make_mmv8([&[0, 0], &[0, 0], &[0, 0], &[0, 0]], 0);
        let song = MusicMaker.decode(&data, None).unwrap();
        assert!(song.patterns[0].is_silent());
        assert!(song.instruments.is_empty());
    }
}
