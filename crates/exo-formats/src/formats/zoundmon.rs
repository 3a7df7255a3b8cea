//! ZoundMon metadata decoder.
//!
//! ZoundMon songs have no magic bytes at all: a five-byte header
//! (table count, part count, play range, speed) followed by sixteen
//! fixed sample records whose audio lives in separate files on the
//! original disks. Full pattern decode is not publicly documented, so
//! this unit deliberately surfaces only what the header states: the
//! named, counted sample slots and the initial speed, over one silent
//! pattern. A degraded mode by design, not a bug.

use exo_ir::{Instrument, Origin, Pattern, Song};

use crate::assemble::assemble;
use crate::reader::Reader;
use crate::registry::FormatUnit;
use crate::FormatError;

const SAMPLE_SLOTS: usize = 16;
/// start(4) + name(40) + vol(1) + length(2) + replen(2) + restart(2) + preset(1)
const SAMPLE_RECORD: usize = 52;
const HEADER_LEN: usize = 5;
/// Parts are 32 rows of one longword per voice.
const PART_ROWS: u16 = 32;
const CHANNELS: u8 = 4;

pub struct ZoundMon;

impl FormatUnit for ZoundMon {
    fn name(&self) -> &'static str {
        "ZoundMon"
    }

    /// No magic to check, so detection is all structure: plausible
    /// header fields, printable sample names, and a file at least as
    /// large as the header's own accounting demands.
    fn detect(&self, data: &[u8], _hint: Option<&str>) -> bool {
        parse_header(data).is_ok()
    }

    fn decode(&self, data: &[u8], hint: Option<&str>) -> Result<Song, FormatError> {
        let header = parse_header(data)?;

        let mut song = Song::new("", CHANNELS);
        song.initial_speed = header.speed;

        for name in header.names.iter().filter(|n| !n.is_empty()) {
            let id = song.instruments.len() as u16 + 1;
            song.instruments.push(Instrument::placeholder(id, name));
        }

        let mut pattern = Pattern::new(0, PART_ROWS, CHANNELS);
        pattern.origin = Origin {
            format: "ZoundMon",
            file: hint.unwrap_or_default().to_string(),
            source_channels: CHANNELS,
            source_patterns: header.max_part as u16 + 1,
            source_instruments: SAMPLE_SLOTS as u16,
        };
        song.patterns.push(pattern);

        assemble(&mut song);
        Ok(song)
    }
}

struct Header {
    max_part: u8,
    speed: u8,
    names: Vec<String>,
}

fn parse_header(data: &[u8]) -> Result<Header, FormatError> {
    let mut r = Reader::new(data);
    let max_table = r.read_u8()?;
    let max_part = r.read_u8()?;
    let load_start = r.read_u8()?;
    let load_end = r.read_u8()?;
    let speed = r.read_u8()?;

    if speed == 0 || speed > 31 || load_start > load_end || load_end > max_table {
        return Err(FormatError::StructuralMismatch(
            "implausible ZoundMon header fields".into(),
        ));
    }

    let mut names = Vec::with_capacity(SAMPLE_SLOTS);
    for _ in 0..SAMPLE_SLOTS {
        r.skip(4)?; // runtime sample pointer, meaningless on disk
        let name_raw = r.read_bytes(40)?;
        if !name_raw.iter().all(|&b| b == 0 || (0x20..0x7F).contains(&b)) {
            return Err(FormatError::StructuralMismatch(
                "sample name contains non-printable bytes".into(),
            ));
        }
        names.push(crate::reader::trim_field(name_raw));
        r.skip(8)?; // vol, length, replen, restart, preset
    }

    // The header promises this much table and part data.
    let table_bytes = (max_table as usize + 1) * CHANNELS as usize * 4;
    let part_bytes = (max_part as usize + 1) * PART_ROWS as usize * 4;
    let expected = HEADER_LEN + SAMPLE_SLOTS * SAMPLE_RECORD + table_bytes + part_bytes;
    if data.len() < expected {
        return Err(FormatError::StructuralMismatch(format!(
            "file of {} bytes cannot hold the declared {} bytes",
            data.len(),
            expected,
        )));
    }

    Ok(Header {
        max_part,
        speed,
        names,
    })
}
