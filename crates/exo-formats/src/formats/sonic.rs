//! Sonic Arranger decoder.
//!
//! The one chunk-chain format decoded natively: after the 8-byte
//! version magic, four tagged size-prefixed chunks follow in fixed
//! order -- song table, instrument records, fixed-grid pattern data,
//! and the raw PCM block. The chunk walk doubles as detection; sample
//! audio is embedded, so this is the decoder that exercises the full
//! sample codec path.

use exo_ir::{Cell, Effect, Instrument, Note, Origin, Pattern, Song, NOTE_COUNT};

use crate::assemble::{assemble, instrument_name};
use crate::reader::{trim_field, Reader};
use crate::registry::FormatUnit;
use crate::sample_codec::encode_sample;
use crate::sections::{ChunkWalker, RawSection};
use crate::FormatError;

const MAGIC: &[u8; 8] = b"SOARV1.0";
const CHANNELS: u8 = 4;
const ROWS: u16 = 64;
const INST_RECORD: usize = 30;
const CELL_BYTES: usize = 4;
/// Amiga PCM playback rate at the reference note.
const SAMPLE_RATE: u32 = 8363;

pub struct SonicArranger;

impl FormatUnit for SonicArranger {
    fn name(&self) -> &'static str {
        "Sonic Arranger"
    }

    fn detect(&self, data: &[u8], _hint: Option<&str>) -> bool {
        walk_chunks(data).is_ok()
    }

    fn decode(&self, data: &[u8], hint: Option<&str>) -> Result<Song, FormatError> {
        let chunks = walk_chunks(data)?;
        let stbl = chunks.stbl.slice(data)?;

        let mut r = Reader::new(stbl);
        let song_length = r.read_u8()? as usize;
        let restart = r.read_u8()?;
        let speed = r.read_u8()?;
        let num_patterns = r.read_u8()? as usize;
        let num_instruments = r.read_u8()? as usize;
        r.skip(1)?;
        let positions = r.read_bytes(song_length)?;

        let mut song = Song::new("", CHANNELS);
        song.initial_speed = speed.max(1);
        song.positions = positions.iter().map(|&p| p as u16).collect();
        song.restart = restart as u16;

        let origin = Origin {
            format: "Sonic Arranger",
            file: hint.unwrap_or_default().to_string(),
            source_channels: CHANNELS,
            source_patterns: num_patterns as u16,
            source_instruments: num_instruments as u16,
        };

        let patt = chunks.patt.slice(data)?;
        let pattern_size = ROWS as usize * CHANNELS as usize * CELL_BYTES;
        for pat_idx in 0..num_patterns {
            let offset = pat_idx * pattern_size;
            if offset + pattern_size > patt.len() {
                return Err(FormatError::StructuralMismatch(format!(
                    "PATT chunk holds {} bytes, pattern {} needs more",
                    patt.len(),
                    pat_idx,
                )));
            }
            let mut pattern = parse_pattern(pat_idx as u16, &patt[offset..offset + pattern_size]);
            pattern.origin = origin.clone();
            song.patterns.push(pattern);
        }

        // Instrument records, then their PCM in the same order.
        let inst = chunks.inst.slice(data)?;
        let smpl = chunks.smpl.slice(data)?;
        if inst.len() < num_instruments * INST_RECORD {
            return Err(FormatError::StructuralMismatch(format!(
                "INST chunk holds {} bytes for {} declared instruments",
                inst.len(),
                num_instruments,
            )));
        }
        let mut ir = Reader::new(inst);
        let mut pcm_offset = 0usize;
        for id in 1..=num_instruments as u16 {
            let name = ir.read_bytes(22)?;
            let volume = ir.read_u8()?;
            ir.skip(1)?;
            let length = ir.read_u16_be()? as usize * 2;
            let loop_start = ir.read_u16_be()? as u32 * 2;
            let loop_len = ir.read_u16_be()? as u32 * 2;

            let instrument = if length > 0 && pcm_offset + length <= smpl.len() {
                let pcm = &smpl[pcm_offset..pcm_offset + length];
                pcm_offset += length;
                let container =
                    encode_sample(name, pcm, SAMPLE_RATE, loop_start, loop_len, volume);
                let mut instrument = Instrument::sampled(id, container);
                if instrument.name.is_empty() {
                    instrument.name = instrument_name("", id);
                }
                instrument
            } else {
                Instrument::placeholder(id, &instrument_name(&trim_field(name), id))
            };
            song.instruments.push(instrument);
        }

        assemble(&mut song);
        Ok(song)
    }
}

struct Chunks {
    stbl: RawSection,
    inst: RawSection,
    patt: RawSection,
    smpl: RawSection,
}

/// Walk the chain, validating magic, tag order and declared sizes
/// against the running budget. Used unchanged by detection.
fn walk_chunks(data: &[u8]) -> Result<Chunks, FormatError> {
    let mut r = Reader::new(data);
    if r.read_bytes(8)? != MAGIC {
        return Err(FormatError::StructuralMismatch("missing SOAR magic".into()));
    }
    let mut walker = ChunkWalker::new(data, 8)?;
    let stbl = walker.expect(b"STBL")?;
    let inst = walker.expect(b"INST")?;
    let patt = walker.expect(b"PATT")?;
    let smpl = walker.expect(b"SMPL")?;
    if stbl.len < 6 {
        return Err(FormatError::StructuralMismatch(
            "STBL chunk shorter than its fixed fields".into(),
        ));
    }
    Ok(Chunks {
        stbl,
        inst,
        patt,
        smpl,
    })
}

fn parse_pattern(id: u16, data: &[u8]) -> Pattern {
    let mut pattern = Pattern::new(id, ROWS, CHANNELS);
    for row in 0..ROWS {
        for ch in 0..CHANNELS {
            let offset = (row as usize * CHANNELS as usize + ch as usize) * CELL_BYTES;
            *pattern.cell_mut(row, ch) = parse_cell(&data[offset..offset + CELL_BYTES]);
        }
    }
    pattern
}

/// Grid cell: note index, instrument, effect, parameter.
fn parse_cell(data: &[u8]) -> Cell {
    let mut cell = Cell::empty();
    cell.note = match data[0] {
        0 => Note::None,
        0xFF => Note::Cut,
        n if n <= NOTE_COUNT => Note::On(n),
        _ => Note::None,
    };
    cell.instrument = data[1];
    cell.push_effect(parse_effect(data[2], data[3]));
    cell
}

fn parse_effect(cmd: u8, param: u8) -> Effect {
    match cmd {
        0x1 => Effect::Arpeggio {
            x: (param >> 4) & 0x0F,
            y: param & 0x0F,
        },
        0x2 => Effect::PortaUp(param),
        0x3 => Effect::PortaDown(param),
        0x4 => Effect::Vibrato {
            speed: (param >> 4) & 0x0F,
            depth: param & 0x0F,
        },
        0x5 => {
            let up = (param >> 4) & 0x0F;
            let down = param & 0x0F;
            Effect::VolumeSlide(if up > 0 { up as i8 } else { -(down as i8) })
        }
        0x6 => Effect::SetVolume(param.min(64)),
        0x7 => Effect::SetSpeed(param.max(1)),
        _ => Effect::None,
    }
}
