//! ProTracker MOD decoder.
//!
//! The one format in the registry whose layout is an actual published
//! standard rather than reverse-engineered disassembly: 1084-byte
//! header (20-byte title, 31 sample headers, order table, 4-byte
//! signature at 1080), 64-row patterns of fixed 4-byte note records,
//! sample PCM appended after the patterns. Bit-exact compliance with
//! that layout is mandatory here.

use exo_ir::{Cell, Effect, Instrument, Origin, Pattern, Song};

use crate::assemble::{assemble, instrument_name};
use crate::periods::period_to_note;
use crate::reader::{trim_field, Reader};
use crate::registry::FormatUnit;
use crate::sample_codec::encode_sample;
use crate::FormatError;

const HEADER_LEN: usize = 1084;
const SAMPLE_SLOTS: usize = 31;

pub struct ProTracker;

impl FormatUnit for ProTracker {
    fn name(&self) -> &'static str {
        "ProTracker"
    }

    fn detect(&self, data: &[u8], _hint: Option<&str>) -> bool {
        data.len() >= HEADER_LEN && signature_channels(&data[1080..1084]).is_some()
    }

    fn decode(&self, data: &[u8], hint: Option<&str>) -> Result<Song, FormatError> {
        decode_mod(data, hint)
    }
}

/// Channel count encoded in the 4-character signature.
fn signature_channels(sig: &[u8]) -> Option<u8> {
    match sig {
        b"M.K." | b"M!K!" | b"FLT4" => Some(4),
        b"6CHN" => Some(6),
        b"8CHN" | b"OCTA" => Some(8),
        _ => None,
    }
}

struct SampleHeader {
    name: [u8; 22],
    length: u32,
    finetune: i8,
    volume: u8,
    loop_start: u32,
    loop_len: u32,
}

fn decode_mod(data: &[u8], hint: Option<&str>) -> Result<Song, FormatError> {
    let mut r = Reader::new(data);
    let num_channels = signature_channels(data.get(1080..1084).ok_or(
        FormatError::OutOfRange {
            offset: 1080,
            width: 4,
            len: data.len(),
        },
    )?)
    .ok_or_else(|| FormatError::StructuralMismatch("unknown MOD signature".into()))?;

    let title = r.read_fixed_str(20)?;
    let mut song = Song::new(&title, num_channels);

    let mut headers = Vec::with_capacity(SAMPLE_SLOTS);
    for _ in 0..SAMPLE_SLOTS {
        headers.push(read_sample_header(&mut r)?);
    }

    let song_length = r.read_u8()? as usize;
    let restart = r.read_u8()?;
    let order = r.read_bytes(128)?;
    song.positions = order[..song_length.min(128)]
        .iter()
        .map(|&p| p as u16)
        .collect();
    // 127 in the restart byte is the historical "no restart" filler.
    song.restart = if restart < 127 { restart as u16 } else { 0 };

    // Every pattern up to the highest order entry is stored, whether
    // or not the position list reaches it.
    let max_pattern = order.iter().max().copied().unwrap_or(0) as usize;
    let pattern_size = 64 * num_channels as usize * 4;

    let origin = Origin {
        format: "ProTracker",
        file: hint.unwrap_or_default().to_string(),
        source_channels: num_channels,
        source_patterns: (max_pattern + 1) as u16,
        source_instruments: SAMPLE_SLOTS as u16,
    };

    for pat_idx in 0..=max_pattern {
        let pat_offset = HEADER_LEN + pat_idx * pattern_size;
        if pat_offset + pattern_size > data.len() {
            break;
        }
        let mut pattern = parse_pattern(
            pat_idx as u16,
            &data[pat_offset..pat_offset + pattern_size],
            num_channels,
        );
        pattern.origin = origin.clone();
        song.patterns.push(pattern);
    }

    // Sample PCM follows the stored patterns, in slot order.
    let mut sample_offset = HEADER_LEN + (max_pattern + 1) * pattern_size;
    for (i, header) in headers.iter().enumerate() {
        let id = (i + 1) as u16;
        let len = header.length as usize;
        let inst = if len > 0 && sample_offset + len <= data.len() {
            let pcm = &data[sample_offset..sample_offset + len];
            sample_offset += len;
            let container = encode_sample(
                &header.name,
                pcm,
                finetuned_rate(header.finetune),
                header.loop_start,
                header.loop_len,
                header.volume,
            );
            let mut inst = Instrument::sampled(id, container);
            if inst.name.is_empty() {
                inst.name = instrument_name("", id);
            }
            inst
        } else {
            Instrument::placeholder(id, &instrument_name(&trim_field(&header.name), id))
        };
        song.instruments.push(inst);
    }

    song.initial_tempo = 125;
    song.initial_speed = 6;

    assemble(&mut song);
    Ok(song)
}

/// Parse one 30-byte sample header. Length and loop fields are in
/// 16-bit words; everything doubles into sample units.
fn read_sample_header(r: &mut Reader<'_>) -> Result<SampleHeader, FormatError> {
    let mut name = [0u8; 22];
    name.copy_from_slice(r.read_bytes(22)?);
    let length = r.read_u16_be()? as u32 * 2;
    let finetune_raw = (r.read_u8()? & 0x0F) as i8;
    let finetune = if finetune_raw > 7 {
        finetune_raw - 16
    } else {
        finetune_raw
    };
    let volume = r.read_u8()?.min(64);
    let loop_start = r.read_u16_be()? as u32 * 2;
    let loop_len = r.read_u16_be()? as u32 * 2;
    Ok(SampleHeader {
        name,
        length,
        finetune,
        volume,
        loop_start,
        loop_len,
    })
}

/// Amiga base rate adjusted by finetune: each step is 1/8 semitone.
fn finetuned_rate(finetune: i8) -> u32 {
    const BASE: u32 = 8363;
    if finetune == 0 {
        return BASE;
    }
    let factor = 2.0_f32.powf(finetune as f32 / 96.0);
    (BASE as f32 * factor) as u32
}

fn parse_pattern(id: u16, data: &[u8], num_channels: u8) -> Pattern {
    let mut pattern = Pattern::new(id, 64, num_channels);
    for row in 0..64u16 {
        for ch in 0..num_channels {
            let offset = (row as usize * num_channels as usize + ch as usize) * 4;
            *pattern.cell_mut(row, ch) = parse_cell(&data[offset..offset + 4]);
        }
    }
    pattern
}

/// One 4-byte note record: period and sample number split across
/// nibbles, effect command and parameter in the low bytes.
fn parse_cell(data: &[u8]) -> Cell {
    let period = (((data[0] & 0x0F) as u16) << 8) | data[1] as u16;
    let sample = (data[0] & 0xF0) | ((data[2] & 0xF0) >> 4);
    let effect_cmd = data[2] & 0x0F;
    let effect_param = data[3];

    let mut cell = Cell {
        note: period_to_note(period),
        instrument: sample,
        ..Cell::empty()
    };
    cell.push_effect(parse_effect(effect_cmd, effect_param));
    cell
}

/// ProTracker effect-column translation.
fn parse_effect(cmd: u8, param: u8) -> Effect {
    match cmd {
        0x0 if param != 0 => Effect::Arpeggio {
            x: (param >> 4) & 0x0F,
            y: param & 0x0F,
        },
        0x1 => Effect::PortaUp(param),
        0x2 => Effect::PortaDown(param),
        0x3 => Effect::TonePorta(param),
        0x4 => Effect::Vibrato {
            speed: (param >> 4) & 0x0F,
            depth: param & 0x0F,
        },
        0x5 => Effect::TonePortaVolSlide(param_to_slide(param)),
        0x6 => Effect::VibratoVolSlide(param_to_slide(param)),
        0x7 => Effect::Tremolo {
            speed: (param >> 4) & 0x0F,
            depth: param & 0x0F,
        },
        0x8 => Effect::SetPan(param),
        0x9 => Effect::SampleOffset(param),
        0xA => Effect::VolumeSlide(param_to_slide(param)),
        0xB => Effect::PositionJump(param),
        0xC => Effect::SetVolume(param.min(64)),
        0xD => Effect::PatternBreak(((param >> 4) * 10 + (param & 0x0F)).min(63)),
        0xE => parse_extended_effect(param),
        0xF => {
            if param < 32 {
                Effect::SetSpeed(param)
            } else {
                Effect::SetTempo(param)
            }
        }
        _ => Effect::None,
    }
}

/// Extended effect (Exx).
fn parse_extended_effect(param: u8) -> Effect {
    let cmd = (param >> 4) & 0x0F;
    let val = param & 0x0F;
    match cmd {
        0x0 => Effect::SetFilter(val == 0),
        0x1 => Effect::FinePortaUp(val),
        0x2 => Effect::FinePortaDown(val),
        0x5 => Effect::SetFinetune(if val > 7 { val as i8 - 16 } else { val as i8 }),
        0x6 => Effect::PatternLoop(val),
        0x9 => Effect::RetriggerNote(val),
        0xA => Effect::FineVolumeSlideUp(val),
        0xB => Effect::FineVolumeSlideDown(val),
        0xC => Effect::NoteCut(val),
        0xD => Effect::NoteDelay(val),
        0xE => Effect::PatternDelay(val),
        _ => Effect::None,
    }
}

/// Volume slide parameter: up nibble wins, else down.
fn param_to_slide(param: u8) -> i8 {
    let up = (param >> 4) & 0x0F;
    let down = param & 0x0F;
    if up > 0 {
        up as i8
    } else {
        -(down as i8)
    }
}
