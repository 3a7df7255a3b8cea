//! Playable sample containers produced by the sample codec.

use alloc::vec::Vec;
use arrayvec::ArrayString;

/// Decibel floor used for a linear volume of zero.
pub const SILENCE_FLOOR_DB: f32 = -60.0;

/// Loop points in output-frame units.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SampleLoop {
    /// First frame of the loop
    pub start: u32,
    /// One past the last frame of the loop
    pub end: u32,
}

/// A loss-free 16-bit rendition of a chip PCM block.
///
/// Built once by the sample codec; owns its frames, never borrows from
/// the source buffer.
#[derive(Clone, Debug)]
pub struct SampleContainer {
    /// Sample name, trimmed of terminators and whitespace
    pub name: ArrayString<32>,
    /// 16-bit signed frames (8-bit source scaled by 256)
    pub frames: Vec<i16>,
    /// Playback rate in Hz, stamped as given by the decoder
    pub sample_rate: u32,
    /// Loop points, present only for real loops (source length > 2)
    pub looping: Option<SampleLoop>,
    /// Chromatic note the playback rate is pinned to
    pub base_note: u8,
    /// Volume in decibels, converted from the source's 0-64 scale
    pub volume_db: f32,
}

impl SampleContainer {
    /// Number of output frames.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Returns true if the container has no frames.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// Convert a 0-64 linear volume to decibels: `20·log10(v/64)`.
///
/// Zero maps to the silence floor instead of negative infinity.
pub fn volume_to_db(volume: u8) -> f32 {
    if volume == 0 {
        return SILENCE_FLOOR_DB;
    }
    let linear = volume.min(64) as f32 / 64.0;
    let db = 20.0 * libm::log10f(linear);
    db.max(SILENCE_FLOOR_DB)
}
