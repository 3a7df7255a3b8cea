//! Final song assembly: validation and defaulting only.
//!
//! Runs after a decoder has produced its patterns and instruments.
//! Performs no decoding itself, and the recoveries here are documented
//! degradations, never silent corruption.

use arrayvec::ArrayString;
use exo_ir::{Pattern, Song};

/// Validate a decoded song in place.
///
/// - A song with zero patterns gets one synthesized silent pattern.
/// - Song positions referencing missing patterns are dropped; an empty
///   result falls back to `[0]`.
/// - The restart position is clamped into the position list.
pub fn assemble(song: &mut Song) {
    if song.patterns.is_empty() {
        log::warn!("no resolvable patterns; substituting a silent pattern");
        song.patterns.push(Pattern::new(0, 64, song.num_channels));
    }

    let pattern_count = song.patterns.len() as u16;
    let before = song.positions.len();
    song.positions.retain(|&idx| idx < pattern_count);
    let dropped = before - song.positions.len();
    if dropped > 0 {
        log::debug!("dropped {} out-of-range song positions", dropped);
    }
    if song.positions.is_empty() {
        log::warn!("empty or invalid position list; falling back to [0]");
        song.positions.push(0);
    }

    if song.restart as usize >= song.positions.len() {
        song.restart = 0;
    }
}

/// Instrument display name: the trimmed source name, or a generated
/// placeholder when the source field was blank.
pub(crate) fn instrument_name(raw: &str, id: u16) -> ArrayString<32> {
    let mut name = ArrayString::new();
    if raw.is_empty() {
        let _ = name.try_push_str(&format!("Sample {}", id));
    } else {
        let _ = name.try_push_str(raw);
    }
    name
}
