//! Song structure.

use alloc::vec::Vec;
use arrayvec::ArrayString;

use crate::instrument::Instrument;
use crate::pattern::Pattern;

/// How note pitches address the hardware.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PeriodMode {
    /// Linear frequency steps
    Linear,
    /// Logarithmic Amiga period table
    #[default]
    Amiga,
}

/// A complete decoded song.
#[derive(Clone, Debug)]
pub struct Song {
    /// Song title
    pub title: ArrayString<32>,
    /// Play order: indices into `patterns`, may repeat
    pub positions: Vec<u16>,
    /// Position to restart from after the last one
    pub restart: u16,
    /// Global channel count
    pub num_channels: u8,
    /// Initial speed (ticks per row)
    pub initial_speed: u8,
    /// Initial tempo in BPM
    pub initial_tempo: u8,
    /// Period addressing mode
    pub period_mode: PeriodMode,
    /// Patterns in decode order
    pub patterns: Vec<Pattern>,
    /// Instruments in format-native numbering (1-based, contiguous)
    pub instruments: Vec<Instrument>,
}

impl Default for Song {
    fn default() -> Self {
        Self {
            title: ArrayString::new(),
            positions: Vec::new(),
            restart: 0,
            num_channels: 4,
            initial_speed: 6,
            initial_tempo: 125,
            period_mode: PeriodMode::Amiga,
            patterns: Vec::new(),
            instruments: Vec::new(),
        }
    }
}

impl Song {
    /// Create an empty song with a title and channel count.
    pub fn new(title: &str, num_channels: u8) -> Self {
        let mut song = Self::default();
        let _ = song.title.try_push_str(title);
        song.num_channels = num_channels;
        song
    }

    /// Look up the pattern played at a song position.
    pub fn pattern_at(&self, position: usize) -> Option<&Pattern> {
        let idx = *self.positions.get(position)? as usize;
        self.patterns.get(idx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_amiga_conventions() {
        let song = Song::new("untitled", 4);
        assert_eq!(song.initial_speed, 6);
        assert_eq!(song.initial_tempo, 125);
        assert_eq!(song.period_mode, PeriodMode::Amiga);
    }

    #[test]
    fn pattern_at_follows_positions() {
        let mut song = Song::new("t", 4);
        song.patterns.push(Pattern::new(0, 64, 4));
        song.patterns.push(Pattern::new(1, 64, 4));
        song.positions = alloc::vec![1, 0, 1];
        assert_eq!(song.pattern_at(0).unwrap().id, 1);
        assert_eq!(song.pattern_at(2).unwrap().id, 1);
        assert!(song.pattern_at(3).is_none());
    }
}
