//! Instrument types.

use arrayvec::ArrayString;

use crate::container::SampleContainer;

/// What an instrument is backed by.
#[derive(Clone, Debug)]
pub enum InstrumentKind {
    /// No decodable audio was available; a synthesized stand-in.
    Placeholder,
    /// PCM-derived audio with loop metadata.
    Sampled(SampleContainer),
}

/// An instrument definition. Ids are 1-based and contiguous within a
/// song, matching the source format's own numbering.
#[derive(Clone, Debug)]
pub struct Instrument {
    /// 1-based identifier, unique within the song
    pub id: u16,
    /// Display name
    pub name: ArrayString<32>,
    /// Placeholder or sampled audio
    pub kind: InstrumentKind,
}

impl Instrument {
    /// Create a placeholder instrument.
    pub fn placeholder(id: u16, name: &str) -> Self {
        let mut inst_name = ArrayString::new();
        let _ = inst_name.try_push_str(name);
        Self {
            id,
            name: inst_name,
            kind: InstrumentKind::Placeholder,
        }
    }

    /// Create a sampled instrument. The container's own name is used
    /// for display.
    pub fn sampled(id: u16, container: SampleContainer) -> Self {
        Self {
            id,
            name: container.name,
            kind: InstrumentKind::Sampled(container),
        }
    }

    /// Returns true if the instrument carries playable audio.
    pub fn has_audio(&self) -> bool {
        matches!(&self.kind, InstrumentKind::Sampled(c) if !c.is_empty())
    }
}
