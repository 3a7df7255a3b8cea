//! Legacy tracker format decoders for exotica.
//!
//! Converts 1980s-90s Amiga/DOS music-tracker files into the canonical
//! song model in `exo-ir`. The pipeline is a registry of (detect,
//! decode) units over an immutable byte buffer: detection is a total
//! predicate, decoding either returns a complete `Song` or a typed
//! failure. Three decode tiers exist by design: full native decode,
//! metadata-only placeholder, and explicit delegation to an external
//! player engine.
//!
//! The whole crate is single-threaded and CPU-bound; decoders never
//! mutate the input buffer and hold no resources across calls.

mod assemble;
mod command_stream;
pub mod formats;
mod periods;
mod reader;
mod registry;
mod sample_codec;
mod sections;

pub use assemble::assemble;
pub use command_stream::{decode_channel, Command, Dialect};
pub use periods::{period_to_note, AMIGA_PERIODS, PERIOD_BASE_NOTE};
pub use reader::Reader;
pub use registry::{DispatchError, FormatUnit, Registry};
pub use sample_codec::encode_sample;
pub use sections::{resolve_offset_table, ChunkWalker, RawSection, MAX_SECTION_OFFSET};

use exo_ir::Song;

/// Error type for a single format's decode attempt.
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    /// A field read would exceed the buffer. Fatal to the current
    /// decode attempt, never to the whole pipeline.
    #[error("read of {width} bytes at offset {offset} exceeds buffer of {len} bytes")]
    OutOfRange {
        offset: usize,
        width: usize,
        len: usize,
    },

    /// A validated field is inconsistent with the format's invariants:
    /// an implausible section offset, a non-matching chunk tag, a
    /// sanity bound exceeded.
    #[error("structural mismatch: {0}")]
    StructuralMismatch(String),

    /// Format recognized, but decoding is intentionally deferred to an
    /// external player engine. This is a routing signal, not a defect
    /// in the file.
    #[error("{0} modules must be handled by the external player engine")]
    DelegationRequired(&'static str),
}

impl FormatError {
    /// Structural failure for an offset beyond the plausibility ceiling.
    pub(crate) fn implausible_offset(offset: usize) -> Self {
        FormatError::StructuralMismatch(format!("implausible section offset {:#x}", offset))
    }

    /// Structural failure for an unexpected chunk tag.
    pub(crate) fn bad_tag(expected: &[u8; 4], got: &[u8]) -> Self {
        FormatError::StructuralMismatch(format!(
            "expected chunk tag {:?}, found {:?}",
            String::from_utf8_lossy(expected),
            String::from_utf8_lossy(got),
        ))
    }
}

/// Decode a file against the default format registry.
///
/// `hint` is the original file name, used only as a detection hint,
/// never as a trust signal that bypasses structural validation.
pub fn load_song(data: &[u8], hint: Option<&str>) -> Result<Song, DispatchError> {
    Registry::default().load(data, hint)
}
