//! Canonical song model for the exotica format converters.
//!
//! Every legacy-format decoder emits these types; the surrounding
//! sequencer plays and edits them. A decoder builds a `Song` atomically:
//! it either returns a complete, internally consistent song or fails
//! with no partial result observable.
//!
//! Designed to be `no_std` compatible with the `alloc` crate.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod container;
mod instrument;
mod pattern;
mod song;

pub use container::{volume_to_db, SampleContainer, SampleLoop, SILENCE_FLOOR_DB};
pub use instrument::{Instrument, InstrumentKind};
pub use pattern::{
    amiga_pan, Cell, Channel, Effect, Note, Origin, Pattern, PersistentEffect, NOTE_COUNT,
};
pub use song::{PeriodMode, Song};
