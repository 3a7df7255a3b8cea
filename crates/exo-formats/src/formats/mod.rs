//! Concrete format units and the built-in registration order.

mod enlightment;
mod musicmaker;
mod protracker;
mod sonic;
mod table;
mod zoundmon;

pub use enlightment::Enlightment;
pub use musicmaker::MusicMaker;
pub use protracker::ProTracker;
pub use sonic::SonicArranger;
pub use zoundmon::ZoundMon;

use crate::registry::Registry;
use table::{TableUnit, HINT_ENTRIES, MAGIC_ENTRIES};

/// Register every built-in unit in priority order: full structural
/// detectors first, then magic-byte entries, then the heuristic
/// ZoundMon sniffer, and the filename-only fallbacks (Tronic last)
/// at the very end.
pub fn register_builtin(registry: &mut Registry) {
    registry.register(Box::new(ProTracker));
    registry.register(Box::new(SonicArranger));
    registry.register(Box::new(Enlightment));
    registry.register(Box::new(MusicMaker));
    for entry in MAGIC_ENTRIES {
        registry.register(Box::new(TableUnit { entry }));
    }
    registry.register(Box::new(ZoundMon));
    for entry in HINT_ENTRIES {
        registry.register(Box::new(TableUnit { entry }));
    }
}
