//! Format registry and dispatch.

use exo_ir::Song;

use crate::FormatError;

/// One registered format: a detection predicate plus a decoder.
///
/// `detect` must be total: it returns a boolean for any input,
/// including empty buffers, and never panics. Out-of-range reads and
/// structural mismatches during detection mean "not this format".
/// `decode` is only called after the unit's own `detect` accepted the
/// buffer.
pub trait FormatUnit {
    fn name(&self) -> &'static str;
    fn detect(&self, data: &[u8], hint: Option<&str>) -> bool;
    fn decode(&self, data: &[u8], hint: Option<&str>) -> Result<Song, FormatError>;
}

/// Why a dispatch failed.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// No registered detector matched. Lists every unit that was
    /// tried, for diagnosing near-miss detections.
    #[error("unrecognized format; tried {}", .attempted.join(", "))]
    Unrecognized { attempted: Vec<&'static str> },

    /// A detector matched but its decoder failed.
    #[error("{format} decode failed: {source}")]
    Decode {
        format: &'static str,
        #[source]
        source: FormatError,
    },
}

/// Ordered collection of format units. Structural detectors are
/// registered before loose filename-based fallbacks, so the most
/// specific match always wins.
pub struct Registry {
    units: Vec<Box<dyn FormatUnit>>,
}

impl Registry {
    /// An empty registry. Use `Registry::default()` for the built-in
    /// formats.
    pub fn new() -> Self {
        Self { units: Vec::new() }
    }

    pub fn register(&mut self, unit: Box<dyn FormatUnit>) {
        self.units.push(unit);
    }

    /// Try each unit's detector in priority order; the first match is
    /// authoritative and its decode result is final. Structural
    /// detectors are expensive and a false positive almost never
    /// reaches decode, so there is no fall-through after a match.
    pub fn load(&self, data: &[u8], hint: Option<&str>) -> Result<Song, DispatchError> {
        let mut attempted = Vec::with_capacity(self.units.len());
        for unit in &self.units {
            if unit.detect(data, hint) {
                log::debug!("detected {}", unit.name());
                return unit.decode(data, hint).map_err(|source| DispatchError::Decode {
                    format: unit.name(),
                    source,
                });
            }
            attempted.push(unit.name());
        }
        Err(DispatchError::Unrecognized { attempted })
    }

    /// Registered unit names in priority order.
    pub fn unit_names(&self) -> Vec<&'static str> {
        self.units.iter().map(|u| u.name()).collect()
    }
}

impl Default for Registry {
    fn default() -> Self {
        let mut registry = Self::new();
        crate::formats::register_builtin(&mut registry);
        registry
    }
}

/// Case-insensitive filename convention match against the hint's base
/// name. Prefixes are the Amiga convention (`mod.name`); suffixes the
/// DOS one (`name.mod`).
pub(crate) fn hint_matches(hint: Option<&str>, prefixes: &[&str], suffixes: &[&str]) -> bool {
    let Some(hint) = hint else {
        return false;
    };
    let base = hint
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(hint)
        .to_ascii_lowercase();
    prefixes.iter().any(|p| base.starts_with(p)) || suffixes.iter().any(|s| base.ends_with(s))
}
