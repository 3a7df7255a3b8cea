//! Data-driven format entries.
//!
//! Dozens of formats in the wild need nothing beyond a fixed-offset
//! magic comparison or a filename convention before being routed to
//! the external player engine, or surfaced as a placeholder song with
//! whatever the header names. Writing a module per format would be
//! dozens of near-identical functions; here they are rows in a table
//! feeding one generic unit.

use exo_ir::{Instrument, Origin, Pattern, Song};

use crate::assemble::{assemble, instrument_name};
use crate::reader::Reader;
use crate::registry::{hint_matches, FormatUnit};
use crate::FormatError;

/// Where a metadata-only entry's instrument names live: `count` fixed
/// records of `record_len` bytes starting at `names_at`, name in the
/// first `name_len` bytes of each.
pub(crate) struct InstrumentTable {
    pub count: usize,
    pub names_at: usize,
    pub record_len: usize,
    pub name_len: usize,
}

pub(crate) enum Tier {
    /// Emit header metadata over a silent pattern.
    MetadataOnly(Option<InstrumentTable>),
    /// Recognized, but decoding belongs to the external player engine.
    Delegated,
}

pub(crate) struct TableEntry {
    pub name: &'static str,
    /// Required bytes at `magic_offset`; empty = filename-only entry.
    pub magic: &'static [u8],
    pub magic_offset: usize,
    pub prefixes: &'static [&'static str],
    pub suffixes: &'static [&'static str],
    pub channels: u8,
    pub tier: Tier,
}

/// Entries with real magic bytes; detection is content-based, the
/// filename is only a bonus.
pub(crate) static MAGIC_ENTRIES: &[TableEntry] = &[
    TableEntry {
        name: "TFMX",
        magic: b"TFMX-SONG",
        magic_offset: 0,
        prefixes: &["tfmx.", "mdat."],
        suffixes: &[],
        channels: 4,
        tier: Tier::Delegated,
    },
    TableEntry {
        name: "Hippel COSO",
        magic: b"COSO",
        magic_offset: 0,
        prefixes: &["hipc."],
        suffixes: &[],
        channels: 4,
        tier: Tier::Delegated,
    },
    TableEntry {
        name: "SoundMon",
        magic: b"BPSM",
        magic_offset: 26,
        prefixes: &["bp."],
        suffixes: &[],
        channels: 4,
        tier: Tier::MetadataOnly(Some(InstrumentTable {
            count: 15,
            names_at: 32,
            record_len: 32,
            name_len: 24,
        })),
    },
    TableEntry {
        name: "Future Composer",
        magic: b"FC14",
        magic_offset: 0,
        prefixes: &["fc.", "fc14."],
        suffixes: &[],
        channels: 4,
        tier: Tier::Delegated,
    },
    TableEntry {
        name: "Future Composer 1.3",
        magic: b"SMOD",
        magic_offset: 0,
        prefixes: &["fc13."],
        suffixes: &[],
        channels: 4,
        tier: Tier::Delegated,
    },
    TableEntry {
        name: "MusicLine",
        magic: b"MLEDMODL",
        magic_offset: 0,
        prefixes: &["ml."],
        suffixes: &[],
        channels: 4,
        tier: Tier::Delegated,
    },
    TableEntry {
        name: "OctaMED",
        magic: b"MMD0",
        magic_offset: 0,
        prefixes: &["med.", "mmd0."],
        suffixes: &[],
        channels: 8,
        tier: Tier::Delegated,
    },
    TableEntry {
        name: "OctaMED MMD1",
        magic: b"MMD1",
        magic_offset: 0,
        prefixes: &["mmd1."],
        suffixes: &[],
        channels: 8,
        tier: Tier::Delegated,
    },
    TableEntry {
        name: "Hively Tracker",
        magic: b"HVL",
        magic_offset: 0,
        prefixes: &[],
        suffixes: &[".hvl"],
        channels: 8,
        tier: Tier::Delegated,
    },
    TableEntry {
        name: "AHX",
        magic: b"THX",
        magic_offset: 0,
        prefixes: &[],
        suffixes: &[".ahx"],
        channels: 4,
        tier: Tier::Delegated,
    },
    TableEntry {
        name: "Digital Mugician",
        magic: b" MUGICIAN/SOFTEYES ",
        magic_offset: 0,
        prefixes: &["dmu."],
        suffixes: &[],
        channels: 4,
        tier: Tier::Delegated,
    },
    TableEntry {
        name: "AMOS Music Bank",
        magic: b"AmBk",
        magic_offset: 0,
        prefixes: &[],
        suffixes: &[".abk"],
        channels: 4,
        tier: Tier::Delegated,
    },
];

/// Filename-only fallbacks for formats with no reliable magic. These
/// are deliberately the loosest detectors in the registry and are
/// ordered after everything content-based. Tronic stays last of all:
/// it matches any non-empty buffer once the filename says so, and must
/// never be given the chance to shadow a real detector.
pub(crate) static HINT_ENTRIES: &[TableEntry] = &[
    TableEntry {
        name: "Jochen Hippel ST",
        magic: b"",
        magic_offset: 0,
        prefixes: &["hot.", "hst."],
        suffixes: &[],
        channels: 4,
        tier: Tier::Delegated,
    },
    TableEntry {
        name: "Jeroen Tel",
        magic: b"",
        magic_offset: 0,
        prefixes: &["jt.", "mon."],
        suffixes: &[],
        channels: 4,
        tier: Tier::Delegated,
    },
    TableEntry {
        name: "Rob Hubbard",
        magic: b"",
        magic_offset: 0,
        prefixes: &["rh.", "rho."],
        suffixes: &[],
        channels: 4,
        tier: Tier::Delegated,
    },
    TableEntry {
        name: "David Whittaker",
        magic: b"",
        magic_offset: 0,
        prefixes: &["dw."],
        suffixes: &[],
        channels: 4,
        tier: Tier::Delegated,
    },
    TableEntry {
        name: "Fred Editor",
        magic: b"",
        magic_offset: 0,
        prefixes: &["fred."],
        suffixes: &[],
        channels: 4,
        tier: Tier::Delegated,
    },
    TableEntry {
        name: "SidMon",
        magic: b"",
        magic_offset: 0,
        prefixes: &["sid1.", "sid2.", "smn."],
        suffixes: &[],
        channels: 4,
        tier: Tier::Delegated,
    },
    TableEntry {
        name: "Tronic",
        magic: b"",
        magic_offset: 0,
        prefixes: &["tronic."],
        suffixes: &[".tronic"],
        channels: 4,
        tier: Tier::Delegated,
    },
];

/// The generic unit a table entry instantiates.
pub(crate) struct TableUnit {
    pub entry: &'static TableEntry,
}

impl FormatUnit for TableUnit {
    fn name(&self) -> &'static str {
        self.entry.name
    }

    fn detect(&self, data: &[u8], hint: Option<&str>) -> bool {
        if data.is_empty() {
            return false;
        }
        if !self.entry.magic.is_empty() {
            let start = self.entry.magic_offset;
            let end = start + self.entry.magic.len();
            if data.len() >= end && &data[start..end] == self.entry.magic {
                return true;
            }
        }
        hint_matches(hint, self.entry.prefixes, self.entry.suffixes)
    }

    fn decode(&self, data: &[u8], hint: Option<&str>) -> Result<Song, FormatError> {
        match &self.entry.tier {
            Tier::Delegated => Err(FormatError::DelegationRequired(self.entry.name)),
            Tier::MetadataOnly(instruments) => {
                Ok(placeholder_song(self.entry, instruments.as_ref(), data, hint))
            }
        }
    }
}

/// Emit the honest degraded form: correctly named, correctly counted
/// placeholder instruments over one silent pattern.
fn placeholder_song(
    entry: &'static TableEntry,
    instruments: Option<&InstrumentTable>,
    data: &[u8],
    hint: Option<&str>,
) -> Song {
    let mut song = Song::new("", entry.channels);

    let mut source_instruments = 0u16;
    if let Some(table) = instruments {
        source_instruments = table.count as u16;
        for i in 0..table.count {
            let mut r = Reader::at(data, table.names_at + i * table.record_len);
            let raw = match r.read_fixed_str(table.name_len) {
                Ok(s) => s,
                Err(_) => break, // short file: surface what fits
            };
            let id = (i + 1) as u16;
            song.instruments
                .push(Instrument::placeholder(id, &instrument_name(&raw, id)));
        }
    }

    let mut pattern = Pattern::new(0, 64, entry.channels);
    pattern.origin = Origin {
        format: entry.name,
        file: hint.unwrap_or_default().to_string(),
        source_channels: entry.channels,
        source_patterns: 0,
        source_instruments,
    };
    song.patterns.push(pattern);

    assemble(&mut song);
    song
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(name: &str) -> TableUnit {
        let entry = MAGIC_ENTRIES
            .iter()
            .chain(HINT_ENTRIES)
            .find(|e| e.name == name)
            .unwrap();
        TableUnit { entry }
    }

    #[test]
    fn magic_entry_matches_on_bytes_alone() {
        let u = unit("TFMX");
        let mut data = b"TFMX-SONG".to_vec();
        data.extend_from_slice(&[0; 32]);
        assert!(u.detect(&data, None));
        assert!(!u.detect(b"TFMX-SON", None)); // short of the magic
        assert!(u.detect(&[1, 2, 3], Some("mdat.title"))); // filename rescue
        assert!(!u.detect(&[], Some("mdat.title"))); // but never empty
    }

    #[test]
    fn offset_magic_is_bounds_checked() {
        let u = unit("SoundMon");
        let mut data = vec![0u8; 30];
        data[26..30].copy_from_slice(b"BPSM");
        assert!(u.detect(&data, None));
        assert!(!u.detect(&data[..20], None));
    }

    #[test]
    fn delegated_decode_is_a_routing_signal() {
        let u = unit("TFMX");
        match u.decode(b"TFMX-SONG", None) {
            Err(FormatError::DelegationRequired(name)) => assert_eq!(name, "TFMX"),
            other => panic!("expected DelegationRequired, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn metadata_tier_surfaces_named_placeholders() {
        let u = unit("SoundMon");
        let mut data = vec![0u8; 32 + 15 * 32];
        data[26..30].copy_from_slice(b"BPSM");
        data[32..37].copy_from_slice(b"piano");
        let song = u.decode(&data, Some("bp.tune")).unwrap();

        assert_eq!(song.instruments.len(), 15);
        assert_eq!(song.instruments[0].name.as_str(), "piano");
        assert_eq!(song.instruments[1].name.as_str(), "Sample 2");
        assert_eq!(song.patterns.len(), 1);
        assert!(song.patterns[0].is_silent());
        assert_eq!(song.patterns[0].origin.source_instruments, 15);
    }

    #[test]
    fn metadata_tier_tolerates_short_files() {
        let u = unit("SoundMon");
        // Magic present but the name table is cut short.
        let mut data = vec![0u8; 32 + 40];
        data[26..30].copy_from_slice(b"BPSM");
        let song = u.decode(&data, None).unwrap();
        assert_eq!(song.instruments.len(), 1);
    }

    #[test]
    fn tronic_requires_the_filename_convention() {
        let u = unit("Tronic");
        assert!(u.detect(&[1, 2, 3], Some("tronic.theme")));
        assert!(u.detect(&[1, 2, 3], Some("theme.tronic")));
        assert!(!u.detect(&[1, 2, 3], Some("theme.mod")));
        assert!(!u.detect(&[1, 2, 3], None));
        assert!(!u.detect(&[], Some("tronic.theme")));
    }
}
