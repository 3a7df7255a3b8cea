//! Signed 8-bit chip PCM to 16-bit sample container encoding.

use arrayvec::ArrayString;
use exo_ir::{volume_to_db, SampleContainer, SampleLoop};

use crate::periods::PERIOD_BASE_NOTE;
use crate::reader::trim_field;

/// Loop lengths of 0-2 source units are legacy "no loop" placeholders,
/// not real loops.
const MIN_LOOP_LEN: u32 = 3;

/// Encode a block of signed 8-bit PCM into a playable container.
///
/// Frame count is preserved exactly; each source sample scales by 256.
/// `loop_start` and `loop_len` are in source sample units and translate
/// 1:1 into output frames (the 8-to-16-bit expansion widens frames, it
/// does not add any). The loop end is clamped to the actual frame
/// count, as real-world rips routinely declare loops past the data.
pub fn encode_sample(
    name: &[u8],
    pcm: &[u8],
    sample_rate: u32,
    loop_start: u32,
    loop_len: u32,
    volume: u8,
) -> SampleContainer {
    let frames: Vec<i16> = pcm.iter().map(|&b| (b as i8 as i16) * 256).collect();

    let looping = if loop_len >= MIN_LOOP_LEN {
        let end = loop_start
            .saturating_add(loop_len)
            .min(frames.len() as u32);
        (loop_start < end).then_some(SampleLoop {
            start: loop_start,
            end,
        })
    } else {
        None
    };

    let mut trimmed = ArrayString::new();
    let _ = trimmed.try_push_str(&trim_field(name));

    SampleContainer {
        name: trimmed,
        frames,
        sample_rate,
        looping,
        base_note: PERIOD_BASE_NOTE,
        volume_db: volume_to_db(volume),
    }
}
