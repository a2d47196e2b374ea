use crate::mseed_error::{MSResult, MSeedError};
use crate::steim_frame::{fits, frame_nibble, frame_word, sign_extend, SteimFrame, SteimFrameBlock};

// Steim compression scheme copyrighted by Dr. Joseph Steim.
// Reference material in Appendix B of the SEED Reference Manual, 2nd Ed.

/// Decode Steim-2 compressed data containing `num_samples` samples.
/// `swap` indicates the 32-bit frame words are little-endian.
///
/// Type code `01` carries four 8-bit differences as in Steim-1. Codes `10`
/// and `11` consult a further 2-bit discriminator in the word's high bits:
/// `10` selects one 30-bit, two 15-bit or three 10-bit differences, `11`
/// selects five 6-bit, six 5-bit or seven 4-bit differences.
pub fn decode(b: &[u8], num_samples: usize, swap: bool) -> MSResult<Vec<i32>> {
    if num_samples == 0 {
        return Ok(Vec::new());
    }
    if b.is_empty() || b.len() % 64 != 0 {
        return Err(MSeedError::Compression(format!(
            "encoded data length is not a positive multiple of 64 bytes ({})",
            b.len()
        )));
    }
    let mut x0: i32 = 0;
    let mut xn: i32 = 0;
    let mut diffs: Vec<i32> = Vec::with_capacity(num_samples);
    for (fidx, offset) in (0..b.len()).step_by(64).enumerate() {
        let map = frame_word(b, offset, 0, swap);
        for w in 1..16 {
            let word = frame_word(b, offset, w, swap);
            match frame_nibble(map, w) {
                0 => {
                    if fidx == 0 && w == 1 {
                        x0 = word as i32;
                    } else if fidx == 0 && w == 2 {
                        xn = word as i32;
                    }
                }
                1 => {
                    for byte in word.to_be_bytes() {
                        diffs.push(byte as i8 as i32);
                    }
                }
                2 => match word >> 30 {
                    1 => diffs.push(sign_extend(word & 0x3FFF_FFFF, 30)),
                    2 => unpack(word, 2, 15, &mut diffs),
                    3 => unpack(word, 3, 10, &mut diffs),
                    _ => {
                        return Err(MSeedError::Compression(format!(
                            "invalid discriminator 0 for type code 2 in frame {}",
                            fidx
                        )))
                    }
                },
                3 => match word >> 30 {
                    0 => unpack(word, 5, 6, &mut diffs),
                    1 => unpack(word, 6, 5, &mut diffs),
                    2 => unpack(word, 7, 4, &mut diffs),
                    _ => {
                        return Err(MSeedError::Compression(format!(
                            "invalid discriminator 3 for type code 3 in frame {}",
                            fidx
                        )))
                    }
                },
                _ => unreachable!(),
            }
        }
    }
    if diffs.len() < num_samples {
        return Err(MSeedError::Compression(format!(
            "decoded {} differences but expected {} samples",
            diffs.len(),
            num_samples
        )));
    }
    let mut samples = Vec::with_capacity(num_samples);
    samples.push(x0);
    for i in 1..num_samples {
        let next = samples[i - 1].wrapping_add(diffs[i]);
        samples.push(next);
    }
    if samples[num_samples - 1] != xn {
        return Err(MSeedError::Compression(format!(
            "last decoded sample {} does not match reverse integration constant {}",
            samples[num_samples - 1],
            xn
        )));
    }
    Ok(samples)
}

/// Extracts `count` differences of `bits` bits each from the low bits of
/// `word`, most significant field first.
fn unpack(word: u32, count: u32, bits: u32, diffs: &mut Vec<i32>) {
    let mask = (1u32 << bits) - 1;
    for i in 0..count {
        let shift = (count - 1 - i) * bits;
        diffs.push(sign_extend((word >> shift) & mask, bits));
    }
}

/// Encode samples into a Steim-2 frame block of at most `max_frames`
/// 64-byte frames (0 for unlimited). The densest representation holding
/// the next run of differences is chosen for each word. A difference
/// wider than 30 bits cannot be represented and is an error.
pub fn encode(samples: &[i32], max_frames: usize) -> MSResult<SteimFrameBlock> {
    if samples.is_empty() {
        return Err(MSeedError::Compression(String::from(
            "samples array is zero size",
        )));
    }
    let mut diffs = Vec::with_capacity(samples.len());
    diffs.push(samples[0]);
    for pair in samples.windows(2) {
        diffs.push(pair[1].wrapping_sub(pair[0]));
    }

    let mut block = SteimFrameBlock::new(2);
    let mut pos = 0;
    while pos < diffs.len() {
        if max_frames > 0 && block.frames.len() == max_frames {
            break;
        }
        let mut frame = SteimFrame::new();
        let mut widx = if block.frames.is_empty() { 2 } else { 0 };
        while widx < 15 && pos < diffs.len() {
            let rem = &diffs[pos..];
            let all_fit = |n: usize, bits: u32| rem.len() >= n && rem[..n].iter().all(|d| fits(*d, bits));
            let (word, nibble, consumed) = if all_fit(7, 4) {
                (pack(&rem[..7], 4) | 2 << 30, 3, 7)
            } else if all_fit(6, 5) {
                (pack(&rem[..6], 5) | 1 << 30, 3, 6)
            } else if all_fit(5, 6) {
                (pack(&rem[..5], 6), 3, 5)
            } else if all_fit(4, 8) {
                (
                    u32::from_be_bytes([rem[0] as u8, rem[1] as u8, rem[2] as u8, rem[3] as u8]),
                    1,
                    4,
                )
            } else if all_fit(3, 10) {
                (pack(&rem[..3], 10) | 3 << 30, 2, 3)
            } else if all_fit(2, 15) {
                (pack(&rem[..2], 15) | 2 << 30, 2, 2)
            } else if all_fit(1, 30) {
                (pack(&rem[..1], 30) | 1 << 30, 2, 1)
            } else {
                return Err(MSeedError::Compression(format!(
                    "difference {} too large to represent",
                    rem[0]
                )));
            };
            frame.set_word(word, nibble, widx);
            widx += 1;
            pos += consumed;
        }
        block.frames.push(frame);
    }
    block.num_samples = pos;
    block.forward_integration_constant(samples[0]);
    block.reverse_integration_constant(samples[pos - 1]);
    Ok(block)
}

/// Packs differences into the low bits of a word, most significant field
/// first, `bits` bits each.
fn pack(diffs: &[i32], bits: u32) -> u32 {
    let mask = (1u32 << bits) - 1;
    let mut word = 0u32;
    for d in diffs {
        word = (word << bits) | (*d as u32 & mask);
    }
    word
}
