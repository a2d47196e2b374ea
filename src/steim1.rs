use crate::mseed_error::{MSResult, MSeedError};
use crate::steim_frame::{fits, frame_nibble, frame_word, SteimFrame, SteimFrameBlock};

// Steim compression scheme copyrighted by Dr. Joseph Steim.
// Reference material in Appendix B of the SEED Reference Manual, 2nd Ed.

/// Decode Steim-1 compressed data containing `num_samples` samples.
/// `swap` indicates the 32-bit frame words are little-endian.
///
/// Each 64-byte frame carries a map word assigning a 2-bit code to the 15
/// data words: `00` no data, `01` four 8-bit differences, `10` two 16-bit
/// differences, `11` one 32-bit difference. Frame 0 data words 1 and 2
/// hold the first sample X0 and last sample Xn; the decoded last sample
/// must equal Xn.
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
                    // frame 0 reserves words 1 and 2 for the integration constants
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
                2 => {
                    diffs.push((word >> 16) as u16 as i16 as i32);
                    diffs.push(word as u16 as i16 as i32);
                }
                3 => {
                    diffs.push(word as i32);
                }
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

/// Encode samples into a Steim-1 frame block of at most `max_frames`
/// 64-byte frames (0 for unlimited). The block may consume fewer samples
/// than given when the frame budget is exhausted; `num_samples` on the
/// returned block reports how many were packed.
pub fn encode(samples: &[i32], max_frames: usize) -> MSResult<SteimFrameBlock> {
    if samples.is_empty() {
        return Err(MSeedError::Compression(String::from(
            "samples array is zero size",
        )));
    }
    // first difference is relative to zero, so it is the sample itself
    let mut diffs = Vec::with_capacity(samples.len());
    diffs.push(samples[0]);
    for pair in samples.windows(2) {
        diffs.push(pair[1].wrapping_sub(pair[0]));
    }

    let mut block = SteimFrameBlock::new(1);
    let mut pos = 0;
    while pos < diffs.len() {
        if max_frames > 0 && block.frames.len() == max_frames {
            break;
        }
        let mut frame = SteimFrame::new();
        // frame 0 reserves the first two data words for X0 and Xn
        let mut widx = if block.frames.is_empty() { 2 } else { 0 };
        while widx < 15 && pos < diffs.len() {
            let rem = &diffs[pos..];
            if rem.len() >= 4 && rem[..4].iter().all(|d| fits(*d, 8)) {
                let word = u32::from_be_bytes([
                    rem[0] as u8,
                    rem[1] as u8,
                    rem[2] as u8,
                    rem[3] as u8,
                ]);
                frame.set_word(word, 1, widx);
                pos += 4;
            } else if rem.len() >= 2 && rem[..2].iter().all(|d| fits(*d, 16)) {
                let word = ((rem[0] as u16 as u32) << 16) | (rem[1] as u16 as u32);
                frame.set_word(word, 2, widx);
                pos += 2;
            } else {
                frame.set_word(rem[0] as u32, 3, widx);
                pos += 1;
            }
            widx += 1;
        }
        block.frames.push(frame);
    }
    block.num_samples = pos;
    block.forward_integration_constant(samples[0]);
    block.reverse_integration_constant(samples[pos - 1]);
    Ok(block)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_frame_layout() {
        let data = [1, -1, -1, -1, 20, -300, 160, -18000];
        let block = encode(&data, 0).unwrap();
        assert_eq!(block.num_samples, data.len());
        let enc = block.encoded_bytes();
        assert_eq!(enc.len(), 64);
        // X0 then Xn
        assert_eq!(&enc[4..8], &1i32.to_be_bytes());
        assert_eq!(&enc[8..12], &(-18000i32).to_be_bytes());
    }

    #[test]
    fn data_round_trip() {
        let data = [1, -1, -1, -1, 200, -300, 16000, -18000, 20000, -40000];
        let block = encode(&data, 0).unwrap();
        assert_eq!(block.num_samples, data.len());
        let rt = decode(&block.encoded_bytes(), data.len(), false).unwrap();
        assert_eq!(rt, data);
    }

    #[test]
    fn round_trip_spanning_frames() {
        let data: Vec<i32> = (0..500).map(|i| (i * 7919) % 100_000 - 50_000).collect();
        let block = encode(&data, 0).unwrap();
        assert_eq!(block.num_samples, data.len());
        let rt = decode(&block.encoded_bytes(), data.len(), false).unwrap();
        assert_eq!(rt, data);
    }

    #[test]
    fn frame_budget_limits_consumption() {
        let data: Vec<i32> = (0..10_000).map(|i| i * 1000).collect();
        let block = encode(&data, 2).unwrap();
        assert_eq!(block.frames.len(), 2);
        assert!(block.num_samples < data.len());
        let consumed = block.num_samples;
        let rt = decode(&block.encoded_bytes(), consumed, false).unwrap();
        assert_eq!(rt, data[..consumed]);
    }

    #[test]
    fn bad_reverse_integration_rejected() {
        let data = [5, 6, 7, 8];
        let block = encode(&data, 0).unwrap();
        let mut enc = block.encoded_bytes();
        // corrupt Xn
        enc[11] ^= 0xFF;
        let err = decode(&enc, data.len(), false).unwrap_err();
        assert_eq!(err.code(), -6);
    }

    #[test]
    fn swapped_words_decode() {
        let data = [12, 13, 15, -2, 1000];
        let block = encode(&data, 0).unwrap();
        let enc = block.encoded_bytes();
        // byte-swap every 32-bit word
        let mut swapped = Vec::with_capacity(enc.len());
        for chunk in enc.chunks(4) {
            swapped.extend(chunk.iter().rev());
        }
        let rt = decode(&swapped, data.len(), true).unwrap();
        assert_eq!(rt, data);
    }

    #[test]
    fn zero_samples() {
        assert!(decode(&[], 0, false).unwrap().is_empty());
        assert!(encode(&[], 0).is_err());
    }
}
