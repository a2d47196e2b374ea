use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::data_encoding::DataEncoding;
use crate::mseed_error::{MSResult, MSeedError};
use crate::samples::Samples;
use crate::steim1;
use crate::steim2;

/// Decode an encoded payload into samples. `swap` is true when the payload
/// byte order is the reverse of the encoding's natural order (little
/// endian for the integer and float families, big endian for Steim and
/// the legacy formats).
pub fn decode_payload(
    encoding: DataEncoding,
    bytes: &[u8],
    sample_count: usize,
    swap: bool,
) -> MSResult<Samples> {
    match encoding {
        DataEncoding::TEXT => Ok(Samples::Text(bytes.to_vec())),
        DataEncoding::INT16 => {
            let b = checked(bytes, sample_count, 2)?;
            Ok(Samples::Int32(
                b.chunks_exact(2)
                    .map(|c| read_u16(c, swap) as i16 as i32)
                    .collect(),
            ))
        }
        DataEncoding::INT32 => {
            let b = checked(bytes, sample_count, 4)?;
            Ok(Samples::Int32(
                b.chunks_exact(4)
                    .map(|c| read_u32(c, swap) as i32)
                    .collect(),
            ))
        }
        DataEncoding::FLOAT32 => {
            let b = checked(bytes, sample_count, 4)?;
            Ok(Samples::Float32(
                b.chunks_exact(4)
                    .map(|c| f32::from_bits(read_u32(c, swap)))
                    .collect(),
            ))
        }
        DataEncoding::FLOAT64 => {
            let b = checked(bytes, sample_count, 8)?;
            Ok(Samples::Float64(
                b.chunks_exact(8)
                    .map(|c| f64::from_bits(read_u64(c, swap)))
                    .collect(),
            ))
        }
        DataEncoding::STEIM1 => Ok(Samples::Int32(steim1::decode(bytes, sample_count, swap)?)),
        DataEncoding::STEIM2 => Ok(Samples::Int32(steim2::decode(bytes, sample_count, swap)?)),
        DataEncoding::GEOSCOPE24 => {
            let b = checked(bytes, sample_count, 3)?;
            Ok(Samples::Int32(
                b.chunks_exact(3)
                    .map(|c| {
                        let raw = if swap {
                            (c[2] as i32) << 16 | (c[1] as i32) << 8 | c[0] as i32
                        } else {
                            (c[0] as i32) << 16 | (c[1] as i32) << 8 | c[2] as i32
                        };
                        if raw > 0x7F_FFFF {
                            raw - 0x100_0000
                        } else {
                            raw
                        }
                    })
                    .collect(),
            ))
        }
        DataEncoding::GEOSCOPE163 => decode_geoscope16(bytes, sample_count, swap, 0x7000),
        DataEncoding::GEOSCOPE164 => decode_geoscope16(bytes, sample_count, swap, 0xF000),
        DataEncoding::CDSN => {
            let b = checked(bytes, sample_count, 2)?;
            Ok(Samples::Int32(
                b.chunks_exact(2)
                    .map(|c| {
                        let x = read_u16(c, !swap);
                        let mantissa = (x & 0x3FFF) as i32 - 0x2000;
                        let mult = match x >> 14 {
                            0 => 1,
                            1 => 4,
                            2 => 16,
                            _ => 128,
                        };
                        mantissa * mult
                    })
                    .collect(),
            ))
        }
        DataEncoding::SRO => {
            let b = checked(bytes, sample_count, 2)?;
            Ok(Samples::Int32(
                b.chunks_exact(2)
                    .map(|c| {
                        let x = read_u16(c, !swap);
                        let mut mantissa = (x & 0x0FFF) as i32;
                        if mantissa > 0x7FF {
                            mantissa -= 0x1000;
                        }
                        let gain = (x >> 12) as i32 & 0xF;
                        let shift = 10 - gain;
                        if shift >= 0 {
                            mantissa << shift
                        } else {
                            mantissa >> -shift
                        }
                    })
                    .collect(),
            ))
        }
        DataEncoding::DWWSSN => {
            let b = checked(bytes, sample_count, 2)?;
            Ok(Samples::Int32(
                b.chunks_exact(2)
                    .map(|c| read_u16(c, !swap) as i16 as i32)
                    .collect(),
            ))
        }
        DataEncoding::UNKNOWN(v) => Err(MSeedError::UnknownFormat(v)),
    }
}

fn decode_geoscope16(
    bytes: &[u8],
    sample_count: usize,
    swap: bool,
    gain_mask: u16,
) -> MSResult<Samples> {
    let b = checked(bytes, sample_count, 2)?;
    Ok(Samples::Float32(
        b.chunks_exact(2)
            .map(|c| {
                let x = read_u16(c, !swap);
                let mantissa = (x & 0x0FFF) as i32 - 2048;
                let gain = ((x & gain_mask) >> 12) as i32;
                mantissa as f32 / (1 << gain) as f32
            })
            .collect(),
    ))
}

/// Encode samples, consuming at most what fits in `max_bytes`. Returns the
/// encoded bytes and the number of samples consumed. The legacy formats
/// are decode-only.
pub fn encode_payload(
    encoding: DataEncoding,
    samples: &Samples,
    max_bytes: usize,
) -> MSResult<(Vec<u8>, usize)> {
    match encoding {
        DataEncoding::TEXT => {
            let text = expect_text(samples)?;
            let n = text.len().min(max_bytes);
            Ok((text[..n].to_vec(), n))
        }
        DataEncoding::INT16 => {
            let ints = expect_int(samples, encoding)?;
            let n = ints.len().min(max_bytes / 2);
            let mut out = vec![0u8; n * 2];
            for (i, v) in ints[..n].iter().enumerate() {
                if *v > i16::MAX as i32 || *v < i16::MIN as i32 {
                    return Err(MSeedError::Generic(format!(
                        "sample {} out of range for 16-bit encoding",
                        v
                    )));
                }
                LittleEndian::write_i16(&mut out[i * 2..], *v as i16);
            }
            Ok((out, n))
        }
        DataEncoding::INT32 => {
            let ints = expect_int(samples, encoding)?;
            let n = ints.len().min(max_bytes / 4);
            let mut out = vec![0u8; n * 4];
            LittleEndian::write_i32_into(&ints[..n], &mut out);
            Ok((out, n))
        }
        DataEncoding::FLOAT32 => {
            let floats = samples
                .as_float32()
                .ok_or_else(|| sample_type_mismatch(samples, encoding))?;
            let n = floats.len().min(max_bytes / 4);
            let mut out = vec![0u8; n * 4];
            LittleEndian::write_f32_into(&floats[..n], &mut out);
            Ok((out, n))
        }
        DataEncoding::FLOAT64 => {
            let doubles = samples
                .as_float64()
                .ok_or_else(|| sample_type_mismatch(samples, encoding))?;
            let n = doubles.len().min(max_bytes / 8);
            let mut out = vec![0u8; n * 8];
            LittleEndian::write_f64_into(&doubles[..n], &mut out);
            Ok((out, n))
        }
        DataEncoding::STEIM1 => {
            let ints = expect_int(samples, encoding)?;
            if max_bytes < 64 {
                return Ok((Vec::new(), 0));
            }
            let block = steim1::encode(ints, max_bytes / 64)?;
            Ok((block.encoded_bytes(), block.num_samples))
        }
        DataEncoding::STEIM2 => {
            let ints = expect_int(samples, encoding)?;
            if max_bytes < 64 {
                return Ok((Vec::new(), 0));
            }
            let block = steim2::encode(ints, max_bytes / 64)?;
            Ok((block.encoded_bytes(), block.num_samples))
        }
        other => Err(MSeedError::UnknownFormat(other.value())),
    }
}

fn expect_int<'a>(samples: &'a Samples, encoding: DataEncoding) -> MSResult<&'a [i32]> {
    samples
        .as_int32()
        .ok_or_else(|| sample_type_mismatch(samples, encoding))
}

fn expect_text(samples: &Samples) -> MSResult<&[u8]> {
    samples
        .as_text()
        .ok_or_else(|| sample_type_mismatch(samples, DataEncoding::TEXT))
}

fn sample_type_mismatch(samples: &Samples, encoding: DataEncoding) -> MSeedError {
    MSeedError::Generic(format!(
        "sample type `{}` cannot be packed as encoding {}",
        samples.sample_type(),
        encoding.value()
    ))
}

fn checked(bytes: &[u8], sample_count: usize, size: usize) -> MSResult<&[u8]> {
    let needed = sample_count * size;
    if bytes.len() < needed {
        return Err(MSeedError::Generic(format!(
            "truncated payload: {} bytes for {} samples of {} bytes",
            bytes.len(),
            sample_count,
            size
        )));
    }
    Ok(&bytes[..needed])
}

fn read_u16(c: &[u8], swap: bool) -> u16 {
    if swap {
        BigEndian::read_u16(c)
    } else {
        LittleEndian::read_u16(c)
    }
}

fn read_u32(c: &[u8], swap: bool) -> u32 {
    if swap {
        BigEndian::read_u32(c)
    } else {
        LittleEndian::read_u32(c)
    }
}

fn read_u64(c: &[u8], swap: bool) -> u64 {
    if swap {
        BigEndian::read_u64(c)
    } else {
        LittleEndian::read_u64(c)
    }
}
