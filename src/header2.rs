use byteorder::{BigEndian, ByteOrder, LittleEndian, WriteBytesExt};
use std::io::prelude::*;

use crate::data_encoding::DataEncoding;
use crate::mseed_error::{MSResult, MSeedError};
use crate::nstime::NsTime;
use crate::source_identifier::Nslc;

/// Size in bytes of the version 2 fixed section of a data header.
pub const FIXED_HEADER2_SIZE: usize = 48;

/// Number of leading bytes needed to decide whether a buffer can be a
/// version 2 header: sequence digits, quality, reserved byte and the
/// BTIME year/day in either byte order.
pub const PROBE2_SIZE: usize = 24;

const BLOCKETTE_1000: u16 = 1000;
const BLOCKETTE_1001: u16 = 1001;

/// Data-quality indicators accepted in header byte 6.
const QUALITIES: [u8; 4] = [b'D', b'R', b'Q', b'M'];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Blockette1000 {
    pub encoding: u8,
    /// 0 little endian, 1 big endian payload word order.
    pub word_order: u8,
    /// Record length as a power-of-two exponent.
    pub record_length_exponent: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Blockette1001 {
    pub timing_quality: u8,
    pub microseconds: i8,
    pub frame_count: u8,
}

/// The fixed section of a version 2 data header plus its parsed
/// blockettes. String codes are space-trimmed.
#[derive(Debug, Clone)]
pub struct Mseed2Header {
    pub sequence_number: u32,
    pub quality: char,
    pub network: String,
    pub station: String,
    pub location: String,
    pub channel: String,
    pub year: u16,
    pub day_of_year: u16,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    /// Tenths of milliseconds within the second.
    pub fract: u16,
    pub num_samples: u16,
    pub rate_factor: i16,
    pub rate_multiplier: i16,
    pub act_flags: u8,
    pub io_flags: u8,
    pub dq_flags: u8,
    pub num_blockettes: u8,
    /// Units of 0.0001 seconds.
    pub time_correction: i32,
    pub data_offset: u16,
    pub blockette_offset: u16,
    pub b1000: Option<Blockette1000>,
    pub b1001: Option<Blockette1001>,
    /// True when the fixed header was stored little endian.
    pub header_swapped: bool,
}

/// True when year/day hold a plausible date in the given byte order.
fn plausible_btime(buffer: &[u8], le: bool) -> bool {
    let year = if le {
        LittleEndian::read_u16(&buffer[20..22])
    } else {
        BigEndian::read_u16(&buffer[20..22])
    };
    let day = if le {
        LittleEndian::read_u16(&buffer[22..24])
    } else {
        BigEndian::read_u16(&buffer[22..24])
    };
    (1900..=2100).contains(&year) && (1..=366).contains(&day)
}

impl Mseed2Header {
    /// True when the buffer starts like a version 2 data header: six
    /// sequence digits, a data quality indicator, a space or NUL, and a
    /// plausible BTIME in one of the two byte orders.
    pub fn probe(buffer: &[u8]) -> bool {
        buffer.len() >= PROBE2_SIZE
            && buffer[0..6].iter().all(|b| b.is_ascii_digit())
            && QUALITIES.contains(&buffer[6])
            && (buffer[7] == b' ' || buffer[7] == 0)
            && (plausible_btime(buffer, false) || plausible_btime(buffer, true))
    }

    /// Parses the fixed header and walks the blockette chain. Returns
    /// `InsufficientBytes` when the chain extends past the buffer.
    pub fn parse(buffer: &[u8]) -> MSResult<Mseed2Header> {
        if buffer.len() < FIXED_HEADER2_SIZE {
            return Err(MSeedError::InsufficientBytes(
                buffer.len(),
                FIXED_HEADER2_SIZE,
            ));
        }
        if !Mseed2Header::probe(buffer) {
            return Err(MSeedError::NotSeed(String::from(
                "not a version 2 data header",
            )));
        }
        let swapped = !plausible_btime(buffer, false);
        let u16_at = |off: usize| -> u16 {
            if swapped {
                LittleEndian::read_u16(&buffer[off..off + 2])
            } else {
                BigEndian::read_u16(&buffer[off..off + 2])
            }
        };
        let sequence_number: u32 = std::str::from_utf8(&buffer[0..6])
            .map_err(|_| MSeedError::NotSeed(String::from("sequence number")))?
            .trim_start_matches('0')
            .parse()
            .unwrap_or(0);
        let code = |range: std::ops::Range<usize>| -> String {
            String::from_utf8_lossy(&buffer[range])
                .trim_matches(|c: char| c == ' ' || c == '\0')
                .to_string()
        };
        let mut header = Mseed2Header {
            sequence_number,
            quality: buffer[6] as char,
            station: code(8..13),
            location: code(13..15),
            channel: code(15..18),
            network: code(18..20),
            year: u16_at(20),
            day_of_year: u16_at(22),
            hour: buffer[24],
            minute: buffer[25],
            second: buffer[26],
            fract: u16_at(28),
            num_samples: u16_at(30),
            rate_factor: u16_at(32) as i16,
            rate_multiplier: u16_at(34) as i16,
            act_flags: buffer[36],
            io_flags: buffer[37],
            dq_flags: buffer[38],
            num_blockettes: buffer[39],
            time_correction: if swapped {
                LittleEndian::read_i32(&buffer[40..44])
            } else {
                BigEndian::read_i32(&buffer[40..44])
            },
            data_offset: u16_at(44),
            blockette_offset: u16_at(46),
            b1000: None,
            b1001: None,
            header_swapped: swapped,
        };

        // follow the blockette chain; offsets must advance
        let mut offset = header.blockette_offset as usize;
        let mut remaining = header.num_blockettes;
        while offset != 0 && remaining > 0 {
            if offset + 4 > buffer.len() {
                return Err(MSeedError::InsufficientBytes(buffer.len(), offset + 4));
            }
            let btype = u16_at(offset);
            let next = u16_at(offset + 2);
            match btype {
                BLOCKETTE_1000 => {
                    if offset + 8 > buffer.len() {
                        return Err(MSeedError::InsufficientBytes(buffer.len(), offset + 8));
                    }
                    header.b1000 = Some(Blockette1000 {
                        encoding: buffer[offset + 4],
                        word_order: buffer[offset + 5],
                        record_length_exponent: buffer[offset + 6],
                    });
                }
                BLOCKETTE_1001 => {
                    if offset + 8 > buffer.len() {
                        return Err(MSeedError::InsufficientBytes(buffer.len(), offset + 8));
                    }
                    header.b1001 = Some(Blockette1001 {
                        timing_quality: buffer[offset + 4],
                        microseconds: buffer[offset + 5] as i8,
                        frame_count: buffer[offset + 7],
                    });
                }
                _ => {}
            }
            if next as usize <= offset {
                break;
            }
            offset = next as usize;
            remaining -= 1;
        }
        Ok(header)
    }

    /// Record length from the required blockette 1000.
    pub fn record_length(&self) -> MSResult<usize> {
        let b1000 = self.b1000.ok_or_else(|| {
            MSeedError::WrongLength(String::from("record has no blockette 1000"))
        })?;
        let exp = b1000.record_length_exponent as u32;
        if !(6..=24).contains(&exp) {
            return Err(MSeedError::WrongLength(format!(
                "record length exponent {} out of range",
                exp
            )));
        }
        Ok(1usize << exp)
    }

    /// Time of the first sample: BTIME plus the microsecond remainder of
    /// blockette 1001 plus any unapplied time correction.
    pub fn start_time(&self) -> MSResult<NsTime> {
        let base = NsTime::from_parts(
            self.year as i32,
            self.day_of_year as u32,
            self.hour as u32,
            self.minute as u32,
            self.second as u32,
            self.fract as u32 * 100_000,
        )?;
        let mut ns = base.as_nanos();
        if let Some(b1001) = self.b1001 {
            ns += b1001.microseconds as i64 * 1_000;
        }
        // activity bit 1 records that the correction is already applied
        if self.act_flags & 0x02 == 0 {
            ns += self.time_correction as i64 * 100_000;
        }
        Ok(NsTime::from_nanos(ns))
    }

    /// Nominal sample rate in Hz from the factor/multiplier pair.
    pub fn sample_rate(&self) -> f64 {
        nominal_sample_rate(self.rate_factor, self.rate_multiplier)
    }

    pub fn encoding(&self) -> MSResult<DataEncoding> {
        let b1000 = self.b1000.ok_or_else(|| {
            MSeedError::WrongLength(String::from("record has no blockette 1000"))
        })?;
        Ok(DataEncoding::from_int(b1000.encoding))
    }
}

/// Sample rate in Hz from the SEED factor/multiplier sign convention.
pub fn nominal_sample_rate(factor: i16, multiplier: i16) -> f64 {
    let f = factor as f64;
    let m = multiplier as f64;
    if factor == 0 || multiplier == 0 {
        return 0.0;
    }
    match (factor > 0, multiplier > 0) {
        (true, true) => f * m,
        (true, false) => -f / m,
        (false, true) => -m / f,
        (false, false) => 1.0 / (f * m),
    }
}

/// Factor/multiplier pair approximating a sample rate (negative values are
/// a period in seconds).
pub fn rate_to_factor_multiplier(sample_rate: f64) -> MSResult<(i16, i16)> {
    if sample_rate == 0.0 {
        return Ok((0, 0));
    }
    let hz = if sample_rate < 0.0 {
        -1.0 / sample_rate
    } else {
        sample_rate
    };
    if hz >= 1.0 {
        if hz.fract() == 0.0 && hz <= 32767.0 {
            return Ok((hz as i16, 1));
        }
        for mult in [10i32, 100, 1000, 10000] {
            let scaled = hz * mult as f64;
            if (scaled - scaled.round()).abs() < 1e-7 && scaled.round() <= 32767.0 {
                return Ok((scaled.round() as i16, -mult as i16));
            }
        }
    } else {
        let period = 1.0 / hz;
        if period.fract() == 0.0 && period <= 32767.0 {
            return Ok((-(period as i16), 1));
        }
        for mult in [10i32, 100, 1000, 10000] {
            let scaled = period * mult as f64;
            if (scaled - scaled.round()).abs() < 1e-7 && scaled.round() <= 32767.0 {
                return Ok((-(scaled.round() as i16), mult as i16));
            }
        }
    }
    Err(MSeedError::Generic(format!(
        "cannot represent sample rate {} as factor/multiplier",
        sample_rate
    )))
}

/// Version 2 record flag translation into the version 3 record flag bits:
/// calibration present, time tag questionable, clock locked.
pub fn flags2_to_flags3(act_flags: u8, io_flags: u8, dq_flags: u8) -> u8 {
    let mut flags = 0u8;
    if act_flags & 0x01 != 0 {
        flags |= 0x01;
    }
    if dq_flags & 0x80 != 0 {
        flags |= 0x02;
    }
    if io_flags & 0x20 != 0 {
        flags |= 0x04;
    }
    flags
}

/// Inverse of [`flags2_to_flags3`]: (activity, io, data quality).
pub fn flags3_to_flags2(flags: u8) -> (u8, u8, u8) {
    let mut act = 0u8;
    let mut io = 0u8;
    let mut dq = 0u8;
    if flags & 0x01 != 0 {
        act |= 0x01;
    }
    if flags & 0x02 != 0 {
        dq |= 0x80;
    }
    if flags & 0x04 != 0 {
        io |= 0x20;
    }
    (act, io, dq)
}

/// Publication version from the data quality indicator.
pub fn quality_to_pub_version(quality: char) -> u8 {
    match quality {
        'R' => 1,
        'D' => 2,
        'Q' => 3,
        'M' => 4,
        _ => 0,
    }
}

/// Data quality indicator from a publication version.
pub fn pub_version_to_quality(pub_version: u8) -> char {
    match pub_version {
        1 => 'R',
        0 | 2 => 'D',
        3 => 'Q',
        _ => 'M',
    }
}

/// Writes a little-endian version 2 fixed header with blockettes 1000 and
/// 1001, returning the data offset. The payload word order advertised in
/// blockette 1000 is big endian for the Steim family, little endian for
/// everything else.
#[allow(clippy::too_many_arguments)]
pub fn write_header2<W: Write>(
    buf: &mut W,
    sequence_number: u32,
    pub_version: u8,
    nslc: &Nslc,
    start: NsTime,
    sample_rate: f64,
    num_samples: u16,
    record_flags: u8,
    encoding: DataEncoding,
    record_length: usize,
    steim_frame_count: u8,
) -> MSResult<u16> {
    if !record_length.is_power_of_two() {
        return Err(MSeedError::Generic(format!(
            "version 2 record length {} is not a power of two",
            record_length
        )));
    }
    let exponent = record_length.trailing_zeros();
    if !(6..=24).contains(&exponent) {
        return Err(MSeedError::Generic(format!(
            "version 2 record length {} out of range",
            record_length
        )));
    }
    let utc = start.to_utc()?;
    use chrono::{Datelike, Timelike};
    let ns_in_sec = utc.nanosecond() % 1_000_000_000;
    let fract = (ns_in_sec / 100_000) as u16;
    let microseconds = ((ns_in_sec % 100_000) / 1_000) as i8;
    let (rate_factor, rate_multiplier) = rate_to_factor_multiplier(sample_rate)?;
    let (act_flags, io_flags, dq_flags) = flags3_to_flags2(record_flags);

    let field = |s: &str, width: usize| -> Vec<u8> {
        let mut v = s.as_bytes().to_vec();
        v.truncate(width);
        v.resize(width, b' ');
        v
    };

    buf.write_all(format!("{:06}", sequence_number % 1_000_000).as_bytes())?;
    buf.write_all(&[pub_version_to_quality(pub_version) as u8, b' '])?;
    buf.write_all(&field(&nslc.station, 5))?;
    buf.write_all(&field(&nslc.location, 2))?;
    buf.write_all(&field(&nslc.channel, 3))?;
    buf.write_all(&field(&nslc.network, 2))?;
    buf.write_u16::<LittleEndian>(utc.year() as u16)?;
    buf.write_u16::<LittleEndian>(utc.ordinal() as u16)?;
    buf.write_all(&[
        utc.hour() as u8,
        utc.minute() as u8,
        (utc.second() + utc.nanosecond() / 1_000_000_000) as u8,
        0,
    ])?;
    buf.write_u16::<LittleEndian>(fract)?;
    buf.write_u16::<LittleEndian>(num_samples)?;
    buf.write_i16::<LittleEndian>(rate_factor)?;
    buf.write_i16::<LittleEndian>(rate_multiplier)?;
    // the written start time already includes any correction
    buf.write_all(&[act_flags | 0x02, io_flags, dq_flags, 2])?;
    buf.write_i32::<LittleEndian>(0)?;
    buf.write_u16::<LittleEndian>(64)?; // data offset
    buf.write_u16::<LittleEndian>(48)?; // first blockette offset

    let word_order = match encoding {
        DataEncoding::STEIM1 | DataEncoding::STEIM2 => 1,
        e if e.is_legacy() => 1,
        _ => 0,
    };
    buf.write_u16::<LittleEndian>(BLOCKETTE_1000)?;
    buf.write_u16::<LittleEndian>(56)?;
    buf.write_all(&[encoding.value(), word_order, exponent as u8, 0])?;

    buf.write_u16::<LittleEndian>(BLOCKETTE_1001)?;
    buf.write_u16::<LittleEndian>(0)?;
    buf.write_all(&[0, microseconds as u8, 0, steim_frame_count])?;

    Ok(64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_big_endian_header() -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(b"000123");
        buf.extend_from_slice(b"D ");
        buf.extend_from_slice(b"TEST ");
        buf.extend_from_slice(b"00");
        buf.extend_from_slice(b"BHZ");
        buf.extend_from_slice(b"XX");
        buf.write_u16::<BigEndian>(2010).unwrap();
        buf.write_u16::<BigEndian>(58).unwrap();
        buf.extend_from_slice(&[6, 50, 0, 0]);
        buf.write_u16::<BigEndian>(695).unwrap(); // 69.5 ms
        buf.write_u16::<BigEndian>(500).unwrap();
        buf.write_i16::<BigEndian>(40).unwrap();
        buf.write_i16::<BigEndian>(1).unwrap();
        buf.extend_from_slice(&[0x02, 0x20, 0x00, 1]);
        buf.write_i32::<BigEndian>(0).unwrap();
        buf.write_u16::<BigEndian>(64).unwrap();
        buf.write_u16::<BigEndian>(48).unwrap();
        // blockette 1000
        buf.write_u16::<BigEndian>(1000).unwrap();
        buf.write_u16::<BigEndian>(0).unwrap();
        buf.extend_from_slice(&[10, 1, 9, 0]);
        buf.resize(64, 0);
        buf
    }

    #[test]
    fn probe_and_parse_big_endian() {
        let buf = build_big_endian_header();
        assert!(Mseed2Header::probe(&buf));
        let header = Mseed2Header::parse(&buf).unwrap();
        assert!(!header.header_swapped);
        assert_eq!(header.sequence_number, 123);
        assert_eq!(header.quality, 'D');
        assert_eq!(header.network, "XX");
        assert_eq!(header.station, "TEST");
        assert_eq!(header.location, "00");
        assert_eq!(header.channel, "BHZ");
        assert_eq!(header.num_samples, 500);
        assert!((header.sample_rate() - 40.0).abs() < f64::EPSILON);
        let b1000 = header.b1000.unwrap();
        assert_eq!(b1000.encoding, 10);
        assert_eq!(b1000.word_order, 1);
        assert_eq!(header.record_length().unwrap(), 512);
        assert_eq!(
            header.start_time().unwrap(),
            NsTime::parse("2010-02-27T06:50:00.0695Z").unwrap()
        );
        assert_eq!(flags2_to_flags3(header.act_flags, header.io_flags, header.dq_flags), 0x04);
    }

    #[test]
    fn parse_swapped_header() {
        let be = build_big_endian_header();
        let mut le = be.clone();
        // swap the multi-byte fixed header fields and blockette fields
        for range in [20..22, 22..24, 28..30, 30..32, 32..34, 34..36, 40..44, 44..46, 46..48, 48..50, 50..52] {
            le[range.clone()].reverse();
        }
        assert!(Mseed2Header::probe(&le));
        let header = Mseed2Header::parse(&le).unwrap();
        assert!(header.header_swapped);
        assert_eq!(header.year, 2010);
        assert_eq!(header.num_samples, 500);
        assert_eq!(header.record_length().unwrap(), 512);
    }

    #[test]
    fn missing_b1000_is_rejected() {
        let mut buf = build_big_endian_header();
        buf[39] = 0; // no blockettes
        buf[46] = 0;
        buf[47] = 0;
        let header = Mseed2Header::parse(&buf).unwrap();
        let err = header.record_length().unwrap_err();
        assert_eq!(err.code(), -3);
    }

    #[test]
    fn time_correction_applied_when_flagged_unapplied() {
        let mut buf = build_big_endian_header();
        buf[36] = 0; // correction not yet applied
        BigEndian::write_i32(&mut buf[40..44], 5000); // 0.5 s
        let header = Mseed2Header::parse(&buf).unwrap();
        assert_eq!(
            header.start_time().unwrap(),
            NsTime::parse("2010-02-27T06:50:00.5695Z").unwrap()
        );
    }

    #[test]
    fn factor_multiplier_round_trips() {
        for rate in [1.0, 40.0, 100.0, 0.1, 0.01, -10.0, 250.5] {
            let (f, m) = rate_to_factor_multiplier(rate).unwrap();
            let hz = if rate < 0.0 { -1.0 / rate } else { rate };
            assert!(
                (nominal_sample_rate(f, m) - hz).abs() < 1e-6,
                "rate {} -> ({}, {})",
                rate,
                f,
                m
            );
        }
        assert_eq!(rate_to_factor_multiplier(0.0).unwrap(), (0, 0));
    }

    #[test]
    fn flag_translation_round_trip() {
        for flags in [0u8, 1, 2, 4, 7] {
            let (a, i, d) = flags3_to_flags2(flags);
            assert_eq!(flags2_to_flags3(a, i, d), flags);
        }
    }

    #[test]
    fn quality_mapping() {
        assert_eq!(quality_to_pub_version('R'), 1);
        assert_eq!(quality_to_pub_version('D'), 2);
        assert_eq!(quality_to_pub_version('Q'), 3);
        assert_eq!(quality_to_pub_version('M'), 4);
        assert_eq!(pub_version_to_quality(1), 'R');
        assert_eq!(pub_version_to_quality(4), 'M');
        assert_eq!(pub_version_to_quality(9), 'M');
    }

    #[test]
    fn write_header2_round_trip() {
        let nslc = Nslc {
            network: String::from("XX"),
            station: String::from("TEST"),
            location: String::new(),
            channel: String::from("BHZ"),
        };
        let start = NsTime::parse("2012-05-12T00:00:00.123456Z").unwrap();
        let mut out = Vec::new();
        let data_offset = write_header2(
            &mut out,
            7,
            1,
            &nslc,
            start,
            40.0,
            1000,
            0x04,
            DataEncoding::STEIM2,
            512,
            7,
        )
        .unwrap();
        assert_eq!(data_offset, 64);
        assert_eq!(out.len(), 64);
        let header = Mseed2Header::parse(&out).unwrap();
        assert!(header.header_swapped);
        assert_eq!(header.quality, 'R');
        assert_eq!(header.station, "TEST");
        assert_eq!(header.channel, "BHZ");
        assert_eq!(header.num_samples, 1000);
        assert_eq!(header.record_length().unwrap(), 512);
        assert_eq!(header.b1001.unwrap().frame_count, 7);
        assert_eq!(header.start_time().unwrap(), start);
        assert!((header.sample_rate() - 40.0).abs() < f64::EPSILON);
        assert_eq!(header.encoding().unwrap(), DataEncoding::STEIM2);
    }
}
