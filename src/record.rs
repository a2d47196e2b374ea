use bitflags::bitflags;
use crc::{Crc, CRC_32_ISCSI};
use std::convert::TryFrom;
use std::fmt;
use std::sync::Arc;

use crate::data_encoding::DataEncoding;
use crate::extra_headers::ExtraHeaders;
use crate::header::{Mseed3Header, CRC_OFFSET, FIXED_HEADER_SIZE};
use crate::header2::{self, Mseed2Header};
use crate::mseed_error::{MSResult, MSeedError};
use crate::nstime::{LeapSecondList, NsTime};
use crate::payload::decode_payload;
use crate::samples::Samples;
use crate::source_identifier::{SourceId, MAX_SID_LENGTH};
use crate::ControlFlags;

/// CRC-32C (Castagnoli), the checksum protecting version 3 records.
pub const CASTAGNOLI: Crc<u32> = Crc::<u32>::new(&CRC_32_ISCSI);

/// Smallest possible record: a bare version 3 fixed header.
pub const MIN_RECORD_LENGTH: usize = FIXED_HEADER_SIZE;

/// Largest accepted record, 10 MiB.
pub const MAX_RECORD_LENGTH: usize = 10_485_760;

bitflags! {
    /// Byte orders observed while parsing, relative to each section's
    /// natural order.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SwapFlags: u8 {
        /// The fixed header was stored in the non-native byte order.
        const HEADER_SWAPPED = 0b0000_0001;
        /// The payload byte order is the reverse of its encoding's
        /// natural order.
        const PAYLOAD_SWAPPED = 0b0000_0010;
    }
}

/// Outcome of attempting to parse one record from a buffer: either a
/// complete record, or the number of additional bytes required before the
/// attempt can succeed.
#[derive(Debug)]
pub enum ParseOutcome {
    Complete(Record),
    MoreBytes(usize),
}

/// The canonical in-memory form of one miniSEED record, either format
/// version.
#[derive(Debug, Clone)]
pub struct Record {
    /// FDSN source identifier, at most 64 bytes.
    pub sid: String,
    /// 2 or 3.
    pub format_version: u8,
    /// Record activity flag bits.
    pub flags: u8,
    pub swap_flags: SwapFlags,
    /// Time of the first sample.
    pub start_time: NsTime,
    /// Samples per second; negative values are a period in seconds.
    pub sample_rate: f64,
    pub encoding: DataEncoding,
    pub pub_version: u8,
    pub sample_count: i64,
    /// CRC-32C of the record, version 3 only.
    pub crc: u32,
    pub extra_headers: ExtraHeaders,
    /// Encoded data payload.
    pub payload: Vec<u8>,
    /// Decoded samples, present after unpacking.
    pub samples: Option<Samples>,
    /// The original record bytes, retained for repacking and record lists.
    pub raw: Option<Arc<[u8]>>,
    /// Offset of the payload within the raw record bytes.
    pub data_offset: usize,
    pub record_length: usize,
}

impl Record {
    /// A skeleton record for packing: everything else defaults to unset.
    pub fn template(sid: &str, start_time: NsTime, sample_rate: f64, encoding: DataEncoding) -> Record {
        Record {
            sid: sid.to_string(),
            format_version: 3,
            flags: 0,
            swap_flags: SwapFlags::empty(),
            start_time,
            sample_rate,
            encoding,
            pub_version: 1,
            sample_count: 0,
            crc: 0,
            extra_headers: ExtraHeaders::new(),
            payload: Vec::new(),
            samples: None,
            raw: None,
            data_offset: 0,
            record_length: 0,
        }
    }

    /// Attempts to parse one record from the start of `buf`. A too-short
    /// buffer yields `MoreBytes`; input that cannot be a record yields
    /// `NotSeed`. `MSF_VALIDATECRC` checks the version 3 CRC and
    /// `MSF_UNPACKDATA` decodes the payload.
    pub fn parse(buf: &[u8], flags: ControlFlags) -> MSResult<ParseOutcome> {
        if buf.len() < MIN_RECORD_LENGTH {
            return Ok(ParseOutcome::MoreBytes(MIN_RECORD_LENGTH - buf.len()));
        }
        if Mseed3Header::probe(buf) {
            Record::parse3(buf, flags)
        } else if Mseed2Header::probe(buf) {
            Record::parse2(buf, flags)
        } else {
            Err(MSeedError::NotSeed(String::from(
                "no record header at buffer start",
            )))
        }
    }

    fn parse3(buf: &[u8], flags: ControlFlags) -> MSResult<ParseOutcome> {
        let header = Mseed3Header::try_from(buf)?;
        let record_length = header.record_size();
        if !(MIN_RECORD_LENGTH..=MAX_RECORD_LENGTH).contains(&record_length) {
            return Err(MSeedError::OutOfRange(
                record_length,
                MIN_RECORD_LENGTH,
                MAX_RECORD_LENGTH,
            ));
        }
        if buf.len() < record_length {
            return Ok(ParseOutcome::MoreBytes(record_length - buf.len()));
        }
        let rec = &buf[..record_length];
        if flags.contains(ControlFlags::MSF_VALIDATECRC) {
            let calc = crc32c_with_zeroed_crc(rec);
            if calc != header.crc {
                return Err(MSeedError::CrcInvalid(calc, header.crc));
            }
        }
        let id_end = FIXED_HEADER_SIZE + header.identifier_length as usize;
        let sid = String::from_utf8(rec[FIXED_HEADER_SIZE..id_end].to_vec())?;
        if sid.len() > MAX_SID_LENGTH || !sid.is_ascii() {
            return Err(MSeedError::SourceIdentifier(sid, String::from("length")));
        }
        let eh_end = id_end + header.extra_headers_length as usize;
        let extra_headers = if header.extra_headers_length > 2 {
            ExtraHeaders::from(String::from_utf8(rec[id_end..eh_end].to_vec())?)
        } else {
            ExtraHeaders::new()
        };
        let mut record = Record {
            sid,
            format_version: 3,
            flags: header.flags,
            swap_flags: SwapFlags::empty(),
            start_time: header.start_time()?,
            sample_rate: header.sample_rate_period,
            encoding: header.encoding,
            pub_version: header.publication_version,
            sample_count: header.num_samples as i64,
            crc: header.crc,
            extra_headers,
            payload: rec[eh_end..].to_vec(),
            samples: None,
            raw: Some(Arc::from(rec)),
            data_offset: eh_end,
            record_length,
        };
        if flags.contains(ControlFlags::MSF_UNPACKDATA) {
            record.decode_samples()?;
        }
        Ok(ParseOutcome::Complete(record))
    }

    fn parse2(buf: &[u8], flags: ControlFlags) -> MSResult<ParseOutcome> {
        let header = match Mseed2Header::parse(buf) {
            Ok(h) => h,
            Err(MSeedError::InsufficientBytes(have, need)) => {
                return Ok(ParseOutcome::MoreBytes(need - have))
            }
            Err(e) => return Err(e),
        };
        let record_length = header.record_length()?;
        if !(MIN_RECORD_LENGTH..=MAX_RECORD_LENGTH).contains(&record_length) {
            return Err(MSeedError::OutOfRange(
                record_length,
                MIN_RECORD_LENGTH,
                MAX_RECORD_LENGTH,
            ));
        }
        if buf.len() < record_length {
            return Ok(ParseOutcome::MoreBytes(record_length - buf.len()));
        }
        let rec = &buf[..record_length];
        let encoding = header.encoding()?;
        let sid = SourceId::from_nslc(
            &header.network,
            &header.station,
            &header.location,
            &header.channel,
        )?
        .to_string();
        let word_order_big = header.b1000.map(|b| b.word_order != 0).unwrap_or(true);
        let payload_swapped = match encoding {
            DataEncoding::STEIM1 | DataEncoding::STEIM2 => !word_order_big,
            e if e.is_legacy() => !word_order_big,
            DataEncoding::TEXT => false,
            _ => word_order_big,
        };
        let mut swap_flags = SwapFlags::empty();
        if header.header_swapped {
            swap_flags |= SwapFlags::HEADER_SWAPPED;
        }
        if payload_swapped {
            swap_flags |= SwapFlags::PAYLOAD_SWAPPED;
        }
        let data_offset = header.data_offset as usize;
        if data_offset < header2::FIXED_HEADER2_SIZE || data_offset > record_length {
            return Err(MSeedError::WrongLength(format!(
                "data offset {} outside record",
                data_offset
            )));
        }
        let mut record = Record {
            sid,
            format_version: 2,
            flags: header2::flags2_to_flags3(header.act_flags, header.io_flags, header.dq_flags),
            swap_flags,
            start_time: header.start_time()?,
            sample_rate: header.sample_rate(),
            encoding,
            pub_version: header2::quality_to_pub_version(header.quality),
            sample_count: header.num_samples as i64,
            crc: 0,
            extra_headers: ExtraHeaders::new(),
            payload: rec[data_offset..].to_vec(),
            samples: None,
            raw: Some(Arc::from(rec)),
            data_offset,
            record_length,
        };
        if flags.contains(ControlFlags::MSF_UNPACKDATA) {
            record.decode_samples()?;
        }
        Ok(ParseOutcome::Complete(record))
    }

    /// Sample rate in Hz; negative stored values are a period in seconds.
    pub fn sample_rate_hertz(&self) -> f64 {
        if self.sample_rate < 0.0 {
            -1.0 / self.sample_rate
        } else {
            self.sample_rate
        }
    }

    /// Time of the last sample.
    pub fn end_time(&self) -> NsTime {
        if self.sample_count <= 0 {
            return self.start_time;
        }
        self.start_time
            .sample_time(self.sample_count - 1, self.sample_rate)
    }

    /// Time of the last sample, stretched by any leap seconds the record
    /// spans.
    pub fn end_time_with_leap(&self, leap: &LeapSecondList) -> NsTime {
        let end = self.end_time();
        let count = leap.count_in(self.start_time, end) as i64;
        NsTime::from_nanos(end.as_nanos() + count * 1_000_000_000)
    }

    /// Decodes the payload into samples, verifying the decoded count
    /// matches the header sample count.
    pub fn decode_samples(&mut self) -> MSResult<usize> {
        let samples = decode_payload(
            self.encoding,
            &self.payload,
            self.sample_count.max(0) as usize,
            self.swap_flags.contains(SwapFlags::PAYLOAD_SWAPPED),
        )?;
        let n = samples.len();
        if n as i64 != self.sample_count {
            return Err(MSeedError::DataLength(
                self.payload.len(),
                self.sample_count,
                self.encoding.value(),
                n,
            ));
        }
        self.samples = Some(samples);
        Ok(n)
    }

    /// Location `(offset, length)` of the encoded payload within the raw
    /// record bytes.
    pub fn data_bounds(&self) -> MSResult<(usize, usize)> {
        let raw = self
            .raw
            .as_ref()
            .ok_or_else(|| MSeedError::Generic(String::from("record has no raw bytes")))?;
        if self.data_offset > raw.len() {
            return Err(MSeedError::WrongLength(format!(
                "data offset {} outside raw record of {} bytes",
                self.data_offset,
                raw.len()
            )));
        }
        Ok((self.data_offset, raw.len() - self.data_offset))
    }

    /// Serializes as a version 3 record from the in-memory fields and the
    /// encoded payload, recomputing lengths and the CRC. The CRC field of
    /// the record is updated to the computed value.
    pub fn pack_v3(&mut self) -> MSResult<Vec<u8>> {
        let payload = std::mem::take(&mut self.payload);
        let out = self.assemble_v3(&payload);
        self.payload = payload;
        out
    }

    /// Rebuilds a version 3 record reusing the payload bytes of the
    /// original raw record, recomputing the CRC. Useful for converting
    /// format versions or updating header fields without re-encoding.
    pub fn repack_v3(&mut self) -> MSResult<Vec<u8>> {
        let (offset, length) = self.data_bounds()?;
        let raw = self.raw.as_ref().unwrap().clone();
        self.assemble_v3(&raw[offset..offset + length])
    }

    fn assemble_v3(&mut self, payload: &[u8]) -> MSResult<Vec<u8>> {
        let id_bytes = self.sid.as_bytes();
        if id_bytes.len() > MAX_SID_LENGTH {
            return Err(MSeedError::SourceIdentifier(
                self.sid.clone(),
                String::from("length"),
            ));
        }
        let eh_string = self.extra_headers.to_json_string();
        let eh_bytes = if eh_string.len() > 2 {
            eh_string.as_bytes()
        } else {
            &[]
        };
        if eh_bytes.len() > u16::MAX as usize {
            return Err(MSeedError::ExtraHeader(format!(
                "extra headers of {} bytes exceed the field limit",
                eh_bytes.len()
            )));
        }
        let start = self.start_time;
        let mut header = Mseed3Header {
            flags: self.flags,
            nanosecond: 0,
            year: 0,
            day_of_year: 0,
            hour: 0,
            minute: 0,
            second: 0,
            encoding: self.encoding,
            sample_rate_period: self.sample_rate,
            num_samples: u32::try_from(self.sample_count.max(0))
                .map_err(|_| MSeedError::Generic(String::from("sample count overflow")))?,
            crc: 0,
            publication_version: self.pub_version,
            identifier_length: id_bytes.len() as u8,
            extra_headers_length: eh_bytes.len() as u16,
            data_length: payload.len() as u32,
        };
        header.set_start_time(start)?;
        let record_length = header.record_size();
        if record_length > MAX_RECORD_LENGTH {
            return Err(MSeedError::OutOfRange(
                record_length,
                MIN_RECORD_LENGTH,
                MAX_RECORD_LENGTH,
            ));
        }
        let mut out = Vec::with_capacity(record_length);
        header.write_to(&mut out)?;
        out.extend_from_slice(id_bytes);
        out.extend_from_slice(eh_bytes);
        out.extend_from_slice(payload);
        let crc = CASTAGNOLI.checksum(&out);
        out[CRC_OFFSET..CRC_OFFSET + 4].copy_from_slice(&crc.to_le_bytes());
        self.crc = crc;
        self.record_length = record_length;
        Ok(out)
    }

    pub fn crc_hex_string(&self) -> String {
        format!("{:#X}", self.crc)
    }
}

/// CRC-32C of a record image with the CRC field bytes treated as zero.
pub fn crc32c_with_zeroed_crc(rec: &[u8]) -> u32 {
    let mut digest = CASTAGNOLI.digest();
    digest.update(&rec[..CRC_OFFSET]);
    digest.update(&[0u8; 4]);
    digest.update(&rec[CRC_OFFSET + 4..]);
    digest.finalize()
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(
            f,
            "{} (format {}, publication {}, {} bytes)",
            self.sid, self.format_version, self.pub_version, self.record_length
        )?;
        writeln!(
            f,
            "  {} samples at {} Hz from {}",
            self.sample_count,
            self.sample_rate_hertz(),
            self.start_time
        )?;
        if self.format_version == 3 {
            writeln!(f, "  crc {}, flags {:#010b}", self.crc_hex_string(), self.flags)?;
        } else {
            writeln!(f, "  flags {:#010b}", self.flags)?;
        }
        write!(
            f,
            "  {} payload bytes, encoding {} (val {})",
            self.payload.len(),
            self.encoding,
            self.encoding.value()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::encode_payload;

    fn test_record(samples: &[i32]) -> Record {
        let mut rec = Record::template(
            "FDSN:XX_TEST__L_H_Z",
            NsTime::parse("2012-01-01T00:00:00Z").unwrap(),
            1.0,
            DataEncoding::INT32,
        );
        let s = Samples::Int32(samples.to_vec());
        let (payload, n) = encode_payload(DataEncoding::INT32, &s, MAX_RECORD_LENGTH).unwrap();
        rec.payload = payload;
        rec.sample_count = n as i64;
        rec.samples = Some(s);
        rec
    }

    #[test]
    fn pack_parse_round_trip() {
        let mut rec = test_record(&[0, -1, 2, -3, 4, -5]);
        let bytes = rec.pack_v3().unwrap();
        assert_eq!(bytes.len(), rec.record_length);
        let flags = ControlFlags::MSF_VALIDATECRC | ControlFlags::MSF_UNPACKDATA;
        let parsed = match Record::parse(&bytes, flags).unwrap() {
            ParseOutcome::Complete(r) => r,
            ParseOutcome::MoreBytes(n) => panic!("needed {} more bytes", n),
        };
        assert_eq!(parsed.sid, rec.sid);
        assert_eq!(parsed.format_version, 3);
        assert_eq!(parsed.start_time, rec.start_time);
        assert_eq!(parsed.sample_count, 6);
        assert_eq!(parsed.crc, rec.crc);
        assert_eq!(
            parsed.samples.as_ref().unwrap().as_int32().unwrap(),
            &[0, -1, 2, -3, 4, -5]
        );
    }

    #[test]
    fn parse_then_repack_is_identical() {
        let mut rec = test_record(&[5, 10, 15, 20]);
        let bytes = rec.pack_v3().unwrap();
        let mut parsed = match Record::parse(&bytes, ControlFlags::empty()).unwrap() {
            ParseOutcome::Complete(r) => r,
            _ => panic!("expected complete record"),
        };
        let repacked = parsed.repack_v3().unwrap();
        assert_eq!(repacked, bytes);
    }

    #[test]
    fn crc_validation_detects_corruption() {
        let mut rec = test_record(&[1, 2, 3]);
        let mut bytes = rec.pack_v3().unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        let err = Record::parse(&bytes, ControlFlags::MSF_VALIDATECRC).unwrap_err();
        assert_eq!(err.code(), -7);
        // without validation the corruption goes unnoticed at parse time
        assert!(matches!(
            Record::parse(&bytes, ControlFlags::empty()).unwrap(),
            ParseOutcome::Complete(_)
        ));
    }

    #[test]
    fn short_buffer_asks_for_more() {
        let mut rec = test_record(&[1, 2, 3]);
        let bytes = rec.pack_v3().unwrap();
        match Record::parse(&bytes[..10], ControlFlags::empty()).unwrap() {
            ParseOutcome::MoreBytes(n) => assert_eq!(n, MIN_RECORD_LENGTH - 10),
            _ => panic!("expected a byte hint"),
        }
        match Record::parse(&bytes[..50], ControlFlags::empty()).unwrap() {
            ParseOutcome::MoreBytes(n) => assert_eq!(n, bytes.len() - 50),
            _ => panic!("expected a byte hint"),
        }
    }

    #[test]
    fn garbage_is_not_seed() {
        let garbage = [0x55u8; 64];
        let err = Record::parse(&garbage, ControlFlags::empty()).unwrap_err();
        assert_eq!(err.code(), -2);
    }

    #[test]
    fn end_time_from_rate_and_period() {
        let mut rec = test_record(&[0; 10]);
        rec.sample_count = 10;
        assert_eq!(
            rec.end_time(),
            NsTime::parse("2012-01-01T00:00:09Z").unwrap()
        );
        rec.sample_rate = -10.0; // 0.1 Hz
        assert_eq!(
            rec.end_time(),
            NsTime::parse("2012-01-01T00:01:30Z").unwrap()
        );
    }

    #[test]
    fn end_time_spanning_leap_second() {
        let leap = LeapSecondList::from_instants(vec![NsTime::parse("2017-01-01T00:00:00Z")
            .unwrap()]);
        let mut rec = test_record(&[0; 10]);
        rec.start_time = NsTime::parse("2016-12-31T23:59:55Z").unwrap();
        rec.sample_count = 10;
        assert_eq!(
            rec.end_time_with_leap(&leap),
            NsTime::parse("2017-01-01T00:00:05Z").unwrap()
        );
    }

    #[test]
    fn data_bounds_locates_payload() {
        let mut rec = test_record(&[7, 8, 9]);
        let bytes = rec.pack_v3().unwrap();
        let parsed = match Record::parse(&bytes, ControlFlags::empty()).unwrap() {
            ParseOutcome::Complete(r) => r,
            _ => panic!("expected complete record"),
        };
        let (offset, length) = parsed.data_bounds().unwrap();
        assert_eq!(offset, FIXED_HEADER_SIZE + parsed.sid.len());
        assert_eq!(length, 12);
        assert_eq!(&bytes[offset..offset + length], &parsed.payload[..]);
    }

    #[test]
    fn extra_headers_survive_round_trip() {
        let mut rec = test_record(&[1]);
        rec.extra_headers.set("/FDSN/Time/Quality", 77).unwrap();
        let bytes = rec.pack_v3().unwrap();
        let mut parsed = match Record::parse(&bytes, ControlFlags::MSF_VALIDATECRC).unwrap() {
            ParseOutcome::Complete(r) => r,
            _ => panic!("expected complete record"),
        };
        assert_eq!(
            parsed.extra_headers.get_int("/FDSN/Time/Quality").unwrap(),
            Some(77)
        );
    }
}
