use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::convert::TryFrom;
use std::fmt;
use std::io::{Cursor, Write};

use crate::data_encoding::DataEncoding;
use crate::mseed_error::{MSResult, MSeedError};
use crate::nstime::NsTime;

/// Size in bytes of the version 3 fixed header, before the identifier,
/// extra headers and payload.
pub const FIXED_HEADER_SIZE: usize = 40;

/// Offset of the 4-byte CRC field within the fixed header.
pub const CRC_OFFSET: usize = 28;

/// Number of leading bytes needed to decide whether a buffer can be a
/// version 3 header.
pub const PROBE_SIZE: usize = 15;

/// The fixed section of a version 3 header. Does not contain the
/// identifier, extra headers, or timeseries data.
#[derive(Debug, Clone)]
pub struct Mseed3Header {
    pub flags: u8,
    pub nanosecond: u32,
    pub year: u16,
    pub day_of_year: u16,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub encoding: DataEncoding,
    pub sample_rate_period: f64,
    pub num_samples: u32,
    pub crc: u32,
    pub publication_version: u8,
    pub identifier_length: u8,
    pub extra_headers_length: u16,
    pub data_length: u32,
}

impl Mseed3Header {
    /// First three bytes of a version 3 record: `MS` then the version.
    pub const REC_IND: [u8; 3] = [b'M', b'S', 3];

    /// True when the buffer starts with the record indicator and the
    /// time-of-day bytes hold plausible values (second 60 admits a leap
    /// second). Fifteen bytes suffice; shorter buffers never match.
    pub fn probe(buffer: &[u8]) -> bool {
        buffer.len() >= PROBE_SIZE
            && buffer[0..3] == Mseed3Header::REC_IND
            && buffer[12] <= 23
            && buffer[13] <= 59
            && buffer[14] <= 60
    }

    /// The size of the whole record, including identifier, extra headers
    /// and data, as described by the length fields.
    pub fn record_size(&self) -> usize {
        FIXED_HEADER_SIZE
            + self.identifier_length as usize
            + self.extra_headers_length as usize
            + self.data_length as usize
    }

    /// Time of the first sample.
    pub fn start_time(&self) -> MSResult<NsTime> {
        NsTime::from_parts(
            self.year as i32,
            self.day_of_year as u32,
            self.hour as u32,
            self.minute as u32,
            self.second as u32,
            self.nanosecond,
        )
    }

    /// Sets the start-time fields from a time scalar.
    pub fn set_start_time(&mut self, start: NsTime) -> MSResult<()> {
        let utc = start.to_utc()?;
        use chrono::{Datelike, Timelike};
        // chrono expresses a leap second as nanosecond overflow
        self.nanosecond = utc.nanosecond() % 1_000_000_000;
        self.year = utc.year() as u16;
        self.day_of_year = utc.ordinal() as u16;
        self.hour = utc.hour() as u8;
        self.minute = utc.minute() as u8;
        self.second = (utc.second() + utc.nanosecond() / 1_000_000_000) as u8;
        Ok(())
    }

    /// Sample rate in Hz; negative header values are a period in seconds.
    pub fn sample_rate_hertz(&self) -> f64 {
        if self.sample_rate_period < 0.0 {
            -1.0 / self.sample_rate_period
        } else {
            self.sample_rate_period
        }
    }

    /// Writes the 40-byte fixed header.
    pub fn write_to<W: Write>(&self, buf: &mut W) -> MSResult<()> {
        buf.write_all(&Mseed3Header::REC_IND)?;
        buf.write_u8(self.flags)?;
        buf.write_u32::<LittleEndian>(self.nanosecond)?;
        buf.write_u16::<LittleEndian>(self.year)?;
        buf.write_u16::<LittleEndian>(self.day_of_year)?;
        buf.write_u8(self.hour)?;
        buf.write_u8(self.minute)?;
        buf.write_u8(self.second)?;
        buf.write_u8(self.encoding.value())?;
        buf.write_f64::<LittleEndian>(self.sample_rate_period)?;
        buf.write_u32::<LittleEndian>(self.num_samples)?;
        buf.write_u32::<LittleEndian>(self.crc)?;
        buf.write_u8(self.publication_version)?;
        buf.write_u8(self.identifier_length)?;
        buf.write_u16::<LittleEndian>(self.extra_headers_length)?;
        buf.write_u32::<LittleEndian>(self.data_length)?;
        Ok(())
    }

    pub fn crc_hex_string(&self) -> String {
        format!("{:#X}", self.crc)
    }
}

impl TryFrom<&[u8]> for Mseed3Header {
    type Error = MSeedError;

    fn try_from(buffer: &[u8]) -> MSResult<Self> {
        if buffer.len() < FIXED_HEADER_SIZE {
            return Err(MSeedError::InsufficientBytes(
                buffer.len(),
                FIXED_HEADER_SIZE,
            ));
        }
        if buffer[0..2] != Mseed3Header::REC_IND[0..2] {
            return Err(MSeedError::NotSeed(format!(
                "record indicator `{}{}`",
                buffer[0] as char, buffer[1] as char
            )));
        }
        if buffer[2] != 3 {
            return Err(MSeedError::NotSeed(format!(
                "format version {} is not 3",
                buffer[2]
            )));
        }
        let mut cursor = Cursor::new(&buffer[..FIXED_HEADER_SIZE]);
        cursor.set_position(3);
        Ok(Mseed3Header {
            flags: cursor.read_u8()?,
            nanosecond: cursor.read_u32::<LittleEndian>()?,
            year: cursor.read_u16::<LittleEndian>()?,
            day_of_year: cursor.read_u16::<LittleEndian>()?,
            hour: cursor.read_u8()?,
            minute: cursor.read_u8()?,
            second: cursor.read_u8()?,
            encoding: DataEncoding::from_int(cursor.read_u8()?),
            sample_rate_period: cursor.read_f64::<LittleEndian>()?,
            num_samples: cursor.read_u32::<LittleEndian>()?,
            crc: cursor.read_u32::<LittleEndian>()?,
            publication_version: cursor.read_u8()?,
            identifier_length: cursor.read_u8()?,
            extra_headers_length: cursor.read_u16::<LittleEndian>()?,
            data_length: cursor.read_u32::<LittleEndian>()?,
        })
    }
}

impl fmt::Display for Mseed3Header {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let start = match self.start_time() {
            Ok(t) => t.to_string(),
            Err(_) => String::from("(invalid start)"),
        };
        writeln!(
            f,
            "format 3, publication {}, {} bytes",
            self.publication_version,
            self.record_size()
        )?;
        writeln!(
            f,
            "  {} samples at {} Hz from {}",
            self.num_samples,
            self.sample_rate_hertz(),
            start
        )?;
        writeln!(
            f,
            "  crc {}, flags {:#010b}",
            self.crc_hex_string(),
            self.flags
        )?;
        write!(
            f,
            "  lengths: identifier {}, extra headers {}, payload {}; encoding {} (val {})",
            self.identifier_length,
            self.extra_headers_length,
            self.data_length,
            self.encoding,
            self.encoding.value()
        )
    }
}
