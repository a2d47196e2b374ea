use lazy_static::lazy_static;
use regex::Regex;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::mseed_error::{MSResult, MSeedError};
use crate::record::{ParseOutcome, Record, MAX_RECORD_LENGTH, MIN_RECORD_LENGTH};
use crate::selection::Selections;
use crate::trace_list::RecordLocator;
use crate::ControlFlags;

/// Initial capacity of the read buffer; it grows on demand up to
/// [`MAX_RECORD_LENGTH`].
const READ_CHUNK: usize = 128 * 1024;

lazy_static! {
    // trailing @start-end with both bounds optional, up to 20 digits each
    static ref RANGE_SUFFIX_REGEX: Regex = Regex::new(r"^(.*)@(\d{0,20})-(\d{0,20})$").unwrap();
}

/// Splits a `path@start-end` byte-range suffix off a pathname. Returns the
/// bare path and the optional bounds.
pub fn parse_range_suffix(path: &str) -> (String, Option<u64>, Option<u64>) {
    if let Some(cap) = RANGE_SUFFIX_REGEX.captures(path) {
        let start = cap[2].parse::<u64>().ok();
        let end = cap[3].parse::<u64>().ok();
        if start.is_some() || end.is_some() {
            return (cap[1].to_string(), start, end);
        }
    }
    (path.to_string(), None, None)
}

/// An incremental reader extracting records from a byte source.
///
/// Records are pulled with [`MSReader::next_record`] or through the
/// `Iterator` implementation. Partial reads are retried, non-record bytes
/// are skipped when `MSF_SKIPNOTDATA` is set, and an optional selection
/// list filters records before they are surfaced.
///
/// ```no_run
/// use mseedio::{ControlFlags, MSReader};
///
/// let mut reader = MSReader::open("data.mseed3", ControlFlags::MSF_UNPACKDATA).unwrap();
/// while let Some(rec) = reader.next() {
///     let rec = rec.unwrap();
///     println!("{}", rec);
/// }
/// ```
pub struct MSReader<R: Read> {
    source: Option<R>,
    path: Option<PathBuf>,
    end_offset: Option<u64>,
    /// Input offset of the byte at `buf[read_offset]`.
    stream_position: u64,
    buf: Vec<u8>,
    read_offset: usize,
    /// Total buffered bytes a pending parse needs before retrying.
    need_total: usize,
    at_eof: bool,
    record_count: u64,
    skipped_bytes: u64,
    last_record_offset: Option<u64>,
    flags: ControlFlags,
    selections: Option<Selections>,
}

impl MSReader<File> {
    /// Opens a file for reading. With `MSF_PNAMERANGE`, a trailing
    /// `@start-end` on the pathname selects a byte range.
    pub fn open<P: AsRef<str>>(path: P, flags: ControlFlags) -> MSResult<MSReader<File>> {
        let path_str: &str = path.as_ref();
        let (path, start, end) = if flags.contains(ControlFlags::MSF_PNAMERANGE) {
            parse_range_suffix(path_str)
        } else {
            (path_str.to_string(), None, None)
        };
        let mut file = File::open(&path)?;
        let start = start.unwrap_or(0);
        if start > 0 {
            file.seek(SeekFrom::Start(start))?;
        }
        let mut reader = MSReader::from_source(file, flags);
        reader.path = Some(PathBuf::from(path));
        reader.stream_position = start;
        reader.end_offset = end;
        Ok(reader)
    }
}

impl<R: Read> MSReader<R> {
    /// Wraps any byte source positioned at the first record.
    pub fn from_source(source: R, flags: ControlFlags) -> MSReader<R> {
        MSReader {
            source: Some(source),
            path: None,
            end_offset: None,
            stream_position: 0,
            buf: Vec::with_capacity(READ_CHUNK),
            read_offset: 0,
            need_total: 0,
            at_eof: false,
            record_count: 0,
            skipped_bytes: 0,
            last_record_offset: None,
            flags,
            selections: None,
        }
    }

    /// Filters surfaced records against a selection list. Records that do
    /// not match are consumed silently.
    pub fn set_selections(&mut self, selections: Option<Selections>) {
        self.selections = selections;
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Input offset of the most recently returned record.
    pub fn last_record_offset(&self) -> Option<u64> {
        self.last_record_offset
    }

    /// Number of records returned so far.
    pub fn record_count(&self) -> u64 {
        self.record_count
    }

    /// A locator for the most recently returned record, preferring the
    /// file position when the reader was opened from a path.
    pub fn locator_for_last(&self, record: &Record) -> Option<RecordLocator> {
        if let (Some(path), Some(offset)) = (&self.path, self.last_record_offset) {
            return Some(RecordLocator::File {
                path: path.clone(),
                offset,
            });
        }
        record.raw.as_ref().map(|raw| RecordLocator::Memory(raw.clone()))
    }

    /// Closes the input and releases the buffer. Subsequent calls return
    /// end-of-input.
    pub fn close(&mut self) {
        self.source = None;
        self.buf = Vec::new();
        self.read_offset = 0;
        self.at_eof = true;
    }

    fn buffered(&self) -> usize {
        self.buf.len() - self.read_offset
    }

    /// Shifts out consumed bytes and reads one chunk from the source.
    fn fill(&mut self) -> MSResult<()> {
        if self.read_offset > 0 && self.buffered() > 0 {
            self.buf.drain(..self.read_offset);
            self.read_offset = 0;
        } else if self.read_offset > 0 {
            self.buf.clear();
            self.read_offset = 0;
        }
        let mut want = MAX_RECORD_LENGTH.saturating_sub(self.buf.len()).min(READ_CHUNK);
        if let Some(end) = self.end_offset {
            let range_left =
                end.saturating_sub(self.stream_position + self.buf.len() as u64) as usize;
            if range_left < want {
                want = range_left;
                if want == 0 {
                    // the byte range is exhausted
                    self.at_eof = true;
                    return Ok(());
                }
            }
        }
        if want == 0 {
            // buffer already holds a full maximum-length record
            return Ok(());
        }
        let source = self
            .source
            .as_mut()
            .ok_or_else(|| MSeedError::Generic(String::from("reader is closed")))?;
        let mut chunk = vec![0u8; want];
        let n = source.read(&mut chunk)?;
        if n == 0 {
            self.at_eof = true;
        } else {
            self.buf.extend_from_slice(&chunk[..n]);
        }
        Ok(())
    }

    fn flush_skip_diagnostic(&mut self) {
        if self.skipped_bytes > 0 {
            log::warn!(
                "skipped {} bytes of non-record data at offset {}",
                self.skipped_bytes,
                self.stream_position - self.skipped_bytes
            );
            self.skipped_bytes = 0;
        }
    }

    fn step_one_byte(&mut self) {
        self.read_offset += 1;
        self.stream_position += 1;
        self.skipped_bytes += 1;
        self.need_total = 0;
    }

    /// Returns the next record, or `None` at the end of the input. An
    /// input that yields no records at all is an error.
    pub fn next_record(&mut self) -> MSResult<Option<Record>> {
        if self.source.is_none() {
            return Ok(None);
        }
        loop {
            if let Some(end) = self.end_offset {
                if self.stream_position + MIN_RECORD_LENGTH as u64 > end {
                    self.flush_skip_diagnostic();
                    return Ok(None);
                }
            }
            while !self.at_eof && self.buffered() < MIN_RECORD_LENGTH.max(self.need_total) {
                self.fill()?;
            }
            let buffered = self.buffered();
            if buffered < MIN_RECORD_LENGTH {
                self.flush_skip_diagnostic();
                if self.record_count > 0 {
                    return Ok(None);
                }
                let err = MSeedError::NotSeed(String::from("no records found in input"));
                log::error!("{}", err);
                return Err(err);
            }

            // defer decoding while a selection could still reject the record
            let mut parse_flags = self.flags;
            if self.selections.is_some() {
                parse_flags.remove(ControlFlags::MSF_UNPACKDATA);
            }
            match Record::parse(&self.buf[self.read_offset..], parse_flags) {
                Ok(ParseOutcome::Complete(mut record)) => {
                    let record_start = self.stream_position;
                    self.read_offset += record.record_length;
                    self.stream_position += record.record_length as u64;
                    self.need_total = 0;
                    if let Some(selections) = &self.selections {
                        let matched = selections
                            .matched(
                                &record.sid,
                                record.start_time,
                                record.end_time(),
                                record.pub_version,
                            )
                            .is_some();
                        if !matched {
                            continue;
                        }
                        if self.flags.contains(ControlFlags::MSF_UNPACKDATA) {
                            record.decode_samples()?;
                        }
                    }
                    self.flush_skip_diagnostic();
                    self.record_count += 1;
                    self.last_record_offset = Some(record_start);
                    return Ok(Some(record));
                }
                Ok(ParseOutcome::MoreBytes(n)) => {
                    if buffered + n > MAX_RECORD_LENGTH {
                        if self.flags.contains(ControlFlags::MSF_SKIPNOTDATA) {
                            self.step_one_byte();
                            continue;
                        }
                        let err =
                            MSeedError::OutOfRange(buffered + n, MIN_RECORD_LENGTH, MAX_RECORD_LENGTH);
                        log::error!("{}", err);
                        return Err(err);
                    }
                    if self.at_eof {
                        // trailing partial record
                        self.flush_skip_diagnostic();
                        if self.record_count > 0 {
                            return Ok(None);
                        }
                        let err = MSeedError::NotSeed(String::from(
                            "input ends within a truncated record",
                        ));
                        log::error!("{}", err);
                        return Err(err);
                    }
                    self.need_total = buffered + n;
                }
                Err(MSeedError::NotSeed(_))
                    if self.flags.contains(ControlFlags::MSF_SKIPNOTDATA) =>
                {
                    self.step_one_byte();
                }
                Err(e) => {
                    log::error!("{}", e);
                    return Err(e);
                }
            }
        }
    }
}

impl<R: Read> Drop for MSReader<R> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<R: Read> Iterator for MSReader<R> {
    type Item = MSResult<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        }
    }
}
