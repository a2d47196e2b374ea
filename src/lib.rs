//! A library for reading, decoding, assembling, encoding and writing
//! miniSEED time series records.
//!
//! Both the current format version 3 (self-delimiting, CRC-protected) and
//! the legacy version 2 (fixed header plus blockettes) are supported. See
//! the specifications at <https://docs.fdsn.org/projects/miniSEED3> and
//! <https://docs.fdsn.org/projects/source-identifiers>.
//!
//! Records are pulled from a byte source with [`MSReader`], merged into
//! continuous segments with [`TraceList`], and produced from sample
//! buffers with [`pack_record`] and [`pack_trace_list`].

use bitflags::bitflags;
use std::io::Read;

mod data_encoding;
mod extra_headers;
mod header;
mod header2;
mod mseed_error;
mod nstime;
mod pack;
mod payload;
mod read;
mod record;
mod samples;
mod selection;
mod source_identifier;
mod steim1;
mod steim2;
mod steim_frame;
mod trace_list;

pub use crate::data_encoding::DataEncoding;
pub use crate::extra_headers::{
    Calibration, EventDetection, ExtraHeaders, Recenter, TimingException,
};
pub use crate::header::{Mseed3Header, CRC_OFFSET, FIXED_HEADER_SIZE};
pub use crate::header2::{Blockette1000, Blockette1001, Mseed2Header};
pub use crate::mseed_error::{MSResult, MSeedError};
pub use crate::nstime::{LeapSecondList, NsTime, SubSeconds, TimeFormat, NSTERROR, NSTUNSET};
pub use crate::pack::{pack_record, pack_trace_list, TlPackInfo, DEFAULT_RECORD_LENGTH};
pub use crate::payload::{decode_payload, encode_payload};
pub use crate::read::{parse_range_suffix, MSReader};
pub use crate::record::{
    crc32c_with_zeroed_crc, ParseOutcome, Record, SwapFlags, MAX_RECORD_LENGTH, MIN_RECORD_LENGTH,
};
pub use crate::samples::Samples;
pub use crate::selection::{glob_match, SelectEntry, SelectTime, Selections};
pub use crate::source_identifier::{Nslc, SourceId, MAX_SID_LENGTH};
pub use crate::trace_list::{
    is_rate_tolerable, unpack_record_list, AddOptions, RecordLocator, RecordPtr, Segment,
    SegmentIter, SegmentRef, Tolerance, TraceId, TraceIdIter, TraceIdRef, TraceList,
    VersionPolicy, MAX_SKIPLIST_HEIGHT,
};

bitflags! {
    /// Parsing, packing and trace construction control flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
    pub struct ControlFlags: u32 {
        /// **Parsing**: Unpack data samples.
        const MSF_UNPACKDATA = 0x0001;
        /// **Parsing**: Skip input that cannot be identified as miniSEED.
        const MSF_SKIPNOTDATA = 0x0002;
        /// **Parsing**: Validate CRC (if version 3).
        const MSF_VALIDATECRC = 0x0004;
        /// **Parsing**: Parse and utilize byte range from path name suffix.
        const MSF_PNAMERANGE = 0x0008;
        /// **Parsing**: Reading routine is at the end of the file.
        const MSF_ATENDOFFILE = 0x0010;
        /// **Packing**: UNSUPPORTED: Maintain a record-level sequence number.
        const MSF_SEQUENCE = 0x0020;
        /// **Packing**: Pack all available data even if the final record
        /// would not be filled.
        const MSF_FLUSHDATA = 0x0040;
        /// **Packing**: Pack as miniSEED version 2 instead of version 3.
        const MSF_PACKVER2 = 0x0080;
        /// **TraceList**: Build a record list for each segment.
        const MSF_RECORDLIST = 0x0100;
        /// **TraceList**: Do not modify a trace list when packing.
        const MSF_MAINTAINMSTL = 0x0200;
        /// **Packing**: With `MSF_MAINTAINMSTL`, advance segment times to
        /// reflect packed data.
        const MSF_PPUPDATETIME = 0x0400;
    }
}

/// Reads every record from a byte source.
///
/// # Example
///
/// ```no_run
/// use mseedio::{ControlFlags, MSeedError};
/// # fn main() -> Result<(), MSeedError> {
/// let file = std::fs::File::open("data.mseed3")?;
/// let mut buf_reader = std::io::BufReader::new(file);
/// let records = mseedio::read_records(&mut buf_reader, ControlFlags::MSF_UNPACKDATA)?;
/// # Ok(())
/// # }
/// ```
pub fn read_records<R: Read>(source: &mut R, flags: ControlFlags) -> MSResult<Vec<Record>> {
    let mut reader = MSReader::from_source(source, flags);
    let mut records = Vec::new();
    while let Some(record) = reader.next_record()? {
        records.push(record);
    }
    Ok(records)
}
