use std::fmt;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::PathBuf;
use std::sync::Arc;

use crate::mseed_error::{MSResult, MSeedError};
use crate::nstime::NsTime;
use crate::payload::decode_payload;
use crate::record::{Record, SwapFlags};
use crate::samples::Samples;
use crate::ControlFlags;

/// Maximum height of the source-identifier skip list.
pub const MAX_SKIPLIST_HEIGHT: usize = 8;

/// Default relative sample-rate tolerance.
const DEFAULT_RATE_TOLERANCE: f64 = 1e-4;

/// True when two sample rates agree within the default relative tolerance.
pub fn is_rate_tolerable(a: f64, b: f64) -> bool {
    if a == b {
        return true;
    }
    if a == 0.0 || b == 0.0 {
        return false;
    }
    (1.0 - a / b).abs() < DEFAULT_RATE_TOLERANCE
}

/// Where the bytes of a contributed record live.
#[derive(Debug, Clone)]
pub enum RecordLocator {
    /// The record bytes themselves.
    Memory(Arc<[u8]>),
    /// A file and the offset of the record within it.
    File { path: PathBuf, offset: u64 },
}

/// One contributed record of a segment's record list, in contribution
/// order: its location, a retained header, its end time, and the offset
/// from the record start to the encoded payload.
#[derive(Debug, Clone)]
pub struct RecordPtr {
    pub locator: RecordLocator,
    pub header: Record,
    pub end_time: NsTime,
    pub data_offset: usize,
}

/// A continuous run of samples from one source at one nominal rate.
#[derive(Debug)]
pub struct Segment {
    pub start_time: NsTime,
    pub end_time: NsTime,
    /// Nominal sample rate in Hz.
    pub sample_rate: f64,
    pub sample_count: i64,
    /// Merged decoded samples, when contributing records were decoded.
    pub samples: Option<Samples>,
    /// Contributed records, kept when requested with `MSF_RECORDLIST`.
    pub records: Vec<RecordPtr>,
    pub(crate) prev: Option<usize>,
    pub(crate) next: Option<usize>,
}

impl Segment {
    fn new(record: &Record) -> Segment {
        Segment {
            start_time: record.start_time,
            end_time: record.end_time(),
            sample_rate: record.sample_rate_hertz(),
            sample_count: record.sample_count,
            samples: record.samples.clone(),
            records: Vec::new(),
            prev: None,
            next: None,
        }
    }

    /// The sample type tag of the held or deferred samples, if known.
    pub fn sample_type(&self) -> Option<char> {
        if let Some(samples) = &self.samples {
            return Some(samples.sample_type());
        }
        self.records
            .first()
            .map(|ptr| ptr.header.encoding.sample_type())
    }
}

/// A node keyed by (source identifier, version bucket) holding segments in
/// start-time order.
#[derive(Debug)]
pub struct TraceId {
    pub sid: String,
    /// Largest contributing publication version.
    pub pub_version: u8,
    /// Grouping bucket; meaning depends on the version policy in use.
    pub(crate) bucket: u32,
    pub earliest: NsTime,
    pub latest: NsTime,
    pub num_segments: usize,
    pub(crate) first_seg: Option<usize>,
    pub(crate) last_seg: Option<usize>,
    pub(crate) next: [Option<usize>; MAX_SKIPLIST_HEIGHT],
}

/// How records are grouped into trace IDs by publication version.
#[derive(Clone, Copy)]
pub enum VersionPolicy {
    /// One bucket for all versions; the highest version wins the summary.
    Group,
    /// One bucket per publication version.
    Split,
    /// One bucket per value of the supplied function.
    Bucket(fn(&Record) -> u32),
}

/// How a record relates to an existing segment's coverage.
#[derive(Debug, Clone, Copy)]
enum SegmentFit {
    /// Abuts the end of the segment.
    Append,
    /// Abuts the start of the segment.
    Prepend,
    /// Entirely inside the segment's coverage.
    Duplicate,
    /// Straddles one of the segment's edges.
    Overlap,
}

/// Per-record tolerances for merging into an existing segment. `time`
/// yields seconds, `sample_rate` yields Hz. Unset functions fall back to
/// half a sample period and the default relative rate tolerance.
#[derive(Default)]
pub struct Tolerance {
    pub time: Option<Box<dyn Fn(&Record) -> f64>>,
    pub sample_rate: Option<Box<dyn Fn(&Record) -> f64>>,
}

/// Options controlling [`TraceList::add_record`].
#[derive(Default)]
pub struct AddOptions {
    pub tolerance: Tolerance,
    pub auto_heal: bool,
    pub flags: ControlFlags,
}

impl Default for VersionPolicy {
    fn default() -> Self {
        VersionPolicy::Group
    }
}

/// An ordered index of trace IDs over ascending (SID, version bucket),
/// backed by a skip list with randomized node heights.
///
/// ```no_run
/// use mseedio::{AddOptions, ControlFlags, MSReader, TraceList, VersionPolicy};
///
/// let mut mstl = TraceList::new(VersionPolicy::Group);
/// let mut reader = MSReader::open("data.mseed3", ControlFlags::MSF_UNPACKDATA).unwrap();
/// while let Some(res) = reader.next() {
///     mstl.add_record(res.unwrap(), None, &AddOptions::default()).unwrap();
/// }
/// for tid in mstl.iter() {
///     for seg in tid.segments() {
///         // work with seg
///     }
/// }
/// ```
pub struct TraceList {
    pub(crate) ids: Vec<TraceId>,
    pub(crate) segments: Vec<Option<Segment>>,
    free_segments: Vec<usize>,
    pub(crate) head: [Option<usize>; MAX_SKIPLIST_HEIGHT],
    num_ids: usize,
    version_policy: VersionPolicy,
    rng_state: u64,
}

impl TraceList {
    pub fn new(version_policy: VersionPolicy) -> TraceList {
        TraceList {
            ids: Vec::new(),
            segments: Vec::new(),
            free_segments: Vec::new(),
            head: [None; MAX_SKIPLIST_HEIGHT],
            num_ids: 0,
            version_policy,
            rng_state: 0x9E37_79B9_7F4A_7C15,
        }
    }

    /// Number of trace IDs in the list.
    pub fn len(&self) -> usize {
        self.num_ids
    }

    pub fn is_empty(&self) -> bool {
        self.num_ids == 0
    }

    /// Iterates trace IDs in ascending (SID, version bucket) order.
    pub fn iter(&self) -> TraceIdIter {
        TraceIdIter {
            list: self,
            next: self.head[0],
        }
    }

    fn next_random(&mut self) -> u64 {
        // xorshift64*
        let mut x = self.rng_state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.rng_state = x;
        x.wrapping_mul(0x2545_F491_4F6C_DD1D)
    }

    /// Geometric height, p = 1/2, capped at the list maximum.
    fn random_height(&mut self) -> usize {
        let bits = self.next_random();
        let mut height = 1;
        while height < MAX_SKIPLIST_HEIGHT && (bits >> (height - 1)) & 1 == 1 {
            height += 1;
        }
        height
    }

    fn key_less(a: (&str, u32), b: (&str, u32)) -> bool {
        a.0 < b.0 || (a.0 == b.0 && a.1 < b.1)
    }

    /// Finds the trace ID for the key, inserting a new node with a random
    /// height when absent.
    fn find_or_insert_id(&mut self, sid: &str, bucket: u32) -> usize {
        let mut update: [Option<usize>; MAX_SKIPLIST_HEIGHT] = [None; MAX_SKIPLIST_HEIGHT];
        let mut current: Option<usize> = None;
        for level in (0..MAX_SKIPLIST_HEIGHT).rev() {
            let mut next = match current {
                None => self.head[level],
                Some(idx) => self.ids[idx].next[level],
            };
            while let Some(nidx) = next {
                let node = &self.ids[nidx];
                if TraceList::key_less((&node.sid, node.bucket), (sid, bucket)) {
                    current = Some(nidx);
                    next = node.next[level];
                } else {
                    break;
                }
            }
            update[level] = current;
        }
        let candidate = match current {
            None => self.head[0],
            Some(idx) => self.ids[idx].next[0],
        };
        if let Some(cidx) = candidate {
            let node = &self.ids[cidx];
            if node.sid == sid && node.bucket == bucket {
                return cidx;
            }
        }
        let height = self.random_height();
        let new_index = self.ids.len();
        self.ids.push(TraceId {
            sid: sid.to_string(),
            pub_version: 0,
            bucket,
            earliest: NsTime::UNSET,
            latest: NsTime::UNSET,
            num_segments: 0,
            first_seg: None,
            last_seg: None,
            next: [None; MAX_SKIPLIST_HEIGHT],
        });
        for level in 0..height {
            match update[level] {
                None => {
                    self.ids[new_index].next[level] = self.head[level];
                    self.head[level] = Some(new_index);
                }
                Some(pidx) => {
                    self.ids[new_index].next[level] = self.ids[pidx].next[level];
                    self.ids[pidx].next[level] = Some(new_index);
                }
            }
        }
        self.num_ids += 1;
        new_index
    }

    fn alloc_segment(&mut self, segment: Segment) -> usize {
        if let Some(index) = self.free_segments.pop() {
            self.segments[index] = Some(segment);
            index
        } else {
            self.segments.push(Some(segment));
            self.segments.len() - 1
        }
    }

    pub(crate) fn segment(&self, index: usize) -> &Segment {
        self.segments[index].as_ref().expect("live segment index")
    }

    pub(crate) fn segment_mut(&mut self, index: usize) -> &mut Segment {
        self.segments[index].as_mut().expect("live segment index")
    }

    /// Merges a record into the list. `locator` feeds the segment record
    /// list when `MSF_RECORDLIST` is among the options' flags; without one
    /// the record's own raw bytes are used.
    pub fn add_record(
        &mut self,
        record: Record,
        locator: Option<RecordLocator>,
        options: &AddOptions,
    ) -> MSResult<()> {
        if !record.start_time.is_set() {
            return Err(MSeedError::Generic(String::from(
                "record start time is not set",
            )));
        }
        let bucket = match self.version_policy {
            VersionPolicy::Group => 0,
            VersionPolicy::Split => record.pub_version as u32,
            VersionPolicy::Bucket(f) => f(&record),
        };
        let rate = record.sample_rate_hertz();
        let end_time = record.end_time();
        let time_tolerance = match &options.tolerance.time {
            Some(f) => f(&record),
            None => {
                if rate > 0.0 {
                    0.5 / rate
                } else {
                    0.0
                }
            }
        };
        let tol_ns = (time_tolerance * 1_000_000_000.0) as i64;
        let rate_tolerance = options.tolerance.sample_rate.as_ref().map(|f| f(&record));

        let id_index = self.find_or_insert_id(&record.sid, bucket);
        {
            let id = &mut self.ids[id_index];
            id.pub_version = id.pub_version.max(record.pub_version);
            if !id.earliest.is_set() || record.start_time < id.earliest {
                id.earliest = record.start_time;
            }
            if !id.latest.is_set() || end_time > id.latest {
                id.latest = end_time;
            }
        }

        let rate_matches = |seg_rate: f64| match rate_tolerance {
            Some(tol) => (seg_rate - rate).abs() <= tol,
            None => is_rate_tolerable(seg_rate, rate),
        };

        // look for a segment whose coverage the record abuts or overlaps
        let mut fit: Option<(usize, SegmentFit)> = None;
        let mut cursor = self.ids[id_index].first_seg;
        while let Some(seg_index) = cursor {
            let seg = self.segment(seg_index);
            if rate_matches(seg.sample_rate) {
                let expected_next = seg.end_time.sample_time(1, seg.sample_rate);
                if (record.start_time.as_nanos() - expected_next.as_nanos()).abs() <= tol_ns {
                    fit = Some((seg_index, SegmentFit::Append));
                    break;
                }
                let expected_prev = record.end_time().sample_time(1, rate);
                if (seg.start_time.as_nanos() - expected_prev.as_nanos()).abs() <= tol_ns {
                    fit = Some((seg_index, SegmentFit::Prepend));
                    break;
                }
                if record.start_time <= seg.end_time && end_time >= seg.start_time {
                    if record.start_time >= seg.start_time && end_time <= seg.end_time {
                        // retransmission already covered by the segment
                        fit = Some((seg_index, SegmentFit::Duplicate));
                        break;
                    }
                    // a straddling record can only be spliced sample-wise
                    if seg.samples.is_some()
                        && record.samples.is_some()
                        && !options.flags.contains(ControlFlags::MSF_RECORDLIST)
                    {
                        fit = Some((seg_index, SegmentFit::Overlap));
                        break;
                    }
                }
            }
            cursor = seg.next;
        }

        let record_ptr = if options.flags.contains(ControlFlags::MSF_RECORDLIST) {
            let locator = match locator {
                Some(l) => l,
                None => RecordLocator::Memory(record.raw.clone().ok_or_else(|| {
                    MSeedError::Generic(String::from(
                        "record list requested but record has no raw bytes or locator",
                    ))
                })?),
            };
            let mut header = record.clone();
            header.samples = None;
            header.payload = Vec::new();
            Some(RecordPtr {
                locator,
                data_offset: record.data_offset,
                end_time,
                header,
            })
        } else {
            None
        };

        match fit {
            Some((_, SegmentFit::Duplicate)) => {}
            Some((seg_index, SegmentFit::Overlap)) => {
                self.splice_overlap(seg_index, record, end_time)?;
                if options.auto_heal {
                    self.heal_around(id_index, seg_index, tol_ns)?;
                }
            }
            Some((seg_index, fit)) => {
                let append = matches!(fit, SegmentFit::Append);
                {
                    let seg = self.segments[seg_index].as_mut().unwrap();
                    match (&mut seg.samples, record.samples) {
                        (Some(held), Some(incoming)) => {
                            if append {
                                held.append(incoming)?;
                            } else {
                                held.prepend(incoming)?;
                            }
                        }
                        (None, None) => {}
                        (held, incoming) => {
                            return Err(MSeedError::Generic(format!(
                                "cannot merge {} record into {} segment",
                                if incoming.is_some() { "decoded" } else { "undecoded" },
                                if held.is_some() { "decoded" } else { "undecoded" },
                            )));
                        }
                    }
                    seg.sample_count += record.sample_count;
                    if append {
                        seg.end_time = end_time;
                    } else {
                        seg.start_time = record.start_time;
                    }
                    // the record list mirrors the sample splice order
                    if let Some(ptr) = record_ptr {
                        if append {
                            seg.records.push(ptr);
                        } else {
                            seg.records.insert(0, ptr);
                        }
                    }
                }
                if options.auto_heal {
                    self.heal_around(id_index, seg_index, tol_ns)?;
                }
            }
            None => {
                let mut segment = Segment::new(&record);
                if let Some(ptr) = record_ptr {
                    segment.records.push(ptr);
                }
                let seg_index = self.alloc_segment(segment);
                self.link_segment(id_index, seg_index);
            }
        }
        Ok(())
    }

    /// Splices a record whose coverage partially overlaps a segment: the
    /// already-covered span keeps the segment's samples, and only the
    /// samples extending past either edge are added.
    fn splice_overlap(&mut self, seg_index: usize, record: Record, end_time: NsTime) -> MSResult<()> {
        let seg = self.segments[seg_index].as_mut().unwrap();
        let mut incoming = record
            .samples
            .ok_or_else(|| MSeedError::Generic(String::from("overlap splice needs decoded samples")))?;
        let rate = seg.sample_rate;
        let rec_n = incoming.len() as i64;
        // sample position of the record's first sample within the segment
        let offset = ((record.start_time.as_nanos() - seg.start_time.as_nanos()) as f64 * rate
            / 1_000_000_000.0)
            .round() as i64;
        let head = (-offset).max(0).min(rec_n);
        let covered = (head + (seg.sample_count - offset.max(0)).max(0)).min(rec_n);
        let tail = rec_n - covered;
        if head > 0 {
            let head_samples = incoming.split_front(head as usize);
            seg.samples
                .as_mut()
                .ok_or_else(|| MSeedError::Generic(String::from("overlap splice needs decoded samples")))?
                .prepend(head_samples)?;
            seg.start_time = record.start_time;
            seg.sample_count += head;
        }
        // discard the span the segment already holds
        incoming.split_front((covered - head) as usize);
        if tail > 0 {
            seg.samples
                .as_mut()
                .ok_or_else(|| MSeedError::Generic(String::from("overlap splice needs decoded samples")))?
                .append(incoming)?;
            seg.end_time = end_time;
            seg.sample_count += tail;
        }
        Ok(())
    }

    /// Links a fresh segment into the ID's list in start-time order.
    fn link_segment(&mut self, id_index: usize, seg_index: usize) {
        let start = self.segment(seg_index).start_time;
        // common case: the new segment goes at the tail
        if let Some(last) = self.ids[id_index].last_seg {
            if self.segment(last).start_time <= start {
                {
                    let seg = self.segments[seg_index].as_mut().unwrap();
                    seg.prev = Some(last);
                    seg.next = None;
                }
                self.segments[last].as_mut().unwrap().next = Some(seg_index);
                self.ids[id_index].last_seg = Some(seg_index);
                self.ids[id_index].num_segments += 1;
                return;
            }
        }
        let mut prev: Option<usize> = None;
        let mut cursor = self.ids[id_index].first_seg;
        while let Some(cidx) = cursor {
            if self.segment(cidx).start_time > start {
                break;
            }
            prev = Some(cidx);
            cursor = self.segment(cidx).next;
        }
        {
            let seg = self.segments[seg_index].as_mut().unwrap();
            seg.prev = prev;
            seg.next = cursor;
        }
        match prev {
            None => self.ids[id_index].first_seg = Some(seg_index),
            Some(pidx) => self.segments[pidx].as_mut().unwrap().next = Some(seg_index),
        }
        match cursor {
            None => self.ids[id_index].last_seg = Some(seg_index),
            Some(nidx) => self.segments[nidx].as_mut().unwrap().prev = Some(seg_index),
        }
        self.ids[id_index].num_segments += 1;
    }

    pub(crate) fn unlink_segment(&mut self, id_index: usize, seg_index: usize) -> Segment {
        let (prev, next) = {
            let seg = self.segment(seg_index);
            (seg.prev, seg.next)
        };
        match prev {
            None => self.ids[id_index].first_seg = next,
            Some(pidx) => self.segments[pidx].as_mut().unwrap().next = next,
        }
        match next {
            None => self.ids[id_index].last_seg = prev,
            Some(nidx) => self.segments[nidx].as_mut().unwrap().prev = prev,
        }
        self.ids[id_index].num_segments -= 1;
        self.free_segments.push(seg_index);
        self.segments[seg_index].take().expect("live segment index")
    }

    /// Merges the segment with its neighbors where the insertion closed
    /// the gap between them.
    fn heal_around(&mut self, id_index: usize, seg_index: usize, tol_ns: i64) -> MSResult<()> {
        // forward: does the next segment now abut this one?
        if let Some(next_index) = self.segment(seg_index).next {
            let (rate, end_time) = {
                let seg = self.segment(seg_index);
                (seg.sample_rate, seg.end_time)
            };
            let next_seg = self.segment(next_index);
            let expected = end_time.sample_time(1, rate);
            if is_rate_tolerable(next_seg.sample_rate, rate)
                && (next_seg.start_time.as_nanos() - expected.as_nanos()).abs() <= tol_ns
            {
                let absorbed = self.unlink_segment(id_index, next_index);
                let seg = self.segments[seg_index].as_mut().unwrap();
                match (&mut seg.samples, absorbed.samples) {
                    (Some(held), Some(incoming)) => held.append(incoming)?,
                    (None, None) => {}
                    _ => {
                        return Err(MSeedError::Generic(String::from(
                            "cannot heal decoded and undecoded segments",
                        )))
                    }
                }
                seg.sample_count += absorbed.sample_count;
                seg.end_time = absorbed.end_time;
                seg.records.extend(absorbed.records);
            }
        }
        // backward: does this segment now abut the previous one?
        if let Some(prev_index) = self.segment(seg_index).prev {
            let (rate, start_time) = {
                let seg = self.segment(seg_index);
                (seg.sample_rate, seg.start_time)
            };
            let prev_seg = self.segment(prev_index);
            let expected = prev_seg.end_time.sample_time(1, prev_seg.sample_rate);
            if is_rate_tolerable(prev_seg.sample_rate, rate)
                && (start_time.as_nanos() - expected.as_nanos()).abs() <= tol_ns
            {
                let absorbed = self.unlink_segment(id_index, seg_index);
                let seg = self.segments[prev_index].as_mut().unwrap();
                match (&mut seg.samples, absorbed.samples) {
                    (Some(held), Some(incoming)) => held.append(incoming)?,
                    (None, None) => {}
                    _ => {
                        return Err(MSeedError::Generic(String::from(
                            "cannot heal decoded and undecoded segments",
                        )))
                    }
                }
                seg.sample_count += absorbed.sample_count;
                seg.end_time = absorbed.end_time;
                seg.records.extend(absorbed.records);
            }
        }
        Ok(())
    }

    /// Decodes a segment's record list into its sample buffer. The
    /// decoded total must equal the segment's sample count.
    pub fn unpack_record_list_at(&mut self, seg_index: usize) -> MSResult<usize> {
        let mut segment = self.segments[seg_index]
            .take()
            .ok_or_else(|| MSeedError::Generic(String::from("no segment at index")))?;
        let result = unpack_record_list(&mut segment);
        self.segments[seg_index] = Some(segment);
        result
    }

    /// Decodes every segment record list in the list.
    pub fn unpack_all_record_lists(&mut self) -> MSResult<usize> {
        let mut total = 0;
        for slot in &mut self.segments {
            if let Some(segment) = slot {
                if !segment.records.is_empty() && segment.samples.is_none() {
                    total += unpack_record_list(segment)?;
                }
            }
        }
        Ok(total)
    }
}

impl fmt::Debug for TraceList {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("TraceList")
            .field("num_ids", &self.num_ids)
            .finish()
    }
}

/// Decodes the contributed records of a segment, in contribution order,
/// into one sample buffer.
pub fn unpack_record_list(segment: &mut Segment) -> MSResult<usize> {
    if segment.samples.is_some() {
        return Ok(segment.samples.as_ref().unwrap().len());
    }
    let sample_type = segment
        .sample_type()
        .ok_or_else(|| MSeedError::Generic(String::from("segment has no record list")))?;
    let mut merged = Samples::empty(sample_type)?;
    for ptr in &segment.records {
        let decoded = match &ptr.locator {
            RecordLocator::Memory(raw) => decode_record_ptr(ptr, raw)?,
            RecordLocator::File { path, offset } => {
                let mut file = File::open(path)?;
                file.seek(SeekFrom::Start(*offset))?;
                let mut raw = vec![0u8; ptr.header.record_length];
                file.read_exact(&mut raw)?;
                decode_record_ptr(ptr, &raw)?
            }
        };
        merged.append(decoded)?;
    }
    if merged.len() as i64 != segment.sample_count {
        return Err(MSeedError::DataLength(
            merged.len(),
            segment.sample_count,
            0,
            merged.len(),
        ));
    }
    let total = merged.len();
    segment.samples = Some(merged);
    Ok(total)
}

fn decode_record_ptr(ptr: &RecordPtr, raw: &[u8]) -> MSResult<Samples> {
    if ptr.data_offset > raw.len() {
        return Err(MSeedError::WrongLength(format!(
            "payload offset {} outside record of {} bytes",
            ptr.data_offset,
            raw.len()
        )));
    }
    decode_payload(
        ptr.header.encoding,
        &raw[ptr.data_offset..],
        ptr.header.sample_count.max(0) as usize,
        ptr.header.swap_flags.contains(SwapFlags::PAYLOAD_SWAPPED),
    )
}

/// An iterator over trace IDs in (SID, bucket) order.
pub struct TraceIdIter<'a> {
    list: &'a TraceList,
    next: Option<usize>,
}

impl<'a> Iterator for TraceIdIter<'a> {
    type Item = TraceIdRef<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.next?;
        self.next = self.list.ids[index].next[0];
        Some(TraceIdRef {
            list: self.list,
            index,
        })
    }
}

/// A borrowed view of one trace ID and its segments.
#[derive(Clone, Copy)]
pub struct TraceIdRef<'a> {
    list: &'a TraceList,
    pub(crate) index: usize,
}

impl<'a> TraceIdRef<'a> {
    fn id(&self) -> &'a TraceId {
        &self.list.ids[self.index]
    }

    pub fn sid(&self) -> &'a str {
        &self.id().sid
    }

    /// Largest contributing publication version.
    pub fn pub_version(&self) -> u8 {
        self.id().pub_version
    }

    /// Time of the first sample seen.
    pub fn earliest(&self) -> NsTime {
        self.id().earliest
    }

    /// Time of the last sample seen.
    pub fn latest(&self) -> NsTime {
        self.id().latest
    }

    pub fn num_segments(&self) -> usize {
        self.id().num_segments
    }

    /// Iterates segments in start-time order.
    pub fn segments(&self) -> SegmentIter<'a> {
        SegmentIter {
            list: self.list,
            next: self.id().first_seg,
        }
    }
}

/// An iterator over a trace ID's segments in start-time order.
pub struct SegmentIter<'a> {
    list: &'a TraceList,
    next: Option<usize>,
}

impl<'a> Iterator for SegmentIter<'a> {
    type Item = SegmentRef<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.next?;
        self.next = self.list.segment(index).next;
        Some(SegmentRef {
            list: self.list,
            index,
        })
    }
}

/// A borrowed view of one segment.
#[derive(Clone, Copy)]
pub struct SegmentRef<'a> {
    list: &'a TraceList,
    pub(crate) index: usize,
}

impl<'a> SegmentRef<'a> {
    pub fn get(&self) -> &'a Segment {
        self.list.segment(self.index)
    }

    /// Arena index, usable with [`TraceList::unpack_record_list_at`].
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn start_time(&self) -> NsTime {
        self.get().start_time
    }

    pub fn end_time(&self) -> NsTime {
        self.get().end_time
    }

    pub fn sample_rate_hz(&self) -> f64 {
        self.get().sample_rate
    }

    pub fn sample_count(&self) -> i64 {
        self.get().sample_count
    }

    pub fn samples(&self) -> Option<&'a Samples> {
        self.get().samples.as_ref()
    }
}
