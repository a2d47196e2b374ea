use crate::data_encoding::DataEncoding;
use crate::extra_headers::ExtraHeaders;
use crate::header2::write_header2;
use crate::mseed_error::{MSResult, MSeedError};
use crate::payload::encode_payload;
use crate::record::Record;
use crate::samples::Samples;
use crate::source_identifier::SourceId;
use crate::trace_list::TraceList;
use crate::ControlFlags;

/// Record length used when a template leaves it unset.
pub const DEFAULT_RECORD_LENGTH: usize = 4096;

/// Trace-list packing parameters.
#[derive(Debug, Clone)]
pub struct TlPackInfo {
    /// Data encoding for produced records.
    pub encoding: DataEncoding,
    /// Record length in bytes.
    pub record_length: usize,
    /// Extra headers added to each output record, compact JSON text.
    pub extra_headers: Option<String>,
}

impl Default for TlPackInfo {
    fn default() -> Self {
        Self {
            encoding: DataEncoding::STEIM2,
            record_length: DEFAULT_RECORD_LENGTH,
            extra_headers: None,
        }
    }
}

/// True when a produced record left no room for more samples.
fn record_is_full(
    encoding: DataEncoding,
    consumed: usize,
    payload_len: usize,
    max_payload: usize,
) -> bool {
    match encoding {
        DataEncoding::TEXT => payload_len >= max_payload,
        DataEncoding::INT16 => consumed >= max_payload / 2,
        DataEncoding::INT32 | DataEncoding::FLOAT32 => consumed >= max_payload / 4,
        DataEncoding::FLOAT64 => consumed >= max_payload / 8,
        DataEncoding::STEIM1 | DataEncoding::STEIM2 => payload_len + 64 > max_payload,
        _ => true,
    }
}

/// Packs the template's buffered samples into records, invoking `handler`
/// with each produced record's bytes.
///
/// Records are cloned from the template: identifier, start time, sample
/// rate, encoding, publication version and extra headers carry over, and
/// the template's start time advances past the packed samples. Full
/// records are always emitted; with [`ControlFlags::MSF_FLUSHDATA`] a
/// final partial record drains the remainder, otherwise the remaining
/// samples stay buffered in the template for a later call.
///
/// A zero record length selects 4096 bytes. Version 2 records are
/// produced when [`ControlFlags::MSF_PACKVER2`] is set.
///
/// Returns `(records_emitted, samples_packed)`.
pub fn pack_record<F>(
    template: &mut Record,
    mut handler: F,
    flags: ControlFlags,
) -> MSResult<(usize, usize)>
where
    F: FnMut(&[u8]),
{
    let record_length = if template.record_length == 0 {
        DEFAULT_RECORD_LENGTH
    } else {
        template.record_length
    };
    let encoding = template.encoding;
    let flush = flags.contains(ControlFlags::MSF_FLUSHDATA);
    let pack_v2 = flags.contains(ControlFlags::MSF_PACKVER2);

    let eh_text = template.extra_headers.to_json_string();
    let eh_len = if eh_text.len() > 2 { eh_text.len() } else { 0 };
    let data_offset: usize = if pack_v2 {
        64
    } else {
        40 + template.sid.len() + eh_len
    };
    let max_payload = record_length
        .checked_sub(data_offset)
        .filter(|n| *n > 0)
        .ok_or_else(|| {
            MSeedError::Generic(format!(
                "record length {} leaves no payload space",
                record_length
            ))
        })?;

    let mut remaining = match template.samples.take() {
        Some(s) => s,
        None => return Ok((0, 0)),
    };
    let mut records_emitted = 0usize;
    let mut samples_packed = 0usize;
    let mut sequence = 1u32;

    while !remaining.is_empty() {
        let (payload, consumed) = match encode_payload(encoding, &remaining, max_payload) {
            Ok(v) => v,
            Err(e) => {
                // the unpacked samples stay with the caller's template
                template.samples = Some(remaining);
                return Err(e);
            }
        };
        if consumed == 0 {
            template.samples = Some(remaining);
            return Err(MSeedError::Generic(format!(
                "record length {} too small to hold any samples",
                record_length
            )));
        }
        let full = record_is_full(encoding, consumed, payload.len(), max_payload);
        if !full && !flush {
            break;
        }
        let assembled = if pack_v2 {
            assemble_v2(template, &payload, consumed, record_length, sequence)
        } else {
            let mut out_record = template.clone();
            out_record.sample_count = consumed as i64;
            out_record.payload = payload;
            out_record.pack_v3()
        };
        let bytes = match assembled {
            Ok(b) => b,
            Err(e) => {
                template.samples = Some(remaining);
                return Err(e);
            }
        };
        handler(&bytes);
        records_emitted += 1;
        sequence += 1;
        samples_packed += consumed;
        template.start_time = template.start_time.sample_time(consumed as i64, template.sample_rate);
        remaining = {
            let mut r = remaining;
            r.split_front(consumed);
            r
        };
    }

    template.sample_count = remaining.len() as i64;
    template.samples = Some(remaining);
    Ok((records_emitted, samples_packed))
}

fn assemble_v2(
    template: &Record,
    payload: &[u8],
    consumed: usize,
    record_length: usize,
    sequence: u32,
) -> MSResult<Vec<u8>> {
    let num_samples = u16::try_from(consumed).map_err(|_| {
        MSeedError::Generic(format!(
            "{} samples exceed a version 2 record's sample counter",
            consumed
        ))
    })?;
    let nslc = SourceId::parse(&template.sid)?.to_nslc();
    let frame_count = match template.encoding {
        DataEncoding::STEIM1 | DataEncoding::STEIM2 => (payload.len() / 64) as u8,
        _ => 0,
    };
    let mut out = Vec::with_capacity(record_length);
    write_header2(
        &mut out,
        sequence,
        template.pub_version,
        &nslc,
        template.start_time,
        template.sample_rate,
        num_samples,
        template.flags,
        template.encoding,
        record_length,
        frame_count,
    )?;
    if out.len() + payload.len() > record_length {
        return Err(MSeedError::Generic(format!(
            "payload of {} bytes overflows the {}-byte record",
            payload.len(),
            record_length
        )));
    }
    out.extend_from_slice(payload);
    out.resize(record_length, 0);
    Ok(out)
}

/// Packs every segment of a trace list, in list order, through `handler`.
///
/// Unless [`ControlFlags::MSF_MAINTAINMSTL`] is set, packed samples are
/// drained from each segment (its start time advances) and fully drained
/// segments are unlinked. With `MSF_MAINTAINMSTL` combined with
/// [`ControlFlags::MSF_PPUPDATETIME`], segment start times advance to
/// reflect the packed data while the sample buffers are kept.
///
/// Returns `(records_emitted, samples_packed)`.
pub fn pack_trace_list<F>(
    mstl: &mut TraceList,
    mut handler: F,
    info: &TlPackInfo,
    flags: ControlFlags,
) -> MSResult<(usize, usize)>
where
    F: FnMut(&[u8]),
{
    let maintain = flags.contains(ControlFlags::MSF_MAINTAINMSTL);
    let update_times = flags.contains(ControlFlags::MSF_PPUPDATETIME);
    let mut records_emitted = 0usize;
    let mut samples_packed = 0usize;

    // snapshot the iteration order before mutating segments
    let mut work: Vec<(usize, usize, String, u8)> = Vec::new();
    let mut id_cursor = mstl.head[0];
    while let Some(id_index) = id_cursor {
        let id = &mstl.ids[id_index];
        let mut seg_cursor = id.first_seg;
        while let Some(seg_index) = seg_cursor {
            work.push((id_index, seg_index, id.sid.clone(), id.pub_version));
            seg_cursor = mstl.segment(seg_index).next;
        }
        id_cursor = id.next[0];
    }

    for (id_index, seg_index, sid, pub_version) in work {
        let (start_time, sample_rate, samples) = {
            let seg = mstl.segment_mut(seg_index);
            let samples = if maintain {
                seg.samples.clone()
            } else {
                seg.samples.take()
            };
            (seg.start_time, seg.sample_rate, samples)
        };
        let samples = match samples {
            Some(s) if !s.is_empty() => s,
            _ => continue,
        };

        let mut template = Record::template(&sid, start_time, sample_rate, info.encoding);
        template.pub_version = pub_version;
        template.record_length = info.record_length;
        if let Some(eh) = &info.extra_headers {
            template.extra_headers = ExtraHeaders::from(eh.as_str());
        }
        template.sample_count = samples.len() as i64;
        template.samples = Some(samples);

        let (records, packed) = pack_record(&mut template, &mut handler, flags)?;
        records_emitted += records;
        samples_packed += packed;

        if maintain {
            if update_times && packed > 0 {
                let seg = mstl.segment_mut(seg_index);
                seg.start_time = template.start_time;
            }
            continue;
        }
        let remainder = template.samples.take().unwrap_or(Samples::Int32(Vec::new()));
        if remainder.is_empty() {
            mstl.unlink_segment(id_index, seg_index);
        } else {
            let seg = mstl.segment_mut(seg_index);
            seg.start_time = template.start_time;
            seg.sample_count = remainder.len() as i64;
            seg.samples = Some(remainder);
        }
    }
    Ok((records_emitted, samples_packed))
}
