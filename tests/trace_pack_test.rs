use std::fs;
use std::io::Write;
use std::path::PathBuf;

use mseedio::{
    AddOptions, ControlFlags, DataEncoding, MSReader, MSResult, NsTime, ParseOutcome, Record,
    Samples, TlPackInfo, TraceList, VersionPolicy,
};

fn sine_data(n: usize, phase: usize) -> Vec<i32> {
    (0..n)
        .map(|i| (20000.0 * ((i + phase) as f64 * 0.05).sin()) as i32)
        .collect()
}

fn packed_record(sid: &str, start: NsTime, rate: f64, samples: &[i32]) -> Vec<u8> {
    let mut rec = Record::template(sid, start, rate, DataEncoding::STEIM2);
    let s = Samples::Int32(samples.to_vec());
    let (payload, n) = mseedio::encode_payload(DataEncoding::STEIM2, &s, 1 << 20).unwrap();
    assert_eq!(n, samples.len());
    rec.payload = payload;
    rec.sample_count = n as i64;
    rec.pack_v3().unwrap()
}

fn temp_file(name: &str, contents: &[u8]) -> PathBuf {
    let mut path = std::env::temp_dir();
    path.push(format!("mseedio-tracetest-{}-{}", std::process::id(), name));
    let mut file = fs::File::create(&path).unwrap();
    file.write_all(contents).unwrap();
    path
}

/// Three contiguous records of one channel in shuffled order, plus one
/// record of a second channel.
fn mixed_stream() -> (Vec<u8>, Vec<i32>) {
    let t0 = NsTime::parse("2010-02-27T06:50:00.069539Z").unwrap();
    let chunk_a = sine_data(135, 0);
    let chunk_b = sine_data(135, 135);
    let chunk_c = sine_data(130, 270);
    let mut stream = Vec::new();
    stream.extend(packed_record("FDSN:XX_ONE__L_H_Z", t0, 1.0, &chunk_a));
    stream.extend(packed_record(
        "FDSN:XX_ONE__L_H_Z",
        t0.sample_time(270, 1.0),
        1.0,
        &chunk_c,
    ));
    stream.extend(packed_record(
        "FDSN:XX_ONE__L_H_Z",
        t0.sample_time(135, 1.0),
        1.0,
        &chunk_b,
    ));
    stream.extend(packed_record(
        "FDSN:ZZ_TWO__B_H_Z",
        t0,
        40.0,
        &sine_data(100, 0),
    ));
    let mut merged = chunk_a;
    merged.extend(chunk_b);
    merged.extend(chunk_c);
    (stream, merged)
}

#[test]
fn assemble_out_of_order_records() -> MSResult<()> {
    let (stream, merged) = mixed_stream();
    let mut mstl = TraceList::new(VersionPolicy::Group);
    let options = AddOptions {
        auto_heal: true,
        ..Default::default()
    };
    let mut reader = MSReader::from_source(&stream[..], ControlFlags::MSF_UNPACKDATA);
    while let Some(rec) = reader.next_record()? {
        mstl.add_record(rec, None, &options)?;
    }
    assert_eq!(mstl.len(), 2);
    let tid = mstl.iter().next().unwrap();
    assert_eq!(tid.sid(), "FDSN:XX_ONE__L_H_Z");
    assert_eq!(tid.num_segments(), 1);
    let seg = tid.segments().next().unwrap();
    assert_eq!(seg.sample_count(), 400);
    assert_eq!(seg.samples().unwrap().as_int32().unwrap(), &merged[..]);
    assert_eq!(
        seg.start_time(),
        NsTime::parse("2010-02-27T06:50:00.069539Z").unwrap()
    );
    assert_eq!(
        seg.end_time(),
        NsTime::parse("2010-02-27T06:56:39.069539Z").unwrap()
    );
    Ok(())
}

#[test]
fn record_list_with_file_locators() -> MSResult<()> {
    let (stream, merged) = mixed_stream();
    let path = temp_file("recordlist.mseed3", &stream);

    let mut mstl = TraceList::new(VersionPolicy::Group);
    let options = AddOptions {
        auto_heal: true,
        flags: ControlFlags::MSF_RECORDLIST,
        ..Default::default()
    };
    // headers only; decoding is deferred to the record list
    let mut reader = MSReader::open(path.to_str().unwrap(), ControlFlags::empty())?;
    while let Some(rec) = reader.next_record()? {
        let locator = reader.locator_for_last(&rec);
        mstl.add_record(rec, locator, &options)?;
    }
    let tid = mstl.iter().next().unwrap();
    assert_eq!(tid.num_segments(), 1);
    let seg = tid.segments().next().unwrap();
    assert!(seg.samples().is_none());
    assert_eq!(seg.get().records.len(), 3);
    // the record list follows the sample order after healing
    assert_eq!(
        seg.get().records[1].header.start_time,
        NsTime::parse("2010-02-27T06:50:00.069539Z")
            .unwrap()
            .sample_time(135, 1.0)
    );
    assert_eq!(
        seg.get().records[2].header.start_time,
        NsTime::parse("2010-02-27T06:50:00.069539Z")
            .unwrap()
            .sample_time(270, 1.0)
    );
    let seg_index = seg.index();

    let unpacked = mstl.unpack_record_list_at(seg_index)?;
    assert_eq!(unpacked, 400);
    let tid = mstl.iter().next().unwrap();
    let seg = tid.segments().next().unwrap();
    assert_eq!(seg.samples().unwrap().as_int32().unwrap(), &merged[..]);
    fs::remove_file(path)?;
    Ok(())
}

#[test]
fn pack_defaults_produce_steim2_4096() -> MSResult<()> {
    let mut mstl = TraceList::new(VersionPolicy::Group);
    let options = AddOptions::default();
    let t0 = NsTime::parse("2012-05-12T00:00:00Z").unwrap();
    let data = sine_data(499, 0);
    let mut rec = Record::template("FDSN:XX_TEST__B_H_Z", t0, 40.0, DataEncoding::STEIM2);
    rec.pub_version = 1;
    rec.sample_count = data.len() as i64;
    rec.samples = Some(Samples::Int32(data.clone()));
    mstl.add_record(rec, None, &options)?;

    let mut stream = Vec::new();
    let (records, samples) = mseedio::pack_trace_list(
        &mut mstl,
        |bytes: &[u8]| stream.extend_from_slice(bytes),
        &TlPackInfo::default(),
        ControlFlags::MSF_FLUSHDATA,
    )?;
    assert_eq!(records, 1);
    assert_eq!(samples, 499);

    let parsed = match Record::parse(
        &stream,
        ControlFlags::MSF_UNPACKDATA | ControlFlags::MSF_VALIDATECRC,
    )? {
        ParseOutcome::Complete(rec) => rec,
        ParseOutcome::MoreBytes(n) => panic!("needs {} more bytes", n),
    };
    assert_eq!(parsed.encoding, DataEncoding::STEIM2);
    assert_eq!(parsed.sid, "FDSN:XX_TEST__B_H_Z");
    assert_eq!(parsed.pub_version, 1);
    assert_eq!(parsed.start_time, t0);
    assert_eq!(parsed.samples.as_ref().unwrap().as_int32().unwrap(), &data[..]);
    // a single flushed record smaller than the 4096 default
    assert!(parsed.record_length < 4096);
    Ok(())
}

#[test]
fn read_assemble_pack_read_cycle() -> MSResult<()> {
    let (stream, merged) = mixed_stream();
    let mut mstl = TraceList::new(VersionPolicy::Group);
    let options = AddOptions {
        auto_heal: true,
        ..Default::default()
    };
    let mut reader = MSReader::from_source(&stream[..], ControlFlags::MSF_UNPACKDATA);
    while let Some(rec) = reader.next_record()? {
        mstl.add_record(rec, None, &options)?;
    }

    let mut repacked = Vec::new();
    let info = TlPackInfo {
        record_length: 512,
        ..Default::default()
    };
    mseedio::pack_trace_list(
        &mut mstl,
        |bytes: &[u8]| repacked.extend_from_slice(bytes),
        &info,
        ControlFlags::MSF_FLUSHDATA,
    )?;
    // all segments drained
    for tid in mstl.iter() {
        assert_eq!(tid.num_segments(), 0);
    }

    let mut reader = MSReader::from_source(&repacked[..], ControlFlags::MSF_UNPACKDATA);
    let mut mstl2 = TraceList::new(VersionPolicy::Group);
    while let Some(rec) = reader.next_record()? {
        mstl2.add_record(rec, None, &options)?;
    }
    let tid = mstl2.iter().next().unwrap();
    assert_eq!(tid.sid(), "FDSN:XX_ONE__L_H_Z");
    assert_eq!(tid.num_segments(), 1);
    assert_eq!(
        tid.segments().next().unwrap().samples().unwrap().as_int32().unwrap(),
        &merged[..]
    );
    Ok(())
}

#[test]
fn publication_versions_split_on_request() -> MSResult<()> {
    let t0 = NsTime::parse("2020-01-01T00:00:00Z").unwrap();
    let mut stream = Vec::new();
    for pv in [1u8, 2, 2, 1] {
        let mut rec = Record::template("FDSN:XX_PV__L_H_Z", t0, 1.0, DataEncoding::INT32);
        let s = Samples::Int32(vec![pv as i32]);
        let (payload, _) = mseedio::encode_payload(DataEncoding::INT32, &s, 64).unwrap();
        rec.payload = payload;
        rec.sample_count = 1;
        rec.pub_version = pv;
        stream.extend(rec.pack_v3().unwrap());
    }
    let options = AddOptions::default();

    let mut grouped = TraceList::new(VersionPolicy::Group);
    let mut reader = MSReader::from_source(&stream[..], ControlFlags::MSF_UNPACKDATA);
    while let Some(rec) = reader.next_record()? {
        grouped.add_record(rec, None, &options)?;
    }
    assert_eq!(grouped.len(), 1);
    assert_eq!(grouped.iter().next().unwrap().pub_version(), 2);

    let mut split = TraceList::new(VersionPolicy::Split);
    let mut reader = MSReader::from_source(&stream[..], ControlFlags::MSF_UNPACKDATA);
    while let Some(rec) = reader.next_record()? {
        split.add_record(rec, None, &options)?;
    }
    assert_eq!(split.len(), 2);
    Ok(())
}
