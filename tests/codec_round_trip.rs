use mseedio::{
    crc32c_with_zeroed_crc, ControlFlags, DataEncoding, MSResult, NsTime, ParseOutcome, Record,
    Samples, SourceId,
};

/// A full period of a reference sine, scaled to exercise several Steim
/// difference widths.
fn sine_data(n: usize) -> Vec<i32> {
    (0..n)
        .map(|i| (34000.0 * (2.0 * std::f64::consts::PI * i as f64 / 125.0).sin()) as i32)
        .collect()
}

fn complete(outcome: ParseOutcome) -> Record {
    match outcome {
        ParseOutcome::Complete(rec) => rec,
        ParseOutcome::MoreBytes(n) => panic!("record incomplete, needs {} bytes", n),
    }
}

#[test]
fn sine_record_all_encodings() -> MSResult<()> {
    let data = sine_data(499);
    for encoding in [
        DataEncoding::INT32,
        DataEncoding::STEIM1,
        DataEncoding::STEIM2,
    ] {
        let mut rec = Record::template(
            "FDSN:XX_TEST__B_H_Z",
            NsTime::parse("2012-05-12T00:00:00Z")?,
            40.0,
            encoding,
        );
        rec.pub_version = 1;
        let samples = Samples::Int32(data.clone());
        let (payload, consumed) = mseedio::encode_payload(encoding, &samples, 1 << 20)?;
        assert_eq!(consumed, 499);
        rec.payload = payload;
        rec.sample_count = 499;
        let bytes = rec.pack_v3()?;

        let parsed = complete(Record::parse(
            &bytes,
            ControlFlags::MSF_UNPACKDATA | ControlFlags::MSF_VALIDATECRC,
        )?);
        assert_eq!(parsed.sid, "FDSN:XX_TEST__B_H_Z");
        assert_eq!(parsed.pub_version, 1);
        assert_eq!(parsed.sample_count, 499);
        assert_eq!(parsed.samples.as_ref().unwrap().as_int32().unwrap(), &data[..]);
        // packing the same fields again reproduces the bytes exactly
        let mut again = parsed;
        let repacked = again.repack_v3()?;
        assert_eq!(repacked, bytes, "encoding {:?}", encoding);
    }
    Ok(())
}

#[test]
fn float_and_text_round_trips() -> MSResult<()> {
    let mut rec = Record::template(
        "FDSN:XX_TEST__B_H_Z",
        NsTime::parse("2012-05-12T00:00:00Z")?,
        1.0,
        DataEncoding::FLOAT64,
    );
    let values: Vec<f64> = (0..100).map(|i| (i as f64).sqrt() * -1.5).collect();
    let samples = Samples::Float64(values.clone());
    let (payload, _) = mseedio::encode_payload(DataEncoding::FLOAT64, &samples, 1 << 20)?;
    rec.payload = payload;
    rec.sample_count = 100;
    let bytes = rec.pack_v3()?;
    let parsed = complete(Record::parse(&bytes, ControlFlags::MSF_UNPACKDATA)?);
    assert_eq!(
        parsed.samples.as_ref().unwrap().as_float64().unwrap(),
        &values[..]
    );

    let mut rec = Record::template(
        "FDSN:XX_TEST__X_Y_Z",
        NsTime::parse("2012-05-12T00:00:00Z")?,
        0.0,
        DataEncoding::TEXT,
    );
    rec.payload = b"I've seen things you people wouldn't believe".to_vec();
    rec.sample_count = rec.payload.len() as i64;
    let bytes = rec.pack_v3()?;
    let parsed = complete(Record::parse(&bytes, ControlFlags::MSF_UNPACKDATA)?);
    assert_eq!(
        parsed.samples.as_ref().unwrap().as_text().unwrap(),
        &rec.payload[..]
    );
    Ok(())
}

#[test]
fn crc_field_matches_recomputation() -> MSResult<()> {
    let mut rec = Record::template(
        "FDSN:XX_TEST__B_H_Z",
        NsTime::parse("2012-05-12T00:00:00Z")?,
        40.0,
        DataEncoding::STEIM2,
    );
    let samples = Samples::Int32(sine_data(499));
    let (payload, _) = mseedio::encode_payload(DataEncoding::STEIM2, &samples, 1 << 20)?;
    rec.payload = payload;
    rec.sample_count = 499;
    let bytes = rec.pack_v3()?;
    assert_eq!(crc32c_with_zeroed_crc(&bytes), rec.crc);
    let stored = u32::from_le_bytes([bytes[28], bytes[29], bytes[30], bytes[31]]);
    assert_eq!(stored, rec.crc);
    Ok(())
}

#[test]
fn version2_to_version3_conversion() -> MSResult<()> {
    // pack a version 2 record, parse it, then repack as version 3
    let data = sine_data(400);
    let mut template = Record::template(
        "FDSN:XX_TEST__B_H_Z",
        NsTime::parse("2012-05-12T00:00:00Z")?,
        40.0,
        DataEncoding::STEIM1,
    );
    template.record_length = 512;
    template.sample_count = 400;
    template.samples = Some(Samples::Int32(data.clone()));
    let mut stream = Vec::new();
    mseedio::pack_record(
        &mut template,
        |bytes: &[u8]| stream.extend_from_slice(bytes),
        ControlFlags::MSF_FLUSHDATA | ControlFlags::MSF_PACKVER2,
    )?;

    let mut offset = 0;
    let mut collected: Vec<i32> = Vec::new();
    while offset < stream.len() {
        let mut rec = complete(Record::parse(
            &stream[offset..],
            ControlFlags::MSF_UNPACKDATA,
        )?);
        offset += rec.record_length;
        assert_eq!(rec.format_version, 2);
        collected.extend(rec.samples.as_ref().unwrap().as_int32().unwrap());

        let v3_bytes = rec.repack_v3()?;
        let v3 = complete(Record::parse(
            &v3_bytes,
            ControlFlags::MSF_UNPACKDATA | ControlFlags::MSF_VALIDATECRC,
        )?);
        assert_eq!(v3.format_version, 3);
        assert_eq!(v3.sid, rec.sid);
        assert_eq!(v3.start_time, rec.start_time);
        assert_eq!(v3.sample_count, rec.sample_count);
        assert_eq!(
            v3.samples.as_ref().unwrap().as_int32().unwrap(),
            rec.samples.as_ref().unwrap().as_int32().unwrap()
        );
    }
    assert_eq!(collected, data);
    Ok(())
}

#[test]
fn zero_sample_record() -> MSResult<()> {
    let mut rec = Record::template(
        "FDSN:XX_TEST__B_H_Z",
        NsTime::parse("2012-05-12T00:00:00Z")?,
        40.0,
        DataEncoding::STEIM2,
    );
    rec.sample_count = 0;
    let bytes = rec.pack_v3()?;
    assert_eq!(bytes.len(), 40 + rec.sid.len());
    let parsed = complete(Record::parse(
        &bytes,
        ControlFlags::MSF_UNPACKDATA | ControlFlags::MSF_VALIDATECRC,
    )?);
    assert_eq!(parsed.sample_count, 0);
    assert_eq!(parsed.samples.as_ref().map(|s| s.len()), Some(0));
    Ok(())
}

#[test]
fn extra_header_ceiling() -> MSResult<()> {
    // a payload pushing the extra-header field to its u16 ceiling
    let mut rec = Record::template(
        "FDSN:XX_TEST__B_H_Z",
        NsTime::parse("2012-05-12T00:00:00Z")?,
        1.0,
        DataEncoding::TEXT,
    );
    let wrapper_len = "{\"FDSN\":{\"Note\":\"\"}}".len();
    let big = format!(
        "{{\"FDSN\":{{\"Note\":\"{}\"}}}}",
        "x".repeat(65_535 - wrapper_len)
    );
    assert_eq!(big.len(), 65_535);
    rec.extra_headers = mseedio::ExtraHeaders::from(big);
    let bytes = rec.pack_v3()?;
    let parsed = complete(Record::parse(&bytes, ControlFlags::MSF_VALIDATECRC)?);
    assert_eq!(parsed.record_length, bytes.len());

    // one byte more no longer fits the field
    let mut rec = Record::template(
        "FDSN:XX_TEST__B_H_Z",
        NsTime::parse("2012-05-12T00:00:00Z")?,
        1.0,
        DataEncoding::TEXT,
    );
    let too_big = format!(
        "{{\"FDSN\":{{\"Note\":\"{}\"}}}}",
        "x".repeat(65_536 - wrapper_len)
    );
    rec.extra_headers = mseedio::ExtraHeaders::from(too_big);
    assert!(rec.pack_v3().is_err());
    Ok(())
}

#[test]
fn sid_round_trip_through_record() -> MSResult<()> {
    let sid = SourceId::parse("FDSN:XX_TEST__L_H_Z")?;
    let nslc = sid.to_nslc();
    assert_eq!(
        (
            nslc.network.as_str(),
            nslc.station.as_str(),
            nslc.location.as_str(),
            nslc.channel.as_str()
        ),
        ("XX", "TEST", "", "LHZ")
    );
    let back = SourceId::from_nslc(&nslc.network, &nslc.station, &nslc.location, &nslc.channel)?;
    assert_eq!(back.to_string(), "FDSN:XX_TEST__L_H_Z");
    assert_eq!(back.to_string().len(), 19);
    Ok(())
}
