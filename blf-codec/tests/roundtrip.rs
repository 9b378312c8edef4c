//! Write-then-read fidelity for every supported encapsulation kind.

use blf_codec::{
    BlfReader, BlfWriter, BusRecord, Direction, Encap, InterfaceKey, InterfaceRegistry, Protocol,
};
use std::io::Cursor;

const BASE_TS: u64 = 1_700_000_000_000_000_000;

fn record(encap: Encap, iface_id: u32, ts: u64, direction: Direction, data: Vec<u8>) -> BusRecord {
    BusRecord {
        encap,
        iface_id,
        cap_len: data.len() as u32,
        wire_len: data.len() as u32,
        timestamp_ns: ts,
        direction,
        data,
    }
}

fn socketcan_data(id: u32, flags: u8, payload: &[u8]) -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(&id.to_be_bytes());
    data.push(payload.len() as u8);
    data.push(flags);
    data.extend_from_slice(&[0, 0]);
    data.extend_from_slice(payload);
    data
}

fn ethernet_data(vlan: bool, payload: &[u8]) -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(&[0x02, 0x00, 0x00, 0x00, 0x00, 0x01]); // dst
    data.extend_from_slice(&[0x02, 0x00, 0x00, 0x00, 0x00, 0x02]); // src
    if vlan {
        data.extend_from_slice(&0x8100u16.to_be_bytes());
        data.extend_from_slice(&0x0064u16.to_be_bytes());
    }
    data.extend_from_slice(&0x0800u16.to_be_bytes());
    data.extend_from_slice(payload);
    data
}

fn flexray_data(frame_id: u16, payload: &[u8]) -> Vec<u8> {
    let words = (payload.len() / 2) as u8;
    let crc = 0x1A5u16;
    let cycle = 7u8;
    let mut data = vec![
        0x01, // measurement header: frame
        0x00, // error flags
        (frame_id >> 8) as u8,
        (frame_id & 0xFF) as u8,
        (words << 1) | ((crc >> 10) as u8),
        ((crc >> 2) & 0xFF) as u8,
        (((crc & 0x03) as u8) << 6) | cycle,
    ];
    data.extend_from_slice(payload);
    data
}

fn lin_data(pid: u8, checksum: u8, payload: &[u8]) -> Vec<u8> {
    // dlc | frame type 0 | checksum type unknown
    let mut data = vec![1, 0, 0, 0, ((payload.len() as u8) << 4) | 0x03, pid, checksum, 0];
    data.extend_from_slice(payload);
    data
}

fn upper_pdu_data(dissector: &str, col_proto: &str, col_info: &str, inner: &[u8]) -> Vec<u8> {
    let mut data = Vec::new();
    for (tag, value) in [(12u16, dissector), (33, col_proto), (34, col_info)] {
        data.extend_from_slice(&tag.to_be_bytes());
        data.extend_from_slice(&(value.len() as u16).to_be_bytes());
        data.extend_from_slice(value.as_bytes());
    }
    data.extend_from_slice(&[0, 0, 0, 0]); // end tag
    data.extend_from_slice(inner);
    data
}

/// Registry + record set covering every encapsulation, ids assigned in the
/// same discovery order a reader of the written file will use
fn sample_records() -> (InterfaceRegistry, Vec<BusRecord>) {
    let mut registry = InterfaceRegistry::new();
    let can = registry.lookup_or_create(InterfaceKey::simple(Protocol::Can, 1), None);
    let eth = registry.lookup_or_create(InterfaceKey::simple(Protocol::Ethernet, 1), None);
    let flexray = registry.lookup_or_create(InterfaceKey::simple(Protocol::FlexRay, 1), None);
    let lin = registry.lookup_or_create(InterfaceKey::simple(Protocol::Lin, 1), None);
    let wlan = registry.lookup_or_create(InterfaceKey::simple(Protocol::Wlan, 1), None);
    let upper = registry.lookup_or_create(
        InterfaceKey::simple(Protocol::UpperPdu, 0),
        Some("BLF-APPTEXT"),
    );

    let records = vec![
        record(
            Encap::SocketCan,
            can,
            BASE_TS,
            Direction::Rx,
            socketcan_data(0x123, 0, &[0xDE, 0xAD, 0xBE, 0xEF]),
        ),
        record(
            Encap::SocketCan,
            can,
            BASE_TS + 1_500,
            Direction::Tx,
            socketcan_data(0x1234_5678 | 0x8000_0000, 0, &[1, 2, 3, 4, 5, 6, 7, 8]),
        ),
        // CAN-FD with BRS, 12 data bytes
        record(
            Encap::SocketCan,
            can,
            BASE_TS + 3_000,
            Direction::Rx,
            socketcan_data(0x456, 0x04 | 0x01, &[9; 12]),
        ),
        record(
            Encap::Ethernet,
            eth,
            BASE_TS + 5_000,
            Direction::Tx,
            ethernet_data(false, &[0x45, 0, 0, 20, 1, 2, 3, 4]),
        ),
        record(
            Encap::Ethernet,
            eth,
            BASE_TS + 6_000,
            Direction::Rx,
            ethernet_data(true, &[0xAA; 16]),
        ),
        record(
            Encap::FlexRay,
            flexray,
            BASE_TS + 7_000,
            Direction::Rx,
            flexray_data(0x2A5, &[0x11; 16]),
        ),
        record(
            Encap::Lin,
            lin,
            BASE_TS + 8_000,
            Direction::Tx,
            lin_data(0x34, 0x5A, &[0xCA, 0xFE]),
        ),
        record(
            Encap::Ieee80211,
            wlan,
            BASE_TS + 9_000,
            Direction::Rx,
            vec![0x80, 0x00, 0x00, 0x00, 1, 2, 3, 4, 5, 6, 7, 8],
        ),
        record(
            Encap::UpperPdu,
            upper,
            BASE_TS + 10_000,
            Direction::Rx,
            upper_pdu_data("data-text-lines", "BLF App text", "Comment", b"first lap"),
        ),
    ];
    (registry, records)
}

fn write_file(registry: &InterfaceRegistry, records: &[BusRecord]) -> Vec<u8> {
    let mut writer = BlfWriter::create(Cursor::new(Vec::new()))
        .unwrap()
        .with_application(9, (0, 1, 0));
    for rec in records {
        writer.write_record(rec, registry).unwrap();
    }
    writer.finish().unwrap();
    writer.into_inner().into_inner()
}

fn read_all(file: Vec<u8>) -> (Vec<(u64, BusRecord)>, BlfReader<Cursor<Vec<u8>>>) {
    let mut reader = BlfReader::open(Cursor::new(file)).unwrap();
    let mut records = Vec::new();
    while let Some(item) = reader.next_record().unwrap() {
        records.push(item);
    }
    (records, reader)
}

#[test]
fn every_encap_roundtrips() {
    let (registry, records) = sample_records();
    let file = write_file(&registry, &records);
    let (decoded, reader) = read_all(file);

    assert_eq!(decoded.len(), records.len());
    for (written, (_, read)) in records.iter().zip(&decoded) {
        assert_eq!(written.encap, read.encap);
        assert_eq!(written.iface_id, read.iface_id, "{}", written.encap);
        assert_eq!(written.timestamp_ns, read.timestamp_ns, "{}", written.encap);
        assert_eq!(written.direction, read.direction, "{}", written.encap);
        assert_eq!(written.data, read.data, "{}", written.encap);
        assert_eq!(read.cap_len as usize, read.data.len());
    }

    // interface discovery order matches the registry the file was written with
    assert_eq!(reader.interfaces().len(), registry.len());
    for (id, info) in registry.iter() {
        assert_eq!(reader.interfaces().get(id).unwrap().key, info.key);
    }
}

#[test]
fn random_access_matches_linear_pass() {
    let (registry, records) = sample_records();
    let file = write_file(&registry, &records);
    let (decoded, mut reader) = read_all(file);

    // revisit in reverse order
    for (offset, rec) in decoded.iter().rev() {
        let again = reader.read_record_at(*offset).unwrap().unwrap();
        assert_eq!(&again, rec);
    }
}

#[test]
fn header_counts_and_dates_survive() {
    let (registry, records) = sample_records();
    let file = write_file(&registry, &records);

    let reader = BlfReader::open(Cursor::new(file)).unwrap();
    let header = reader.header();
    // one container plus one object per record
    assert_eq!(header.object_count as usize, records.len() + 1);
    assert_eq!(header.application_id, 9);
    let start_ns = header.start_date.to_epoch_ns().unwrap();
    assert_eq!(start_ns, BASE_TS);
    let end_ns = header.end_date.to_epoch_ns().unwrap();
    // end date is millisecond-truncated from the last record timestamp
    assert_eq!(end_ns, BASE_TS);
}

#[test]
fn rewrite_preserves_record_sequence() {
    let (registry, records) = sample_records();
    let file = write_file(&registry, &records);
    let (first_pass, reader) = read_all(file);

    // re-encode everything the reader produced, using its own registry
    let mut writer = BlfWriter::create(Cursor::new(Vec::new())).unwrap();
    for (_, rec) in &first_pass {
        writer.write_record(rec, reader.interfaces()).unwrap();
    }
    writer.finish().unwrap();
    let rewritten = writer.into_inner().into_inner();

    let (second_pass, _) = read_all(rewritten);
    assert_eq!(first_pass.len(), second_pass.len());
    for ((_, a), (_, b)) in first_pass.iter().zip(&second_pass) {
        assert_eq!(a, b);
    }
}

#[test]
fn roundtrip_through_a_real_file() {
    let (registry, records) = sample_records();

    let mut tmp = tempfile::NamedTempFile::new().unwrap();
    let mut writer = BlfWriter::create(tmp.as_file_mut()).unwrap();
    for rec in &records {
        writer.write_record(rec, &registry).unwrap();
    }
    writer.finish().unwrap();
    drop(writer);

    let file = std::fs::File::open(tmp.path()).unwrap();
    let mut reader = BlfReader::open(std::io::BufReader::new(file)).unwrap();
    let mut count = 0;
    while let Some((_, rec)) = reader.next_record().unwrap() {
        assert_eq!(rec.data, records[count].data);
        count += 1;
    }
    assert_eq!(count, records.len());
}

#[test]
fn ethernet_status_record_roundtrips() {
    let mut registry = InterfaceRegistry::new();
    let status = registry.lookup_or_create(InterfaceKey::new(Protocol::UpperPdu, 1, 0), None);

    // raw 16-byte status struct as the bridged payload
    let mut state = vec![0u8; 16];
    state[0] = 1; // channel
    state[4] = 2; // link up
    let rec = record(
        Encap::UpperPdu,
        status,
        BASE_TS,
        Direction::Rx,
        upper_pdu_data(
            "blf-ethernetstatus-obj",
            "BLF Ethernet Status",
            "Ethernet status event",
            &state,
        ),
    );

    let file = write_file(&registry, &[rec.clone()]);
    let (decoded, _) = read_all(file);
    assert_eq!(decoded.len(), 1);
    assert_eq!(decoded[0].1.data, rec.data);
}

#[test]
fn timestamps_spanning_milliseconds_roundtrip() {
    let mut registry = InterfaceRegistry::new();
    let can = registry.lookup_or_create(InterfaceKey::simple(Protocol::Can, 1), None);

    // offsets chosen to cross millisecond boundaries with ns remainders
    let stamps = [
        BASE_TS + 999_999,
        BASE_TS + 1_000_001,
        BASE_TS + 123_456_789,
        BASE_TS + 60_000_000_000,
    ];
    let records: Vec<BusRecord> = stamps
        .iter()
        .map(|&ts| {
            record(
                Encap::SocketCan,
                can,
                ts,
                Direction::Rx,
                socketcan_data(1, 0, &[0]),
            )
        })
        .collect();

    let file = write_file(&registry, &records);
    let (decoded, _) = read_all(file);
    let read_stamps: Vec<u64> = decoded.iter().map(|(_, r)| r.timestamp_ns).collect();
    assert_eq!(read_stamps, stamps);
}
