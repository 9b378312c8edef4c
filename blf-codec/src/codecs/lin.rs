//! LIN record codecs
//!
//! Two object generations exist: the flat v1 structs and the v2 structs
//! built around a nested message descriptor with nine per-data-byte
//! timestamps. Both decode to the same generic layout: an 8-byte header
//! (format revision 1, three reserved bytes, a dlc/frame-type/checksum-type
//! byte, the protected id, the checksum, an error byte) followed by the
//! data bytes. v2-only fields (checksum model, simulated and
//! event-triggered flags) are folded into the frame-type and checksum-type
//! bits so v1 and v2 frames look alike downstream. Wakeup and sleep events
//! travel through the same layout with the event frame type.

use super::{ensure_fixed, ObjectCtx};
use crate::objects::{OBJTYPE_LIN_MESSAGE, OBJTYPE_LIN_SLEEP, OBJTYPE_LIN_WAKEUP};
use crate::registry::{InterfaceKey, InterfaceRegistry, Protocol};
use crate::types::{BlfError, BusRecord, Direction, Encap, Result};

/// Generic LIN header size
pub const LIN_HEADER_SIZE: usize = 8;

// Frame-type bits (header byte 4, bits 2..4)
pub const LIN_TYPE_FRAME: u8 = 0;
pub const LIN_TYPE_EVENT_TRIGGERED: u8 = 1;
pub const LIN_TYPE_SIMULATED: u8 = 2;
pub const LIN_TYPE_BUS_EVENT: u8 = 3;

// Checksum-type bits (header byte 4, bits 0..2)
pub const LIN_CHECKSUM_CLASSIC: u8 = 0;
pub const LIN_CHECKSUM_ENHANCED: u8 = 1;
pub const LIN_CHECKSUM_UNKNOWN: u8 = 3;

// Error bits (header byte 7)
pub const LIN_ERR_NO_RESPONSE: u8 = 0x01;
pub const LIN_ERR_TRANSMISSION: u8 = 0x02;
pub const LIN_ERR_CHECKSUM: u8 = 0x08;

// Bus-event ids carried in the pid byte of event records
pub const LIN_EVENT_GO_TO_SLEEP: u8 = 1;
pub const LIN_EVENT_WAKEUP: u8 = 2;

const LIN_MESSAGE_FIXED: usize = 24;
const LIN_RCV_ERROR_FIXED: usize = 12;
const LIN_SND_ERROR_FIXED: usize = 12;
const LIN_EVENT_FIXED: usize = 8;

// v2 nested struct sizes
const LIN_BUS_EVENT_SIZE: usize = 16;
const LIN_DESCRIPTOR_SIZE: usize = 40;
const LIN_DATABYTE_TS_SIZE: usize = LIN_DESCRIPTOR_SIZE + 9 * 8;
const LIN_MESSAGE2_FIXED: usize = LIN_DATABYTE_TS_SIZE + 20;
const LIN_CRC_ERROR2_FIXED: usize = LIN_DATABYTE_TS_SIZE + 16;
const LIN_RCV_ERROR2_FIXED: usize = LIN_DATABYTE_TS_SIZE + 16;
const LIN_SND_ERROR2_FIXED: usize = LIN_DESCRIPTOR_SIZE + 12;
const LIN_WAKEUP2_FIXED: usize = LIN_BUS_EVENT_SIZE + 4;

fn lin_header(
    dlc: u8,
    frame_type: u8,
    checksum_type: u8,
    pid: u8,
    checksum: u8,
    errors: u8,
) -> [u8; LIN_HEADER_SIZE] {
    [
        1, // message format revision
        0,
        0,
        0,
        (dlc << 4) | ((frame_type & 0x03) << 2) | (checksum_type & 0x03),
        pid,
        checksum,
        errors,
    ]
}

#[allow(clippy::too_many_arguments)]
fn lin_record(
    ctx: &ObjectCtx,
    registry: &mut InterfaceRegistry,
    channel: u16,
    direction: Direction,
    header: [u8; LIN_HEADER_SIZE],
    payload: &[u8],
) -> BusRecord {
    let iface_id = registry.lookup_or_create(InterfaceKey::simple(Protocol::Lin, channel), None);
    let mut data = Vec::with_capacity(LIN_HEADER_SIZE + payload.len());
    data.extend_from_slice(&header);
    data.extend_from_slice(payload);
    let total = data.len() as u32;
    BusRecord {
        encap: Encap::Lin,
        iface_id,
        cap_len: total,
        wire_len: total,
        timestamp_ns: ctx.timestamp_ns,
        direction,
        data,
    }
}

fn dlc_len(dlc: u8) -> usize {
    (dlc & 0x0F).min(8) as usize
}

fn dir_from(raw: u8) -> Direction {
    if raw == 0 {
        Direction::Rx
    } else {
        Direction::Tx
    }
}

/// LIN_MESSAGE: flat v1 data frame
pub(crate) fn decode_message(
    ctx: &ObjectCtx,
    body: &[u8],
    registry: &mut InterfaceRegistry,
) -> Result<BusRecord> {
    ensure_fixed(body, LIN_MESSAGE_FIXED, "LIN_MESSAGE")?;
    let channel = u16::from_le_bytes([body[0], body[1]]);
    let id = body[2];
    let dlc = body[3];
    let crc = u16::from_le_bytes([body[16], body[17]]);
    let dir = body[18];

    let len = dlc_len(dlc);
    Ok(lin_record(
        ctx,
        registry,
        channel,
        dir_from(dir),
        lin_header(dlc & 0x0F, LIN_TYPE_FRAME, LIN_CHECKSUM_UNKNOWN, id, crc as u8, 0),
        &body[4..4 + len],
    ))
}

/// LIN_CRC_ERROR: v1 frame received with a bad checksum
pub(crate) fn decode_crc_error(
    ctx: &ObjectCtx,
    body: &[u8],
    registry: &mut InterfaceRegistry,
) -> Result<BusRecord> {
    ensure_fixed(body, LIN_MESSAGE_FIXED, "LIN_CRC_ERROR")?;
    let channel = u16::from_le_bytes([body[0], body[1]]);
    let id = body[2];
    let dlc = body[3];
    let crc = u16::from_le_bytes([body[16], body[17]]);
    let dir = body[18];

    let len = dlc_len(dlc);
    Ok(lin_record(
        ctx,
        registry,
        channel,
        dir_from(dir),
        lin_header(
            dlc & 0x0F,
            LIN_TYPE_FRAME,
            LIN_CHECKSUM_UNKNOWN,
            id,
            crc as u8,
            LIN_ERR_CHECKSUM,
        ),
        &body[4..4 + len],
    ))
}

/// LIN_RCV_ERROR: v1 header without a (complete) response
pub(crate) fn decode_rcv_error(
    ctx: &ObjectCtx,
    body: &[u8],
    registry: &mut InterfaceRegistry,
) -> Result<BusRecord> {
    ensure_fixed(body, LIN_RCV_ERROR_FIXED, "LIN_RCV_ERROR")?;
    let channel = u16::from_le_bytes([body[0], body[1]]);
    let id = body[2];
    let dlc = body[3];
    Ok(lin_record(
        ctx,
        registry,
        channel,
        Direction::Rx,
        lin_header(
            dlc & 0x0F,
            LIN_TYPE_FRAME,
            LIN_CHECKSUM_UNKNOWN,
            id,
            0,
            LIN_ERR_NO_RESPONSE,
        ),
        &[],
    ))
}

/// LIN_SND_ERROR: v1 header whose response was never transmitted
pub(crate) fn decode_snd_error(
    ctx: &ObjectCtx,
    body: &[u8],
    registry: &mut InterfaceRegistry,
) -> Result<BusRecord> {
    ensure_fixed(body, LIN_SND_ERROR_FIXED, "LIN_SND_ERROR")?;
    let channel = u16::from_le_bytes([body[0], body[1]]);
    let id = body[2];
    let dlc = body[3];
    Ok(lin_record(
        ctx,
        registry,
        channel,
        Direction::Tx,
        lin_header(
            dlc & 0x0F,
            LIN_TYPE_FRAME,
            LIN_CHECKSUM_UNKNOWN,
            id,
            0,
            LIN_ERR_TRANSMISSION,
        ),
        &[],
    ))
}

fn event_record(
    ctx: &ObjectCtx,
    registry: &mut InterfaceRegistry,
    channel: u16,
    event_id: u8,
    detail: u8,
) -> BusRecord {
    lin_record(
        ctx,
        registry,
        channel,
        Direction::Rx,
        lin_header(0, LIN_TYPE_BUS_EVENT, LIN_CHECKSUM_UNKNOWN, event_id, detail, 0),
        &[],
    )
}

/// LIN_SLEEP: bus entered sleep mode
pub(crate) fn decode_sleep(
    ctx: &ObjectCtx,
    body: &[u8],
    registry: &mut InterfaceRegistry,
) -> Result<BusRecord> {
    ensure_fixed(body, LIN_EVENT_FIXED, "LIN_SLEEP")?;
    let channel = u16::from_le_bytes([body[0], body[1]]);
    let reason = body[2];
    Ok(event_record(ctx, registry, channel, LIN_EVENT_GO_TO_SLEEP, reason))
}

/// LIN_WAKEUP: wake-up signal seen on the bus
pub(crate) fn decode_wakeup(
    ctx: &ObjectCtx,
    body: &[u8],
    registry: &mut InterfaceRegistry,
) -> Result<BusRecord> {
    ensure_fixed(body, LIN_EVENT_FIXED, "LIN_WAKEUP")?;
    let channel = u16::from_le_bytes([body[0], body[1]]);
    let signal = body[2];
    Ok(event_record(ctx, registry, channel, LIN_EVENT_WAKEUP, signal))
}

/// Fields shared by all v2 objects that embed the message descriptor
struct Descriptor {
    channel: u16,
    id: u8,
    dlc: u8,
    checksum_model: u8,
}

// Descriptor layout: sof u64, event baudrate u32, channel u16, reserved u16,
// synch break length u64, synch delimiter length u64, supplier id u16,
// message id u16, nad u8, id u8, dlc u8, checksum model u8
fn parse_descriptor(body: &[u8]) -> Descriptor {
    Descriptor {
        channel: u16::from_le_bytes([body[12], body[13]]),
        id: body[37],
        dlc: body[38],
        checksum_model: body[39],
    }
}

fn checksum_type_from_model(model: u8) -> u8 {
    match model {
        0 => LIN_CHECKSUM_CLASSIC,
        1 => LIN_CHECKSUM_ENHANCED,
        _ => LIN_CHECKSUM_UNKNOWN,
    }
}

fn frame_type_from_flags(is_etf: u8, simulated: u8) -> u8 {
    if is_etf != 0 {
        LIN_TYPE_EVENT_TRIGGERED
    } else if simulated != 0 {
        LIN_TYPE_SIMULATED
    } else {
        LIN_TYPE_FRAME
    }
}

/// LIN_MESSAGE2: v2 data frame with per-byte timestamps
pub(crate) fn decode_message2(
    ctx: &ObjectCtx,
    body: &[u8],
    registry: &mut InterfaceRegistry,
) -> Result<BusRecord> {
    ensure_fixed(body, LIN_MESSAGE2_FIXED, "LIN_MESSAGE2")?;
    let d = parse_descriptor(body);
    let data = &body[LIN_DATABYTE_TS_SIZE..LIN_DATABYTE_TS_SIZE + 8];
    let crc = u16::from_le_bytes([body[LIN_DATABYTE_TS_SIZE + 8], body[LIN_DATABYTE_TS_SIZE + 9]]);
    let dir = body[LIN_DATABYTE_TS_SIZE + 10];
    let simulated = body[LIN_DATABYTE_TS_SIZE + 11];
    let is_etf = body[LIN_DATABYTE_TS_SIZE + 12];

    let len = dlc_len(d.dlc);
    Ok(lin_record(
        ctx,
        registry,
        d.channel,
        dir_from(dir),
        lin_header(
            d.dlc & 0x0F,
            frame_type_from_flags(is_etf, simulated),
            checksum_type_from_model(d.checksum_model),
            d.id,
            crc as u8,
            0,
        ),
        &data[..len],
    ))
}

/// LIN_CRC_ERROR2: v2 frame with a bad checksum
pub(crate) fn decode_crc_error2(
    ctx: &ObjectCtx,
    body: &[u8],
    registry: &mut InterfaceRegistry,
) -> Result<BusRecord> {
    ensure_fixed(body, LIN_CRC_ERROR2_FIXED, "LIN_CRC_ERROR2")?;
    let d = parse_descriptor(body);
    let data = &body[LIN_DATABYTE_TS_SIZE..LIN_DATABYTE_TS_SIZE + 8];
    let crc = u16::from_le_bytes([body[LIN_DATABYTE_TS_SIZE + 8], body[LIN_DATABYTE_TS_SIZE + 9]]);
    let dir = body[LIN_DATABYTE_TS_SIZE + 10];
    let simulated = body[LIN_DATABYTE_TS_SIZE + 13];

    let len = dlc_len(d.dlc);
    Ok(lin_record(
        ctx,
        registry,
        d.channel,
        dir_from(dir),
        lin_header(
            d.dlc & 0x0F,
            frame_type_from_flags(0, simulated),
            checksum_type_from_model(d.checksum_model),
            d.id,
            crc as u8,
            LIN_ERR_CHECKSUM,
        ),
        &data[..len],
    ))
}

/// LIN_RCV_ERROR2: v2 reception error, data bytes only when flagged present
pub(crate) fn decode_rcv_error2(
    ctx: &ObjectCtx,
    body: &[u8],
    registry: &mut InterfaceRegistry,
) -> Result<BusRecord> {
    ensure_fixed(body, LIN_RCV_ERROR2_FIXED, "LIN_RCV_ERROR2")?;
    let d = parse_descriptor(body);
    let data = &body[LIN_DATABYTE_TS_SIZE..LIN_DATABYTE_TS_SIZE + 8];
    let is_etf = body[LIN_DATABYTE_TS_SIZE + 14];
    let has_databytes = body[LIN_DATABYTE_TS_SIZE + 15];

    let len = if has_databytes != 0 { dlc_len(d.dlc) } else { 0 };
    Ok(lin_record(
        ctx,
        registry,
        d.channel,
        Direction::Rx,
        lin_header(
            d.dlc & 0x0F,
            frame_type_from_flags(is_etf, 0),
            checksum_type_from_model(d.checksum_model),
            d.id,
            0,
            LIN_ERR_NO_RESPONSE,
        ),
        &data[..len],
    ))
}

/// LIN_SND_ERROR2: v2 transmission error, descriptor only
pub(crate) fn decode_snd_error2(
    ctx: &ObjectCtx,
    body: &[u8],
    registry: &mut InterfaceRegistry,
) -> Result<BusRecord> {
    ensure_fixed(body, LIN_SND_ERROR2_FIXED, "LIN_SND_ERROR2")?;
    let d = parse_descriptor(body);
    let is_etf = body[LIN_DESCRIPTOR_SIZE + 8];
    Ok(lin_record(
        ctx,
        registry,
        d.channel,
        Direction::Tx,
        lin_header(
            d.dlc & 0x0F,
            frame_type_from_flags(is_etf, 0),
            checksum_type_from_model(d.checksum_model),
            d.id,
            0,
            LIN_ERR_TRANSMISSION,
        ),
        &[],
    ))
}

/// LIN_WAKEUP2: v2 wake-up event
pub(crate) fn decode_wakeup2(
    ctx: &ObjectCtx,
    body: &[u8],
    registry: &mut InterfaceRegistry,
) -> Result<BusRecord> {
    ensure_fixed(body, LIN_WAKEUP2_FIXED, "LIN_WAKEUP2")?;
    let channel = u16::from_le_bytes([body[12], body[13]]);
    let signal = body[LIN_BUS_EVENT_SIZE + 1];
    Ok(event_record(ctx, registry, channel, LIN_EVENT_WAKEUP, signal))
}

/// Encode a generic LIN record, choosing the object type from the record
/// shape: bus events map to sleep/wakeup objects, error bits select the
/// matching v1 error object, frames needing v2-only bits (checksum model,
/// event-triggered/simulated) re-emit a LIN_MESSAGE2, everything else a
/// v1 LIN_MESSAGE.
pub(crate) fn encode(rec: &BusRecord, key: InterfaceKey) -> Result<(u32, Vec<u8>)> {
    use crate::objects::{
        OBJTYPE_LIN_CRC_ERROR, OBJTYPE_LIN_MESSAGE2, OBJTYPE_LIN_RCV_ERROR,
        OBJTYPE_LIN_SND_ERROR,
    };

    if rec.data.len() < LIN_HEADER_SIZE {
        return Err(BlfError::Malformed(format!(
            "LIN record of {} bytes is shorter than its header",
            rec.data.len()
        )));
    }
    let dlc = rec.data[4] >> 4;
    let frame_type = (rec.data[4] >> 2) & 0x03;
    let checksum_type = rec.data[4] & 0x03;
    let pid = rec.data[5];
    let checksum = rec.data[6];
    let errors = rec.data[7];
    let payload = &rec.data[LIN_HEADER_SIZE..];
    let tx = rec.direction == Direction::Tx;

    if frame_type == LIN_TYPE_BUS_EVENT {
        let mut body = vec![0u8; LIN_EVENT_FIXED];
        body[0..2].copy_from_slice(&key.channel.to_le_bytes());
        body[2] = checksum; // event detail byte
        let object_type = match pid {
            LIN_EVENT_GO_TO_SLEEP => OBJTYPE_LIN_SLEEP,
            _ => OBJTYPE_LIN_WAKEUP,
        };
        return Ok((object_type, body));
    }

    if errors & LIN_ERR_NO_RESPONSE != 0 {
        let mut body = vec![0u8; LIN_RCV_ERROR_FIXED];
        body[0..2].copy_from_slice(&key.channel.to_le_bytes());
        body[2] = pid;
        body[3] = dlc;
        return Ok((OBJTYPE_LIN_RCV_ERROR, body));
    }
    if errors & LIN_ERR_TRANSMISSION != 0 {
        let mut body = vec![0u8; LIN_SND_ERROR_FIXED];
        body[0..2].copy_from_slice(&key.channel.to_le_bytes());
        body[2] = pid;
        body[3] = dlc;
        return Ok((OBJTYPE_LIN_SND_ERROR, body));
    }

    let needs_v2 = checksum_type != LIN_CHECKSUM_UNKNOWN || frame_type != LIN_TYPE_FRAME;
    if needs_v2 && errors & LIN_ERR_CHECKSUM == 0 {
        let mut body = vec![0u8; LIN_MESSAGE2_FIXED];
        body[12..14].copy_from_slice(&key.channel.to_le_bytes());
        body[37] = pid;
        body[38] = dlc;
        body[39] = match checksum_type {
            LIN_CHECKSUM_CLASSIC => 0,
            LIN_CHECKSUM_ENHANCED => 1,
            _ => 0xFF,
        };
        let n = payload.len().min(8);
        body[LIN_DATABYTE_TS_SIZE..LIN_DATABYTE_TS_SIZE + n].copy_from_slice(&payload[..n]);
        body[LIN_DATABYTE_TS_SIZE + 8] = checksum;
        body[LIN_DATABYTE_TS_SIZE + 10] = if tx { 1 } else { 0 };
        body[LIN_DATABYTE_TS_SIZE + 11] =
            if frame_type == LIN_TYPE_SIMULATED { 1 } else { 0 };
        body[LIN_DATABYTE_TS_SIZE + 12] =
            if frame_type == LIN_TYPE_EVENT_TRIGGERED { 1 } else { 0 };
        return Ok((OBJTYPE_LIN_MESSAGE2, body));
    }

    let mut body = vec![0u8; LIN_MESSAGE_FIXED];
    body[0..2].copy_from_slice(&key.channel.to_le_bytes());
    body[2] = pid;
    body[3] = dlc;
    let n = payload.len().min(8);
    body[4..4 + n].copy_from_slice(&payload[..n]);
    body[16] = checksum;
    body[18] = if tx { 1 } else { 0 };
    let object_type = if errors & LIN_ERR_CHECKSUM != 0 {
        OBJTYPE_LIN_CRC_ERROR
    } else {
        OBJTYPE_LIN_MESSAGE
    };
    Ok((object_type, body))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(object_type: u32, _body_len: usize) -> ObjectCtx {
        ObjectCtx {
            object_type,
            header_length: 32,
            timestamp_ns: 0,
        }
    }

    #[test]
    fn test_v1_message_decode() {
        let mut body = vec![0u8; LIN_MESSAGE_FIXED];
        body[0] = 1; // channel
        body[2] = 0x34; // protected id
        body[3] = 4; // dlc
        body[4..8].copy_from_slice(&[0x11, 0x22, 0x33, 0x44]);
        body[16] = 0x5A; // checksum
        body[18] = 1; // tx

        let mut reg = InterfaceRegistry::new();
        let rec = decode_message(&ctx(11, body.len()), &body, &mut reg).unwrap();
        assert_eq!(rec.direction, Direction::Tx);
        assert_eq!(rec.data[0], 1); // format revision
        assert_eq!(rec.data[4] >> 4, 4);
        assert_eq!(rec.data[5], 0x34);
        assert_eq!(rec.data[6], 0x5A);
        assert_eq!(&rec.data[8..], &[0x11, 0x22, 0x33, 0x44]);
    }

    #[test]
    fn test_v1_roundtrip_through_encode() {
        let mut body = vec![0u8; LIN_MESSAGE_FIXED];
        body[0] = 2;
        body[2] = 0x17;
        body[3] = 2;
        body[4..6].copy_from_slice(&[0xAB, 0xCD]);
        body[16] = 0x99;

        let mut reg = InterfaceRegistry::new();
        let rec = decode_message(&ctx(11, body.len()), &body, &mut reg).unwrap();
        let key = reg.get(rec.iface_id).unwrap().key;
        let (obj_type, encoded) = encode(&rec, key).unwrap();
        assert_eq!(obj_type, OBJTYPE_LIN_MESSAGE);
        let rec2 = decode_message(&ctx(11, encoded.len()), &encoded, &mut reg).unwrap();
        assert_eq!(rec.data, rec2.data);
        assert_eq!(rec.direction, rec2.direction);
    }

    fn message2_body() -> Vec<u8> {
        let mut body = vec![0u8; LIN_MESSAGE2_FIXED];
        body[12..14].copy_from_slice(&3u16.to_le_bytes()); // channel
        body[37] = 0x21; // id
        body[38] = 3; // dlc
        body[39] = 1; // enhanced checksum model
        body[LIN_DATABYTE_TS_SIZE..LIN_DATABYTE_TS_SIZE + 3]
            .copy_from_slice(&[0xDE, 0xAD, 0xBE]);
        body[LIN_DATABYTE_TS_SIZE + 8] = 0x42; // crc low byte
        body
    }

    #[test]
    fn test_v2_message_converges_to_v1_shape() {
        let body = message2_body();
        let mut reg = InterfaceRegistry::new();
        let rec = decode_message2(&ctx(57, body.len()), &body, &mut reg).unwrap();

        assert_eq!(rec.data[4] >> 4, 3);
        assert_eq!(rec.data[4] & 0x03, LIN_CHECKSUM_ENHANCED);
        assert_eq!((rec.data[4] >> 2) & 0x03, LIN_TYPE_FRAME);
        assert_eq!(rec.data[5], 0x21);
        assert_eq!(rec.data[6], 0x42);
        assert_eq!(&rec.data[8..], &[0xDE, 0xAD, 0xBE]);
    }

    #[test]
    fn test_v2_etf_flag_maps_to_frame_type() {
        let mut body = message2_body();
        body[LIN_DATABYTE_TS_SIZE + 12] = 1; // event-triggered
        let mut reg = InterfaceRegistry::new();
        let rec = decode_message2(&ctx(57, body.len()), &body, &mut reg).unwrap();
        assert_eq!((rec.data[4] >> 2) & 0x03, LIN_TYPE_EVENT_TRIGGERED);
    }

    #[test]
    fn test_rcv_error2_without_databytes() {
        let mut body = vec![0u8; LIN_RCV_ERROR2_FIXED];
        body[12..14].copy_from_slice(&1u16.to_le_bytes());
        body[38] = 8; // dlc
        body[LIN_DATABYTE_TS_SIZE + 15] = 0; // no data bytes present
        let mut reg = InterfaceRegistry::new();
        let rec = decode_rcv_error2(&ctx(61, body.len()), &body, &mut reg).unwrap();
        assert_eq!(rec.cap_len as usize, LIN_HEADER_SIZE);
        assert_eq!(rec.data[7], LIN_ERR_NO_RESPONSE);
    }

    #[test]
    fn test_wakeup_event_roundtrip() {
        let mut body = vec![0u8; LIN_EVENT_FIXED];
        body[0] = 5; // channel
        body[2] = 0x7F; // signal
        let mut reg = InterfaceRegistry::new();
        let rec = decode_wakeup(&ctx(21, body.len()), &body, &mut reg).unwrap();
        assert_eq!((rec.data[4] >> 2) & 0x03, LIN_TYPE_BUS_EVENT);
        assert_eq!(rec.data[5], LIN_EVENT_WAKEUP);

        let key = reg.get(rec.iface_id).unwrap().key;
        let (obj_type, encoded) = encode(&rec, key).unwrap();
        assert_eq!(obj_type, OBJTYPE_LIN_WAKEUP);
        let rec2 = decode_wakeup(&ctx(21, encoded.len()), &encoded, &mut reg).unwrap();
        assert_eq!(rec.data, rec2.data);
    }

    #[test]
    fn test_v2_roundtrip_through_message2() {
        let body = message2_body();
        let mut reg = InterfaceRegistry::new();
        let rec = decode_message2(&ctx(57, body.len()), &body, &mut reg).unwrap();

        let key = reg.get(rec.iface_id).unwrap().key;
        let (obj_type, encoded) = encode(&rec, key).unwrap();
        assert_eq!(obj_type, crate::objects::OBJTYPE_LIN_MESSAGE2);
        let rec2 = decode_message2(&ctx(57, encoded.len()), &encoded, &mut reg).unwrap();
        assert_eq!(rec.data, rec2.data);
    }

    #[test]
    fn test_error_bits_select_error_objects() {
        let mut reg = InterfaceRegistry::new();
        let mut body = vec![0u8; LIN_MESSAGE_FIXED];
        body[0] = 1;
        body[2] = 0x17;
        body[3] = 2;
        let rec = decode_crc_error(&ctx(12, body.len()), &body, &mut reg).unwrap();
        let key = reg.get(rec.iface_id).unwrap().key;
        let (obj_type, encoded) = encode(&rec, key).unwrap();
        assert_eq!(obj_type, crate::objects::OBJTYPE_LIN_CRC_ERROR);
        let rec2 = decode_crc_error(&ctx(12, encoded.len()), &encoded, &mut reg).unwrap();
        assert_eq!(rec.data, rec2.data);

        let body = {
            let mut b = vec![0u8; LIN_RCV_ERROR_FIXED];
            b[0] = 1;
            b[2] = 0x20;
            b[3] = 4;
            b
        };
        let rec = decode_rcv_error(&ctx(14, body.len()), &body, &mut reg).unwrap();
        let (obj_type, encoded) = encode(&rec, key).unwrap();
        assert_eq!(obj_type, crate::objects::OBJTYPE_LIN_RCV_ERROR);
        let rec2 = decode_rcv_error(&ctx(14, encoded.len()), &encoded, &mut reg).unwrap();
        assert_eq!(rec.data, rec2.data);
    }

    #[test]
    fn test_sleep_event_encodes_to_sleep_object() {
        let mut body = vec![0u8; LIN_EVENT_FIXED];
        body[0] = 1;
        body[2] = 2; // reason
        let mut reg = InterfaceRegistry::new();
        let rec = decode_sleep(&ctx(20, body.len()), &body, &mut reg).unwrap();
        let key = reg.get(rec.iface_id).unwrap().key;
        assert_eq!(encode(&rec, key).unwrap().0, OBJTYPE_LIN_SLEEP);
    }
}
