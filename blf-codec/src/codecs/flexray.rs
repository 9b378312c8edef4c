//! FlexRay record codecs
//!
//! Three object generations carry FlexRay frames (FLEXRAY_DATA,
//! FLEXRAY_MESSAGE, FLEXRAY_RCVMESSAGE with an EX variant). All of them
//! decode to the same generic layout: a one-byte measurement header, an
//! error-flags byte, then the 5-byte FlexRay frame header (indicators,
//! frame id, payload length in words, header CRC, cycle) followed by the
//! payload bytes. The encode path always emits the RCVMESSAGE shape, the
//! generation current tooling writes.

use super::{ensure_fixed, ObjectCtx};
use crate::objects::OBJTYPE_FLEXRAY_RCVMESSAGE;
use crate::registry::{InterfaceKey, InterfaceRegistry, Protocol};
use crate::types::{BlfError, BusRecord, Direction, Encap, Result};

/// Measurement-header value for a data frame
pub const FR_MEASUREMENT_FRAME: u8 = 0x01;
/// Generic FlexRay preamble size (measurement + error + frame header)
pub const FR_PREAMBLE_SIZE: usize = 7;

// Indicator bits of the generic frame header
pub const FR_IND_STARTUP: u8 = 0x01;
pub const FR_IND_SYNC: u8 = 0x02;
pub const FR_IND_NULL: u8 = 0x04;
pub const FR_IND_PPI: u8 = 0x08;

// RCVMESSAGE frameFlags bits
const RCV_FLAG_NULL: u32 = 0x0000_0001;
const RCV_FLAG_SYNC: u32 = 0x0000_0004;
const RCV_FLAG_STARTUP: u32 = 0x0000_0008;
const RCV_FLAG_PPI: u32 = 0x0000_0010;

const FR_DATA_FIXED: usize = 12;
const FR_MESSAGE_FIXED: usize = 32;
const FR_RCV_FIXED: usize = 44;
/// Extra fixed bytes the EX variant inserts before the payload
const FR_RCV_EX_EXTRA: usize = 40;

const FR_FRAME_ID_MASK: u16 = 0x07FF;
const FR_HEADER_CRC_MASK: u16 = 0x07FF;
const FR_MAX_PAYLOAD: usize = 254;

/// Build the generic preamble for one frame
fn preamble(
    frame_id: u16,
    payload_len: usize,
    header_crc: u16,
    cycle: u8,
    indicators: u8,
    error_flags: u8,
) -> [u8; FR_PREAMBLE_SIZE] {
    let words = (payload_len.min(FR_MAX_PAYLOAD) / 2) as u8;
    let id = frame_id & FR_FRAME_ID_MASK;
    let crc = header_crc & FR_HEADER_CRC_MASK;
    [
        FR_MEASUREMENT_FRAME,
        error_flags,
        ((indicators & 0x1F) << 3) | ((id >> 8) as u8),
        (id & 0xFF) as u8,
        (words << 1) | ((crc >> 10) as u8),
        ((crc >> 2) & 0xFF) as u8,
        (((crc & 0x03) as u8) << 6) | (cycle & 0x3F),
    ]
}

struct PreambleFields {
    frame_id: u16,
    header_crc: u16,
    cycle: u8,
    indicators: u8,
}

fn parse_preamble(data: &[u8]) -> Result<PreambleFields> {
    if data.len() < FR_PREAMBLE_SIZE {
        return Err(BlfError::Malformed(format!(
            "FlexRay record of {} bytes is shorter than its preamble",
            data.len()
        )));
    }
    Ok(PreambleFields {
        frame_id: (((data[2] & 0x07) as u16) << 8) | data[3] as u16,
        header_crc: (((data[4] & 0x01) as u16) << 10)
            | ((data[5] as u16) << 2)
            | ((data[6] >> 6) as u16),
        cycle: data[6] & 0x3F,
        indicators: data[2] >> 3,
    })
}

fn flexray_record(
    ctx: &ObjectCtx,
    registry: &mut InterfaceRegistry,
    channel: u16,
    direction: Direction,
    frame_id: u16,
    header_crc: u16,
    cycle: u8,
    indicators: u8,
    payload: &[u8],
    wire_payload_len: usize,
) -> BusRecord {
    let iface_id =
        registry.lookup_or_create(InterfaceKey::simple(Protocol::FlexRay, channel), None);
    let mut data = Vec::with_capacity(FR_PREAMBLE_SIZE + payload.len());
    data.extend_from_slice(&preamble(
        frame_id,
        wire_payload_len,
        header_crc,
        cycle,
        indicators,
        0,
    ));
    data.extend_from_slice(payload);
    BusRecord {
        encap: Encap::FlexRay,
        iface_id,
        cap_len: data.len() as u32,
        wire_len: (FR_PREAMBLE_SIZE + wire_payload_len) as u32,
        timestamp_ns: ctx.timestamp_ns,
        direction,
        data,
    }
}

/// FLEXRAY_DATA: the oldest frame shape, id and CRC only
pub(crate) fn decode_data(
    ctx: &ObjectCtx,
    body: &[u8],
    registry: &mut InterfaceRegistry,
) -> Result<BusRecord> {
    ensure_fixed(body, FR_DATA_FIXED, "FLEXRAY_DATA")?;
    let channel = u16::from_le_bytes([body[0], body[1]]);
    let len = (body[3] as usize).min(body.len() - FR_DATA_FIXED);
    let message_id = u16::from_le_bytes([body[4], body[5]]);
    let crc = u16::from_le_bytes([body[6], body[7]]);
    let dir = body[8];

    Ok(flexray_record(
        ctx,
        registry,
        channel,
        if dir == 0 { Direction::Rx } else { Direction::Tx },
        message_id,
        crc,
        0,
        0,
        &body[FR_DATA_FIXED..FR_DATA_FIXED + len],
        len,
    ))
}

/// FLEXRAY_MESSAGE: frame shape with cluster timing and state bits
pub(crate) fn decode_message(
    ctx: &ObjectCtx,
    body: &[u8],
    registry: &mut InterfaceRegistry,
) -> Result<BusRecord> {
    ensure_fixed(body, FR_MESSAGE_FIXED, "FLEXRAY_MESSAGE")?;
    let channel = u16::from_le_bytes([body[0], body[1]]);
    let dir = body[2];
    let frame_id = u16::from_le_bytes([body[20], body[21]]);
    let header_crc = u16::from_le_bytes([body[22], body[23]]);
    let length = body[26] as usize;
    let cycle = body[27];
    let header_bit_mask = body[28];

    // the stored bit mask matches the generic indicator layout
    let indicators = header_bit_mask & 0x1F;
    let len = length.min(body.len() - FR_MESSAGE_FIXED);
    Ok(flexray_record(
        ctx,
        registry,
        channel,
        if dir == 0 { Direction::Rx } else { Direction::Tx },
        frame_id,
        header_crc,
        cycle,
        indicators,
        &body[FR_MESSAGE_FIXED..FR_MESSAGE_FIXED + len],
        length,
    ))
}

/// FLEXRAY_RCVMESSAGE / FLEXRAY_RCVMESSAGE_EX: the current frame shape
pub(crate) fn decode_rcvmessage(
    ctx: &ObjectCtx,
    body: &[u8],
    registry: &mut InterfaceRegistry,
    ex: bool,
) -> Result<BusRecord> {
    let fixed = if ex { FR_RCV_FIXED + FR_RCV_EX_EXTRA } else { FR_RCV_FIXED };
    ensure_fixed(body, fixed, "FLEXRAY_RCVMESSAGE")?;
    let channel = u16::from_le_bytes([body[0], body[1]]);
    let dir = u16::from_le_bytes([body[6], body[7]]);
    let frame_id = u16::from_le_bytes([body[16], body[17]]);
    let header_crc = u16::from_le_bytes([body[18], body[19]]);
    let payload_length = u16::from_le_bytes([body[22], body[23]]) as usize;
    let payload_length_valid = u16::from_le_bytes([body[24], body[25]]) as usize;
    let cycle = (u16::from_le_bytes([body[26], body[27]]) & 0xFF) as u8;
    let frame_flags = u32::from_le_bytes([body[36], body[37], body[38], body[39]]);

    let mut indicators = 0u8;
    if frame_flags & RCV_FLAG_NULL != 0 {
        indicators |= FR_IND_NULL;
    }
    if frame_flags & RCV_FLAG_SYNC != 0 {
        indicators |= FR_IND_SYNC;
    }
    if frame_flags & RCV_FLAG_STARTUP != 0 {
        indicators |= FR_IND_STARTUP;
    }
    if frame_flags & RCV_FLAG_PPI != 0 {
        indicators |= FR_IND_PPI;
    }

    let len = payload_length_valid.min(body.len() - fixed);
    Ok(flexray_record(
        ctx,
        registry,
        channel,
        if dir & 0xFF == 0 { Direction::Rx } else { Direction::Tx },
        frame_id,
        header_crc,
        cycle,
        indicators,
        &body[fixed..fixed + len],
        payload_length.max(len),
    ))
}

/// Encode a generic FlexRay record as a FLEXRAY_RCVMESSAGE body
pub(crate) fn encode_rcvmessage(rec: &BusRecord, key: InterfaceKey) -> Result<(u32, Vec<u8>)> {
    let fields = parse_preamble(&rec.data)?;
    let payload = &rec.data[FR_PREAMBLE_SIZE..];

    let mut frame_flags = 0u32;
    if fields.indicators & FR_IND_NULL != 0 {
        frame_flags |= RCV_FLAG_NULL;
    }
    if fields.indicators & FR_IND_SYNC != 0 {
        frame_flags |= RCV_FLAG_SYNC;
    }
    if fields.indicators & FR_IND_STARTUP != 0 {
        frame_flags |= RCV_FLAG_STARTUP;
    }
    if fields.indicators & FR_IND_PPI != 0 {
        frame_flags |= RCV_FLAG_PPI;
    }

    let mut body = vec![0u8; FR_RCV_FIXED + payload.len()];
    body[0..2].copy_from_slice(&key.channel.to_le_bytes());
    let dir: u16 = if rec.direction == Direction::Tx { 1 } else { 0 };
    body[6..8].copy_from_slice(&dir.to_le_bytes());
    body[16..18].copy_from_slice(&fields.frame_id.to_le_bytes());
    body[18..20].copy_from_slice(&fields.header_crc.to_le_bytes());
    body[22..24].copy_from_slice(&(payload.len() as u16).to_le_bytes());
    body[24..26].copy_from_slice(&(payload.len() as u16).to_le_bytes());
    body[26..28].copy_from_slice(&(fields.cycle as u16).to_le_bytes());
    body[36..40].copy_from_slice(&frame_flags.to_le_bytes());
    body[FR_RCV_FIXED..].copy_from_slice(payload);
    Ok((OBJTYPE_FLEXRAY_RCVMESSAGE, body))
}
