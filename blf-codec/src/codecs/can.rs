//! CAN record codecs: classic, CAN-FD, CAN-FD64, CAN XL and error frames
//!
//! The generic payload layout is SocketCAN-like: a big-endian 32-bit id with
//! EFF/RTR/ERR flag bits, a length byte, a flags byte (FDF/BRS/ESI for FD),
//! two reserved bytes, then the data. CAN XL frames use the 12-byte XL
//! header (priority, flags, SDU type, length, acceptance field) instead.

use super::{ensure_fixed, ObjectCtx};
use crate::registry::{InterfaceKey, InterfaceRegistry, Protocol};
use crate::types::{BlfError, BusRecord, Direction, Encap, Result};

// Flag bits inside the generic 32-bit id field (network byte order)
pub const CAN_EFF_FLAG: u32 = 0x8000_0000;
pub const CAN_RTR_FLAG: u32 = 0x4000_0000;
pub const CAN_ERR_FLAG: u32 = 0x2000_0000;
pub const CAN_EFF_MASK: u32 = 0x1FFF_FFFF;
pub const CAN_SFF_MASK: u32 = 0x0000_07FF;

// Flags byte of the generic header (offset 5)
pub const CANFD_BRS: u8 = 0x01;
pub const CANFD_ESI: u8 = 0x02;
pub const CANFD_FDF: u8 = 0x04;

// Flags byte of the generic CAN XL header (offset 4)
pub const CANXL_SEC: u8 = 0x01;
pub const CANXL_RRS: u8 = 0x02;
pub const CANXL_XLF: u8 = 0x80;

/// Size of the generic CAN header preceding the data bytes
pub const CAN_HEADER_SIZE: usize = 8;
/// Size of the generic CAN XL header preceding the data bytes
pub const CANXL_HEADER_SIZE: usize = 12;

// BLF-side flag bits
const BLF_CAN_FLAG_TX: u8 = 0x01;
const BLF_CAN_FLAG_RTR: u8 = 0x80;
const BLF_CAN_ID_EXTENDED: u32 = 0x8000_0000;
const BLF_CANFD_EDL: u8 = 0x01;
const BLF_CANFD_BRS: u8 = 0x02;
const BLF_CANFD_ESI: u8 = 0x04;
const BLF_CANFD64_FLAG_REMOTE: u32 = 0x0000_0010;
const BLF_CANFD64_FLAG_EDL: u32 = 0x0000_1000;
const BLF_CANFD64_FLAG_BRS: u32 = 0x0000_2000;
const BLF_CANFD64_FLAG_ESI: u32 = 0x0000_4000;
// CAN XL channel-frame flags
const BLF_CANXL_FLAG_XLF: u16 = 0x0001;
const BLF_CANXL_FLAG_SEC: u16 = 0x0002;
const BLF_CANXL_FLAG_RRS: u16 = 0x0004;
const BLF_CANXL_FLAG_RTR: u16 = 0x0008;
const BLF_CANXL_FLAG_EDL: u16 = 0x0010;
const BLF_CANXL_FLAG_BRS: u16 = 0x0020;
const BLF_CANXL_FLAG_ESI: u16 = 0x0040;

/// Classic CAN DLC to byte length; DLC above 8 clamps to 8
pub const CLASSIC_DLC_TO_LEN: [u8; 16] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 8, 8, 8, 8, 8, 8, 8];
/// CAN-FD DLC to byte length
pub const FD_DLC_TO_LEN: [u8; 16] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 12, 16, 20, 24, 32, 48, 64];

/// Byte length encoded by a DLC value. Pure table lookup, no out-of-table
/// access for any input.
pub fn dlc_to_len(dlc: u8, fd: bool) -> usize {
    let table = if fd { &FD_DLC_TO_LEN } else { &CLASSIC_DLC_TO_LEN };
    table[(dlc & 0x0F) as usize] as usize
}

/// Smallest DLC whose encoded length covers `len`
pub fn len_to_dlc(len: usize, fd: bool) -> u8 {
    let table = if fd { &FD_DLC_TO_LEN } else { &CLASSIC_DLC_TO_LEN };
    for (dlc, &table_len) in table.iter().enumerate() {
        if table_len as usize >= len {
            return dlc as u8;
        }
    }
    15
}

/// Build the 8-byte generic CAN header
fn can_header(can_id: u32, len: u8, flags: u8) -> [u8; CAN_HEADER_SIZE] {
    let mut h = [0u8; CAN_HEADER_SIZE];
    h[0..4].copy_from_slice(&can_id.to_be_bytes());
    h[4] = len;
    h[5] = flags;
    h
}

/// Apply the extended-frame flag: ids above the 11-bit range are extended
/// even when the source object did not mark them so.
fn generic_can_id(raw_id: u32, rtr: bool, err: bool) -> u32 {
    let mut id = raw_id & CAN_EFF_MASK;
    if raw_id & BLF_CAN_ID_EXTENDED != 0 || id > CAN_SFF_MASK {
        id |= CAN_EFF_FLAG;
    }
    if rtr {
        id |= CAN_RTR_FLAG;
    }
    if err {
        id |= CAN_ERR_FLAG;
    }
    id
}

fn can_record(
    ctx: &ObjectCtx,
    registry: &mut InterfaceRegistry,
    channel: u16,
    direction: Direction,
    can_id: u32,
    flags: u8,
    payload: &[u8],
) -> BusRecord {
    let iface_id = registry.lookup_or_create(InterfaceKey::simple(Protocol::Can, channel), None);
    let mut data = Vec::with_capacity(CAN_HEADER_SIZE + payload.len());
    data.extend_from_slice(&can_header(can_id, payload.len() as u8, flags));
    data.extend_from_slice(payload);
    let total = data.len() as u32;
    BusRecord {
        encap: Encap::SocketCan,
        iface_id,
        cap_len: total,
        wire_len: total,
        timestamp_ns: ctx.timestamp_ns,
        direction,
        data,
    }
}

/// CAN_MESSAGE / CAN_MESSAGE2: channel, flags, dlc, id, 8 data bytes
/// (CAN_MESSAGE2 carries trailing timing fields the generic record drops)
pub(crate) fn decode_can_message(
    ctx: &ObjectCtx,
    body: &[u8],
    registry: &mut InterfaceRegistry,
) -> Result<BusRecord> {
    ensure_fixed(body, 16, "CAN_MESSAGE")?;
    let channel = u16::from_le_bytes([body[0], body[1]]);
    let flags = body[2];
    let dlc = body[3];
    let raw_id = u32::from_le_bytes([body[4], body[5], body[6], body[7]]);

    let rtr = flags & BLF_CAN_FLAG_RTR != 0;
    let len = if rtr { 0 } else { dlc_to_len(dlc, false).min(8) };
    let direction = if flags & BLF_CAN_FLAG_TX != 0 {
        Direction::Tx
    } else {
        Direction::Rx
    };
    Ok(can_record(
        ctx,
        registry,
        channel,
        direction,
        generic_can_id(raw_id, rtr, false),
        0,
        &body[8..8 + len],
    ))
}

/// CAN_ERROR: channel and frame length only; emitted as a SocketCAN error
/// frame with the conventional 8 zero data bytes
pub(crate) fn decode_can_error(
    ctx: &ObjectCtx,
    body: &[u8],
    registry: &mut InterfaceRegistry,
) -> Result<BusRecord> {
    ensure_fixed(body, 4, "CAN_ERROR")?;
    let channel = u16::from_le_bytes([body[0], body[1]]);
    Ok(can_record(
        ctx,
        registry,
        channel,
        Direction::Rx,
        CAN_ERR_FLAG,
        0,
        &[0u8; 8],
    ))
}

/// CAN_OVERLOAD: overload condition on the bus, shaped like an error frame
pub(crate) fn decode_can_overload(
    ctx: &ObjectCtx,
    body: &[u8],
    registry: &mut InterfaceRegistry,
) -> Result<BusRecord> {
    ensure_fixed(body, 4, "CAN_OVERLOAD")?;
    let channel = u16::from_le_bytes([body[0], body[1]]);
    Ok(can_record(
        ctx,
        registry,
        channel,
        Direction::Rx,
        CAN_ERR_FLAG,
        0,
        &[0u8; 8],
    ))
}

/// CAN_ERROR_EXT: extended error frame with ECC, position and frame data
pub(crate) fn decode_can_error_ext(
    ctx: &ObjectCtx,
    body: &[u8],
    registry: &mut InterfaceRegistry,
) -> Result<BusRecord> {
    ensure_fixed(body, 32, "CAN_ERROR_EXT")?;
    let channel = u16::from_le_bytes([body[0], body[1]]);
    let dlc = body[10];
    let raw_id = u32::from_le_bytes([body[16], body[17], body[18], body[19]]);
    let len = dlc_to_len(dlc, false).min(8);
    Ok(can_record(
        ctx,
        registry,
        channel,
        Direction::Rx,
        generic_can_id(raw_id, false, true),
        0,
        &body[24..24 + len],
    ))
}

/// CAN_FD_MESSAGE: FD frame with up to 64 data bytes; frames without the
/// EDL bit are classic frames logged through the FD object
pub(crate) fn decode_can_fd_message(
    ctx: &ObjectCtx,
    body: &[u8],
    registry: &mut InterfaceRegistry,
) -> Result<BusRecord> {
    ensure_fixed(body, 20, "CAN_FD_MESSAGE")?;
    let channel = u16::from_le_bytes([body[0], body[1]]);
    let flags = body[2];
    let dlc = body[3];
    let raw_id = u32::from_le_bytes([body[4], body[5], body[6], body[7]]);
    let canfd_flags = body[13];
    let valid_bytes = body[14] as usize;

    let fd = canfd_flags & BLF_CANFD_EDL != 0;
    let rtr = !fd && flags & BLF_CAN_FLAG_RTR != 0;
    let avail = body.len() - 20;
    let len = if rtr {
        0
    } else {
        dlc_to_len(dlc, fd).min(valid_bytes).min(avail)
    };

    let mut gen_flags = 0u8;
    if fd {
        gen_flags |= CANFD_FDF;
        if canfd_flags & BLF_CANFD_BRS != 0 {
            gen_flags |= CANFD_BRS;
        }
        if canfd_flags & BLF_CANFD_ESI != 0 {
            gen_flags |= CANFD_ESI;
        }
    }
    let direction = if flags & BLF_CAN_FLAG_TX != 0 {
        Direction::Tx
    } else {
        Direction::Rx
    };
    Ok(can_record(
        ctx,
        registry,
        channel,
        direction,
        generic_can_id(raw_id, rtr, false),
        gen_flags,
        &body[20..20 + len],
    ))
}

/// CAN_FD_MESSAGE_64: 64-byte FD frame variant with bitrate configuration
/// and an optional extension block after the data
pub(crate) fn decode_can_fd_message64(
    ctx: &ObjectCtx,
    body: &[u8],
    registry: &mut InterfaceRegistry,
) -> Result<BusRecord> {
    ensure_fixed(body, 40, "CAN_FD_MESSAGE_64")?;
    let channel = body[0] as u16;
    let dlc = body[1];
    let valid_bytes = body[2] as usize;
    let raw_id = u32::from_le_bytes([body[4], body[5], body[6], body[7]]);
    let flags = u32::from_le_bytes([body[12], body[13], body[14], body[15]]);
    let dir = body[34];
    let ext_data_offset = body[35] as usize;

    // the extension block, when present, bounds the data area
    let avail = if ext_data_offset > 0 {
        ext_data_offset
            .saturating_sub(ctx.header_length as usize + 40)
            .min(body.len() - 40)
    } else {
        body.len() - 40
    };

    let fd = flags & BLF_CANFD64_FLAG_EDL != 0;
    let rtr = !fd && flags & BLF_CANFD64_FLAG_REMOTE != 0;
    let len = if rtr {
        0
    } else {
        dlc_to_len(dlc, fd).min(valid_bytes).min(avail)
    };

    let mut gen_flags = 0u8;
    if fd {
        gen_flags |= CANFD_FDF;
        if flags & BLF_CANFD64_FLAG_BRS != 0 {
            gen_flags |= CANFD_BRS;
        }
        if flags & BLF_CANFD64_FLAG_ESI != 0 {
            gen_flags |= CANFD_ESI;
        }
    }
    let direction = if dir == 0 { Direction::Rx } else { Direction::Tx };
    Ok(can_record(
        ctx,
        registry,
        channel,
        direction,
        generic_can_id(raw_id, rtr, false),
        gen_flags,
        &body[40..40 + len],
    ))
}

/// CAN_FD_ERROR_64: FD error frame with frame data
pub(crate) fn decode_can_fd_error64(
    ctx: &ObjectCtx,
    body: &[u8],
    registry: &mut InterfaceRegistry,
) -> Result<BusRecord> {
    ensure_fixed(body, 44, "CAN_FD_ERROR_64")?;
    let channel = body[0] as u16;
    let dlc = body[1];
    let valid_bytes = body[2] as usize;
    let raw_id = u32::from_le_bytes([body[12], body[13], body[14], body[15]]);

    let avail = body.len() - 44;
    let len = dlc_to_len(dlc, true).min(valid_bytes).min(avail);
    Ok(can_record(
        ctx,
        registry,
        channel,
        Direction::Rx,
        generic_can_id(raw_id, false, true),
        CANFD_FDF,
        &body[44..44 + len],
    ))
}

// CAN XL channel-frame body layout:
//   0  u16 channel          14 u8  dir
//   2  u16 flags            15 u8  vcid
//   4  u32 id/priority      16 u8  sdu_type
//   8  u32 frame_length_ns  17 u8  reserved
//   12 u16 bit_count        18 u16 data_length
//                           20 u32 acceptance_field
//                           24 u32 crc
//                           28 u32 reserved
const CANXL_FIXED: usize = 32;

/// CAN_XL_CHANNEL_FRAME: either a true CAN XL frame or a classic/FD frame
/// tunneled through the XL object type, discriminated by the XLF flag
pub(crate) fn decode_can_xl_frame(
    ctx: &ObjectCtx,
    body: &[u8],
    registry: &mut InterfaceRegistry,
) -> Result<BusRecord> {
    ensure_fixed(body, CANXL_FIXED, "CAN_XL_CHANNEL_FRAME")?;
    let channel = u16::from_le_bytes([body[0], body[1]]);
    let flags = u16::from_le_bytes([body[2], body[3]]);
    let raw_id = u32::from_le_bytes([body[4], body[5], body[6], body[7]]);
    let dir = body[14];
    let vcid = body[15];
    let sdu_type = body[16];
    let data_length = u16::from_le_bytes([body[18], body[19]]) as usize;
    let acceptance = u32::from_le_bytes([body[20], body[21], body[22], body[23]]);

    let avail = body.len() - CANXL_FIXED;
    let direction = if dir == 0 { Direction::Rx } else { Direction::Tx };

    if flags & BLF_CANXL_FLAG_XLF == 0 {
        // classic or FD frame tunneled through the XL object
        let fd = flags & BLF_CANXL_FLAG_EDL != 0;
        let rtr = !fd && flags & BLF_CANXL_FLAG_RTR != 0;
        let max_len = if fd { 64 } else { 8 };
        let len = if rtr { 0 } else { data_length.min(max_len).min(avail) };
        let mut gen_flags = 0u8;
        if fd {
            gen_flags |= CANFD_FDF;
            if flags & BLF_CANXL_FLAG_BRS != 0 {
                gen_flags |= CANFD_BRS;
            }
            if flags & BLF_CANXL_FLAG_ESI != 0 {
                gen_flags |= CANFD_ESI;
            }
        }
        return Ok(can_record(
            ctx,
            registry,
            channel,
            direction,
            generic_can_id(raw_id, rtr, false),
            gen_flags,
            &body[CANXL_FIXED..CANXL_FIXED + len],
        ));
    }

    // true CAN XL frame: 12-byte XL header before the data
    let len = data_length.min(avail);
    let mut xl_flags = CANXL_XLF;
    if flags & BLF_CANXL_FLAG_SEC != 0 {
        xl_flags |= CANXL_SEC;
    }
    if flags & BLF_CANXL_FLAG_RRS != 0 {
        xl_flags |= CANXL_RRS;
    }
    let prio = ((vcid as u32) << 16) | (raw_id & CAN_SFF_MASK);

    let iface_id = registry.lookup_or_create(InterfaceKey::simple(Protocol::Can, channel), None);
    let mut data = Vec::with_capacity(CANXL_HEADER_SIZE + len);
    data.extend_from_slice(&prio.to_be_bytes());
    data.push(xl_flags);
    data.push(sdu_type);
    data.extend_from_slice(&(data_length as u16).to_be_bytes());
    data.extend_from_slice(&acceptance.to_be_bytes());
    data.extend_from_slice(&body[CANXL_FIXED..CANXL_FIXED + len]);
    let cap = data.len() as u32;
    Ok(BusRecord {
        encap: Encap::SocketCan,
        iface_id,
        cap_len: cap,
        wire_len: (CANXL_HEADER_SIZE + data_length) as u32,
        timestamp_ns: ctx.timestamp_ns,
        direction,
        data,
    })
}

/// Split a generic CAN payload back into its header fields
struct GenericCan<'a> {
    can_id: u32,
    len: usize,
    flags: u8,
    payload: &'a [u8],
}

fn parse_generic(data: &[u8]) -> Result<GenericCan<'_>> {
    if data.len() < CAN_HEADER_SIZE {
        return Err(BlfError::Malformed(format!(
            "generic CAN record of {} bytes is shorter than its header",
            data.len()
        )));
    }
    let can_id = u32::from_be_bytes([data[0], data[1], data[2], data[3]]);
    let len = (data[4] as usize).min(data.len() - CAN_HEADER_SIZE);
    Ok(GenericCan {
        can_id,
        len,
        flags: data[5],
        payload: &data[CAN_HEADER_SIZE..CAN_HEADER_SIZE + len],
    })
}

fn blf_raw_id(can_id: u32) -> u32 {
    let mut id = can_id & CAN_EFF_MASK;
    if can_id & CAN_EFF_FLAG != 0 {
        id |= BLF_CAN_ID_EXTENDED;
    }
    id
}

/// Encode a generic SocketCAN record, choosing the object type from the
/// record shape: XL header, FD flags, error flag, else classic.
pub(crate) fn encode(rec: &BusRecord, key: InterfaceKey) -> Result<(u32, Vec<u8>)> {
    use crate::objects::{
        OBJTYPE_CAN_ERROR_EXT, OBJTYPE_CAN_FD_MESSAGE, OBJTYPE_CAN_MESSAGE,
        OBJTYPE_CAN_XL_CHANNEL_FRAME,
    };

    // a CAN XL header is recognizable by its always-set XLF bit, which can
    // never appear in the classic header's length byte
    if rec.data.len() >= CANXL_HEADER_SIZE && rec.data[4] & CANXL_XLF != 0 {
        return encode_xl(rec, key, OBJTYPE_CAN_XL_CHANNEL_FRAME);
    }

    let gen = parse_generic(&rec.data)?;
    let tx = rec.direction == Direction::Tx;

    if gen.can_id & CAN_ERR_FLAG != 0 {
        // extended error frame object
        let mut body = vec![0u8; 32];
        body[0..2].copy_from_slice(&key.channel.to_le_bytes());
        body[10] = len_to_dlc(gen.len, false);
        body[16..20].copy_from_slice(&blf_raw_id(gen.can_id).to_le_bytes());
        let n = gen.len.min(8);
        body[24..24 + n].copy_from_slice(&gen.payload[..n]);
        return Ok((OBJTYPE_CAN_ERROR_EXT, body));
    }

    if gen.flags & CANFD_FDF != 0 {
        let mut body = vec![0u8; 20 + 64];
        body[0..2].copy_from_slice(&key.channel.to_le_bytes());
        body[2] = if tx { BLF_CAN_FLAG_TX } else { 0 };
        body[3] = len_to_dlc(gen.len, true);
        body[4..8].copy_from_slice(&blf_raw_id(gen.can_id).to_le_bytes());
        let mut canfd_flags = BLF_CANFD_EDL;
        if gen.flags & CANFD_BRS != 0 {
            canfd_flags |= BLF_CANFD_BRS;
        }
        if gen.flags & CANFD_ESI != 0 {
            canfd_flags |= BLF_CANFD_ESI;
        }
        body[13] = canfd_flags;
        body[14] = gen.len as u8;
        let n = gen.len.min(64);
        body[20..20 + n].copy_from_slice(&gen.payload[..n]);
        return Ok((OBJTYPE_CAN_FD_MESSAGE, body));
    }

    let rtr = gen.can_id & CAN_RTR_FLAG != 0;
    let mut body = vec![0u8; 16];
    body[0..2].copy_from_slice(&key.channel.to_le_bytes());
    let mut flags = if tx { BLF_CAN_FLAG_TX } else { 0 };
    if rtr {
        flags |= BLF_CAN_FLAG_RTR;
    }
    body[2] = flags;
    body[3] = len_to_dlc(gen.len, false);
    body[4..8].copy_from_slice(&blf_raw_id(gen.can_id).to_le_bytes());
    let n = gen.len.min(8);
    body[8..8 + n].copy_from_slice(&gen.payload[..n]);
    Ok((OBJTYPE_CAN_MESSAGE, body))
}

fn encode_xl(rec: &BusRecord, key: InterfaceKey, object_type: u32) -> Result<(u32, Vec<u8>)> {
    let data = &rec.data;
    let prio = u32::from_be_bytes([data[0], data[1], data[2], data[3]]);
    let xl_flags = data[4];
    let sdu_type = data[5];
    let data_length = u16::from_be_bytes([data[6], data[7]]) as usize;
    let acceptance = u32::from_be_bytes([data[8], data[9], data[10], data[11]]);
    let payload = &data[CANXL_HEADER_SIZE..];

    let mut flags = BLF_CANXL_FLAG_XLF;
    if xl_flags & CANXL_SEC != 0 {
        flags |= BLF_CANXL_FLAG_SEC;
    }
    if xl_flags & CANXL_RRS != 0 {
        flags |= BLF_CANXL_FLAG_RRS;
    }

    let mut body = vec![0u8; CANXL_FIXED + payload.len()];
    body[0..2].copy_from_slice(&key.channel.to_le_bytes());
    body[2..4].copy_from_slice(&flags.to_le_bytes());
    body[4..8].copy_from_slice(&(prio & CAN_SFF_MASK).to_le_bytes());
    body[14] = if rec.direction == Direction::Tx { 1 } else { 0 };
    body[15] = (prio >> 16) as u8;
    body[16] = sdu_type;
    body[18..20].copy_from_slice(&(data_length as u16).to_le_bytes());
    body[20..24].copy_from_slice(&acceptance.to_le_bytes());
    body[CANXL_FIXED..].copy_from_slice(payload);
    Ok((object_type, body))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(object_type: u32, _body_len: usize) -> ObjectCtx {
        ObjectCtx {
            object_type,
            header_length: 32,
            timestamp_ns: 1000,
        }
    }

    #[test]
    fn test_dlc_tables() {
        for dlc in 0u8..=15 {
            let classic = dlc_to_len(dlc, false);
            assert!(classic <= 8, "classic dlc {} gave {}", dlc, classic);
            if dlc <= 8 {
                assert_eq!(classic, dlc as usize);
            }
        }
        assert_eq!(dlc_to_len(9, true), 12);
        assert_eq!(dlc_to_len(15, true), 64);
        // masking keeps out-of-range inputs in the table
        assert_eq!(dlc_to_len(0xFF, false), 8);
    }

    #[test]
    fn test_len_to_dlc_inverse() {
        for dlc in 0u8..=15 {
            let len = dlc_to_len(dlc, true);
            assert_eq!(dlc_to_len(len_to_dlc(len, true), true), len);
        }
        assert_eq!(len_to_dlc(9, true), 9); // 9 bytes needs the 12-byte slot
        assert_eq!(len_to_dlc(9, false), 15); // no classic slot covers 9 bytes
    }

    #[test]
    fn test_decode_classic_message() {
        let mut body = vec![0u8; 16];
        body[0] = 1; // channel
        body[2] = BLF_CAN_FLAG_TX;
        body[3] = 4; // dlc
        body[4..8].copy_from_slice(&0x123u32.to_le_bytes());
        body[8..12].copy_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);

        let mut reg = InterfaceRegistry::new();
        let rec = decode_can_message(&ctx(1, body.len()), &body, &mut reg).unwrap();
        assert_eq!(rec.encap, Encap::SocketCan);
        assert_eq!(rec.iface_id, 0);
        assert_eq!(rec.direction, Direction::Tx);
        assert_eq!(rec.cap_len, 12);
        assert_eq!(&rec.data[0..4], &[0, 0, 0x01, 0x23]);
        assert_eq!(rec.data[4], 4);
        assert_eq!(&rec.data[8..], &[0xDE, 0xAD, 0xBE, 0xEF]);
    }

    #[test]
    fn test_decode_extended_and_remote() {
        let mut body = vec![0u8; 16];
        body[2] = BLF_CAN_FLAG_RTR;
        body[3] = 8;
        body[4..8].copy_from_slice(&(0x1234_5678u32 | BLF_CAN_ID_EXTENDED).to_le_bytes());

        let mut reg = InterfaceRegistry::new();
        let rec = decode_can_message(&ctx(1, body.len()), &body, &mut reg).unwrap();
        let id = u32::from_be_bytes([rec.data[0], rec.data[1], rec.data[2], rec.data[3]]);
        assert!(id & CAN_EFF_FLAG != 0);
        assert!(id & CAN_RTR_FLAG != 0);
        // remote frames carry no payload regardless of DLC
        assert_eq!(rec.cap_len, 8);
        assert_eq!(rec.data[4], 0);

        // an id above the 11-bit range is extended even without the marker
        let mut body = vec![0u8; 16];
        body[4..8].copy_from_slice(&0x800u32.to_le_bytes());
        let rec = decode_can_message(&ctx(1, body.len()), &body, &mut reg).unwrap();
        let id = u32::from_be_bytes([rec.data[0], rec.data[1], rec.data[2], rec.data[3]]);
        assert!(id & CAN_EFF_FLAG != 0);
    }

    #[test]
    fn test_decode_fd_message() {
        let mut body = vec![0u8; 20 + 64];
        body[0] = 2;
        body[3] = 9; // dlc 9 -> 12 bytes
        body[4..8].copy_from_slice(&0x456u32.to_le_bytes());
        body[13] = BLF_CANFD_EDL | BLF_CANFD_BRS;
        body[14] = 12;
        for i in 0..12 {
            body[20 + i] = i as u8;
        }
        let mut reg = InterfaceRegistry::new();
        let rec = decode_can_fd_message(&ctx(100, body.len()), &body, &mut reg).unwrap();
        assert_eq!(rec.cap_len, 8 + 12);
        assert_eq!(rec.data[5], CANFD_FDF | CANFD_BRS);
        assert_eq!(rec.data[4], 12);
    }

    #[test]
    fn test_fd_payload_clamped_to_object_bounds() {
        // dlc says 64 bytes but the object only carries 4
        let mut body = vec![0u8; 24];
        body[3] = 15;
        body[14] = 64;
        let mut reg = InterfaceRegistry::new();
        let rec = decode_can_fd_message(&ctx(100, body.len()), &body, &mut reg).unwrap();
        assert_eq!(rec.cap_len, 8 + 4);
    }

    #[test]
    fn test_short_fixed_header_is_fatal() {
        let body = vec![0u8; 10];
        let mut reg = InterfaceRegistry::new();
        assert!(matches!(
            decode_can_message(&ctx(1, body.len()), &body, &mut reg),
            Err(BlfError::Malformed(_))
        ));
    }

    #[test]
    fn test_classic_roundtrip_through_encode() {
        let mut body = vec![0u8; 16];
        body[0] = 1;
        body[3] = 4;
        body[4..8].copy_from_slice(&0x123u32.to_le_bytes());
        body[8..12].copy_from_slice(&[1, 2, 3, 4]);
        let mut reg = InterfaceRegistry::new();
        let rec = decode_can_message(&ctx(1, body.len()), &body, &mut reg).unwrap();

        let key = reg.get(rec.iface_id).unwrap().key;
        let (obj_type, encoded) = encode(&rec, key).unwrap();
        assert_eq!(obj_type, crate::objects::OBJTYPE_CAN_MESSAGE);

        let rec2 = decode_can_message(&ctx(1, encoded.len()), &encoded, &mut reg).unwrap();
        assert_eq!(rec.data, rec2.data);
        assert_eq!(rec.direction, rec2.direction);
    }

    #[test]
    fn test_xl_frame_roundtrip() {
        let payload: Vec<u8> = (0..48).collect();
        let mut body = vec![0u8; CANXL_FIXED + payload.len()];
        body[0] = 3; // channel
        body[2..4].copy_from_slice(
            &(BLF_CANXL_FLAG_XLF | BLF_CANXL_FLAG_SEC).to_le_bytes(),
        );
        body[4..8].copy_from_slice(&0x55u32.to_le_bytes());
        body[15] = 2; // vcid
        body[16] = 0x03; // sdu type
        body[18..20].copy_from_slice(&(payload.len() as u16).to_le_bytes());
        body[20..24].copy_from_slice(&0xCAFEu32.to_le_bytes());
        body[CANXL_FIXED..].copy_from_slice(&payload);

        let mut reg = InterfaceRegistry::new();
        let rec = decode_can_xl_frame(&ctx(135, body.len()), &body, &mut reg).unwrap();
        assert_eq!(rec.data[4] & CANXL_XLF, CANXL_XLF);
        assert_eq!(rec.data[4] & CANXL_SEC, CANXL_SEC);
        assert_eq!(&rec.data[CANXL_HEADER_SIZE..], &payload[..]);

        let key = reg.get(rec.iface_id).unwrap().key;
        let (obj_type, encoded) = encode(&rec, key).unwrap();
        assert_eq!(obj_type, crate::objects::OBJTYPE_CAN_XL_CHANNEL_FRAME);
        let rec2 = decode_can_xl_frame(&ctx(135, encoded.len()), &encoded, &mut reg).unwrap();
        assert_eq!(rec.data, rec2.data);
    }

    #[test]
    fn test_xl_tunneled_classic_uses_can_path() {
        let mut body = vec![0u8; CANXL_FIXED + 8];
        body[2..4].copy_from_slice(&0u16.to_le_bytes()); // XLF clear
        body[4..8].copy_from_slice(&0x77u32.to_le_bytes());
        body[18..20].copy_from_slice(&4u16.to_le_bytes());
        body[CANXL_FIXED..CANXL_FIXED + 4].copy_from_slice(&[9, 9, 9, 9]);
        let mut reg = InterfaceRegistry::new();
        let rec = decode_can_xl_frame(&ctx(135, body.len()), &body, &mut reg).unwrap();
        assert_eq!(rec.cap_len, 8 + 4);
        assert_eq!(rec.data[4], 4);
        assert_eq!(rec.data[5] & CANFD_FDF, 0);
    }
}
