//! Ethernet and WLAN record codecs
//!
//! The plain ETHERNET_FRAME object stores the frame fields out of order
//! (source MAC, channel, destination MAC, direction, EtherType, VLAN tag,
//! payload length); decode reassembles a standards-shaped Ethernet II frame
//! and encode reverses the reassembly exactly, re-deriving whether a VLAN
//! tag block is present from the frame bytes. The EX/error/RX-error objects
//! already carry a standard frame and only need their envelope stripped.
//! Status and phy-state objects carry no frame at all; they are bridged as
//! Upper-PDU records tagging the raw state struct with a dissector name.

use super::apptext::upper_pdu_payload;
use super::{ensure_fixed, ObjectCtx};
use crate::objects::{
    OBJTYPE_ETHERNET_FRAME, OBJTYPE_ETHERNET_PHY_STATE, OBJTYPE_ETHERNET_STATUS,
    OBJTYPE_WLAN_FRAME,
};
use crate::registry::{InterfaceKey, InterfaceRegistry, Protocol};
use crate::types::{BlfError, BusRecord, Direction, Encap, Result};

/// Dissector tag carried by Ethernet status Upper-PDU records
pub const STATUS_DISSECTOR: &str = "blf-ethernetstatus-obj";
/// Dissector tag carried by Ethernet phy-state Upper-PDU records
pub const PHY_STATE_DISSECTOR: &str = "blf-ethernetphystate-obj";

// TPIDs that announce an 802.1Q / 802.1ad tag in a standard frame
const VLAN_TPIDS: [u16; 3] = [0x8100, 0x88A8, 0x9100];

const ETH_FRAME_FIXED: usize = 32;
const ETH_EX_FIXED: usize = 32;
const ETH_RX_ERROR_FIXED: usize = 20;
const WLAN_FIXED: usize = 16;
const ETH_STATUS_FIXED: usize = 16;
const ETH_PHY_STATE_FIXED: usize = 8;

fn direction_from(dir: u16) -> Direction {
    if dir == 0 {
        Direction::Rx
    } else {
        Direction::Tx
    }
}

/// ETHERNET_FRAME: reorder the stored fields back into an Ethernet II frame
pub(crate) fn decode_frame(
    ctx: &ObjectCtx,
    body: &[u8],
    registry: &mut InterfaceRegistry,
) -> Result<BusRecord> {
    ensure_fixed(body, ETH_FRAME_FIXED, "ETHERNET_FRAME")?;
    let src = &body[0..6];
    let channel = u16::from_le_bytes([body[6], body[7]]);
    let dst = &body[8..14];
    let dir = u16::from_le_bytes([body[14], body[15]]);
    let ethtype = u16::from_le_bytes([body[16], body[17]]);
    let tpid = u16::from_le_bytes([body[18], body[19]]);
    let tci = u16::from_le_bytes([body[20], body[21]]);
    let payload_length = u16::from_le_bytes([body[22], body[23]]) as usize;

    let avail = body.len() - ETH_FRAME_FIXED;
    let captured = payload_length.min(avail);
    let has_vlan = tpid != 0 || tci != 0;

    let mut data = Vec::with_capacity(12 + 4 + 2 + captured);
    data.extend_from_slice(dst);
    data.extend_from_slice(src);
    if has_vlan {
        data.extend_from_slice(&tpid.to_be_bytes());
        data.extend_from_slice(&tci.to_be_bytes());
    }
    data.extend_from_slice(&ethtype.to_be_bytes());
    data.extend_from_slice(&body[ETH_FRAME_FIXED..ETH_FRAME_FIXED + captured]);

    let header_len = data.len() - captured;
    let iface_id = registry.lookup_or_create(InterfaceKey::simple(Protocol::Ethernet, channel), None);
    Ok(BusRecord {
        encap: Encap::Ethernet,
        iface_id,
        cap_len: data.len() as u32,
        wire_len: (header_len + payload_length) as u32,
        timestamp_ns: ctx.timestamp_ns,
        direction: direction_from(dir),
        data,
    })
}

/// ETHERNET_FRAME_EX / ETHERNET_ERROR_EX: the payload is a complete frame
pub(crate) fn decode_frame_ex(
    ctx: &ObjectCtx,
    body: &[u8],
    registry: &mut InterfaceRegistry,
) -> Result<BusRecord> {
    ensure_fixed(body, ETH_EX_FIXED, "ETHERNET_FRAME_EX")?;
    let struct_length = u16::from_le_bytes([body[0], body[1]]) as usize;
    let channel = u16::from_le_bytes([body[4], body[5]]);
    let hw_channel = u16::from_le_bytes([body[6], body[7]]);
    let dir = u16::from_le_bytes([body[20], body[21]]);
    let frame_length = u16::from_le_bytes([body[22], body[23]]) as usize;

    // struct_length allows future header growth; the frame follows it
    let frame_start = struct_length.max(ETH_EX_FIXED).min(body.len());
    let captured = frame_length.min(body.len() - frame_start);

    let iface_id = registry.lookup_or_create(
        InterfaceKey::new(Protocol::Ethernet, channel, hw_channel),
        None,
    );
    Ok(BusRecord {
        encap: Encap::Ethernet,
        iface_id,
        cap_len: captured as u32,
        wire_len: frame_length as u32,
        timestamp_ns: ctx.timestamp_ns,
        direction: direction_from(dir),
        data: body[frame_start..frame_start + captured].to_vec(),
    })
}

/// ETHERNET_RX_ERROR: a complete frame that failed reception
pub(crate) fn decode_rx_error(
    ctx: &ObjectCtx,
    body: &[u8],
    registry: &mut InterfaceRegistry,
) -> Result<BusRecord> {
    ensure_fixed(body, ETH_RX_ERROR_FIXED, "ETHERNET_RX_ERROR")?;
    let struct_length = u16::from_le_bytes([body[0], body[1]]) as usize;
    let channel = u16::from_le_bytes([body[2], body[3]]);
    let dir = u16::from_le_bytes([body[4], body[5]]);
    let hw_channel = u16::from_le_bytes([body[6], body[7]]);
    let frame_data_length = u16::from_le_bytes([body[12], body[13]]) as usize;

    let frame_start = struct_length.max(ETH_RX_ERROR_FIXED).min(body.len());
    let captured = frame_data_length.min(body.len() - frame_start);

    let iface_id = registry.lookup_or_create(
        InterfaceKey::new(Protocol::Ethernet, channel, hw_channel),
        None,
    );
    Ok(BusRecord {
        encap: Encap::Ethernet,
        iface_id,
        cap_len: captured as u32,
        wire_len: frame_data_length as u32,
        timestamp_ns: ctx.timestamp_ns,
        direction: direction_from(dir),
        data: body[frame_start..frame_start + captured].to_vec(),
    })
}

/// WLAN_FRAME: raw IEEE 802.11 frame bytes
pub(crate) fn decode_wlan_frame(
    ctx: &ObjectCtx,
    body: &[u8],
    registry: &mut InterfaceRegistry,
) -> Result<BusRecord> {
    ensure_fixed(body, WLAN_FIXED, "WLAN_FRAME")?;
    let channel = u16::from_le_bytes([body[0], body[1]]);
    let dir = body[4];
    let frame_length = u16::from_le_bytes([body[10], body[11]]) as usize;

    let captured = frame_length.min(body.len() - WLAN_FIXED);
    let iface_id = registry.lookup_or_create(InterfaceKey::simple(Protocol::Wlan, channel), None);
    Ok(BusRecord {
        encap: Encap::Ieee80211,
        iface_id,
        cap_len: captured as u32,
        wire_len: frame_length as u32,
        timestamp_ns: ctx.timestamp_ns,
        direction: direction_from(dir as u16),
        data: body[WLAN_FIXED..WLAN_FIXED + captured].to_vec(),
    })
}

fn state_record(
    ctx: &ObjectCtx,
    registry: &mut InterfaceRegistry,
    channel: u16,
    hw_channel: u16,
    dissector: &str,
    col_proto: &str,
    col_info: &str,
    body: &[u8],
) -> BusRecord {
    let iface_id = registry.lookup_or_create(
        InterfaceKey::new(Protocol::UpperPdu, channel, hw_channel),
        None,
    );
    let data = upper_pdu_payload(dissector, col_proto, col_info, body);
    BusRecord {
        encap: Encap::UpperPdu,
        iface_id,
        cap_len: data.len() as u32,
        wire_len: data.len() as u32,
        timestamp_ns: ctx.timestamp_ns,
        direction: Direction::Rx,
        data,
    }
}

/// ETHERNET_STATUS: link state change, bridged as an Upper-PDU record
/// carrying the raw status struct
pub(crate) fn decode_status(
    ctx: &ObjectCtx,
    body: &[u8],
    registry: &mut InterfaceRegistry,
) -> Result<BusRecord> {
    ensure_fixed(body, ETH_STATUS_FIXED, "ETHERNET_STATUS")?;
    let channel = u16::from_le_bytes([body[0], body[1]]);
    let hw_channel = body[11] as u16;
    Ok(state_record(
        ctx,
        registry,
        channel,
        hw_channel,
        STATUS_DISSECTOR,
        "BLF Ethernet Status",
        "Ethernet status event",
        body,
    ))
}

/// ETHERNET_PHY_STATE: phy negotiation state, bridged like status objects
pub(crate) fn decode_phy_state(
    ctx: &ObjectCtx,
    body: &[u8],
    registry: &mut InterfaceRegistry,
) -> Result<BusRecord> {
    ensure_fixed(body, ETH_PHY_STATE_FIXED, "ETHERNET_PHY_STATE")?;
    let channel = u16::from_le_bytes([body[0], body[1]]);
    let hw_channel = body[6] as u16;
    Ok(state_record(
        ctx,
        registry,
        channel,
        hw_channel,
        PHY_STATE_DISSECTOR,
        "BLF Ethernet Phy State",
        "Ethernet phy state event",
        body,
    ))
}

/// Encode a standard Ethernet II frame into an ETHERNET_FRAME body,
/// splitting destination/source/VLAN back into the stored field order
pub(crate) fn encode_frame(rec: &BusRecord, key: InterfaceKey) -> Result<(u32, Vec<u8>)> {
    let frame = &rec.data;
    if frame.len() < 14 {
        return Err(BlfError::Malformed(format!(
            "Ethernet record of {} bytes is shorter than a minimal frame",
            frame.len()
        )));
    }
    let dst = &frame[0..6];
    let src = &frame[6..12];
    let outer_type = u16::from_be_bytes([frame[12], frame[13]]);

    let (tpid, tci, ethtype, payload) = if VLAN_TPIDS.contains(&outer_type) && frame.len() >= 18 {
        let tci = u16::from_be_bytes([frame[14], frame[15]]);
        let ethtype = u16::from_be_bytes([frame[16], frame[17]]);
        (outer_type, tci, ethtype, &frame[18..])
    } else {
        (0, 0, outer_type, &frame[14..])
    };

    let mut body = vec![0u8; ETH_FRAME_FIXED + payload.len()];
    body[0..6].copy_from_slice(src);
    body[6..8].copy_from_slice(&key.channel.to_le_bytes());
    body[8..14].copy_from_slice(dst);
    let dir: u16 = if rec.direction == Direction::Tx { 1 } else { 0 };
    body[14..16].copy_from_slice(&dir.to_le_bytes());
    body[16..18].copy_from_slice(&ethtype.to_le_bytes());
    body[18..20].copy_from_slice(&tpid.to_le_bytes());
    body[20..22].copy_from_slice(&tci.to_le_bytes());
    body[22..24].copy_from_slice(&(payload.len() as u16).to_le_bytes());
    body[ETH_FRAME_FIXED..].copy_from_slice(payload);
    Ok((OBJTYPE_ETHERNET_FRAME, body))
}

/// Encode a WLAN record into a WLAN_FRAME body
pub(crate) fn encode_wlan_frame(rec: &BusRecord, key: InterfaceKey) -> Result<(u32, Vec<u8>)> {
    let mut body = vec![0u8; WLAN_FIXED + rec.data.len()];
    body[0..2].copy_from_slice(&key.channel.to_le_bytes());
    body[4] = if rec.direction == Direction::Tx { 1 } else { 0 };
    body[10..12].copy_from_slice(&(rec.data.len() as u16).to_le_bytes());
    body[WLAN_FIXED..].copy_from_slice(&rec.data);
    Ok((OBJTYPE_WLAN_FRAME, body))
}

/// Encode a status/phy-state Upper-PDU record back into its object type.
/// Returns `None` if the dissector tag belongs to another codec.
pub(crate) fn encode_state(dissector: &str, state: &[u8]) -> Option<(u32, Vec<u8>)> {
    match dissector {
        STATUS_DISSECTOR => Some((OBJTYPE_ETHERNET_STATUS, state.to_vec())),
        PHY_STATE_DISSECTOR => Some((OBJTYPE_ETHERNET_PHY_STATE, state.to_vec())),
        _ => None,
    }
}
