//! Record codecs
//!
//! One decode/encode pair per bus object type. Decoders translate the BLF
//! wire layout of an object body into a [`BusRecord`] with the generic
//! per-protocol payload layout; encoders reverse the translation for the
//! write path. Shared rules:
//!
//! - a body shorter than the type's fixed header is a fatal per-object
//!   error (the declared object length is self-consistent metadata),
//! - declared payload lengths are additionally clamped against the bytes
//!   actually present in the object; overshoot truncates, it does not fail,
//! - generic preambles are reproduced byte for byte so records round-trip.

pub(crate) mod apptext;
pub(crate) mod can;
pub(crate) mod ethernet;
pub(crate) mod flexray;
pub(crate) mod lin;

use crate::objects::*;
use crate::registry::{InterfaceKey, InterfaceRegistry};
use crate::types::{BlfError, BusRecord, Encap, Result};

/// Per-object context handed to every decoder
#[derive(Debug, Clone, Copy)]
pub(crate) struct ObjectCtx {
    pub object_type: u32,
    pub header_length: u16,
    /// Converted to nanoseconds and offset by the file start date
    pub timestamp_ns: u64,
}

/// Outcome of dispatching one object to the codec set
pub(crate) enum Decoded {
    Record(BusRecord),
    /// Recognized but intentionally not decoded (legacy or unsupported
    /// subtype); the scanner steps over it silently
    Skipped,
    /// No codec for this object type; the scanner warns once per type
    Unknown,
}

/// Fixed-header length check shared by all decoders
pub(crate) fn ensure_fixed(body: &[u8], fixed: usize, what: &str) -> Result<()> {
    if body.len() < fixed {
        return Err(BlfError::Malformed(format!(
            "{} object body of {} bytes too short for its {}-byte fixed header",
            what,
            body.len(),
            fixed
        )));
    }
    Ok(())
}

/// Decode one non-container, non-AppText object body
pub(crate) fn decode_object(
    ctx: &ObjectCtx,
    body: &[u8],
    registry: &mut InterfaceRegistry,
) -> Result<Decoded> {
    let record = match ctx.object_type {
        OBJTYPE_CAN_MESSAGE | OBJTYPE_CAN_MESSAGE2 => Some(can::decode_can_message(ctx, body, registry)?),
        OBJTYPE_CAN_ERROR => Some(can::decode_can_error(ctx, body, registry)?),
        OBJTYPE_CAN_OVERLOAD => Some(can::decode_can_overload(ctx, body, registry)?),
        OBJTYPE_CAN_ERROR_EXT => Some(can::decode_can_error_ext(ctx, body, registry)?),
        OBJTYPE_CAN_FD_MESSAGE => Some(can::decode_can_fd_message(ctx, body, registry)?),
        OBJTYPE_CAN_FD_MESSAGE_64 => Some(can::decode_can_fd_message64(ctx, body, registry)?),
        OBJTYPE_CAN_FD_ERROR_64 => Some(can::decode_can_fd_error64(ctx, body, registry)?),
        OBJTYPE_CAN_XL_CHANNEL_FRAME => Some(can::decode_can_xl_frame(ctx, body, registry)?),
        OBJTYPE_CAN_XL_CHANNEL_ERROR_FRAME => {
            // carries no payload a generic consumer can use yet
            log::debug!("skipping CAN XL error frame object");
            return Ok(Decoded::Skipped);
        }
        OBJTYPE_ETHERNET_FRAME => Some(ethernet::decode_frame(ctx, body, registry)?),
        OBJTYPE_ETHERNET_FRAME_EX | OBJTYPE_ETHERNET_ERROR_EX => {
            Some(ethernet::decode_frame_ex(ctx, body, registry)?)
        }
        OBJTYPE_ETHERNET_RX_ERROR => Some(ethernet::decode_rx_error(ctx, body, registry)?),
        OBJTYPE_ETHERNET_STATUS => Some(ethernet::decode_status(ctx, body, registry)?),
        OBJTYPE_ETHERNET_PHY_STATE => Some(ethernet::decode_phy_state(ctx, body, registry)?),
        OBJTYPE_WLAN_FRAME => Some(ethernet::decode_wlan_frame(ctx, body, registry)?),
        OBJTYPE_FLEXRAY_DATA => Some(flexray::decode_data(ctx, body, registry)?),
        OBJTYPE_FLEXRAY_MESSAGE => Some(flexray::decode_message(ctx, body, registry)?),
        OBJTYPE_FLEXRAY_RCVMESSAGE => Some(flexray::decode_rcvmessage(ctx, body, registry, false)?),
        OBJTYPE_FLEXRAY_RCVMESSAGE_EX => Some(flexray::decode_rcvmessage(ctx, body, registry, true)?),
        OBJTYPE_LIN_MESSAGE => Some(lin::decode_message(ctx, body, registry)?),
        OBJTYPE_LIN_CRC_ERROR => Some(lin::decode_crc_error(ctx, body, registry)?),
        OBJTYPE_LIN_RCV_ERROR => Some(lin::decode_rcv_error(ctx, body, registry)?),
        OBJTYPE_LIN_SND_ERROR => Some(lin::decode_snd_error(ctx, body, registry)?),
        OBJTYPE_LIN_SLEEP => Some(lin::decode_sleep(ctx, body, registry)?),
        OBJTYPE_LIN_WAKEUP => Some(lin::decode_wakeup(ctx, body, registry)?),
        OBJTYPE_LIN_MESSAGE2 => Some(lin::decode_message2(ctx, body, registry)?),
        OBJTYPE_LIN_CRC_ERROR2 => Some(lin::decode_crc_error2(ctx, body, registry)?),
        OBJTYPE_LIN_RCV_ERROR2 => Some(lin::decode_rcv_error2(ctx, body, registry)?),
        OBJTYPE_LIN_SND_ERROR2 => Some(lin::decode_snd_error2(ctx, body, registry)?),
        OBJTYPE_LIN_WAKEUP2 => Some(lin::decode_wakeup2(ctx, body, registry)?),
        _ => None,
    };
    Ok(match record {
        Some(rec) => Decoded::Record(rec),
        None => Decoded::Unknown,
    })
}

/// Serialize a generic record into an object body, choosing the canonical
/// object type for its shape. Returns `(object_type, body_bytes)`.
pub(crate) fn encode_record(rec: &BusRecord, key: InterfaceKey) -> Result<(u32, Vec<u8>)> {
    match rec.encap {
        Encap::SocketCan => can::encode(rec, key),
        Encap::Ethernet => ethernet::encode_frame(rec, key),
        Encap::FlexRay => flexray::encode_rcvmessage(rec, key),
        Encap::Lin => lin::encode(rec, key),
        Encap::Ieee80211 => ethernet::encode_wlan_frame(rec, key),
        Encap::UpperPdu => apptext::encode_upper_pdu(rec, key),
    }
}
