//! BLF object-level constants and headers
//!
//! Single source of truth for the object-type codes, the per-object block
//! header, and the three typed object-header extensions. Keeping every code
//! here prevents mismatches between the scanner, the record codecs, and the
//! writer.

use crate::bytes;

/// Object-level magic, `"LOBJ"`
pub const OBJECT_MAGIC: &[u8; 4] = b"LOBJ";

/// Size of the block header every object starts with
pub const BLOCK_HEADER_SIZE: usize = 16;

// Object type codes. The full table is carried so unknown-type warnings can
// name what was skipped; only a subset produces records.
pub const OBJTYPE_UNKNOWN: u32 = 0;
pub const OBJTYPE_CAN_MESSAGE: u32 = 1;
pub const OBJTYPE_CAN_ERROR: u32 = 2;
pub const OBJTYPE_CAN_OVERLOAD: u32 = 3;
pub const OBJTYPE_CAN_STATISTIC: u32 = 4;
pub const OBJTYPE_APP_TRIGGER: u32 = 5;
pub const OBJTYPE_ENV_INTEGER: u32 = 6;
pub const OBJTYPE_ENV_DOUBLE: u32 = 7;
pub const OBJTYPE_ENV_STRING: u32 = 8;
pub const OBJTYPE_ENV_DATA: u32 = 9;
pub const OBJTYPE_LOG_CONTAINER: u32 = 10;
pub const OBJTYPE_LIN_MESSAGE: u32 = 11;
pub const OBJTYPE_LIN_CRC_ERROR: u32 = 12;
pub const OBJTYPE_LIN_DLC_INFO: u32 = 13;
pub const OBJTYPE_LIN_RCV_ERROR: u32 = 14;
pub const OBJTYPE_LIN_SND_ERROR: u32 = 15;
pub const OBJTYPE_LIN_SLV_TIMEOUT: u32 = 16;
pub const OBJTYPE_LIN_SCHED_MODCH: u32 = 17;
pub const OBJTYPE_LIN_SYN_ERROR: u32 = 18;
pub const OBJTYPE_LIN_BAUDRATE: u32 = 19;
pub const OBJTYPE_LIN_SLEEP: u32 = 20;
pub const OBJTYPE_LIN_WAKEUP: u32 = 21;
pub const OBJTYPE_MOST_SPY: u32 = 22;
pub const OBJTYPE_MOST_CTRL: u32 = 23;
pub const OBJTYPE_MOST_LIGHTLOCK: u32 = 24;
pub const OBJTYPE_MOST_STATISTIC: u32 = 25;
pub const OBJTYPE_FLEXRAY_DATA: u32 = 29;
pub const OBJTYPE_FLEXRAY_SYNC: u32 = 30;
pub const OBJTYPE_CAN_DRIVER_ERROR: u32 = 31;
pub const OBJTYPE_MOST_PKT: u32 = 32;
pub const OBJTYPE_MOST_PKT2: u32 = 33;
pub const OBJTYPE_MOST_HWMODE: u32 = 34;
pub const OBJTYPE_MOST_REG: u32 = 35;
pub const OBJTYPE_MOST_GENREG: u32 = 36;
pub const OBJTYPE_MOST_NETSTATE: u32 = 37;
pub const OBJTYPE_MOST_DATALOST: u32 = 38;
pub const OBJTYPE_MOST_TRIGGER: u32 = 39;
pub const OBJTYPE_FLEXRAY_CYCLE: u32 = 40;
pub const OBJTYPE_FLEXRAY_MESSAGE: u32 = 41;
pub const OBJTYPE_LIN_CHECKSUM_INFO: u32 = 42;
pub const OBJTYPE_LIN_SPIKE_EVENT: u32 = 43;
pub const OBJTYPE_CAN_DRIVER_SYNC: u32 = 44;
pub const OBJTYPE_FLEXRAY_STATUS: u32 = 45;
pub const OBJTYPE_GPS_EVENT: u32 = 46;
pub const OBJTYPE_FLEXRAY_ERROR: u32 = 47;
pub const OBJTYPE_FLEXRAY_STATUS2: u32 = 48;
pub const OBJTYPE_FLEXRAY_STARTCYCLE: u32 = 49;
pub const OBJTYPE_FLEXRAY_RCVMESSAGE: u32 = 50;
pub const OBJTYPE_REALTIMECLOCK: u32 = 51;
pub const OBJTYPE_LIN_STATISTIC: u32 = 54;
pub const OBJTYPE_J1708_MESSAGE: u32 = 55;
pub const OBJTYPE_J1708_VIRTUAL_MSG: u32 = 56;
pub const OBJTYPE_LIN_MESSAGE2: u32 = 57;
pub const OBJTYPE_LIN_SND_ERROR2: u32 = 58;
pub const OBJTYPE_LIN_SYN_ERROR2: u32 = 59;
pub const OBJTYPE_LIN_CRC_ERROR2: u32 = 60;
pub const OBJTYPE_LIN_RCV_ERROR2: u32 = 61;
pub const OBJTYPE_LIN_WAKEUP2: u32 = 62;
pub const OBJTYPE_LIN_SPIKE_EVENT2: u32 = 63;
pub const OBJTYPE_LIN_LONG_DOM_SIG: u32 = 64;
pub const OBJTYPE_APP_TEXT: u32 = 65;
pub const OBJTYPE_FLEXRAY_RCVMESSAGE_EX: u32 = 66;
pub const OBJTYPE_MOST_STATISTICEX: u32 = 67;
pub const OBJTYPE_MOST_TXLIGHT: u32 = 68;
pub const OBJTYPE_MOST_ALLOCTAB: u32 = 69;
pub const OBJTYPE_MOST_STRESS: u32 = 70;
pub const OBJTYPE_ETHERNET_FRAME: u32 = 71;
pub const OBJTYPE_SYS_VARIABLE: u32 = 72;
pub const OBJTYPE_CAN_ERROR_EXT: u32 = 73;
pub const OBJTYPE_CAN_DRIVER_ERROR_EXT: u32 = 74;
pub const OBJTYPE_LIN_LONG_DOM_SIG2: u32 = 75;
pub const OBJTYPE_MOST_150_MESSAGE: u32 = 76;
pub const OBJTYPE_MOST_150_PKT: u32 = 77;
pub const OBJTYPE_MOST_ETHERNET_PKT: u32 = 78;
pub const OBJTYPE_MOST_150_MESSAGE_FRAGMENT: u32 = 79;
pub const OBJTYPE_MOST_150_PKT_FRAGMENT: u32 = 80;
pub const OBJTYPE_MOST_ETHERNET_PKT_FRAGMENT: u32 = 81;
pub const OBJTYPE_MOST_SYSTEM_EVENT: u32 = 82;
pub const OBJTYPE_MOST_150_ALLOCTAB: u32 = 83;
pub const OBJTYPE_MOST_50_MESSAGE: u32 = 84;
pub const OBJTYPE_MOST_50_PKT: u32 = 85;
pub const OBJTYPE_CAN_MESSAGE2: u32 = 86;
pub const OBJTYPE_LIN_UNEXPECTED_WAKEUP: u32 = 87;
pub const OBJTYPE_LIN_SHORT_OR_SLOW_RESPONSE: u32 = 88;
pub const OBJTYPE_LIN_DISTURBANCE_EVENT: u32 = 89;
pub const OBJTYPE_SERIAL_EVENT: u32 = 90;
pub const OBJTYPE_OVERRUN_ERROR: u32 = 91;
pub const OBJTYPE_EVENT_COMMENT: u32 = 92;
pub const OBJTYPE_WLAN_FRAME: u32 = 93;
pub const OBJTYPE_WLAN_STATISTIC: u32 = 94;
pub const OBJTYPE_MOST_ECL: u32 = 95;
pub const OBJTYPE_GLOBAL_MARKER: u32 = 96;
pub const OBJTYPE_AFDX_FRAME: u32 = 97;
pub const OBJTYPE_AFDX_STATISTIC: u32 = 98;
pub const OBJTYPE_KLINE_STATUSEVENT: u32 = 99;
pub const OBJTYPE_CAN_FD_MESSAGE: u32 = 100;
pub const OBJTYPE_CAN_FD_MESSAGE_64: u32 = 101;
pub const OBJTYPE_ETHERNET_RX_ERROR: u32 = 102;
pub const OBJTYPE_ETHERNET_STATUS: u32 = 103;
pub const OBJTYPE_CAN_FD_ERROR_64: u32 = 104;
pub const OBJTYPE_LIN_SHORT_OR_SLOW_RESPONSE2: u32 = 105;
pub const OBJTYPE_AFDX_STATUS: u32 = 106;
pub const OBJTYPE_AFDX_BUS_STATISTIC: u32 = 107;
pub const OBJTYPE_AFDX_ERROR_EVENT: u32 = 109;
pub const OBJTYPE_A429_ERROR: u32 = 110;
pub const OBJTYPE_A429_STATUS: u32 = 111;
pub const OBJTYPE_A429_BUS_STATISTIC: u32 = 112;
pub const OBJTYPE_A429_MESSAGE: u32 = 113;
pub const OBJTYPE_ETHERNET_STATISTIC: u32 = 114;
pub const OBJTYPE_TEST_STRUCTURE: u32 = 118;
pub const OBJTYPE_DIAG_REQUEST_INTERPRETATION: u32 = 119;
pub const OBJTYPE_ETHERNET_FRAME_EX: u32 = 120;
pub const OBJTYPE_ETHERNET_FRAME_FORWARDED: u32 = 121;
pub const OBJTYPE_ETHERNET_ERROR_EX: u32 = 122;
pub const OBJTYPE_ETHERNET_ERROR_FORWARDED: u32 = 123;
pub const OBJTYPE_FUNCTION_BUS: u32 = 124;
pub const OBJTYPE_DATA_LOST_BEGIN: u32 = 125;
pub const OBJTYPE_DATA_LOST_END: u32 = 126;
pub const OBJTYPE_WATER_MARK_EVENT: u32 = 127;
pub const OBJTYPE_TRIGGER_CONDITION: u32 = 128;
pub const OBJTYPE_CAN_SETTING_CHANGED: u32 = 129;
pub const OBJTYPE_DISTRIBUTED_OBJECT_MEMBER: u32 = 130;
pub const OBJTYPE_ATTRIBUTE_EVENT: u32 = 131;
pub const OBJTYPE_DISTRIBUTED_OBJECT_CHANGE: u32 = 132;
pub const OBJTYPE_ETHERNET_PHY_STATE: u32 = 133;
pub const OBJTYPE_SYS_VARIABLE_MEMBER: u32 = 134;
pub const OBJTYPE_CAN_XL_CHANNEL_FRAME: u32 = 135;
pub const OBJTYPE_CAN_XL_CHANNEL_ERROR_FRAME: u32 = 136;

// Object header types (selects the extension after the block header)
pub const HEADER_TYPE_DEFAULT: u16 = 1;
pub const HEADER_TYPE_2: u16 = 2;
pub const HEADER_TYPE_3: u16 = 3;

// Timestamp resolution flags in the object-header extension
pub const TS_RESOLUTION_10US: u32 = 0x0000_0001;
pub const TS_RESOLUTION_1NS: u32 = 0x0000_0002;

/// Human-readable name of an object type, for log messages and tooling
pub fn object_type_name(object_type: u32) -> &'static str {
    match object_type {
        OBJTYPE_CAN_MESSAGE => "CAN_MESSAGE",
        OBJTYPE_CAN_ERROR => "CAN_ERROR",
        OBJTYPE_CAN_OVERLOAD => "CAN_OVERLOAD",
        OBJTYPE_CAN_STATISTIC => "CAN_STATISTIC",
        OBJTYPE_APP_TRIGGER => "APP_TRIGGER",
        OBJTYPE_ENV_INTEGER => "ENV_INTEGER",
        OBJTYPE_ENV_DOUBLE => "ENV_DOUBLE",
        OBJTYPE_ENV_STRING => "ENV_STRING",
        OBJTYPE_ENV_DATA => "ENV_DATA",
        OBJTYPE_LOG_CONTAINER => "LOG_CONTAINER",
        OBJTYPE_LIN_MESSAGE => "LIN_MESSAGE",
        OBJTYPE_LIN_CRC_ERROR => "LIN_CRC_ERROR",
        OBJTYPE_LIN_RCV_ERROR => "LIN_RCV_ERROR",
        OBJTYPE_LIN_SND_ERROR => "LIN_SND_ERROR",
        OBJTYPE_LIN_SLEEP => "LIN_SLEEP",
        OBJTYPE_LIN_WAKEUP => "LIN_WAKEUP",
        OBJTYPE_FLEXRAY_DATA => "FLEXRAY_DATA",
        OBJTYPE_FLEXRAY_MESSAGE => "FLEXRAY_MESSAGE",
        OBJTYPE_FLEXRAY_RCVMESSAGE => "FLEXRAY_RCVMESSAGE",
        OBJTYPE_FLEXRAY_RCVMESSAGE_EX => "FLEXRAY_RCVMESSAGE_EX",
        OBJTYPE_LIN_MESSAGE2 => "LIN_MESSAGE2",
        OBJTYPE_LIN_SND_ERROR2 => "LIN_SND_ERROR2",
        OBJTYPE_LIN_CRC_ERROR2 => "LIN_CRC_ERROR2",
        OBJTYPE_LIN_RCV_ERROR2 => "LIN_RCV_ERROR2",
        OBJTYPE_LIN_WAKEUP2 => "LIN_WAKEUP2",
        OBJTYPE_APP_TEXT => "APP_TEXT",
        OBJTYPE_ETHERNET_FRAME => "ETHERNET_FRAME",
        OBJTYPE_CAN_ERROR_EXT => "CAN_ERROR_EXT",
        OBJTYPE_CAN_MESSAGE2 => "CAN_MESSAGE2",
        OBJTYPE_SERIAL_EVENT => "SERIAL_EVENT",
        OBJTYPE_EVENT_COMMENT => "EVENT_COMMENT",
        OBJTYPE_WLAN_FRAME => "WLAN_FRAME",
        OBJTYPE_GLOBAL_MARKER => "GLOBAL_MARKER",
        OBJTYPE_CAN_FD_MESSAGE => "CAN_FD_MESSAGE",
        OBJTYPE_CAN_FD_MESSAGE_64 => "CAN_FD_MESSAGE_64",
        OBJTYPE_ETHERNET_RX_ERROR => "ETHERNET_RX_ERROR",
        OBJTYPE_ETHERNET_STATUS => "ETHERNET_STATUS",
        OBJTYPE_CAN_FD_ERROR_64 => "CAN_FD_ERROR_64",
        OBJTYPE_ETHERNET_STATISTIC => "ETHERNET_STATISTIC",
        OBJTYPE_ETHERNET_FRAME_EX => "ETHERNET_FRAME_EX",
        OBJTYPE_ETHERNET_FRAME_FORWARDED => "ETHERNET_FRAME_FORWARDED",
        OBJTYPE_ETHERNET_ERROR_EX => "ETHERNET_ERROR_EX",
        OBJTYPE_ETHERNET_ERROR_FORWARDED => "ETHERNET_ERROR_FORWARDED",
        OBJTYPE_DATA_LOST_BEGIN => "DATA_LOST_BEGIN",
        OBJTYPE_DATA_LOST_END => "DATA_LOST_END",
        OBJTYPE_ETHERNET_PHY_STATE => "ETHERNET_PHY_STATE",
        OBJTYPE_CAN_XL_CHANNEL_FRAME => "CAN_XL_CHANNEL_FRAME",
        OBJTYPE_CAN_XL_CHANNEL_ERROR_FRAME => "CAN_XL_CHANNEL_ERROR_FRAME",
        _ => "UNKNOWN",
    }
}

/// The 16-byte header every BLF object starts with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    pub header_length: u16,
    pub header_type: u16,
    pub object_length: u32,
    pub object_type: u32,
}

impl BlockHeader {
    /// Parse a block header from a 16-byte slice starting at the magic.
    /// Returns `None` on a short slice or wrong magic.
    pub fn parse(buf: &[u8]) -> Option<BlockHeader> {
        if buf.len() < BLOCK_HEADER_SIZE || &buf[0..4] != OBJECT_MAGIC {
            return None;
        }
        Some(BlockHeader {
            header_length: bytes::get_u16_le(buf, 4)?,
            header_type: bytes::get_u16_le(buf, 6)?,
            object_length: bytes::get_u32_le(buf, 8)?,
            object_type: bytes::get_u32_le(buf, 12)?,
        })
    }

    /// Serialize into the 16-byte wire layout
    pub fn to_bytes(&self) -> [u8; BLOCK_HEADER_SIZE] {
        let mut out = [0u8; BLOCK_HEADER_SIZE];
        out[0..4].copy_from_slice(OBJECT_MAGIC);
        bytes::put_u16_le(&mut out, 4, self.header_length);
        bytes::put_u16_le(&mut out, 6, self.header_type);
        bytes::put_u32_le(&mut out, 8, self.object_length);
        bytes::put_u32_le(&mut out, 12, self.object_type);
        out
    }
}

/// Decoded object-header extension (any of the three variants)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectExtHeader {
    pub flags: u32,
    pub version: u16,
    /// Raw timestamp in the resolution selected by `flags`
    pub timestamp_raw: u64,
    /// Only present on header type 2
    pub original_timestamp: Option<u64>,
    /// Only present on header type 2
    pub timestamp_status: Option<u8>,
}

/// Size in bytes of the extension struct for a header type, if known
pub fn ext_header_size(header_type: u16) -> Option<usize> {
    match header_type {
        HEADER_TYPE_DEFAULT => Some(16),
        HEADER_TYPE_2 => Some(24),
        HEADER_TYPE_3 => Some(16),
        _ => None,
    }
}

/// Parse the typed extension following the block header.
/// `buf` starts right after the 16 block-header bytes.
pub fn parse_ext_header(header_type: u16, buf: &[u8]) -> Option<ObjectExtHeader> {
    match header_type {
        // flags, client index, version, timestamp
        HEADER_TYPE_DEFAULT => Some(ObjectExtHeader {
            flags: bytes::get_u32_le(buf, 0)?,
            version: bytes::get_u16_le(buf, 6)?,
            timestamp_raw: bytes::get_u64_le(buf, 8)?,
            original_timestamp: None,
            timestamp_status: None,
        }),
        // flags, timestamp status, reserved, version, timestamp, original timestamp
        HEADER_TYPE_2 => Some(ObjectExtHeader {
            flags: bytes::get_u32_le(buf, 0)?,
            version: bytes::get_u16_le(buf, 6)?,
            timestamp_raw: bytes::get_u64_le(buf, 8)?,
            original_timestamp: Some(bytes::get_u64_le(buf, 16)?),
            timestamp_status: Some(bytes::get_u8(buf, 4)?),
        }),
        // flags, static size, version, timestamp
        HEADER_TYPE_3 => Some(ObjectExtHeader {
            flags: bytes::get_u32_le(buf, 0)?,
            version: bytes::get_u16_le(buf, 6)?,
            timestamp_raw: bytes::get_u64_le(buf, 8)?,
            original_timestamp: None,
            timestamp_status: None,
        }),
        _ => None,
    }
}

/// Serialize a default (type 1) extension header
pub fn ext_header_v1_bytes(flags: u32, version: u16, timestamp_raw: u64) -> [u8; 16] {
    let mut out = [0u8; 16];
    bytes::put_u32_le(&mut out, 0, flags);
    // client index stays zero
    bytes::put_u16_le(&mut out, 6, version);
    bytes::put_u64_le(&mut out, 8, timestamp_raw);
    out
}

/// Convert a raw object timestamp to nanoseconds using the resolution flags.
/// Objects without a resolution flag are treated as nanoseconds.
pub fn timestamp_to_ns(flags: u32, raw: u64) -> u64 {
    if flags & TS_RESOLUTION_1NS != 0 {
        raw
    } else if flags & TS_RESOLUTION_10US != 0 {
        raw.saturating_mul(10_000)
    } else {
        raw
    }
}
