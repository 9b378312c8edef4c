//! Core types for the BLF codec library
//!
//! This module defines the generic record representation the codec emits when
//! reading a trace and consumes when writing one, plus the library error type.
//! The codec is symmetric: everything a decode exposes here can be fed back
//! into the encode path to reproduce an equivalent file.

use chrono::{DateTime, Utc};
use std::fmt;

/// Result type for codec operations
pub type Result<T> = std::result::Result<T, BlfError>;

/// Protocol encapsulation of a decoded record.
///
/// This tells a downstream dissector how to interpret [`BusRecord::data`]:
/// each variant has a fixed generic wire layout (a SocketCAN-style header for
/// CAN, a reassembled Ethernet II frame for Ethernet, and so on).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Encap {
    /// SocketCAN-style frame: 8-byte header (id/len/flags) followed by the
    /// payload; CAN-FD and CAN XL frames use the matching extended headers.
    SocketCan,
    /// Standard Ethernet II frame bytes (dst, src, optional 802.1Q tag,
    /// EtherType, payload).
    Ethernet,
    /// FlexRay measurement header plus the 5-byte FlexRay frame header and
    /// payload.
    FlexRay,
    /// 8-byte LIN header (format revision, dlc/type/checksum bits, pid,
    /// checksum, errors) followed by the data bytes.
    Lin,
    /// Raw IEEE 802.11 frame bytes.
    Ieee80211,
    /// Tag-length-value wrapped metadata record carrying a dissector name and
    /// column texts; used for status, comments and XML metadata.
    UpperPdu,
}

impl fmt::Display for Encap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Encap::SocketCan => write!(f, "CAN"),
            Encap::Ethernet => write!(f, "ETH"),
            Encap::FlexRay => write!(f, "FR"),
            Encap::Lin => write!(f, "LIN"),
            Encap::Ieee80211 => write!(f, "WLAN"),
            Encap::UpperPdu => write!(f, "UPPER-PDU"),
        }
    }
}

/// Direction of a bus event relative to the logging node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Rx,
    Tx,
}

/// A single decoded bus event in its generic wire representation.
///
/// This is the output of the decode path and the input of the encode path.
/// `data` holds the protocol-specific generic layout described on [`Encap`];
/// only `cap_len` bytes of it are materialized, `wire_len` is the length the
/// frame had on the bus (the two differ when a record's declared payload was
/// clamped to the object boundary).
#[derive(Debug, Clone, PartialEq)]
pub struct BusRecord {
    /// How to interpret `data`
    pub encap: Encap,
    /// Interface id resolved through the session's interface registry
    pub iface_id: u32,
    /// Number of payload bytes actually present in `data`
    pub cap_len: u32,
    /// On-wire length of the frame
    pub wire_len: u32,
    /// Absolute timestamp in nanoseconds (file start date + object offset)
    pub timestamp_ns: u64,
    /// Direction of the event
    pub direction: Direction,
    /// Generic wire-format bytes
    pub data: Vec<u8>,
}

impl BusRecord {
    /// Convert the record timestamp to a `DateTime<Utc>`
    pub fn timestamp(&self) -> DateTime<Utc> {
        let secs = (self.timestamp_ns / 1_000_000_000) as i64;
        let nsecs = (self.timestamp_ns % 1_000_000_000) as u32;
        DateTime::from_timestamp(secs, nsecs).unwrap_or_else(Utc::now)
    }
}

/// Errors that can occur while reading or writing a BLF trace
#[derive(Debug, thiserror::Error)]
pub enum BlfError {
    /// The file does not start with the BLF magic. Reported distinctly from
    /// mid-file corruption so a caller probing several formats can cleanly
    /// move on to the next one.
    #[error("not a BLF file: {0}")]
    NotBlf(String),

    /// The object structure is inconsistent in a way that breaks offset
    /// arithmetic for everything that follows. Aborts the read.
    #[error("malformed BLF object: {0}")]
    Malformed(String),

    /// A structure we cannot safely interpret (unknown header type, nested
    /// log container, unknown interface id on the write path).
    #[error("unsupported BLF structure: {0}")]
    Unsupported(String),

    /// An object's declared length extends past the end of the known
    /// container space, i.e. the file stops mid-record.
    #[error("truncated BLF file: {0}")]
    Truncated(String),

    /// A log container failed to decompress. Recoverable at container
    /// granularity on the linear read path; fatal only for random access.
    #[error("container decompression failed: {0}")]
    Decompress(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encap_display() {
        assert_eq!(format!("{}", Encap::SocketCan), "CAN");
        assert_eq!(format!("{}", Encap::FlexRay), "FR");
        assert_eq!(format!("{}", Encap::UpperPdu), "UPPER-PDU");
    }

    #[test]
    fn test_record_timestamp_conversion() {
        let rec = BusRecord {
            encap: Encap::SocketCan,
            iface_id: 0,
            cap_len: 0,
            wire_len: 0,
            timestamp_ns: 1_700_000_000_123_456_789,
            direction: Direction::Rx,
            data: Vec::new(),
        };
        let ts = rec.timestamp();
        assert_eq!(ts.timestamp(), 1_700_000_000);
        assert_eq!(ts.timestamp_subsec_nanos(), 123_456_789);
    }
}
