//! AppText objects and the Upper-PDU metadata bridge
//!
//! APP_TEXT is a grab-bag object type disambiguated by a `source` field:
//! channel-name announcements, multi-part XML metadata, comments,
//! attachments and trace lines. Channel announcements feed the interface
//! registry and produce no record. The others are bridged as Upper-PDU
//! records: a TLV sequence tagging a dissector name plus protocol/info
//! column texts, followed by the raw text bytes. Tags and lengths are
//! big-endian and the sequence ends with a zero tag.
//!
//! Metadata payloads may be chunked across consecutive APP_TEXT objects;
//! [`MetadataAssembly`] tracks the in-progress buffer and the discard rule
//! when an unrelated AppText object interrupts the sequence.

use super::ObjectCtx;
use crate::objects::OBJTYPE_APP_TEXT;
use crate::registry::{InterfaceKey, InterfaceRegistry, Protocol};
use crate::types::{BlfError, BusRecord, Direction, Encap, Result};

// AppText source kinds
pub const APPTEXT_SOURCE_COMMENT: u32 = 0;
pub const APPTEXT_SOURCE_CHANNEL: u32 = 1;
pub const APPTEXT_SOURCE_METADATA: u32 = 2;
pub const APPTEXT_SOURCE_ATTACHMENT: u32 = 3;
pub const APPTEXT_SOURCE_TRACELINE: u32 = 4;

/// Fixed AppText header: source, reserved, text length, reserved
pub const APPTEXT_HEADER_SIZE: usize = 16;

// Upper-PDU TLV tags
pub const TAG_DISSECTOR_NAME: u16 = 12;
pub const TAG_COL_PROTO: u16 = 33;
pub const TAG_COL_INFO: u16 = 34;
pub const TAG_END: u16 = 0;

/// Dissector tag for assembled XML metadata
pub const METADATA_DISSECTOR: &str = "xml";
/// Dissector tag for plain text records (comments, attachments, trace lines)
pub const TEXT_DISSECTOR: &str = "data-text-lines";

const COL_PROTO_APPTEXT: &str = "BLF App text";
const COL_INFO_COMMENT: &str = "Comment";
const COL_INFO_ATTACHMENT: &str = "Attachment";
const COL_INFO_TRACELINE: &str = "Trace line";
const COL_INFO_METADATA: &str = "Metadata";

#[derive(Debug, Clone, Copy)]
pub(crate) struct AppTextHeader {
    pub source: u32,
    pub reserved1: u32,
    pub text_length: u32,
}

pub(crate) fn parse_header(body: &[u8]) -> Option<AppTextHeader> {
    if body.len() < APPTEXT_HEADER_SIZE {
        return None;
    }
    Some(AppTextHeader {
        source: u32::from_le_bytes([body[0], body[1], body[2], body[3]]),
        reserved1: u32::from_le_bytes([body[4], body[5], body[6], body[7]]),
        text_length: u32::from_le_bytes([body[8], body[9], body[10], body[11]]),
    })
}

/// Build the Upper-PDU payload: TLV tags followed by the wrapped bytes
pub(crate) fn upper_pdu_payload(
    dissector: &str,
    col_proto: &str,
    col_info: &str,
    data: &[u8],
) -> Vec<u8> {
    let mut out = Vec::with_capacity(24 + dissector.len() + col_proto.len() + col_info.len() + data.len());
    for (tag, value) in [
        (TAG_DISSECTOR_NAME, dissector),
        (TAG_COL_PROTO, col_proto),
        (TAG_COL_INFO, col_info),
    ] {
        if value.is_empty() {
            continue;
        }
        out.extend_from_slice(&tag.to_be_bytes());
        out.extend_from_slice(&(value.len() as u16).to_be_bytes());
        out.extend_from_slice(value.as_bytes());
    }
    out.extend_from_slice(&TAG_END.to_be_bytes());
    out.extend_from_slice(&0u16.to_be_bytes());
    out.extend_from_slice(data);
    out
}

/// Decoded view of an Upper-PDU payload
pub(crate) struct UpperPduParts<'a> {
    pub dissector: &'a str,
    pub col_proto: &'a str,
    pub col_info: &'a str,
    pub data: &'a [u8],
}

/// Walk the TLV sequence of an Upper-PDU payload
pub(crate) fn parse_upper_pdu(payload: &[u8]) -> Option<UpperPduParts<'_>> {
    let mut dissector = "";
    let mut col_proto = "";
    let mut col_info = "";
    let mut pos = 0usize;
    loop {
        if pos + 4 > payload.len() {
            return None;
        }
        let tag = u16::from_be_bytes([payload[pos], payload[pos + 1]]);
        let len = u16::from_be_bytes([payload[pos + 2], payload[pos + 3]]) as usize;
        pos += 4;
        if tag == TAG_END {
            return Some(UpperPduParts {
                dissector,
                col_proto,
                col_info,
                data: &payload[pos..],
            });
        }
        let value = payload.get(pos..pos + len)?;
        pos += len;
        let text = std::str::from_utf8(value).ok()?;
        match tag {
            TAG_DISSECTOR_NAME => dissector = text,
            TAG_COL_PROTO => col_proto = text,
            TAG_COL_INFO => col_info = text,
            _ => {}
        }
    }
}

/// Assembly state for chunked metadata AppText sequences
#[derive(Debug, Default)]
pub(crate) struct MetadataAssembly {
    buf: Vec<u8>,
    expected: usize,
    active: bool,
}

impl MetadataAssembly {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Discard an in-progress buffer; unrelated payloads are never joined
    pub fn interrupt(&mut self) {
        if self.active {
            log::warn!(
                "discarding incomplete metadata assembly of {} bytes",
                self.buf.len()
            );
        }
        self.buf.clear();
        self.active = false;
        self.expected = 0;
    }

    /// Feed one metadata chunk. `declared_total` is the length the whole
    /// sequence announces (this chunk plus everything still to come).
    /// Returns the assembled payload once complete.
    pub fn push_chunk(&mut self, declared_total: usize, text: &[u8]) -> Option<Vec<u8>> {
        if !self.active {
            if declared_total <= text.len() {
                return Some(text.to_vec());
            }
            self.expected = declared_total;
            self.buf = text.to_vec();
            self.active = true;
            return None;
        }
        self.buf.extend_from_slice(text);
        if self.buf.len() >= self.expected {
            self.active = false;
            self.expected = 0;
            return Some(std::mem::take(&mut self.buf));
        }
        None
    }
}

fn xml_attr<'a>(text: &'a str, name: &str) -> Option<&'a str> {
    let needle = format!("{}=\"", name);
    let start = text.find(&needle)? + needle.len();
    let end = text[start..].find('"')? + start;
    Some(&text[start..end])
}

/// Parse a channel-announcement fragment like
/// `<channel number="1" type="CAN" network="Powertrain"/>`
pub(crate) fn parse_channel_announcement(text: &str) -> Option<(Protocol, u16, String)> {
    let number: u16 = xml_attr(text, "number")?.parse().ok()?;
    let bus_type = xml_attr(text, "type")?;
    let network = xml_attr(text, "network")?;
    let protocol = match bus_type.to_ascii_uppercase().as_str() {
        "CAN" | "CANFD" => Protocol::Can,
        "LIN" => Protocol::Lin,
        "ETHERNET" | "ETH" => Protocol::Ethernet,
        "FLEXRAY" => Protocol::FlexRay,
        "WLAN" => Protocol::Wlan,
        _ => return None,
    };
    Some((protocol, number, network.to_string()))
}

fn apptext_record(
    ctx: &ObjectCtx,
    registry: &mut InterfaceRegistry,
    dissector: &str,
    col_info: &str,
    text: &[u8],
) -> BusRecord {
    let iface_id = registry.lookup_or_create(
        InterfaceKey::simple(Protocol::UpperPdu, 0),
        Some("BLF-APPTEXT"),
    );
    let data = upper_pdu_payload(dissector, COL_PROTO_APPTEXT, col_info, text);
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

/// Handle one APP_TEXT object. Returns a record for the sub-kinds that
/// produce one; channel announcements and partial metadata chunks return
/// `None`.
pub(crate) fn handle_apptext(
    ctx: &ObjectCtx,
    body: &[u8],
    registry: &mut InterfaceRegistry,
    assembly: &mut MetadataAssembly,
) -> Result<Option<BusRecord>> {
    let header = match parse_header(body) {
        Some(h) => h,
        None => {
            return Err(BlfError::Malformed(format!(
                "APP_TEXT object body of {} bytes too short for its {}-byte fixed header",
                body.len(),
                APPTEXT_HEADER_SIZE
            )))
        }
    };
    let avail = body.len() - APPTEXT_HEADER_SIZE;
    let text_len = (header.text_length as usize).min(avail);
    let text = &body[APPTEXT_HEADER_SIZE..APPTEXT_HEADER_SIZE + text_len];

    // any non-metadata AppText interrupts a metadata sequence in progress
    if header.source != APPTEXT_SOURCE_METADATA {
        assembly.interrupt();
    }

    match header.source {
        APPTEXT_SOURCE_CHANNEL => {
            let text = String::from_utf8_lossy(text);
            match parse_channel_announcement(&text) {
                Some((protocol, channel, name)) => {
                    registry.register_pending_name(
                        InterfaceKey::simple(protocol, channel),
                        &name,
                        true,
                    );
                }
                None => log::debug!("unparsable channel announcement: {:?}", text),
            }
            Ok(None)
        }
        APPTEXT_SOURCE_METADATA => {
            // low 24 bits of reserved1 carry the sequence's remaining length
            let declared_total = (header.reserved1 & 0x00FF_FFFF) as usize;
            match assembly.push_chunk(declared_total, text) {
                Some(xml) => Ok(Some(apptext_record(
                    ctx,
                    registry,
                    METADATA_DISSECTOR,
                    COL_INFO_METADATA,
                    &xml,
                ))),
                None => Ok(None),
            }
        }
        APPTEXT_SOURCE_ATTACHMENT => Ok(Some(apptext_record(
            ctx,
            registry,
            TEXT_DISSECTOR,
            COL_INFO_ATTACHMENT,
            text,
        ))),
        APPTEXT_SOURCE_TRACELINE => Ok(Some(apptext_record(
            ctx,
            registry,
            TEXT_DISSECTOR,
            COL_INFO_TRACELINE,
            text,
        ))),
        // comments and unknown sources both carry free text
        _ => Ok(Some(apptext_record(
            ctx,
            registry,
            TEXT_DISSECTOR,
            COL_INFO_COMMENT,
            text,
        ))),
    }
}

/// Build an APP_TEXT object body
pub(crate) fn apptext_body(source: u32, reserved1: u32, text: &[u8]) -> Vec<u8> {
    let mut body = vec![0u8; APPTEXT_HEADER_SIZE + text.len()];
    body[0..4].copy_from_slice(&source.to_le_bytes());
    body[4..8].copy_from_slice(&reserved1.to_le_bytes());
    body[8..12].copy_from_slice(&(text.len() as u32).to_le_bytes());
    body[APPTEXT_HEADER_SIZE..].copy_from_slice(text);
    body
}

/// Encode an Upper-PDU record back into the object type it came from,
/// routed by its dissector tag.
pub(crate) fn encode_upper_pdu(rec: &BusRecord, _key: InterfaceKey) -> Result<(u32, Vec<u8>)> {
    let parts = match parse_upper_pdu(&rec.data) {
        Some(p) => p,
        None => {
            return Err(BlfError::Malformed(
                "Upper-PDU record with invalid tag sequence".to_string(),
            ))
        }
    };

    if let Some(encoded) = super::ethernet::encode_state(parts.dissector, parts.data) {
        return Ok(encoded);
    }
    log::trace!(
        "re-encoding {:?} record ({} bytes) as APP_TEXT",
        parts.col_proto,
        parts.data.len()
    );

    match parts.dissector {
        METADATA_DISSECTOR => {
            // single-object metadata: declared total equals the chunk length
            let reserved1 = (parts.data.len() as u32) & 0x00FF_FFFF;
            Ok((
                OBJTYPE_APP_TEXT,
                apptext_body(APPTEXT_SOURCE_METADATA, reserved1, parts.data),
            ))
        }
        TEXT_DISSECTOR => {
            let source = match parts.col_info {
                COL_INFO_ATTACHMENT => APPTEXT_SOURCE_ATTACHMENT,
                COL_INFO_TRACELINE => APPTEXT_SOURCE_TRACELINE,
                _ => APPTEXT_SOURCE_COMMENT,
            };
            Ok((OBJTYPE_APP_TEXT, apptext_body(source, 0, parts.data)))
        }
        other => Err(BlfError::Unsupported(format!(
            "cannot encode Upper-PDU record tagged for dissector {:?}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> ObjectCtx {
        ObjectCtx {
            object_type: OBJTYPE_APP_TEXT,
            header_length: 32,
            timestamp_ns: 0,
        }
    }

    #[test]
    fn test_upper_pdu_tlv_roundtrip() {
        let payload = upper_pdu_payload("xml", "BLF Metadata", "Metadata", b"<x/>");
        let parts = parse_upper_pdu(&payload).unwrap();
        assert_eq!(parts.dissector, "xml");
        assert_eq!(parts.col_proto, "BLF Metadata");
        assert_eq!(parts.col_info, "Metadata");
        assert_eq!(parts.data, b"<x/>");
    }

    #[test]
    fn test_channel_announcement_parses() {
        let (proto, number, name) = parse_channel_announcement(
            r#"<channel number="3" type="CAN" network="Powertrain"/>"#,
        )
        .unwrap();
        assert_eq!(proto, Protocol::Can);
        assert_eq!(number, 3);
        assert_eq!(name, "Powertrain");

        assert!(parse_channel_announcement("<channel  />").is_none());
        assert!(
            parse_channel_announcement(r#"<channel number="x" type="CAN" network="n"/>"#).is_none()
        );
    }

    #[test]
    fn test_channel_announcement_registers_pending_name() {
        let mut reg = InterfaceRegistry::new();
        let mut assembly = MetadataAssembly::new();
        let body = apptext_body(
            APPTEXT_SOURCE_CHANNEL,
            0,
            br#"<channel number="1" type="LIN" network="BodyLin"/>"#,
        );
        let rec = handle_apptext(&ctx(), &body, &mut reg, &mut assembly).unwrap();
        assert!(rec.is_none());

        let id = reg.lookup_or_create(InterfaceKey::simple(Protocol::Lin, 1), None);
        assert_eq!(reg.get(id).unwrap().name, "BodyLin");
    }

    #[test]
    fn test_metadata_single_chunk_yields_record() {
        let mut reg = InterfaceRegistry::new();
        let mut assembly = MetadataAssembly::new();
        let xml = b"<metadata>ok</metadata>";
        let body = apptext_body(APPTEXT_SOURCE_METADATA, xml.len() as u32, xml);
        let rec = handle_apptext(&ctx(), &body, &mut reg, &mut assembly)
            .unwrap()
            .unwrap();
        let parts = parse_upper_pdu(&rec.data).unwrap();
        assert_eq!(parts.dissector, METADATA_DISSECTOR);
        assert_eq!(parts.data, xml);
    }

    #[test]
    fn test_metadata_chunked_assembly() {
        let mut reg = InterfaceRegistry::new();
        let mut assembly = MetadataAssembly::new();
        let part1 = b"<metadata>";
        let part2 = b"</metadata>";
        let total = (part1.len() + part2.len()) as u32;

        // first chunk declares more than it carries: no record yet
        let body = apptext_body(APPTEXT_SOURCE_METADATA, total, part1);
        assert!(handle_apptext(&ctx(), &body, &mut reg, &mut assembly)
            .unwrap()
            .is_none());
        assert!(assembly.is_active());

        let body = apptext_body(APPTEXT_SOURCE_METADATA, part2.len() as u32, part2);
        let rec = handle_apptext(&ctx(), &body, &mut reg, &mut assembly)
            .unwrap()
            .unwrap();
        let parts = parse_upper_pdu(&rec.data).unwrap();
        assert_eq!(parts.data, b"<metadata></metadata>");
        assert!(!assembly.is_active());
    }

    #[test]
    fn test_interrupting_source_discards_partial_metadata() {
        let mut reg = InterfaceRegistry::new();
        let mut assembly = MetadataAssembly::new();

        let body = apptext_body(APPTEXT_SOURCE_METADATA, 100, b"<partial>");
        assert!(handle_apptext(&ctx(), &body, &mut reg, &mut assembly)
            .unwrap()
            .is_none());
        assert!(assembly.is_active());

        // a comment interrupts and still produces its own record
        let body = apptext_body(APPTEXT_SOURCE_COMMENT, 0, b"note");
        let rec = handle_apptext(&ctx(), &body, &mut reg, &mut assembly)
            .unwrap()
            .unwrap();
        assert!(!assembly.is_active());
        assert_eq!(parse_upper_pdu(&rec.data).unwrap().data, b"note");

        // restarting metadata later starts from scratch
        let xml = b"<fresh/>";
        let body = apptext_body(APPTEXT_SOURCE_METADATA, xml.len() as u32, xml);
        let rec = handle_apptext(&ctx(), &body, &mut reg, &mut assembly)
            .unwrap()
            .unwrap();
        assert_eq!(parse_upper_pdu(&rec.data).unwrap().data, xml);
    }

    #[test]
    fn test_comment_roundtrip_through_encode() {
        let mut reg = InterfaceRegistry::new();
        let mut assembly = MetadataAssembly::new();
        let body = apptext_body(APPTEXT_SOURCE_COMMENT, 0, b"hello trace");
        let rec = handle_apptext(&ctx(), &body, &mut reg, &mut assembly)
            .unwrap()
            .unwrap();

        let key = reg.get(rec.iface_id).unwrap().key;
        let (obj_type, encoded) = encode_upper_pdu(&rec, key).unwrap();
        assert_eq!(obj_type, OBJTYPE_APP_TEXT);
        let rec2 = handle_apptext(&ctx(), &encoded, &mut reg, &mut assembly)
            .unwrap()
            .unwrap();
        assert_eq!(rec.data, rec2.data);
    }
}
