//! BLF trace writer
//!
//! The inverse of the read path: generic records are serialized by the
//! record codecs and batched into size-bounded uncompressed log containers.
//! Container headers and the file header are written as placeholders first
//! and back-patched by seeking once their final sizes and timestamps are
//! known; that is why the file starts with a fixed-size all-zero header
//! region rather than reserving variable-length space.
//!
//! # Example
//!
//! ```no_run
//! use blf_codec::{BlfWriter, BusRecord, Direction, Encap, InterfaceKey, InterfaceRegistry, Protocol};
//! use std::fs::File;
//!
//! let mut registry = InterfaceRegistry::new();
//! let iface_id = registry.lookup_or_create(InterfaceKey::simple(Protocol::Can, 1), None);
//!
//! let mut writer = BlfWriter::create(File::create("out.blf").unwrap()).unwrap();
//! let record = BusRecord {
//!     encap: Encap::SocketCan,
//!     iface_id,
//!     cap_len: 12,
//!     wire_len: 12,
//!     timestamp_ns: 0,
//!     direction: Direction::Rx,
//!     data: vec![0, 0, 0x01, 0x23, 4, 0, 0, 0, 0xDE, 0xAD, 0xBE, 0xEF],
//! };
//! writer.write_record(&record, &registry).unwrap();
//! writer.finish().unwrap();
//! ```

use std::io::{Seek, SeekFrom, Write};

use crate::bytes;
use crate::codecs;
use crate::container::{Compression, LOG_CONTAINER_HEADER_SIZE};
use crate::file::{BlfDate, FileHeader, FILE_HEADER_SIZE};
use crate::objects::{
    ext_header_v1_bytes, BlockHeader, BLOCK_HEADER_SIZE, HEADER_TYPE_DEFAULT,
    OBJTYPE_LOG_CONTAINER, TS_RESOLUTION_1NS,
};
use crate::registry::InterfaceRegistry;
use crate::types::{BlfError, BusRecord, Result};

/// Soft cap on a single container's payload; reaching it closes the
/// container and opens the next one
pub const CONTAINER_PAYLOAD_CAP: u64 = 10 * 1024 * 1024;

/// API version stamped into written file headers
const API_VERSION: u32 = 4_070_100;

const CONTAINER_ENVELOPE: u64 = (BLOCK_HEADER_SIZE + LOG_CONTAINER_HEADER_SIZE) as u64;

/// Writer session producing one BLF file
pub struct BlfWriter<W: Write + Seek> {
    writer: W,
    application_id: u8,
    application_version: (u8, u8, u8),
    /// Physical position of the open container's block header
    container_start: Option<u64>,
    /// Payload bytes written into the open container
    container_payload: u64,
    object_count: u32,
    first_ts_ns: Option<u64>,
    last_ts_ns: u64,
    /// Epoch offset subtracted from record timestamps, derived from the
    /// first record and truncated to the header's millisecond resolution
    start_offset_ns: u64,
    finished: bool,
}

impl<W: Write + Seek> BlfWriter<W> {
    /// Start a new BLF file. Writes the placeholder header region; the real
    /// header lands there when [`BlfWriter::finish`] is called.
    pub fn create(mut writer: W) -> Result<Self> {
        let placeholder = [0u8; FILE_HEADER_SIZE as usize];
        writer.write_all(&placeholder)?;
        Ok(BlfWriter {
            writer,
            application_id: 0,
            application_version: (0, 0, 0),
            container_start: None,
            container_payload: 0,
            object_count: 0,
            first_ts_ns: None,
            last_ts_ns: 0,
            start_offset_ns: 0,
            finished: false,
        })
    }

    /// Set the application identity stamped into the file header
    pub fn with_application(mut self, id: u8, version: (u8, u8, u8)) -> Self {
        self.application_id = id;
        self.application_version = version;
        self
    }

    /// Serialize one record into the current log container.
    ///
    /// The registry maps the record's interface id back to its (protocol,
    /// channel, hardware channel) key; an id the registry does not know is
    /// an error.
    pub fn write_record(&mut self, rec: &BusRecord, registry: &InterfaceRegistry) -> Result<()> {
        if self.finished {
            return Err(BlfError::Unsupported(
                "write_record after finish".to_string(),
            ));
        }
        let info = registry.get(rec.iface_id).ok_or_else(|| {
            BlfError::Unsupported(format!("unknown interface id {}", rec.iface_id))
        })?;
        let (object_type, body) = codecs::encode_record(rec, info.key)?;

        if self.first_ts_ns.is_none() {
            self.first_ts_ns = Some(rec.timestamp_ns);
            self.start_offset_ns = BlfDate::from_epoch_ns(rec.timestamp_ns)
                .to_epoch_ns()
                .unwrap_or(0);
        }
        self.last_ts_ns = self.last_ts_ns.max(rec.timestamp_ns);
        let raw_ts = rec.timestamp_ns.saturating_sub(self.start_offset_ns);

        let header_length = (BLOCK_HEADER_SIZE + 16) as u16;
        let object_length = header_length as u32 + body.len() as u32;
        let mut obj = Vec::with_capacity(object_length as usize + 3);
        obj.extend_from_slice(
            &BlockHeader {
                header_length,
                header_type: HEADER_TYPE_DEFAULT,
                object_length,
                object_type,
            }
            .to_bytes(),
        );
        obj.extend_from_slice(&ext_header_v1_bytes(TS_RESOLUTION_1NS, 0, raw_ts));
        obj.extend_from_slice(&body);
        // objects are aligned to 4 bytes within a container
        let pad = (4 - obj.len() % 4) % 4;
        obj.resize(obj.len() + pad, 0);

        self.ensure_container(obj.len() as u64)?;
        self.writer.write_all(&obj)?;
        self.container_payload += obj.len() as u64;
        self.object_count += 1;
        Ok(())
    }

    fn ensure_container(&mut self, incoming: u64) -> Result<()> {
        if self.container_start.is_some()
            && self.container_payload + incoming > CONTAINER_PAYLOAD_CAP
        {
            self.close_container()?;
        }
        if self.container_start.is_none() {
            self.open_container()?;
        }
        Ok(())
    }

    fn open_container(&mut self) -> Result<()> {
        let pos = self.writer.stream_position()?;
        let placeholder = [0u8; CONTAINER_ENVELOPE as usize];
        self.writer.write_all(&placeholder)?;
        self.container_start = Some(pos);
        self.container_payload = 0;
        // the container is itself an object
        self.object_count += 1;
        log::trace!("opened log container at file offset {}", pos);
        Ok(())
    }

    /// Back-patch the open container's block header and sub-header with the
    /// final payload size, then restore the write cursor.
    fn close_container(&mut self) -> Result<()> {
        let start = match self.container_start.take() {
            Some(start) => start,
            None => return Ok(()),
        };
        let end = self.writer.stream_position()?;

        let header = BlockHeader {
            header_length: BLOCK_HEADER_SIZE as u16,
            header_type: HEADER_TYPE_DEFAULT,
            object_length: (CONTAINER_ENVELOPE + self.container_payload) as u32,
            object_type: OBJTYPE_LOG_CONTAINER,
        };
        let mut sub = [0u8; LOG_CONTAINER_HEADER_SIZE];
        bytes::put_u16_le(&mut sub, 0, Compression::None.to_raw());
        bytes::put_u32_le(&mut sub, 8, self.container_payload as u32);

        self.writer.seek(SeekFrom::Start(start))?;
        self.writer.write_all(&header.to_bytes())?;
        self.writer.write_all(&sub)?;
        self.writer.seek(SeekFrom::Start(end))?;
        log::trace!(
            "closed log container at file offset {} with {} payload bytes",
            start,
            self.container_payload
        );
        self.container_payload = 0;
        Ok(())
    }

    /// Close the last container and back-patch the file header with the
    /// final object count, lengths and measurement time span.
    pub fn finish(&mut self) -> Result<FileHeader> {
        if self.finished {
            return Err(BlfError::Unsupported("finish called twice".to_string()));
        }
        self.close_container()?;
        let end = self.writer.stream_position()?;

        let header = FileHeader {
            header_length: FILE_HEADER_SIZE,
            api_version: API_VERSION,
            application_id: self.application_id,
            application_version: self.application_version,
            len_compressed: end,
            // containers are written uncompressed, both lengths match
            len_uncompressed: end,
            object_count: self.object_count,
            objects_read: 0,
            start_date: self
                .first_ts_ns
                .map(BlfDate::from_epoch_ns)
                .unwrap_or_default(),
            end_date: if self.first_ts_ns.is_some() {
                BlfDate::from_epoch_ns(self.last_ts_ns)
            } else {
                BlfDate::default()
            },
        };

        self.writer.seek(SeekFrom::Start(0))?;
        header.write(&mut self.writer)?;
        self.writer.seek(SeekFrom::Start(end))?;
        self.writer.flush()?;
        self.finished = true;
        Ok(header)
    }

    /// Consume the writer and return the underlying sink
    pub fn into_inner(self) -> W {
        self.writer
    }
}
