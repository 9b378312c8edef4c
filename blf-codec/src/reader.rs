//! BLF trace reader
//!
//! [`BlfReader`] is the session object spanning one open file: it owns the
//! byte source, the container index, the interface registry and the
//! metadata-assembly state. The linear path ([`BlfReader::next_record`])
//! walks the virtual decompressed stream object by object, resynchronizing
//! on the `LOBJ` magic after corrupt stretches; once a full pass has
//! completed, [`BlfReader::read_record_at`] re-decodes any record by its
//! virtual offset using pure binary search over the index.
//!
//! # Example
//!
//! ```no_run
//! use blf_codec::BlfReader;
//! use std::fs::File;
//! use std::io::BufReader;
//!
//! let file = BufReader::new(File::open("trace.blf").unwrap());
//! let mut reader = BlfReader::open(file).unwrap();
//! while let Some((offset, record)) = reader.next_record().unwrap() {
//!     println!("{} @ {}: {} bytes", record.encap, offset, record.cap_len);
//! }
//! ```

use std::collections::HashSet;
use std::io::{Read, Seek};

use crate::codecs::apptext::MetadataAssembly;
use crate::codecs::{self, Decoded, ObjectCtx};
use crate::config::ReaderConfig;
use crate::container::ContainerIndex;
use crate::file::FileHeader;
use crate::objects::{
    self, ext_header_size, object_type_name, parse_ext_header, timestamp_to_ns, BlockHeader,
    BLOCK_HEADER_SIZE, OBJECT_MAGIC,
};
use crate::registry::{InterfaceRegistry, Protocol};
use crate::types::{BlfError, BusRecord, Result};

/// Reader session over one open BLF file
#[derive(Debug)]
pub struct BlfReader<R> {
    reader: R,
    header: FileHeader,
    config: ReaderConfig,
    index: ContainerIndex,
    /// Virtual cursor of the linear scan
    current_real_pos: u64,
    start_offset_ns: u64,
    registry: InterfaceRegistry,
    assembly: MetadataAssembly,
    skipped_types: HashSet<u32>,
    records_read: u64,
}

impl<R: Read + Seek> BlfReader<R> {
    /// Open a BLF trace with the default configuration.
    ///
    /// Validates the `"LOGG"` file magic and parses the file header; a
    /// non-BLF input is reported as [`BlfError::NotBlf`].
    pub fn open(reader: R) -> Result<Self> {
        Self::with_config(reader, ReaderConfig::default())
    }

    /// Open a BLF trace with an explicit configuration
    pub fn with_config(mut reader: R, config: ReaderConfig) -> Result<Self> {
        let header = FileHeader::read(&mut reader)?;
        log::debug!(
            "opened BLF file: app {} v{}.{}.{}, {} objects declared",
            header.application_id,
            header.application_version.0,
            header.application_version.1,
            header.application_version.2,
            header.object_count
        );
        let start_offset_ns = header.start_offset_ns();
        let index = ContainerIndex::new(header.header_length as u64, config.cache_containers);
        Ok(BlfReader {
            reader,
            header,
            config,
            index,
            current_real_pos: 0,
            start_offset_ns,
            registry: InterfaceRegistry::new(),
            assembly: MetadataAssembly::new(),
            skipped_types: HashSet::new(),
            records_read: 0,
        })
    }

    /// Decode the next record on the linear path.
    ///
    /// Returns the record together with the virtual offset of its object,
    /// which can later be passed to [`BlfReader::read_record_at`]. `None`
    /// means clean end of file. Objects that produce no record (skipped
    /// types, channel announcements, partial metadata chunks) are stepped
    /// over internally.
    pub fn next_record(&mut self) -> Result<Option<(u64, BusRecord)>> {
        loop {
            let start = match self.seek_magic(self.current_real_pos)? {
                Some(pos) => pos,
                None => {
                    // a metadata sequence still open at EOF never completes
                    if self.assembly.is_active() {
                        self.assembly.interrupt();
                    }
                    return Ok(None);
                }
            };
            let (advance, record) = self.decode_one(start, true)?;
            self.current_real_pos = start + advance;
            if let Some(rec) = record {
                if !self.passes_filter(&rec) {
                    continue;
                }
                self.records_read += 1;
                return Ok(Some((start, rec)));
            }
        }
    }

    /// Re-decode the record at a virtual offset previously returned by
    /// [`BlfReader::next_record`].
    ///
    /// Random access is only supported once the container index is
    /// complete, i.e. after a full linear pass; calling it earlier is an
    /// error rather than a partially-working lookup. Objects that produce
    /// no standalone record (for instance a metadata chunk of a multi-part
    /// sequence) return `None`.
    pub fn read_record_at(&mut self, real_pos: u64) -> Result<Option<BusRecord>> {
        if !self.index.complete {
            return Err(BlfError::Unsupported(
                "random access requires a completed linear pass over the file".to_string(),
            ));
        }
        let header_buf =
            self.index
                .read_bytes(&mut self.reader, real_pos, BLOCK_HEADER_SIZE)?;
        if &header_buf[0..4] != OBJECT_MAGIC {
            return Err(BlfError::Malformed(format!(
                "no object magic at virtual offset {}",
                real_pos
            )));
        }
        let (_, record) = self.decode_one(real_pos, false)?;
        Ok(record)
    }

    /// Iterate the remaining records on the linear path
    pub fn records(&mut self) -> RecordsIter<'_, R> {
        RecordsIter { reader: self }
    }

    /// Find the next `LOBJ` magic at or after `pos`. Clean EOF (including a
    /// partial magic at the very end of the stream) returns `None`.
    fn seek_magic(&mut self, mut pos: u64) -> Result<Option<u64>> {
        loop {
            let mut window = [0u8; 4];
            let got = self.index.read_at(&mut self.reader, pos, &mut window)?;
            if got < 4 {
                return Ok(None);
            }
            if &window == OBJECT_MAGIC {
                return Ok(Some(pos));
            }
            let skip = window[1..]
                .iter()
                .position(|&b| b == b'L')
                .map(|i| i + 1)
                .unwrap_or(4) as u64;
            pos += skip;
        }
    }

    /// Decode the object at virtual offset `start`. Returns the cursor
    /// advance and the record, if the object produced one. `linear` selects
    /// whether session state (metadata assembly, skip bookkeeping) applies.
    fn decode_one(&mut self, start: u64, linear: bool) -> Result<(u64, Option<BusRecord>)> {
        let header_buf = self
            .index
            .read_bytes(&mut self.reader, start, BLOCK_HEADER_SIZE)?;
        let header = match BlockHeader::parse(&header_buf) {
            Some(h) => h,
            None => {
                return Err(BlfError::Malformed(format!(
                    "no object magic at virtual offset {}",
                    start
                )))
            }
        };
        if (header.header_length as usize) < BLOCK_HEADER_SIZE
            || header.object_length < header.header_length as u32
        {
            return Err(BlfError::Malformed(format!(
                "object at virtual offset {} declares header length {} and object length {}",
                start, header.header_length, header.object_length
            )));
        }

        // the 16-byte floor stops zero or undersized declared lengths from
        // stalling the scan
        let advance = (header.object_length as u64)
            .max(header.header_length as u64)
            .max(BLOCK_HEADER_SIZE as u64);

        let ext_size = match ext_header_size(header.header_type) {
            Some(size) => size,
            None => {
                return Err(BlfError::Unsupported(format!(
                    "object header type {} at virtual offset {}",
                    header.header_type, start
                )))
            }
        };
        if (header.header_length as usize) < BLOCK_HEADER_SIZE + ext_size {
            return Err(BlfError::Malformed(format!(
                "header length {} too small for header type {}",
                header.header_length, header.header_type
            )));
        }
        let ext_buf =
            self.index
                .read_bytes(&mut self.reader, start + BLOCK_HEADER_SIZE as u64, ext_size)?;
        let ext = match parse_ext_header(header.header_type, &ext_buf) {
            Some(ext) => ext,
            None => {
                return Err(BlfError::Unsupported(format!(
                    "object header type {} at virtual offset {}",
                    header.header_type, start
                )))
            }
        };

        if header.object_type == objects::OBJTYPE_LOG_CONTAINER {
            // containers only exist at the physical level; one inside the
            // virtual stream means a container wrapped in a container
            return Err(BlfError::Unsupported(format!(
                "log container nested inside a log container at virtual offset {}",
                start
            )));
        }

        let body_len = (header.object_length - header.header_length as u32) as usize;
        let body =
            self.index
                .read_bytes(&mut self.reader, start + header.header_length as u64, body_len)?;

        let ctx = ObjectCtx {
            object_type: header.object_type,
            header_length: header.header_length,
            timestamp_ns: self
                .start_offset_ns
                .saturating_add(timestamp_to_ns(ext.flags, ext.timestamp_raw)),
        };

        if header.object_type == objects::OBJTYPE_APP_TEXT {
            let record = if linear {
                codecs::apptext::handle_apptext(&ctx, &body, &mut self.registry, &mut self.assembly)?
            } else {
                // random access must not disturb the session's assembly
                let mut scratch = MetadataAssembly::new();
                codecs::apptext::handle_apptext(&ctx, &body, &mut self.registry, &mut scratch)?
            };
            return Ok((advance, record));
        }

        match codecs::decode_object(&ctx, &body, &mut self.registry)? {
            Decoded::Record(rec) => Ok((advance, Some(rec))),
            Decoded::Skipped => Ok((advance, None)),
            Decoded::Unknown => {
                if linear && self.skipped_types.insert(header.object_type) {
                    log::warn!(
                        "skipping unsupported BLF object type {} ({}, {} bytes)",
                        header.object_type,
                        object_type_name(header.object_type),
                        header.object_length
                    );
                }
                Ok((advance, None))
            }
        }
    }

    fn passes_filter(&self, rec: &BusRecord) -> bool {
        let filter = match &self.config.channel_filter {
            Some(filter) => filter,
            None => return true,
        };
        match self.registry.get(rec.iface_id) {
            // metadata records always pass
            Some(info) if info.key.protocol == Protocol::UpperPdu => true,
            Some(info) => filter.contains(&info.key.channel),
            None => true,
        }
    }
}

impl<R> BlfReader<R> {
    /// The parsed file header
    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    /// Interfaces discovered so far, in id order
    pub fn interfaces(&self) -> &InterfaceRegistry {
        &self.registry
    }

    /// Number of containers dropped due to corruption
    pub fn skipped_containers(&self) -> u32 {
        self.index.skipped_containers
    }

    /// True once the linear scan has seen the whole file
    pub fn index_complete(&self) -> bool {
        self.index.complete
    }

    /// Records decoded so far on the linear path
    pub fn records_read(&self) -> u64 {
        self.records_read
    }
}

/// Iterator over the remaining records of a linear pass
pub struct RecordsIter<'a, R> {
    reader: &'a mut BlfReader<R>,
}

impl<R: Read + Seek> Iterator for RecordsIter<'_, R> {
    type Item = Result<(u64, BusRecord)>;

    fn next(&mut self) -> Option<Self::Item> {
        self.reader.next_record().transpose()
    }
}
