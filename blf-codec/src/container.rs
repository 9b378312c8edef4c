//! Log-container index and materializer
//!
//! A BLF file is a sequence of objects; `LOG_CONTAINER` objects carry a
//! possibly zlib-compressed payload that is itself a sequence of objects.
//! The index maps the virtual ("real") decompressed address space to
//! physical file locations. Containers are discovered by a forward-only
//! resynchronizing magic scan, so corrupt stretches between containers are
//! skipped rather than aborting the read. Lone objects appearing outside any
//! container are wrapped as uncompressed pseudo-containers covering their
//! raw bytes, which keeps the virtual address space gap-free.
//!
//! Materialization (decompression) is lazy and cached: a container's payload
//! buffer is produced on first access and kept until the entry is dropped or
//! evicted.

use std::io::{Read, Seek, SeekFrom};

use crate::bytes;
use crate::objects::{self, BlockHeader, BLOCK_HEADER_SIZE};
use crate::types::{BlfError, Result};

/// Size of the sub-header following a log container's block header
pub const LOG_CONTAINER_HEADER_SIZE: usize = 16;

/// Compression method of a log container payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Zlib,
}

impl Compression {
    pub fn from_raw(raw: u16) -> Option<Compression> {
        match raw {
            0 => Some(Compression::None),
            2 => Some(Compression::Zlib),
            _ => None,
        }
    }

    pub fn to_raw(self) -> u16 {
        match self {
            Compression::None => 0,
            Compression::Zlib => 2,
        }
    }
}

/// One container's span in physical and virtual space
#[derive(Debug)]
pub(crate) struct ContainerEntry {
    /// Physical offset of the container's block header
    pub infile_start_pos: u64,
    /// Physical length of the whole container object
    pub infile_length: u64,
    /// Physical offset where the payload begins
    pub infile_data_start: u64,
    /// Start of this container's span in the virtual address space
    pub real_start_pos: u64,
    /// Uncompressed payload length
    pub real_length: u64,
    pub compression: Compression,
    /// Decompressed payload, produced at most once
    pub buffer: Option<Vec<u8>>,
}

impl ContainerEntry {
    pub fn contains(&self, real_pos: u64) -> bool {
        real_pos >= self.real_start_pos && real_pos < self.real_start_pos + self.real_length
    }
}

/// Outcome of one discovery step
enum ScanOutcome {
    /// A new index entry was appended
    Registered,
    /// An unusable container was stepped over
    Skipped,
    /// Clean physical end of file
    Eof,
}

/// Ordered container index over one open file
#[derive(Debug, Default)]
pub(crate) struct ContainerIndex {
    pub entries: Vec<ContainerEntry>,
    /// Physical offset where the next discovery scan resumes
    next_scan_pos: u64,
    /// True once the scan has reached physical EOF
    pub complete: bool,
    /// Keep materialized buffers (false evicts behind the read cursor)
    pub cache_containers: bool,
    /// Containers dropped due to decompression failure or unknown method
    pub skipped_containers: u32,
}

/// Read until `buf` is full or EOF; returns the number of bytes read
fn read_fully<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut total = 0;
    while total < buf.len() {
        match reader.read(&mut buf[total..]) {
            Ok(0) => break,
            Ok(n) => total += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(total)
}

#[cfg(feature = "zlib")]
fn inflate(compressed: &[u8], expected: usize) -> Result<Vec<u8>> {
    use std::io::Read as _;
    let decoder = flate2::read::ZlibDecoder::new(compressed);
    let mut out = Vec::new();
    // the take bound keeps a lying size declaration from ballooning memory
    // while still detecting overshoot as a size mismatch
    decoder
        .take(expected as u64 + 1)
        .read_to_end(&mut out)
        .map_err(|e| BlfError::Decompress(format!("zlib inflate error: {}", e)))?;
    if out.len() != expected {
        return Err(BlfError::Decompress(format!(
            "inflated {} bytes, container declared {}",
            out.len(),
            expected
        )));
    }
    Ok(out)
}

#[cfg(not(feature = "zlib"))]
fn inflate(_compressed: &[u8], _expected: usize) -> Result<Vec<u8>> {
    Err(BlfError::Decompress(
        "zlib support not compiled in".to_string(),
    ))
}

impl ContainerIndex {
    pub fn new(first_object_pos: u64, cache_containers: bool) -> Self {
        ContainerIndex {
            entries: Vec::new(),
            next_scan_pos: first_object_pos,
            complete: false,
            cache_containers,
            skipped_containers: 0,
        }
    }

    /// End of the known virtual address space
    pub fn virtual_end(&self) -> u64 {
        self.entries
            .last()
            .map(|e| e.real_start_pos + e.real_length)
            .unwrap_or(0)
    }

    /// Scan forward from the current physical position for the next
    /// container (or lone object) and append it to the index.
    ///
    /// The scan slides a partial-match window over the stream looking for
    /// the `LOBJ` magic; it never seeks backward, so a corrupt stretch costs
    /// one pass over its bytes. Containers with an unknown compression
    /// method are skipped with a warning and scanning continues past them.
    /// Returns `false` on clean physical EOF.
    pub fn find_next_container<R: Read + Seek>(&mut self, reader: &mut R) -> Result<bool> {
        loop {
            match self.scan_one(reader)? {
                ScanOutcome::Eof => return Ok(false),
                ScanOutcome::Registered => return Ok(true),
                ScanOutcome::Skipped => continue,
            }
        }
    }

    fn scan_one<R: Read + Seek>(&mut self, reader: &mut R) -> Result<ScanOutcome> {
        if self.complete {
            return Ok(ScanOutcome::Eof);
        }
        reader.seek(SeekFrom::Start(self.next_scan_pos))?;
        let mut pos = self.next_scan_pos;
        let mut window = [0u8; BLOCK_HEADER_SIZE];

        let got = read_fully(reader, &mut window)?;
        if got < BLOCK_HEADER_SIZE {
            // not enough bytes left for any object header
            self.complete = true;
            return Ok(ScanOutcome::Eof);
        }

        loop {
            if let Some(header) = BlockHeader::parse(&window) {
                return self.register(reader, pos, header);
            }
            // resynchronize: reuse the longest usable suffix of the window
            let skip = window[1..]
                .iter()
                .position(|&b| b == b'L')
                .map(|i| i + 1)
                .unwrap_or(BLOCK_HEADER_SIZE);
            window.copy_within(skip.., 0);
            let refilled = read_fully(reader, &mut window[BLOCK_HEADER_SIZE - skip..])?;
            if refilled < skip {
                self.complete = true;
                return Ok(ScanOutcome::Eof);
            }
            pos += skip as u64;
        }
    }

    /// Register the object found at physical `pos` as an index entry
    fn register<R: Read + Seek>(
        &mut self,
        reader: &mut R,
        pos: u64,
        header: BlockHeader,
    ) -> Result<ScanOutcome> {
        if (header.header_length as usize) < BLOCK_HEADER_SIZE
            || header.object_length < header.header_length as u32
        {
            return Err(BlfError::Malformed(format!(
                "object at file offset {} declares header length {} and object length {}",
                pos, header.header_length, header.object_length
            )));
        }

        if header.object_type != objects::OBJTYPE_LOG_CONTAINER {
            // lone object outside any container: wrap its raw bytes
            self.entries.push(ContainerEntry {
                infile_start_pos: pos,
                infile_length: header.object_length as u64,
                infile_data_start: pos,
                real_start_pos: self.virtual_end(),
                real_length: header.object_length as u64,
                compression: Compression::None,
                buffer: None,
            });
            self.next_scan_pos = pos + header.object_length as u64;
            return Ok(ScanOutcome::Registered);
        }

        // the sub-header sits after the declared header length, which may
        // exceed the bare block header
        reader.seek(SeekFrom::Start(pos + header.header_length as u64))?;
        let mut sub = [0u8; LOG_CONTAINER_HEADER_SIZE];
        let got = read_fully(reader, &mut sub)?;
        if got < LOG_CONTAINER_HEADER_SIZE {
            return Err(BlfError::Truncated(format!(
                "log container header cut short at file offset {}",
                pos
            )));
        }
        let method_raw = bytes::get_u16_le(&sub, 0).unwrap_or(0);
        let uncompressed_size = bytes::get_u32_le(&sub, 8).unwrap_or(0) as u64;

        let data_start = pos + header.header_length as u64 + LOG_CONTAINER_HEADER_SIZE as u64;
        self.next_scan_pos = pos + header.object_length as u64;

        let compression = match Compression::from_raw(method_raw) {
            Some(c) => c,
            None => {
                log::warn!(
                    "skipping log container at file offset {} with unknown compression method {}",
                    pos,
                    method_raw
                );
                self.skipped_containers += 1;
                // scanning resumes after the container's declared extent
                return Ok(ScanOutcome::Skipped);
            }
        };

        self.entries.push(ContainerEntry {
            infile_start_pos: pos,
            infile_length: header.object_length as u64,
            infile_data_start: data_start,
            real_start_pos: self.virtual_end(),
            real_length: uncompressed_size,
            compression,
            buffer: None,
        });
        Ok(ScanOutcome::Registered)
    }

    /// Binary search for the container covering `real_pos`. Valid once the
    /// index is complete.
    pub fn search(&self, real_pos: u64) -> Option<usize> {
        let idx = self
            .entries
            .partition_point(|e| e.real_start_pos + e.real_length <= real_pos);
        match self.entries.get(idx) {
            Some(e) if e.contains(real_pos) => Some(idx),
            _ => None,
        }
    }

    /// Find the container covering `real_pos`, growing the index on demand
    /// while in linear mode. Returns `None` at virtual EOF.
    pub fn locate<R: Read + Seek>(
        &mut self,
        reader: &mut R,
        real_pos: u64,
    ) -> Result<Option<usize>> {
        if self.complete {
            return Ok(self.search(real_pos));
        }
        // backward scan over already-discovered containers, no I/O
        for (i, e) in self.entries.iter().enumerate().rev() {
            if e.contains(real_pos) {
                return Ok(Some(i));
            }
            if e.real_start_pos + e.real_length <= real_pos {
                break;
            }
        }
        if real_pos < self.virtual_end() {
            // inside known space but in no entry: only possible for
            // zero-length containers, which never satisfy a read
            return Ok(None);
        }
        loop {
            if !self.find_next_container(reader)? {
                return Ok(None);
            }
            if let Some(last) = self.entries.last() {
                if last.contains(real_pos) {
                    return Ok(Some(self.entries.len() - 1));
                }
            }
        }
    }

    /// Produce the decompressed payload for `idx`. Idempotent: a second call
    /// returns immediately with the cached buffer in place.
    pub fn materialize<R: Read + Seek>(&mut self, reader: &mut R, idx: usize) -> Result<()> {
        if self.entries[idx].buffer.is_some() {
            return Ok(());
        }
        if !self.cache_containers {
            // evict buffers fully behind the one being read; keep the
            // immediate predecessor since objects straddle boundaries
            for e in self.entries[..idx.saturating_sub(1)].iter_mut() {
                e.buffer = None;
            }
        }

        let entry = &self.entries[idx];
        if entry.real_length == 0 {
            self.entries[idx].buffer = Some(Vec::new());
            return Ok(());
        }

        reader.seek(SeekFrom::Start(entry.infile_data_start))?;
        let payload_len = entry
            .infile_length
            .saturating_sub(entry.infile_data_start - entry.infile_start_pos)
            as usize;

        // declared lengths come from the file; bounded reads instead of
        // upfront allocations keep lying declarations cheap
        let buffer = match entry.compression {
            Compression::None => {
                let mut buf = Vec::new();
                reader.take(entry.real_length).read_to_end(&mut buf)?;
                if (buf.len() as u64) < entry.real_length {
                    return Err(BlfError::Truncated(format!(
                        "container at file offset {} declares {} payload bytes, {} available",
                        entry.infile_start_pos,
                        entry.real_length,
                        buf.len()
                    )));
                }
                buf
            }
            Compression::Zlib => {
                let mut compressed = Vec::new();
                reader.take(payload_len as u64).read_to_end(&mut compressed)?;
                inflate(&compressed, entry.real_length as usize)?
            }
        };
        self.entries[idx].buffer = Some(buffer);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::{OBJTYPE_CAN_MESSAGE, OBJTYPE_LOG_CONTAINER};
    use std::io::Cursor;

    fn container_bytes(payload: &[u8], compression: Compression, uncompressed_len: u32) -> Vec<u8> {
        let mut out = Vec::new();
        let header = BlockHeader {
            header_length: BLOCK_HEADER_SIZE as u16,
            header_type: 1,
            object_length: (BLOCK_HEADER_SIZE + LOG_CONTAINER_HEADER_SIZE + payload.len()) as u32,
            object_type: OBJTYPE_LOG_CONTAINER,
        };
        out.extend_from_slice(&header.to_bytes());
        let mut sub = [0u8; LOG_CONTAINER_HEADER_SIZE];
        crate::bytes::put_u16_le(&mut sub, 0, compression.to_raw());
        crate::bytes::put_u32_le(&mut sub, 8, uncompressed_len);
        out.extend_from_slice(&sub);
        out.extend_from_slice(payload);
        out
    }

    fn lone_object_bytes(object_type: u32, body: &[u8]) -> Vec<u8> {
        let header = BlockHeader {
            header_length: BLOCK_HEADER_SIZE as u16,
            header_type: 1,
            object_length: (BLOCK_HEADER_SIZE + body.len()) as u32,
            object_type,
        };
        let mut out = header.to_bytes().to_vec();
        out.extend_from_slice(body);
        out
    }

    #[test]
    fn test_discover_uncompressed_container() {
        let payload = b"0123456789abcdef";
        let file = container_bytes(payload, Compression::None, payload.len() as u32);
        let mut cursor = Cursor::new(file);

        let mut index = ContainerIndex::new(0, true);
        assert!(index.find_next_container(&mut cursor).unwrap());
        assert_eq!(index.entries.len(), 1);
        let e = &index.entries[0];
        assert_eq!(e.real_start_pos, 0);
        assert_eq!(e.real_length, payload.len() as u64);
        assert_eq!(e.infile_data_start, 32);

        index.materialize(&mut cursor, 0).unwrap();
        assert_eq!(index.entries[0].buffer.as_deref(), Some(&payload[..]));

        assert!(!index.find_next_container(&mut cursor).unwrap());
        assert!(index.complete);
    }

    #[test]
    fn test_resync_over_garbage() {
        let payload = b"payload!";
        let mut file = vec![0x42u8; 37]; // garbage before the first container
        file.extend_from_slice(b"LO"); // partial magic mid-garbage
        file.extend(container_bytes(payload, Compression::None, payload.len() as u32));
        let mut cursor = Cursor::new(file);

        let mut index = ContainerIndex::new(0, true);
        assert!(index.find_next_container(&mut cursor).unwrap());
        assert_eq!(index.entries[0].infile_start_pos, 39);
        index.materialize(&mut cursor, 0).unwrap();
        assert_eq!(index.entries[0].buffer.as_deref(), Some(&payload[..]));
    }

    #[test]
    fn test_lone_object_becomes_pseudo_container() {
        let obj = lone_object_bytes(OBJTYPE_CAN_MESSAGE, &[0u8; 32]);
        let mut cursor = Cursor::new(obj.clone());

        let mut index = ContainerIndex::new(0, true);
        assert!(index.find_next_container(&mut cursor).unwrap());
        let e = &index.entries[0];
        assert_eq!(e.compression, Compression::None);
        assert_eq!(e.real_length, obj.len() as u64);
        assert_eq!(e.infile_data_start, 0);

        // the pseudo-container's payload is the whole object, header included
        index.materialize(&mut cursor, 0).unwrap();
        assert_eq!(index.entries[0].buffer.as_deref(), Some(&obj[..]));
    }

    #[test]
    fn test_zero_length_container_advances_scan() {
        let mut file = container_bytes(&[], Compression::None, 0);
        let payload = b"next";
        file.extend(container_bytes(payload, Compression::None, payload.len() as u32));
        let mut cursor = Cursor::new(file);

        let mut index = ContainerIndex::new(0, true);
        assert!(index.find_next_container(&mut cursor).unwrap());
        assert!(index.find_next_container(&mut cursor).unwrap());
        assert_eq!(index.entries.len(), 2);
        assert_eq!(index.entries[0].real_length, 0);
        assert_eq!(index.entries[1].real_start_pos, 0);
        index.materialize(&mut cursor, 1).unwrap();
        assert_eq!(index.entries[1].buffer.as_deref(), Some(&payload[..]));
    }

    #[test]
    fn test_search_is_binary_over_virtual_space() {
        let mut index = ContainerIndex::new(0, true);
        for i in 0..10u64 {
            index.entries.push(ContainerEntry {
                infile_start_pos: i * 100,
                infile_length: 100,
                infile_data_start: i * 100 + 32,
                real_start_pos: i * 50,
                real_length: 50,
                compression: Compression::None,
                buffer: None,
            });
        }
        index.complete = true;
        assert_eq!(index.search(0), Some(0));
        assert_eq!(index.search(49), Some(0));
        assert_eq!(index.search(50), Some(1));
        assert_eq!(index.search(499), Some(9));
        assert_eq!(index.search(500), None);
    }

    #[test]
    fn test_malformed_lengths_are_fatal() {
        let mut raw = lone_object_bytes(OBJTYPE_CAN_MESSAGE, &[0u8; 16]);
        // object_length below header_length
        crate::bytes::put_u32_le(&mut raw, 8, 8);
        let mut cursor = Cursor::new(raw);
        let mut index = ContainerIndex::new(0, true);
        assert!(matches!(
            index.find_next_container(&mut cursor),
            Err(BlfError::Malformed(_))
        ));
    }

    #[cfg(feature = "zlib")]
    #[test]
    fn test_zlib_container_roundtrip() {
        use flate2::write::ZlibEncoder;
        use std::io::Write as _;

        let payload: Vec<u8> = (0..200u16).map(|v| (v % 251) as u8).collect();
        let mut encoder = ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(&payload).unwrap();
        let compressed = encoder.finish().unwrap();

        let file = container_bytes(&compressed, Compression::Zlib, payload.len() as u32);
        let mut cursor = Cursor::new(file);
        let mut index = ContainerIndex::new(0, true);
        assert!(index.find_next_container(&mut cursor).unwrap());
        index.materialize(&mut cursor, 0).unwrap();
        assert_eq!(index.entries[0].buffer.as_deref(), Some(&payload[..]));
    }

    #[cfg(feature = "zlib")]
    #[test]
    fn test_zlib_garbage_fails_recoverably() {
        let garbage = [0x11u8; 64];
        let file = container_bytes(&garbage, Compression::Zlib, 128);
        let mut cursor = Cursor::new(file);
        let mut index = ContainerIndex::new(0, true);
        assert!(index.find_next_container(&mut cursor).unwrap());
        assert!(matches!(
            index.materialize(&mut cursor, 0),
            Err(BlfError::Decompress(_))
        ));
    }

    #[cfg(feature = "zlib")]
    #[test]
    fn test_zlib_size_mismatch_is_decompress_error() {
        use flate2::write::ZlibEncoder;
        use std::io::Write as _;

        let payload = [7u8; 40];
        let mut encoder = ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(&payload).unwrap();
        let compressed = encoder.finish().unwrap();

        // declare more output than the stream actually inflates to
        let file = container_bytes(&compressed, Compression::Zlib, 41);
        let mut cursor = Cursor::new(file);
        let mut index = ContainerIndex::new(0, true);
        index.find_next_container(&mut cursor).unwrap();
        assert!(matches!(
            index.materialize(&mut cursor, 0),
            Err(BlfError::Decompress(_))
        ));
    }
}
