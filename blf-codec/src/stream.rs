//! Virtual stream reads over the container index
//!
//! Maps a read of N bytes at a virtual offset onto one or more container
//! buffers, transparently crossing container boundaries. A container that
//! fails to decompress on the linear path is dropped from the index with a
//! warning and the read continues with whatever the forward scan finds next;
//! the failed container's virtual range collapses, which is what lets a
//! single corrupt container cost only its own records.

use std::io::{Read, Seek};

use crate::container::ContainerIndex;
use crate::types::{BlfError, Result};

impl ContainerIndex {
    /// Copy up to `out.len()` bytes starting at virtual offset `real_pos`.
    /// Returns the number of bytes copied; fewer than requested means the
    /// virtual stream ended.
    pub fn read_at<R: Read + Seek>(
        &mut self,
        reader: &mut R,
        real_pos: u64,
        out: &mut [u8],
    ) -> Result<usize> {
        let mut copied = 0usize;
        while copied < out.len() {
            let pos = real_pos + copied as u64;
            let idx = match self.locate(reader, pos)? {
                Some(idx) => idx,
                None => break,
            };
            match self.materialize(reader, idx) {
                Ok(()) => {}
                Err(BlfError::Decompress(msg)) if !self.complete && idx + 1 == self.entries.len() => {
                    log::warn!(
                        "discarding corrupt log container at file offset {}: {}",
                        self.entries[idx].infile_start_pos,
                        msg
                    );
                    self.skipped_containers += 1;
                    // collapse the container's virtual range; the next scan
                    // continues after its physical extent
                    self.entries.remove(idx);
                    continue;
                }
                Err(e) => return Err(e),
            }

            let entry = &self.entries[idx];
            let offset = (pos - entry.real_start_pos) as usize;
            let n = (entry.real_length as usize - offset).min(out.len() - copied);
            let buffer = match entry.buffer.as_deref() {
                Some(b) => b,
                None => {
                    return Err(BlfError::Malformed(
                        "container buffer missing after materialization".to_string(),
                    ))
                }
            };
            out[copied..copied + n].copy_from_slice(&buffer[offset..offset + n]);
            copied += n;
        }
        Ok(copied)
    }

    /// Read up to `count` bytes at `real_pos`, growing the buffer in
    /// bounded chunks so a lying declared length cannot force a huge
    /// upfront allocation.
    fn read_up_to<R: Read + Seek>(
        &mut self,
        reader: &mut R,
        real_pos: u64,
        count: usize,
    ) -> Result<Vec<u8>> {
        const CHUNK: usize = 64 * 1024;
        let mut buf = Vec::with_capacity(count.min(CHUNK));
        while buf.len() < count {
            let want = (count - buf.len()).min(CHUNK);
            let filled = buf.len();
            buf.resize(filled + want, 0);
            let got = self.read_at(reader, real_pos + filled as u64, &mut buf[filled..])?;
            buf.truncate(filled + got);
            if got < want {
                break;
            }
        }
        Ok(buf)
    }

    /// Read exactly `count` bytes at `real_pos`; a short read means an
    /// object's declared extent runs past the known container space, i.e.
    /// the file is truncated mid-record.
    pub fn read_bytes<R: Read + Seek>(
        &mut self,
        reader: &mut R,
        real_pos: u64,
        count: usize,
    ) -> Result<Vec<u8>> {
        let buf = self.read_up_to(reader, real_pos, count)?;
        if buf.len() < count {
            return Err(BlfError::Truncated(format!(
                "needed {} bytes at virtual offset {}, only {} available",
                count,
                real_pos,
                buf.len()
            )));
        }
        Ok(buf)
    }

    /// Like [`read_bytes`](Self::read_bytes), but running out of data at
    /// exactly `real_pos` is a non-error "no more data" signal.
    pub fn read_bytes_or_eof<R: Read + Seek>(
        &mut self,
        reader: &mut R,
        real_pos: u64,
        count: usize,
    ) -> Result<Option<Vec<u8>>> {
        let buf = self.read_up_to(reader, real_pos, count)?;
        if buf.is_empty() && count > 0 {
            return Ok(None);
        }
        if buf.len() < count {
            return Err(BlfError::Truncated(format!(
                "needed {} bytes at virtual offset {}, only {} available",
                count,
                real_pos,
                buf.len()
            )));
        }
        Ok(Some(buf))
    }
}
