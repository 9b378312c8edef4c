//! BLF file-level header
//!
//! The file starts with a `"LOGG"` magic and a fixed statistics header. The
//! declared header length is authoritative: readers skip any excess bytes
//! beyond the fixed struct, writers emit the documented 144-byte variant with
//! zeroed reserved padding.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use chrono::{DateTime, Datelike, Timelike, Utc};
use std::io::{Read, Write};

use crate::types::{BlfError, Result};

/// File-level magic, `"LOGG"`
pub const FILE_MAGIC: &[u8; 4] = b"LOGG";

/// Header length the writer emits
pub const FILE_HEADER_SIZE: u32 = 144;

/// Size of the fixed fields, up to and including the end date
const FILE_HEADER_FIXED_SIZE: u32 = 72;

/// SYSTEMTIME-style wall-clock date used for the measurement start/end
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlfDate {
    pub year: u16,
    pub month: u16,
    pub day_of_week: u16,
    pub day: u16,
    pub hour: u16,
    pub minute: u16,
    pub second: u16,
    pub millisecond: u16,
}

impl BlfDate {
    fn read<R: Read>(reader: &mut R) -> std::io::Result<BlfDate> {
        let mut f = [0u16; 8];
        for v in f.iter_mut() {
            *v = reader.read_u16::<LittleEndian>()?;
        }
        Ok(BlfDate {
            year: f[0],
            month: f[1],
            day_of_week: f[2],
            day: f[3],
            hour: f[4],
            minute: f[5],
            second: f[6],
            millisecond: f[7],
        })
    }

    fn write<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        for v in [
            self.year,
            self.month,
            self.day_of_week,
            self.day,
            self.hour,
            self.minute,
            self.second,
            self.millisecond,
        ] {
            writer.write_u16::<LittleEndian>(v)?;
        }
        Ok(())
    }

    /// Convert to nanoseconds since the Unix epoch. Returns `None` for the
    /// all-zero date and for field combinations chrono rejects.
    pub fn to_epoch_ns(&self) -> Option<u64> {
        let date = chrono::NaiveDate::from_ymd_opt(
            self.year as i32,
            self.month as u32,
            self.day as u32,
        )?;
        let dt = date.and_hms_milli_opt(
            self.hour as u32,
            self.minute as u32,
            self.second as u32,
            self.millisecond as u32,
        )?;
        let ns = dt.and_utc().timestamp_nanos_opt()?;
        u64::try_from(ns).ok()
    }

    /// Build a date from an epoch-nanosecond timestamp, truncating to
    /// millisecond resolution.
    pub fn from_epoch_ns(ns: u64) -> BlfDate {
        let secs = (ns / 1_000_000_000) as i64;
        let subsec = (ns % 1_000_000_000) as u32;
        let dt: DateTime<Utc> =
            DateTime::from_timestamp(secs, subsec).unwrap_or_else(|| DateTime::UNIX_EPOCH);
        BlfDate {
            year: dt.year() as u16,
            month: dt.month() as u16,
            day_of_week: dt.weekday().num_days_from_sunday() as u16,
            day: dt.day() as u16,
            hour: dt.hour() as u16,
            minute: dt.minute() as u16,
            second: dt.second() as u16,
            millisecond: (dt.timestamp_subsec_millis()) as u16,
        }
    }
}

/// Parsed BLF file header
#[derive(Debug, Clone, Default)]
pub struct FileHeader {
    pub header_length: u32,
    pub api_version: u32,
    pub application_id: u8,
    pub application_version: (u8, u8, u8),
    /// Physical file size including this header
    pub len_compressed: u64,
    /// Logical size with all containers expanded
    pub len_uncompressed: u64,
    pub object_count: u32,
    pub objects_read: u32,
    pub start_date: BlfDate,
    pub end_date: BlfDate,
}

impl FileHeader {
    /// Read and validate the file header, consuming exactly `header_length`
    /// bytes from the stream.
    ///
    /// A missing or mismatched magic is reported as [`BlfError::NotBlf`] so a
    /// caller probing multiple formats can cleanly try the next one.
    pub fn read<R: Read>(reader: &mut R) -> Result<FileHeader> {
        let mut magic = [0u8; 4];
        reader
            .read_exact(&mut magic)
            .map_err(|e| BlfError::NotBlf(format!("failed to read file magic: {}", e)))?;
        if &magic != FILE_MAGIC {
            return Err(BlfError::NotBlf(format!(
                "bad file magic: {:02x?}",
                magic
            )));
        }

        let header_length = reader.read_u32::<LittleEndian>()?;
        if header_length < FILE_HEADER_FIXED_SIZE {
            return Err(BlfError::Malformed(format!(
                "file header length {} below fixed size {}",
                header_length, FILE_HEADER_FIXED_SIZE
            )));
        }

        let api_version = reader.read_u32::<LittleEndian>()?;
        let application_id = reader.read_u8()?;
        let application_version = (reader.read_u8()?, reader.read_u8()?, reader.read_u8()?);
        let len_compressed = reader.read_u64::<LittleEndian>()?;
        let len_uncompressed = reader.read_u64::<LittleEndian>()?;
        let object_count = reader.read_u32::<LittleEndian>()?;
        let objects_read = reader.read_u32::<LittleEndian>()?;
        let start_date = BlfDate::read(reader)?;
        let end_date = BlfDate::read(reader)?;

        // header_length is authoritative; skip padding up to the payload
        let mut remaining = (header_length - FILE_HEADER_FIXED_SIZE) as usize;
        let mut skip = [0u8; 64];
        while remaining > 0 {
            let n = remaining.min(skip.len());
            reader.read_exact(&mut skip[..n])?;
            remaining -= n;
        }

        Ok(FileHeader {
            header_length,
            api_version,
            application_id,
            application_version,
            len_compressed,
            len_uncompressed,
            object_count,
            objects_read,
            start_date,
            end_date,
        })
    }

    /// Serialize as the 144-byte writer layout
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(FILE_MAGIC)?;
        writer.write_u32::<LittleEndian>(FILE_HEADER_SIZE)?;
        writer.write_u32::<LittleEndian>(self.api_version)?;
        writer.write_u8(self.application_id)?;
        writer.write_u8(self.application_version.0)?;
        writer.write_u8(self.application_version.1)?;
        writer.write_u8(self.application_version.2)?;
        writer.write_u64::<LittleEndian>(self.len_compressed)?;
        writer.write_u64::<LittleEndian>(self.len_uncompressed)?;
        writer.write_u32::<LittleEndian>(self.object_count)?;
        writer.write_u32::<LittleEndian>(self.objects_read)?;
        self.start_date.write(writer)?;
        self.end_date.write(writer)?;
        let reserved = [0u8; (FILE_HEADER_SIZE - FILE_HEADER_FIXED_SIZE) as usize];
        writer.write_all(&reserved)?;
        Ok(())
    }

    /// Epoch-nanosecond offset added to object timestamps, derived from the
    /// measurement start date. Zero when the date is absent or invalid.
    pub fn start_offset_ns(&self) -> u64 {
        self.start_date.to_epoch_ns().unwrap_or(0)
    }
}
