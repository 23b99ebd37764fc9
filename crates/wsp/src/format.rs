//! Whisper on-disk format.
//!
//! This module provides structures and codecs for the fixed-size Whisper
//! round-robin database layout. All multi-byte integers and floating-point
//! values are big-endian.
//!
//! ## File Structure
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Metadata (16 bytes, at offset 0)                            │
//! │  - Aggregation type: u32 (4 bytes)                           │
//! │  - Max retention: u32 (4 bytes, seconds)                     │
//! │  - xFilesFactor: f32 (4 bytes)                               │
//! │  - Archive count: u32 (4 bytes)                              │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Archive descriptors (12 bytes each, repeated)               │
//! │  - Offset: u32 (4 bytes, absolute byte offset of the ring)   │
//! │  - Seconds per point: u32 (4 bytes)                          │
//! │  - Points: u32 (4 bytes)                                     │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Archive rings (one per descriptor, in descriptor order)     │
//! │  - Point records (12 bytes each): timestamp u32 + value f64  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Archives are stored finest granularity first, coarsest last (ascending
//! retention). The reader trusts this ordering; it is a precondition of the
//! format, not something this module enforces or repairs.

use crate::error::{Result, WspError};
use std::io::{self, Read, Write};

/// Metadata record size in bytes.
pub const METADATA_SIZE: usize = 16;

/// Archive descriptor size in bytes.
pub const ARCHIVE_INFO_SIZE: usize = 12;

/// Point record size in bytes. Every ring offset computation depends on it.
pub const POINT_SIZE: usize = 12;

/// Reads an exact-size record, mapping a short read to `TruncatedInput`.
pub(crate) fn read_record<R: Read>(
    reader: &mut R,
    buf: &mut [u8],
    what: &'static str,
) -> Result<()> {
    reader.read_exact(buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => WspError::TruncatedInput {
            what,
            needed: buf.len() as u64,
        },
        _ => WspError::Io(e),
    })
}

/// How points are rolled up when propagating between archives.
///
/// Decoded from a small integer code. Codes outside the known range are
/// preserved verbatim; the read path never acts on the method, so an
/// unknown code is not an error here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AggregationMethod {
    /// Arithmetic mean of the valid points (code 1).
    #[default]
    Average,
    /// Sum of the valid points (code 2).
    Sum,
    /// Most recent valid point (code 3).
    Last,
    /// Largest valid point (code 4).
    Max,
    /// Smallest valid point (code 5).
    Min,
    /// A code this implementation does not know, kept as written.
    Unknown(u32),
}

impl AggregationMethod {
    /// Decodes an AggregationMethod from its on-disk code.
    pub fn from_u32(code: u32) -> Self {
        match code {
            1 => Self::Average,
            2 => Self::Sum,
            3 => Self::Last,
            4 => Self::Max,
            5 => Self::Min,
            other => Self::Unknown(other),
        }
    }

    /// Returns the on-disk code for this method.
    pub fn as_u32(self) -> u32 {
        match self {
            Self::Average => 1,
            Self::Sum => 2,
            Self::Last => 3,
            Self::Max => 4,
            Self::Min => 5,
            Self::Unknown(code) => code,
        }
    }
}

/// Descriptor of one fixed-resolution circular buffer within the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveInfo {
    /// Absolute byte offset of this archive's ring within the file.
    pub offset: u32,
    /// Sampling step in seconds.
    pub seconds_per_point: u32,
    /// Number of point slots in the ring.
    pub points: u32,
}

impl ArchiveInfo {
    /// Creates a new archive descriptor.
    pub fn new(offset: u32, seconds_per_point: u32, points: u32) -> Self {
        Self {
            offset,
            seconds_per_point,
            points,
        }
    }

    /// Total time span this archive can hold, in seconds.
    pub fn retention(&self) -> u64 {
        u64::from(self.seconds_per_point) * u64::from(self.points)
    }

    /// Byte length of the ring buffer.
    pub fn size(&self) -> u64 {
        u64::from(self.points) * POINT_SIZE as u64
    }

    /// Absolute byte offset one past the end of the ring.
    pub fn end_offset(&self) -> u64 {
        u64::from(self.offset) + self.size()
    }

    /// Writes the descriptor to a writer using big-endian byte order.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        // Offset (4 bytes)
        writer.write_all(&self.offset.to_be_bytes())?;
        // Seconds per point (4 bytes)
        writer.write_all(&self.seconds_per_point.to_be_bytes())?;
        // Points (4 bytes)
        writer.write_all(&self.points.to_be_bytes())?;

        Ok(())
    }

    /// Reads a descriptor from a reader using big-endian byte order.
    ///
    /// # Errors
    ///
    /// Returns `WspError::TruncatedInput` if fewer than 12 bytes remain.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let mut buf = [0u8; ARCHIVE_INFO_SIZE];
        read_record(reader, &mut buf, "archive descriptor")?;

        let offset = u32::from_be_bytes(buf[0..4].try_into().unwrap());
        let seconds_per_point = u32::from_be_bytes(buf[4..8].try_into().unwrap());
        let points = u32::from_be_bytes(buf[8..12].try_into().unwrap());

        Ok(Self {
            offset,
            seconds_per_point,
            points,
        })
    }
}

/// File header: the metadata record plus the ordered archive descriptors.
#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    /// Roll-up method recorded by the writer.
    pub aggregation: AggregationMethod,
    /// Seconds of history guaranteed across all archives.
    pub max_retention: u32,
    /// Fraction of valid points required for roll-up, in [0, 1].
    /// Decoded for fidelity; the read path does not use it.
    pub x_files_factor: f32,
    /// Archive descriptors in on-disk order (ascending retention).
    pub archives: Vec<ArchiveInfo>,
}

impl Header {
    /// Number of archives in the file.
    pub fn archive_count(&self) -> u32 {
        self.archives.len() as u32
    }

    /// Byte length of the header region (metadata + descriptors).
    pub fn size(&self) -> usize {
        METADATA_SIZE + self.archives.len() * ARCHIVE_INFO_SIZE
    }

    /// Writes the metadata record and all descriptors, big-endian.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        // Aggregation type (4 bytes)
        writer.write_all(&self.aggregation.as_u32().to_be_bytes())?;
        // Max retention (4 bytes)
        writer.write_all(&self.max_retention.to_be_bytes())?;
        // xFilesFactor (4 bytes)
        writer.write_all(&self.x_files_factor.to_be_bytes())?;
        // Archive count (4 bytes)
        writer.write_all(&(self.archives.len() as u32).to_be_bytes())?;

        for archive in &self.archives {
            archive.write_to(writer)?;
        }

        Ok(())
    }

    /// Reads the metadata record and `archive_count` descriptors, big-endian.
    ///
    /// The declared archive count is trusted as given; a corrupt value that
    /// implies reading past end-of-file surfaces as `TruncatedInput` while
    /// decoding descriptors.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let mut buf = [0u8; METADATA_SIZE];
        read_record(reader, &mut buf, "file metadata")?;

        let aggregation =
            AggregationMethod::from_u32(u32::from_be_bytes(buf[0..4].try_into().unwrap()));
        let max_retention = u32::from_be_bytes(buf[4..8].try_into().unwrap());
        let x_files_factor = f32::from_be_bytes(buf[8..12].try_into().unwrap());
        let archive_count = u32::from_be_bytes(buf[12..16].try_into().unwrap());

        // Not preallocated from the wire: a corrupt count should fail on
        // read, not on allocation.
        let mut archives = Vec::new();
        for _ in 0..archive_count {
            archives.push(ArchiveInfo::read_from(reader)?);
        }

        Ok(Self {
            aggregation,
            max_retention,
            x_files_factor,
            archives,
        })
    }
}

/// One on-disk point record: a timestamp and its value.
///
/// A timestamp of 0 marks a slot that was never written.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    /// Step-aligned timestamp in epoch seconds, or 0 for an empty slot.
    pub interval: u32,
    /// Recorded value.
    pub value: f64,
}

impl Point {
    /// Creates a new point record.
    pub fn new(interval: u32, value: f64) -> Self {
        Self { interval, value }
    }

    /// Decodes a point from a fixed-size big-endian record.
    pub fn from_bytes(buf: &[u8; POINT_SIZE]) -> Self {
        let interval = u32::from_be_bytes(buf[0..4].try_into().unwrap());
        let value = f64::from_be_bytes(buf[4..12].try_into().unwrap());
        Self { interval, value }
    }

    /// Writes the point to a writer using big-endian byte order.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        // Timestamp (4 bytes)
        writer.write_all(&self.interval.to_be_bytes())?;
        // Value (8 bytes)
        writer.write_all(&self.value.to_be_bytes())?;

        Ok(())
    }

    /// Reads a point from a reader using big-endian byte order.
    ///
    /// # Errors
    ///
    /// Returns `WspError::TruncatedInput` if fewer than 12 bytes remain.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let mut buf = [0u8; POINT_SIZE];
        read_record(reader, &mut buf, "point record")?;
        Ok(Self::from_bytes(&buf))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample_header() -> Header {
        Header {
            aggregation: AggregationMethod::Average,
            max_retention: 2_592_000,
            x_files_factor: 0.5,
            archives: vec![
                ArchiveInfo::new(40, 300, 2016),
                ArchiveInfo::new(24_232, 3600, 720),
            ],
        }
    }

    #[test]
    fn test_metadata_size() {
        let header = Header {
            archives: Vec::new(),
            ..sample_header()
        };
        let mut buf = Vec::new();
        header.write_to(&mut buf).unwrap();
        assert_eq!(buf.len(), METADATA_SIZE);
    }

    #[test]
    fn test_header_size_includes_descriptors() {
        let header = sample_header();
        let mut buf = Vec::new();
        header.write_to(&mut buf).unwrap();
        assert_eq!(buf.len(), METADATA_SIZE + 2 * ARCHIVE_INFO_SIZE);
        assert_eq!(buf.len(), header.size());
    }

    #[test]
    fn test_header_roundtrip() {
        let header = sample_header();

        let mut buf = Vec::new();
        header.write_to(&mut buf).unwrap();

        let mut cursor = Cursor::new(buf);
        let read_header = Header::read_from(&mut cursor).unwrap();

        assert_eq!(header, read_header);
        assert_eq!(read_header.archive_count(), 2);
    }

    #[test]
    fn test_header_truncated_metadata() {
        let mut cursor = Cursor::new(vec![0u8; METADATA_SIZE - 1]);
        let result = Header::read_from(&mut cursor);
        assert!(matches!(result, Err(WspError::TruncatedInput { .. })));
    }

    #[test]
    fn test_header_truncated_descriptor() {
        // Metadata claims two archives but only one descriptor follows.
        let mut buf = Vec::new();
        sample_header().write_to(&mut buf).unwrap();
        buf.truncate(METADATA_SIZE + ARCHIVE_INFO_SIZE + 3);

        let mut cursor = Cursor::new(buf);
        let result = Header::read_from(&mut cursor);
        assert!(matches!(result, Err(WspError::TruncatedInput { .. })));
    }

    #[test]
    fn test_aggregation_codes() {
        assert_eq!(AggregationMethod::from_u32(1), AggregationMethod::Average);
        assert_eq!(AggregationMethod::from_u32(2), AggregationMethod::Sum);
        assert_eq!(AggregationMethod::from_u32(3), AggregationMethod::Last);
        assert_eq!(AggregationMethod::from_u32(4), AggregationMethod::Max);
        assert_eq!(AggregationMethod::from_u32(5), AggregationMethod::Min);

        for code in [1u32, 2, 3, 4, 5, 0, 6, 999] {
            assert_eq!(AggregationMethod::from_u32(code).as_u32(), code);
        }
    }

    #[test]
    fn test_unknown_aggregation_preserved() {
        let header = Header {
            aggregation: AggregationMethod::Unknown(42),
            ..sample_header()
        };

        let mut buf = Vec::new();
        header.write_to(&mut buf).unwrap();

        let mut cursor = Cursor::new(buf);
        let read_header = Header::read_from(&mut cursor).unwrap();
        assert_eq!(read_header.aggregation, AggregationMethod::Unknown(42));
    }

    #[test]
    fn test_archive_derived_fields() {
        // The standard 5-minutes-for-a-week descriptor.
        let archive = ArchiveInfo::new(40, 300, 2016);
        assert_eq!(archive.retention(), 604_800);
        assert_eq!(archive.size(), 24_192);
        assert_eq!(archive.end_offset(), 24_232);
    }

    #[test]
    fn test_point_big_endian_layout() {
        let point = Point::new(1, 2.0);
        let mut buf = Vec::new();
        point.write_to(&mut buf).unwrap();

        assert_eq!(buf.len(), POINT_SIZE);
        assert_eq!(&buf[0..4], &[0, 0, 0, 1]);
        assert_eq!(&buf[4..12], &2.0f64.to_be_bytes());
    }

    #[test]
    fn test_point_roundtrip() {
        let point = Point::new(1_234_567_890, -3.75);

        let mut buf = Vec::new();
        point.write_to(&mut buf).unwrap();

        let mut cursor = Cursor::new(buf);
        let read_point = Point::read_from(&mut cursor).unwrap();
        assert_eq!(point, read_point);
    }

    #[test]
    fn test_point_truncated() {
        let mut cursor = Cursor::new(vec![0u8; POINT_SIZE - 1]);
        let result = Point::read_from(&mut cursor);
        assert!(matches!(result, Err(WspError::TruncatedInput { .. })));
    }
}
