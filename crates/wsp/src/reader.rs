//! Retrieval engine for Whisper files.
//!
//! Built as a pipeline: decode the header, pick the first archive whose
//! retention covers the requested span, snap both window bounds forward to
//! the archive's step, read the ring (in one or two parts when the window
//! wraps past its physical end), then reconstruct a gap-aware series by
//! checking every decoded timestamp against the slot it should occupy.
//!
//! The engine is read-only. Each [`info`] / [`fetch`] call opens its own
//! file handle, performs a bounded number of reads, and releases the handle
//! on every exit path. No state is shared across calls.

use crate::error::{Result, WspError};
use crate::format::{read_record, ArchiveInfo, Header, Point, POINT_SIZE};
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

/// Decoded metadata of an opened file, as returned by [`info`].
#[derive(Debug, Clone, PartialEq)]
pub struct WspFileInfo {
    /// Path the file was opened from.
    pub path: PathBuf,
    /// The decoded header, including all archive descriptors.
    pub header: Header,
    /// Total byte length of the file.
    pub file_size: u64,
}

/// A time-aligned, gap-filled sequence of values, as returned by [`fetch`].
#[derive(Debug, Clone, PartialEq)]
pub struct FetchResult {
    /// Aligned start of the covered window (inclusive, epoch seconds).
    pub from: u32,
    /// Aligned end of the covered window (exclusive, epoch seconds).
    pub until: u32,
    /// Step of the archive that served the request, in seconds.
    pub step: u32,
    /// One slot per step between `from` and `until`; `None` is a gap.
    pub values: Vec<Option<f64>>,
}

impl FetchResult {
    /// Number of slots in the result.
    pub fn count(&self) -> usize {
        self.values.len()
    }
}

/// Opens Whisper files and serves time-range reads against them.
#[derive(Debug)]
pub struct WspReader {
    /// Path to the file. Data reads reopen it per call.
    path: PathBuf,
    /// Header decoded at open time.
    header: Header,
    /// File length captured at open time.
    file_size: u64,
}

impl WspReader {
    /// Opens a Whisper file and decodes its header.
    ///
    /// Every descriptor is checked against the actual file length: a ring
    /// that would extend past end-of-file is reported as `TruncatedInput`,
    /// and a descriptor with a zero step or zero slot count is rejected as
    /// `InvalidDescriptor`. Archive ordering is trusted, not verified;
    /// files are required to store archives in ascending-retention order.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or the header region
    /// is shorter than the metadata record and declared descriptors.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let file_size = file.metadata()?.len();
        let mut reader = BufReader::new(file);

        let header = Header::read_from(&mut reader)?;

        for (index, archive) in header.archives.iter().enumerate() {
            if archive.seconds_per_point == 0 {
                return Err(WspError::InvalidDescriptor {
                    index,
                    reason: "seconds_per_point is zero",
                });
            }
            if archive.points == 0 {
                return Err(WspError::InvalidDescriptor {
                    index,
                    reason: "points is zero",
                });
            }
            if archive.end_offset() > file_size {
                return Err(WspError::TruncatedInput {
                    what: "archive ring",
                    needed: archive.end_offset() - file_size,
                });
            }
        }

        Ok(Self {
            path: path.to_path_buf(),
            header,
            file_size,
        })
    }

    /// Returns the decoded header.
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Returns the file length captured at open time.
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Returns the path the reader was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Fetches values for `[from, until)` against the current wall clock.
    ///
    /// `None` (or 0) defaults `from` to the oldest retained time and
    /// `until` to now. See [`WspReader::fetch_at`] for the full contract.
    pub fn fetch(&self, from: Option<u32>, until: Option<u32>) -> Result<FetchResult> {
        self.fetch_at(from, until, unix_now())
    }

    /// Fetches values for `[from, until)` relative to an explicit
    /// reference time.
    ///
    /// The window is defaulted, validated (`from >= until` is
    /// `InvalidRange`), clamped to `[now - max_retention, now]`, then both
    /// bounds are snapped forward to the chosen archive's next step
    /// boundary. The returned `from`/`until` are the aligned bounds and are
    /// authoritative; callers must not assume their inputs were covered
    /// verbatim.
    ///
    /// # Errors
    ///
    /// Returns `NoSuitableArchive` if no archive's retention covers
    /// `now - from` after clamping, and `MalformedArchive` if the ring
    /// yields a different number of records than the window has slots.
    pub fn fetch_at(&self, from: Option<u32>, until: Option<u32>, now: u32) -> Result<FetchResult> {
        let until = match until {
            Some(0) | None => now,
            Some(u) => u,
        };
        let from = match from {
            Some(0) | None => 0,
            Some(f) => f,
        };
        if from >= until {
            return Err(WspError::InvalidRange { from, until });
        }

        let oldest = now.saturating_sub(self.header.max_retention);
        // Both bounds clamp into [oldest, now]; a from in the future would
        // otherwise leave the span negative.
        let from = from.max(oldest).min(now);
        let until = until.min(now);

        let span = now - from;
        let archive = self
            .header
            .archives
            .iter()
            .find(|a| a.retention() >= u64::from(span))
            .ok_or(WspError::NoSuitableArchive { span })?;
        let step = archive.seconds_per_point;
        debug!("Selected {}s/point archive for a {}s span", step, span);

        let from_interval = align_interval(from, step);
        // A window clamped entirely out of retention leaves until < from;
        // aligning it would be meaningless, the result is empty either way.
        let until_interval = align_interval(until.max(from), step);

        if until_interval <= from_interval {
            return Ok(FetchResult {
                from: from_interval,
                until: from_interval,
                step,
                values: Vec::new(),
            });
        }
        let expected = ((until_interval - from_interval) / step) as usize;

        let file = File::open(&self.path)?;
        let mut reader = BufReader::new(file);

        // Slot 0 anchors all offset arithmetic for this ring.
        reader.seek(SeekFrom::Start(u64::from(archive.offset)))?;
        let base = Point::read_from(&mut reader)?;

        if base.interval == 0 {
            // Never written; the rest of the ring holds nothing.
            return Ok(FetchResult {
                from: from_interval,
                until: until_interval,
                step,
                values: vec![None; expected],
            });
        }

        let from_offset = ring_offset(archive, base.interval, from_interval);
        let until_offset = ring_offset(archive, base.interval, until_interval);

        let raw = if from_offset < until_offset {
            read_span(&mut reader, from_offset, (until_offset - from_offset) as usize)?
        } else {
            // The window wraps past the physical end of the ring: tail of
            // the ring first, then its head, or values come out
            // time-reversed.
            debug!("Ring read wraps at byte {}", archive.end_offset());
            let mut tail = read_span(
                &mut reader,
                from_offset,
                (archive.end_offset() - from_offset) as usize,
            )?;
            let head = read_span(
                &mut reader,
                u64::from(archive.offset),
                (until_offset - u64::from(archive.offset)) as usize,
            )?;
            tail.extend_from_slice(&head);
            tail
        };

        let decoded = raw.len() / POINT_SIZE;
        if raw.len() % POINT_SIZE != 0 || decoded != expected {
            return Err(WspError::MalformedArchive { decoded, expected });
        }

        let mut values = Vec::with_capacity(expected);
        for (i, chunk) in raw.chunks_exact(POINT_SIZE).enumerate() {
            let point = Point::from_bytes(chunk.try_into().unwrap());
            let slot_interval = from_interval + (i as u32) * step;
            // A slot left over from an earlier wrap carries a timestamp
            // that does not match this window; it is a gap, not data.
            if point.interval == slot_interval {
                values.push(Some(point.value));
            } else {
                values.push(None);
            }
        }

        Ok(FetchResult {
            from: from_interval,
            until: until_interval,
            step,
            values,
        })
    }
}

/// Retrieves a file's decoded header and size.
///
/// # Errors
///
/// Returns an error if the file is missing, unreadable, or its header
/// region is truncated.
pub fn info(path: &Path) -> Result<WspFileInfo> {
    let reader = WspReader::open(path)?;
    Ok(WspFileInfo {
        path: reader.path,
        header: reader.header,
        file_size: reader.file_size,
    })
}

/// Fetches values for `[from, until)` against the current wall clock.
///
/// Convenience wrapper over [`WspReader::open`] + [`WspReader::fetch`];
/// `None` defaults `from` to the oldest retained time and `until` to now.
pub fn fetch(path: &Path, from: Option<u32>, until: Option<u32>) -> Result<FetchResult> {
    WspReader::open(path)?.fetch(from, until)
}

/// Snaps a timestamp forward to the next step boundary.
///
/// Saturates at `u32::MAX` rather than overflowing for timestamps within
/// one step of the end of the epoch.
fn align_interval(ts: u32, step: u32) -> u32 {
    (ts - ts % step).saturating_add(step)
}

/// Byte offset of an interval's slot within the file.
///
/// The time distance from the ring's anchor is converted to a point count
/// with floor division, to bytes, wrapped into `[0, ring size)` with a
/// non-negative modulo, then rebased onto the archive's offset. Floor
/// semantics matter: the interval may precede the anchor.
fn ring_offset(archive: &ArchiveInfo, base_interval: u32, interval: u32) -> u64 {
    let time_distance = i64::from(interval) - i64::from(base_interval);
    let point_distance = time_distance.div_euclid(i64::from(archive.seconds_per_point));
    let byte_distance = point_distance * POINT_SIZE as i64;
    let wrapped = byte_distance.rem_euclid(archive.size() as i64);
    u64::from(archive.offset) + wrapped as u64
}

/// Reads `len` bytes starting at an absolute offset.
fn read_span<R: Read + Seek>(reader: &mut R, offset: u64, len: usize) -> Result<Vec<u8>> {
    reader.seek(SeekFrom::Start(offset))?;
    let mut buf = vec![0u8; len];
    read_record(reader, &mut buf, "archive points")?;
    Ok(buf)
}

/// Current wall-clock time in epoch seconds.
fn unix_now() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or(0)
}
