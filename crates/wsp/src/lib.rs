//! wsp - read engine for Graphite Whisper database files.
//!
//! Whisper files are fixed-size round-robin time-series databases: a header
//! describing one or more fixed-granularity circular-buffer archives,
//! followed by the archives themselves. This crate decodes that layout and
//! retrieves time-aligned, gap-filled value series from it.
//!
//! # Components
//!
//! - [`Header`] / [`ArchiveInfo`] / [`Point`]: on-disk format codecs
//! - [`WspReader`]: archive selection, interval alignment, circular reads
//! - [`info`] / [`fetch`]: one-shot entry points over a file path
//!
//! # Example
//!
//! ```rust,ignore
//! use wsp::{fetch, info};
//!
//! // Inspect the archives a file carries
//! let meta = info(path)?;
//! for archive in &meta.header.archives {
//!     println!("{}s/point for {}s", archive.seconds_per_point, archive.retention());
//! }
//!
//! // Last hour of values; gaps come back as None
//! let result = fetch(path, Some(now - 3600), None)?;
//! for (i, value) in result.values.iter().enumerate() {
//!     println!("{}: {:?}", result.from + i as u32 * result.step, value);
//! }
//! ```
//!
//! The engine is strictly read-only: file creation, point updates and
//! archive merging are writer-side concerns outside this crate.

#![deny(missing_docs)]

pub mod error;
pub mod format;
pub mod reader;

pub use error::{Result, WspError};
pub use format::{AggregationMethod, ArchiveInfo, Header, Point};
pub use reader::{fetch, info, FetchResult, WspFileInfo, WspReader};
