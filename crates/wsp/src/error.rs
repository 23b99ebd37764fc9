//! Error and Result types for Whisper read operations.

use std::io;
use thiserror::Error;

/// A convenience `Result` type for Whisper operations.
pub type Result<T> = std::result::Result<T, WspError>;

/// The error type for Whisper read operations.
#[derive(Debug, Error)]
pub enum WspError {
    /// Underlying I/O error. A missing or unreadable file surfaces here
    /// with its original `io::ErrorKind`.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Fewer bytes were available than a fixed-size record requires.
    /// Signals a corrupt or incompletely written file.
    #[error("Truncated input: {needed} bytes required for {what}")]
    TruncatedInput {
        /// The record that could not be read in full.
        what: &'static str,
        /// Number of bytes the record requires.
        needed: u64,
    },

    /// An archive descriptor that cannot describe a readable ring buffer.
    #[error("Invalid archive descriptor #{index}: {reason}")]
    InvalidDescriptor {
        /// Position of the descriptor in the header, starting at 0.
        index: usize,
        /// Why the descriptor was rejected.
        reason: &'static str,
    },

    /// Requested time window is empty or inverted after defaulting.
    #[error("Invalid time range: from {from} >= until {until}")]
    InvalidRange {
        /// Start of the requested window (epoch seconds).
        from: u32,
        /// End of the requested window (epoch seconds).
        until: u32,
    },

    /// No archive's retention covers the requested span.
    #[error("No archive covers a span of {span} seconds")]
    NoSuitableArchive {
        /// Seconds between the requested start and now, after clamping.
        span: u32,
    },

    /// Decoded point count does not match the expected slot count for the
    /// requested window. Distinct from a per-slot gap, which is never an
    /// error.
    #[error("Malformed archive: decoded {decoded} points, expected {expected}")]
    MalformedArchive {
        /// Number of point records actually decoded.
        decoded: usize,
        /// Number of slots the aligned window spans.
        expected: usize,
    },
}
