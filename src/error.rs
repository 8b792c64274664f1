//! Error types for PDF417 decoding

use thiserror::Error;

/// Failure modes of one decode attempt.
///
/// All variants abort the attempt; none are retried internally. A caller
/// may retry with adjusted corner points or a wider codeword envelope.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// No symbol could be established in the region: the bounding box is
    /// unusable, neither row indicator column yields valid metadata, or the
    /// left and right indicator columns disagree about the symbol shape.
    #[error("no PDF417 symbol found")]
    NotFound,

    /// The codeword stream is structurally invalid (bad symbol length
    /// descriptor, malformed compaction sequence, truncated macro block).
    #[error("invalid codeword stream format")]
    InvalidFormat,

    /// Error correction determined the codeword set is uncorrectable
    /// relative to its redundancy.
    #[error("error correction failed")]
    ChecksumFailure,

    /// An internal iteration cap was exhausted. Either the input corruption
    /// exceeds design assumptions or there is an implementation bug; this is
    /// surfaced loudly instead of returning truncated output.
    #[error("decoder invariant violated: {0}")]
    InvariantViolation(&'static str),
}
