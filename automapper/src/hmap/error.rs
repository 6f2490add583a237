//! Decoder error types.

use thiserror::Error;

/// Errors that abort decoding of an `.hmap` file.
///
/// Only framing problems are fatal. Records that are well framed but
/// semantically unknown (record types, marker kinds, grid versions, height
/// schemes) are skipped and counted in [`DecodeStats`](super::DecodeStats).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// The file does not start with the expected signature
    #[error("invalid signature: not an hmap export")]
    BadSignature,

    /// The zlib header following the signature is invalid
    #[error("invalid zlib header: {0:02x} {1:02x}")]
    BadCompressionHeader(u8, u8),

    /// The deflate stream is corrupt
    #[error("decompression failed: {0}")]
    Decompression(String),

    /// The decompressed body exceeds the size limit
    #[error("decompressed body exceeds {limit} bytes")]
    TooLarge { limit: usize },

    /// A read ran past the end of a record or of the body
    #[error("truncated data at offset {offset}: needed {needed} bytes, {available} available")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// A record header declared a negative length
    #[error("invalid record length {length} for record '{record}'")]
    InvalidLength { record: String, length: i32 },

    /// A string was not terminated before the end of its record
    #[error("unterminated string at offset {0}")]
    UnterminatedString(usize),
}
