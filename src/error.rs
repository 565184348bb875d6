use core::fmt;

/// Everything that can go wrong decoding an XZ/LZMA2 stream.
///
/// The taxonomy mirrors the four failure classes a caller actually needs to
/// distinguish: malformed framing, a checksum mismatch, a bad arithmetic-coded
/// sequence, and a buffer that was too small. All variants are fatal and
/// local — nothing in this crate retries a failed decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XzError {
    /// Bad magic, bad flags, malformed VLI, unsupported filter, bad padding,
    /// an index/footer mismatch, or any other framing inconsistency.
    Structural(&'static str),
    /// A CRC-32 verification failed (stream header, index, footer, or block).
    Integrity,
    /// The range coder or the LZ77 state machine hit an invalid sequence:
    /// exhausted compressed budget, invalid distance, a chunk that didn't
    /// exactly fill its declared size.
    Decode(&'static str),
    /// The caller's output buffer is smaller than the decompressed data, or
    /// the input was truncated.
    Buffer(&'static str),
}

impl XzError {
    /// True only for an integrity (checksum) failure. This is the sound,
    /// per-call replacement for a global "last operation failed its checksum"
    /// flag: the caller already has this value in hand, no second query
    /// needed.
    pub fn is_checksum_error(&self) -> bool {
        matches!(self, XzError::Integrity)
    }
}

impl fmt::Display for XzError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            XzError::Structural(msg) => write!(f, "malformed XZ/LZMA2 input: {msg}"),
            XzError::Integrity => write!(f, "checksum verification failed"),
            XzError::Decode(msg) => write!(f, "LZMA decode failure: {msg}"),
            XzError::Buffer(msg) => write!(f, "buffer error: {msg}"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for XzError {}

pub(crate) type Result<T> = core::result::Result<T, XzError>;

#[inline(always)]
pub(crate) fn error_structural(msg: &'static str) -> XzError {
    XzError::Structural(msg)
}

#[inline(always)]
pub(crate) fn error_decode(msg: &'static str) -> XzError {
    XzError::Decode(msg)
}

#[inline(always)]
pub(crate) fn error_buffer(msg: &'static str) -> XzError {
    XzError::Buffer(msg)
}
