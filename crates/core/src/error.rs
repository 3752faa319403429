//! Error types for the media bridge library.

use std::fmt;

/// Errors that can occur in the media bridge library.
///
/// Variants map to specific failure modes across the stack:
///
/// - **Configuration**: [`InvalidCounterWidth`](Self::InvalidCounterWidth).
/// - **RTP**: [`Rtp`](Self::Rtp) for malformed datagrams,
///   [`DestinationNotConfigured`](Self::DestinationNotConfigured),
///   [`PacketTooLarge`](Self::PacketTooLarge).
/// - **Transport**: [`Io`](Self::Io), [`PortRangeExhausted`](Self::PortRangeExhausted),
///   [`AlreadyRunning`](Self::AlreadyRunning), [`ReaderStopped`](Self::ReaderStopped).
/// - **Matroska**: [`Matroska`](Self::Matroska), always fatal to the read loop.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// Underlying I/O or socket error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A [`RolloverContext`](crate::RolloverContext) was built with an unusable width.
    #[error("invalid rollover counter width: {0} bits (expected 2..=32)")]
    InvalidCounterWidth(u32),

    /// A datagram could not be parsed as an RTP packet (RFC 3550 §5.1).
    #[error("RTP parse error: {kind}")]
    Rtp { kind: RtpParseErrorKind },

    /// [`RtpWriter`](crate::RtpWriter) has no usable destination address.
    #[error("RTP destination not configured")]
    DestinationNotConfigured,

    /// Serialized packet does not fit in a single UDP datagram.
    #[error("RTP packet too large for UDP: {0} bytes")]
    PacketTooLarge(usize),

    /// [`RtpReader::start`](crate::RtpReader::start) was called while already running.
    #[error("reader already running")]
    AlreadyRunning,

    /// The reader was stopped and its socket released; it cannot be restarted.
    #[error("reader stopped")]
    ReaderStopped,

    /// The even-port search walked past 65534 without a free port.
    #[error("port range exhausted (no free even UDP port from the search base)")]
    PortRangeExhausted,

    /// Malformed or unsupported Matroska/EBML stream.
    #[error("Matroska parse error at offset {offset}: {kind}")]
    Matroska { kind: MatroskaErrorKind, offset: u64 },
}

/// Specific kind of RTP parse failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RtpParseErrorKind {
    /// Datagram shorter than the header it declares.
    TooShort,
    /// Version field was not 2.
    UnsupportedVersion(u8),
    /// Header extension runs past the end of the datagram.
    BadExtension,
    /// Padding count is zero or larger than the payload.
    BadPadding,
}

impl fmt::Display for RtpParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooShort => write!(f, "packet too short"),
            Self::UnsupportedVersion(v) => write!(f, "unsupported RTP version {v}"),
            Self::BadExtension => write!(f, "header extension past end of packet"),
            Self::BadPadding => write!(f, "invalid padding"),
        }
    }
}

/// Specific kind of Matroska parse failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatroskaErrorKind {
    /// Element ID not accepted in the current parse state.
    UnexpectedId(u32),
    /// First byte of an element ID has no length marker in its top 4 bits.
    InvalidId(u8),
    /// First byte of a data size or vint is zero.
    InvalidSize(u8),
    /// Element declared an unknown size where only Segment/Cluster may.
    UnknownSize(u32),
    /// Element declared a size reaching past its parent's end.
    ElementOverflow(u32),
    /// Element that must be buffered whole is larger than the buffering cap.
    ElementTooLarge(u32),
    /// Integer element wider than 8 bytes, or float element not 4/8 bytes.
    InvalidNumber { id: u32, len: u64 },
    /// EBML header `DocType` is neither `matroska` nor `webm`.
    InvalidDocType(String),
    /// Block header larger than the block itself.
    TruncatedBlock,
    /// Target-track block uses Xiph/EBML/fixed lacing.
    LacedBlock,
}

impl fmt::Display for MatroskaErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedId(id) => write!(f, "unexpected element ID 0x{id:X}"),
            Self::InvalidId(b) => write!(f, "invalid element ID lead byte 0x{b:02X}"),
            Self::InvalidSize(b) => write!(f, "invalid variable-length size lead byte 0x{b:02X}"),
            Self::UnknownSize(id) => write!(f, "unknown size not allowed for element 0x{id:X}"),
            Self::ElementOverflow(id) => write!(f, "element 0x{id:X} overruns its parent"),
            Self::ElementTooLarge(id) => write!(f, "element 0x{id:X} too large to buffer"),
            Self::InvalidNumber { id, len } => {
                write!(f, "element 0x{id:X} has invalid numeric length {len}")
            }
            Self::InvalidDocType(doc_type) => write!(f, "unsupported DocType {doc_type:?}"),
            Self::TruncatedBlock => write!(f, "block header exceeds block size"),
            Self::LacedBlock => write!(f, "laced blocks are not supported"),
        }
    }
}

/// Convenience alias for `Result<T, BridgeError>`.
pub type Result<T> = std::result::Result<T, BridgeError>;
