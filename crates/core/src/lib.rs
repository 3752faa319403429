pub mod error;
pub mod matroska;
pub mod rtp;
pub mod transport;

#[cfg(test)]
mod testutil;

pub use error::{BridgeError, MatroskaErrorKind, Result, RtpParseErrorKind};
pub use matroska::{MatroskaReader, NoPacing, Pacer, RealtimePacer};
pub use rtp::{RolloverContext, RtpPacket, RtpSequencer, Unwrapped};
pub use transport::{ReaderConfig, ReaderStats, RtpReader, RtpWriter, WriterConfig};
