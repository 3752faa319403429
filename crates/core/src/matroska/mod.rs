//! Single-track Matroska/WebM demuxer with real-time pacing.
//!
//! [`MatroskaReader`] walks the EBML element stream from a byte source,
//! returns the frames of one track and waits until each frame's
//! presentation time before handing out its RTP timestamp. Timing comes
//! from a [`Pacer`]; [`RealtimePacer`] sleeps against the wall clock and
//! [`NoPacing`] never waits.
//!
//! Lacing, seeking and Cues-driven navigation are not supported.

pub mod ebml;
pub mod pacing;
pub mod reader;

pub use pacing::{NoPacing, Pacer, RealtimePacer};
pub use reader::{BlockGroupInfo, BlockHeader, ClusterInfo, MatroskaReader, SegmentInfo, TrackInfo};
