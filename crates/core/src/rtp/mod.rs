//! RTP packet model, sender state and counter unwrapping.
//!
//! ## RTP overview (RFC 3550)
//!
//! Every RTP packet carries a 12-byte fixed header followed by an optional
//! CSRC list and header extension:
//!
//! - **Sequence number** (16-bit, wrapping): for reordering and loss detection.
//! - **Timestamp** (32-bit, wrapping): media clock in clock-rate units.
//! - **SSRC** (32-bit): identifies the sender.
//! - **Marker bit**: typically set on the last packet of a frame.
//!
//! [`RtpPacket`] parses and serializes that layout. Receivers unwrap the
//! 16/32-bit counters with a [`RolloverContext`] each; senders stamp
//! packets with an [`RtpSequencer`].

pub mod packet;
pub mod rollover;
pub mod sequencer;

pub use packet::{HeaderExtension, RtpPacket};
pub use rollover::{RolloverContext, Unwrapped};
pub use sequencer::RtpSequencer;
