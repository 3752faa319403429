//! UDP transport for RTP media.
//!
//! - **Binding** ([`udp`]): fixed-port binding, or an even-port search
//!   starting at [`udp::PORT_SEARCH_BASE`] that steps by 2 on conflict
//!   (RTP on even ports, RFC 3550 §11).
//!
//! - **Receive** ([`reader`]): [`RtpReader`] runs a receive thread that only
//!   reads the socket and queues datagrams; a dispatch thread parses them
//!   and invokes the packet callback in arrival order. A slow callback fills
//!   the bounded queue instead of stalling the socket.
//!
//! - **Send** ([`writer`]): [`RtpWriter`] serializes packets into one owned
//!   buffer and sends them to a lazily resolved destination.

pub mod reader;
pub mod udp;
pub mod writer;

pub use reader::{ReaderConfig, ReaderStats, RtpReader};
pub use writer::{RtpWriter, WriterConfig};
