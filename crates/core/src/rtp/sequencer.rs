use rand::RngExt;

use super::RtpPacket;

/// Per-stream sender state for outgoing RTP packets.
///
/// Manages:
/// - **Sequence number**: incremented on every stamped packet; the writer
///   truncates it to 16 bits on the wire.
/// - **Timestamp**: u64 internally so frame-duration arithmetic never wraps;
///   the lower 32 bits are written to the wire.
/// - **SSRC**: randomly generated per RFC 3550 §8.1 unless given.
#[derive(Debug)]
pub struct RtpSequencer {
    /// RTP payload type (7-bit, RFC 3551).
    pub payload_type: u8,
    /// Synchronization source identifier (RFC 3550 §8.1).
    pub ssrc: u32,
    sequence: u64,
    timestamp: u64,
}

impl RtpSequencer {
    pub fn new(payload_type: u8, ssrc: u32) -> Self {
        tracing::debug!(
            payload_type,
            ssrc = format_args!("{:#010X}", ssrc),
            "RTP sequencer created"
        );
        Self {
            payload_type,
            ssrc,
            sequence: 0,
            timestamp: 0,
        }
    }

    /// Create with a random SSRC.
    pub fn with_random_ssrc(payload_type: u8) -> Self {
        Self::new(payload_type, random_ssrc())
    }

    /// Sequence number the next stamped packet will carry.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// Jump the media clock to an absolute timestamp (e.g. a demuxed
    /// frame's presentation time).
    pub fn set_timestamp(&mut self, timestamp: u64) {
        self.timestamp = timestamp;
    }

    /// Advance the media clock by `increment` clock-rate units.
    pub fn advance_timestamp(&mut self, increment: u32) {
        self.timestamp = self.timestamp.wrapping_add(u64::from(increment));
    }

    /// Build the next packet for `payload` and advance the sequence number.
    pub fn next_packet(&mut self, payload: Vec<u8>, marker: bool) -> RtpPacket {
        let mut packet = RtpPacket::new(payload, self.sequence, self.timestamp, marker);
        packet.payload_type = self.payload_type;
        packet.ssrc = self.ssrc;
        self.sequence = self.sequence.wrapping_add(1);
        packet
    }
}

/// A random SSRC (RFC 3550 §8.1).
pub fn random_ssrc() -> u32 {
    rand::rng().random::<u32>()
}
