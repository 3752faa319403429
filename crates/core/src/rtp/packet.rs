use crate::error::{BridgeError, Result, RtpParseErrorKind};

/// Length of the RTP fixed header (no CSRCs, no extension).
pub const FIXED_HEADER_LEN: usize = 12;

const VERSION: u8 = 2;

/// RTP header extension (RFC 3550 §5.3.1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderExtension {
    /// Profile-defined 16-bit identifier.
    pub profile: u16,
    /// Extension body; a multiple of 4 bytes on the wire.
    pub data: Vec<u8>,
}

/// An RTP packet (RFC 3550 §5.1).
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |V=2|P|X|  CC   |M|     PT      |       Sequence Number         |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                           Timestamp                           |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                             SSRC                              |
/// +=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+
/// |                    CSRC list (0..15 items)                    |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
///
/// Sequence number and timestamp are kept as `u64`, the way a sender
/// tracks them. Parsing yields the raw wire values (no rollover handling;
/// see [`RolloverContext`](super::RolloverContext)). Serializing truncates
/// them to 16 and 32 bits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtpPacket {
    pub payload: Vec<u8>,
    pub sequence_number: u64,
    pub timestamp: u64,
    pub marker: bool,
    /// Payload type (7-bit). Set on parse; stamped by the writer on send.
    pub payload_type: u8,
    /// Synchronization source. Set on parse; stamped by the writer on send.
    pub ssrc: u32,
    pub csrcs: Vec<u32>,
    pub extension: Option<HeaderExtension>,
}

impl RtpPacket {
    pub fn new(payload: Vec<u8>, sequence_number: u64, timestamp: u64, marker: bool) -> Self {
        Self {
            payload,
            sequence_number,
            timestamp,
            marker,
            payload_type: 0,
            ssrc: 0,
            csrcs: Vec::new(),
            extension: None,
        }
    }

    /// Parse a datagram as an RTP packet.
    ///
    /// The payload is everything after the CSRC list and header extension,
    /// minus padding.
    pub fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < FIXED_HEADER_LEN {
            return Err(parse_error(RtpParseErrorKind::TooShort));
        }

        let b0 = buf[0];
        let b1 = buf[1];

        let version = b0 >> 6;
        if version != VERSION {
            return Err(parse_error(RtpParseErrorKind::UnsupportedVersion(version)));
        }
        let has_padding = (b0 & 0b0010_0000) != 0;
        let has_extension = (b0 & 0b0001_0000) != 0;
        let csrc_count = usize::from(b0 & 0b0000_1111);

        let marker = (b1 & 0b1000_0000) != 0;
        let payload_type = b1 & 0b0111_1111;

        let sequence_number = u16::from_be_bytes([buf[2], buf[3]]);
        let timestamp = u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]);
        let ssrc = u32::from_be_bytes([buf[8], buf[9], buf[10], buf[11]]);

        let mut offset = FIXED_HEADER_LEN + csrc_count * 4;
        if buf.len() < offset {
            return Err(parse_error(RtpParseErrorKind::TooShort));
        }
        let csrcs = buf[FIXED_HEADER_LEN..offset]
            .chunks_exact(4)
            .map(|c| u32::from_be_bytes([c[0], c[1], c[2], c[3]]))
            .collect();

        let extension = if has_extension {
            if buf.len() < offset + 4 {
                return Err(parse_error(RtpParseErrorKind::BadExtension));
            }
            let profile = u16::from_be_bytes([buf[offset], buf[offset + 1]]);
            let words = usize::from(u16::from_be_bytes([buf[offset + 2], buf[offset + 3]]));
            let start = offset + 4;
            let end = start + words * 4;
            if buf.len() < end {
                return Err(parse_error(RtpParseErrorKind::BadExtension));
            }
            offset = end;
            Some(HeaderExtension {
                profile,
                data: buf[start..end].to_vec(),
            })
        } else {
            None
        };

        let mut payload_end = buf.len();
        if has_padding {
            if payload_end <= offset {
                return Err(parse_error(RtpParseErrorKind::BadPadding));
            }
            let pad_len = usize::from(buf[payload_end - 1]);
            if pad_len == 0 || pad_len > payload_end - offset {
                return Err(parse_error(RtpParseErrorKind::BadPadding));
            }
            payload_end -= pad_len;
        }

        Ok(RtpPacket {
            payload: buf[offset..payload_end].to_vec(),
            sequence_number: u64::from(sequence_number),
            timestamp: u64::from(timestamp),
            marker,
            payload_type,
            ssrc,
            csrcs,
            extension,
        })
    }

    /// Length of the serialized packet in bytes.
    pub fn wire_len(&self) -> usize {
        let ext_len = self
            .extension
            .as_ref()
            .map_or(0, |ext| 4 + ext.data.len().div_ceil(4) * 4);
        FIXED_HEADER_LEN + self.csrcs.len().min(15) * 4 + ext_len + self.payload.len()
    }

    /// Serialize into `buf` (cleared first) with the given payload type and SSRC.
    ///
    /// Sequence number and timestamp are truncated to their wire widths.
    /// At most 15 CSRCs are written; extension data is zero-padded to a
    /// 32-bit boundary.
    pub fn serialize_into(&self, payload_type: u8, ssrc: u32, buf: &mut Vec<u8>) {
        buf.clear();

        let csrcs = &self.csrcs[..self.csrcs.len().min(15)];
        let mut first_byte: u8 = (VERSION << 6) | csrcs.len() as u8;
        if self.extension.is_some() {
            first_byte |= 0b0001_0000;
        }
        let second_byte: u8 = ((self.marker as u8) << 7) | (payload_type & 0x7f);

        buf.push(first_byte);
        buf.push(second_byte);
        buf.extend_from_slice(&(self.sequence_number as u16).to_be_bytes());
        buf.extend_from_slice(&(self.timestamp as u32).to_be_bytes());
        buf.extend_from_slice(&ssrc.to_be_bytes());
        for csrc in csrcs {
            buf.extend_from_slice(&csrc.to_be_bytes());
        }

        if let Some(ext) = &self.extension {
            let words = ext.data.len().div_ceil(4);
            buf.extend_from_slice(&ext.profile.to_be_bytes());
            buf.extend_from_slice(&(words as u16).to_be_bytes());
            buf.extend_from_slice(&ext.data);
            buf.resize(buf.len() + (words * 4 - ext.data.len()), 0);
        }

        buf.extend_from_slice(&self.payload);
    }

    /// Serialize using this packet's own payload type and SSRC.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.wire_len());
        self.serialize_into(self.payload_type, self.ssrc, &mut buf);
        buf
    }
}

fn parse_error(kind: RtpParseErrorKind) -> BridgeError {
    BridgeError::Rtp { kind }
}
