use std::net::{IpAddr, Ipv4Addr, SocketAddr, ToSocketAddrs, UdpSocket};

use crate::error::{BridgeError, Result};
use crate::rtp::RtpPacket;
use crate::rtp::sequencer::random_ssrc;

/// Initial capacity of the reusable send buffer.
const SEND_BUFFER_CAPACITY: usize = 2048;

/// Largest UDP payload over IPv4 (65535 - 8 byte UDP header - 20 byte IP header).
pub const MAX_DATAGRAM_LEN: usize = 65507;

/// Send-side configuration.
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Local address for the (ephemeral-port) send socket.
    pub bind_ip: IpAddr,
    /// `host:port` to send to. Resolved on the first write.
    pub destination: Option<String>,
    /// Payload type written into every packet.
    pub payload_type: u8,
    /// SSRC written into every packet.
    pub ssrc: u32,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            bind_ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            destination: None,
            payload_type: 96,
            ssrc: random_ssrc(),
        }
    }
}

/// UDP RTP sender.
///
/// Serializes each packet into one owned buffer, so `write` takes
/// `&mut self`; share a writer across threads behind a lock.
pub struct RtpWriter {
    socket: UdpSocket,
    destination: Option<String>,
    resolved: Option<SocketAddr>,
    /// Set after a failed lookup; cleared by `set_destination`.
    resolve_failed: bool,
    payload_type: u8,
    ssrc: u32,
    buffer: Vec<u8>,
    packets_sent: u64,
}

impl RtpWriter {
    /// Bind an ephemeral send socket.
    pub fn new(config: WriterConfig) -> Result<Self> {
        let socket = UdpSocket::bind(SocketAddr::new(config.bind_ip, 0))?;
        tracing::debug!(
            local_addr = %socket.local_addr()?,
            payload_type = config.payload_type,
            ssrc = format_args!("{:#010X}", config.ssrc),
            "RTP writer bound"
        );
        Ok(Self {
            socket,
            destination: config.destination,
            resolved: None,
            resolve_failed: false,
            payload_type: config.payload_type,
            ssrc: config.ssrc,
            buffer: Vec::with_capacity(SEND_BUFFER_CAPACITY),
            packets_sent: 0,
        })
    }

    /// Send to `addr` from now on, replacing any configured destination.
    pub fn set_destination(&mut self, addr: SocketAddr) {
        tracing::debug!(%addr, "RTP writer destination set");
        self.destination = Some(addr.to_string());
        self.resolved = Some(addr);
        self.resolve_failed = false;
    }

    pub fn payload_type(&self) -> u8 {
        self.payload_type
    }

    pub fn ssrc(&self) -> u32 {
        self.ssrc
    }

    pub fn packets_sent(&self) -> u64 {
        self.packets_sent
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Serialize and send one packet with this writer's payload type and SSRC.
    ///
    /// Returns `Ok(false)` without sending when no destination is configured
    /// or it does not resolve. A failed lookup is not retried until
    /// [`set_destination`](Self::set_destination) is called. Socket errors
    /// are returned.
    pub fn write(&mut self, packet: &RtpPacket) -> Result<bool> {
        if self.resolve_failed {
            tracing::trace!(
                sequence_number = packet.sequence_number,
                "no RTP destination, dropping packet"
            );
            return Ok(false);
        }
        let dest = match self.resolve_destination() {
            Ok(addr) => addr,
            Err(e) => {
                self.resolve_failed = true;
                tracing::warn!(
                    destination = self.destination.as_deref(),
                    sequence_number = packet.sequence_number,
                    error = %e,
                    "RTP destination unavailable, dropping packets"
                );
                return Ok(false);
            }
        };

        let len = packet.wire_len();
        if len > MAX_DATAGRAM_LEN {
            return Err(BridgeError::PacketTooLarge(len));
        }

        packet.serialize_into(self.payload_type, self.ssrc, &mut self.buffer);
        self.socket.send_to(&self.buffer, dest)?;
        self.packets_sent += 1;

        tracing::trace!(
            %dest,
            sequence_number = packet.sequence_number as u16,
            timestamp = packet.timestamp as u32,
            marker = packet.marker,
            len,
            "RTP packet sent"
        );
        Ok(true)
    }

    fn resolve_destination(&mut self) -> Result<SocketAddr> {
        if let Some(addr) = self.resolved {
            return Ok(addr);
        }
        let host = self
            .destination
            .as_deref()
            .ok_or(BridgeError::DestinationNotConfigured)?;

        let local_is_ipv4 = self.socket.local_addr()?.is_ipv4();
        let addr = host
            .to_socket_addrs()?
            .find(|a| a.is_ipv4() == local_is_ipv4)
            .ok_or(BridgeError::DestinationNotConfigured)?;

        tracing::debug!(destination = host, %addr, "RTP writer destination resolved");
        self.resolved = Some(addr);
        Ok(addr)
    }
}
