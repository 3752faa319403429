use std::io::ErrorKind;
use std::net::{IpAddr, SocketAddr, UdpSocket};

use crate::error::{BridgeError, Result};

/// First port tried by the even-port search (start of the IANA dynamic range).
pub const PORT_SEARCH_BASE: u16 = 49152;

const PORT_SEARCH_MAX: u16 = 65534;

/// Bind a UDP socket on `ip`.
///
/// With a fixed `port`, a bind failure is returned as-is. Without one, even
/// ports are tried from [`PORT_SEARCH_BASE`] upwards in steps of 2 until a
/// bind succeeds; only "address in use" style failures move on to the next
/// port.
pub fn bind(ip: IpAddr, port: Option<u16>) -> Result<UdpSocket> {
    match port {
        Some(port) => {
            let socket = UdpSocket::bind(SocketAddr::new(ip, port))?;
            tracing::debug!(%ip, port, "bound fixed UDP port");
            Ok(socket)
        }
        None => bind_even_port(ip, PORT_SEARCH_BASE),
    }
}

/// Even-port search starting at `base`.
pub fn bind_even_port(ip: IpAddr, base: u16) -> Result<UdpSocket> {
    let mut port = base;
    loop {
        match UdpSocket::bind(SocketAddr::new(ip, port)) {
            Ok(socket) => {
                tracing::debug!(%ip, port, "bound UDP port");
                return Ok(socket);
            }
            Err(e) if is_port_conflict(e.kind()) => {
                tracing::trace!(%ip, port, "UDP port in use, trying next");
            }
            Err(e) => return Err(e.into()),
        }

        port = match port.checked_add(2) {
            Some(next) if next <= PORT_SEARCH_MAX => next,
            _ => return Err(BridgeError::PortRangeExhausted),
        };
    }
}

// Windows reports a held port as an access error.
fn is_port_conflict(kind: ErrorKind) -> bool {
    matches!(kind, ErrorKind::AddrInUse | ErrorKind::PermissionDenied)
}
