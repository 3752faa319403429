use std::io::ErrorKind;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::{BridgeError, Result};
use crate::rtp::RtpPacket;
use crate::transport::udp;

/// Receive-side configuration.
#[derive(Debug, Clone)]
pub struct ReaderConfig {
    /// Local address to bind.
    pub bind_ip: IpAddr,
    /// Fixed port. When `None`, an even port is searched from
    /// [`udp::PORT_SEARCH_BASE`].
    pub port: Option<u16>,
    /// Datagrams held between the receive and dispatch threads. When full,
    /// newly received datagrams are dropped.
    pub queue_capacity: usize,
    /// Largest datagram accepted; longer ones are truncated by the OS.
    pub recv_buffer_size: usize,
    /// Socket read timeout, i.e. how quickly [`RtpReader::stop`] is noticed.
    pub poll_interval: Duration,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            bind_ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: None,
            queue_capacity: 1024,
            recv_buffer_size: 65536,
            poll_interval: Duration::from_millis(50),
        }
    }
}

/// Snapshot of reader counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReaderStats {
    /// Datagrams read from the socket.
    pub received: u64,
    /// Packets parsed and handed to the callback.
    pub dispatched: u64,
    /// Datagrams dropped because the dispatch queue was full.
    pub dropped: u64,
    /// Datagrams that failed RTP parsing.
    pub parse_errors: u64,
}

#[derive(Debug, Default)]
struct Counters {
    received: AtomicU64,
    dispatched: AtomicU64,
    dropped: AtomicU64,
    parse_errors: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> ReaderStats {
        ReaderStats {
            received: self.received.load(Ordering::Relaxed),
            dispatched: self.dispatched.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            parse_errors: self.parse_errors.load(Ordering::Relaxed),
        }
    }
}

struct Datagram {
    data: Vec<u8>,
    peer: SocketAddr,
}

struct Workers {
    receive: JoinHandle<()>,
    dispatch: JoinHandle<()>,
}

enum ReaderState {
    Created(UdpSocket),
    Running(Workers),
    Stopped,
}

/// UDP RTP receiver.
///
/// ```text
/// new()    -> Created   (socket bound)
/// start()  -> Running   (receive + dispatch threads)
/// stop()   -> Stopped   (socket released, queue drained)
/// ```
///
/// A stopped reader cannot be started again. Packets reach the callback
/// with their raw sequence number and timestamp; unwrapping is left to the
/// consumer. Malformed datagrams and panicking callbacks are logged and
/// skipped without stopping the reader.
pub struct RtpReader {
    local_addr: SocketAddr,
    config: ReaderConfig,
    running: Arc<AtomicBool>,
    counters: Arc<Counters>,
    state: Mutex<ReaderState>,
}

impl RtpReader {
    /// Bind the receive socket.
    ///
    /// A fixed-port bind failure is returned; the port search only fails
    /// once the range is exhausted.
    pub fn new(config: ReaderConfig) -> Result<Self> {
        let socket = udp::bind(config.bind_ip, config.port)?;
        socket.set_read_timeout(Some(config.poll_interval))?;
        let local_addr = socket.local_addr()?;

        tracing::info!(%local_addr, "RTP reader bound");

        Ok(Self {
            local_addr,
            config,
            running: Arc::new(AtomicBool::new(false)),
            counters: Arc::new(Counters::default()),
            state: Mutex::new(ReaderState::Created(socket)),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> ReaderStats {
        self.counters.snapshot()
    }

    /// Start receiving; `on_packet` runs on the dispatch thread, one packet
    /// at a time, in arrival order.
    ///
    /// Returns once both threads are spawned.
    pub fn start<F>(&self, on_packet: F) -> Result<()>
    where
        F: FnMut(RtpPacket) + Send + 'static,
    {
        let mut state = self.state.lock();
        let socket = match std::mem::replace(&mut *state, ReaderState::Stopped) {
            ReaderState::Created(socket) => socket,
            ReaderState::Running(workers) => {
                *state = ReaderState::Running(workers);
                return Err(BridgeError::AlreadyRunning);
            }
            ReaderState::Stopped => return Err(BridgeError::ReaderStopped),
        };

        let (tx, rx) = mpsc::sync_channel(self.config.queue_capacity);
        self.running.store(true, Ordering::SeqCst);

        let counters = self.counters.clone();
        let dispatch = thread::Builder::new()
            .name("rtp-dispatch".into())
            .spawn(move || dispatch_loop(rx, on_packet, counters));
        let dispatch = match dispatch {
            Ok(handle) => handle,
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                return Err(e.into());
            }
        };

        let running = self.running.clone();
        let counters = self.counters.clone();
        let buffer_size = self.config.recv_buffer_size;
        let receive = thread::Builder::new()
            .name("rtp-receive".into())
            .spawn(move || receive_loop(socket, tx, running, counters, buffer_size));
        let receive = match receive {
            Ok(handle) => handle,
            Err(e) => {
                // The unspawned closure dropped the sender, so dispatch exits.
                self.running.store(false, Ordering::SeqCst);
                let _ = dispatch.join();
                return Err(e.into());
            }
        };

        *state = ReaderState::Running(Workers { receive, dispatch });
        tracing::info!(local_addr = %self.local_addr, "RTP reader started");
        Ok(())
    }

    /// Stop receiving and release the socket.
    ///
    /// Waits for the receive loop to exit, then for every datagram already
    /// queued to be dispatched.
    pub fn stop(&self) {
        let mut state = self.state.lock();
        let previous = std::mem::replace(&mut *state, ReaderState::Stopped);
        self.running.store(false, Ordering::SeqCst);

        match previous {
            ReaderState::Running(workers) => {
                if workers.receive.join().is_err() {
                    tracing::warn!("RTP receive thread panicked");
                }
                if workers.dispatch.join().is_err() {
                    tracing::warn!("RTP dispatch thread panicked");
                }
                let stats = self.counters.snapshot();
                tracing::info!(
                    local_addr = %self.local_addr,
                    received = stats.received,
                    dispatched = stats.dispatched,
                    dropped = stats.dropped,
                    parse_errors = stats.parse_errors,
                    "RTP reader stopped"
                );
            }
            ReaderState::Created(_) => {
                tracing::debug!(local_addr = %self.local_addr, "RTP reader closed before start");
            }
            ReaderState::Stopped => {}
        }
    }
}

impl Drop for RtpReader {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Socket read loop. Checks `running` between reads; the socket's read
/// timeout bounds how long a stop request goes unnoticed.
fn receive_loop(
    socket: UdpSocket,
    tx: SyncSender<Datagram>,
    running: Arc<AtomicBool>,
    counters: Arc<Counters>,
    buffer_size: usize,
) {
    let mut buf = vec![0u8; buffer_size];
    while running.load(Ordering::SeqCst) {
        match socket.recv_from(&mut buf) {
            Ok((len, peer)) => {
                counters.received.fetch_add(1, Ordering::Relaxed);
                let datagram = Datagram {
                    data: buf[..len].to_vec(),
                    peer,
                };
                match tx.try_send(datagram) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        counters.dropped.fetch_add(1, Ordering::Relaxed);
                        tracing::warn!(%peer, len, "dispatch queue full, dropping datagram");
                    }
                    Err(TrySendError::Disconnected(_)) => break,
                }
            }
            Err(ref e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {}
            Err(e) => {
                if running.load(Ordering::SeqCst) {
                    tracing::warn!(error = %e, "UDP receive error");
                }
            }
        }
    }
    tracing::debug!("receive loop exited");
}

/// Runs until the sender is dropped and the queue is empty.
fn dispatch_loop<F>(rx: Receiver<Datagram>, mut on_packet: F, counters: Arc<Counters>)
where
    F: FnMut(RtpPacket),
{
    for datagram in rx {
        match RtpPacket::parse(&datagram.data) {
            Ok(packet) => {
                counters.dispatched.fetch_add(1, Ordering::Relaxed);
                let sequence_number = packet.sequence_number;
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| on_packet(packet)));
                if outcome.is_err() {
                    tracing::warn!(
                        peer = %datagram.peer,
                        sequence_number,
                        "packet callback panicked"
                    );
                }
            }
            Err(e) => {
                counters.parse_errors.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    peer = %datagram.peer,
                    len = datagram.data.len(),
                    error = %e,
                    "dropping malformed RTP datagram"
                );
            }
        }
    }
    tracing::debug!("dispatch loop exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::RecvTimeoutError;

    fn loopback_config() -> ReaderConfig {
        ReaderConfig {
            bind_ip: IpAddr::V4(Ipv4Addr::LOCALHOST),
            poll_interval: Duration::from_millis(10),
            ..ReaderConfig::default()
        }
    }

    fn rtp_bytes(seq: u64) -> Vec<u8> {
        let mut p = RtpPacket::new(vec![0xAB; 8], seq, seq * 960, false);
        p.payload_type = 111;
        p.ssrc = 42;
        p.to_bytes()
    }

    #[test]
    fn binds_even_port_from_search_base() {
        let reader = RtpReader::new(loopback_config()).unwrap();
        let port = reader.local_addr().port();
        assert!(port >= udp::PORT_SEARCH_BASE);
        assert_eq!(port % 2, 0);
    }

    #[test]
    fn start_twice_fails() {
        let reader = RtpReader::new(loopback_config()).unwrap();
        reader.start(|_| {}).unwrap();
        assert!(matches!(
            reader.start(|_| {}),
            Err(BridgeError::AlreadyRunning)
        ));
        reader.stop();
    }

    #[test]
    fn not_restartable_after_stop() {
        let reader = RtpReader::new(loopback_config()).unwrap();
        reader.start(|_| {}).unwrap();
        reader.stop();
        assert!(!reader.is_running());
        assert!(matches!(
            reader.start(|_| {}),
            Err(BridgeError::ReaderStopped)
        ));
    }

    #[test]
    fn full_queue_drops_newest_datagrams() {
        const BURST: u64 = 20;

        let reader = RtpReader::new(ReaderConfig {
            queue_capacity: 1,
            ..loopback_config()
        })
        .unwrap();
        let (gate_tx, gate_rx) = mpsc::channel::<()>();
        let (tx, rx) = mpsc::channel();
        reader
            .start(move |packet| {
                // Blocks until the gate sender is dropped.
                let _ = gate_rx.recv();
                let _ = tx.send(packet.sequence_number);
            })
            .unwrap();

        let sender = UdpSocket::bind("127.0.0.1:0").unwrap();
        let dest = reader.local_addr();
        for seq in 0..BURST {
            sender.send_to(&rtp_bytes(seq), dest).unwrap();
        }

        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while reader.stats().received < BURST && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        drop(gate_tx);
        reader.stop();

        let stats = reader.stats();
        assert_eq!(stats.received, BURST);
        assert!(stats.dropped > 0);
        assert_eq!(stats.parse_errors, 0);
        assert_eq!(stats.received, stats.dispatched + stats.dropped);

        let delivered: Vec<u64> = rx.try_iter().collect();
        assert_eq!(delivered.len() as u64, stats.dispatched);
        assert!(delivered.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(delivered.first(), Some(&0));
    }

    #[test]
    fn malformed_and_panicking_packets_do_not_stop_dispatch() {
        let reader = RtpReader::new(loopback_config()).unwrap();
        let (tx, rx) = mpsc::channel();
        reader
            .start(move |packet| {
                if packet.sequence_number == 1 {
                    panic!("callback failure");
                }
                tx.send(packet.sequence_number).unwrap();
            })
            .unwrap();

        let sender = UdpSocket::bind("127.0.0.1:0").unwrap();
        let dest = reader.local_addr();
        sender.send_to(&[0x00, 0x01, 0x02], dest).unwrap();
        sender.send_to(&rtp_bytes(1), dest).unwrap();
        sender.send_to(&rtp_bytes(2), dest).unwrap();

        assert_eq!(rx.recv_timeout(Duration::from_secs(2)), Ok(2));
        reader.stop();

        let stats = reader.stats();
        assert_eq!(stats.received, 3);
        assert_eq!(stats.parse_errors, 1);
        assert_eq!(stats.dispatched, 2);
        assert_eq!(
            rx.recv_timeout(Duration::from_millis(10)),
            Err(RecvTimeoutError::Disconnected)
        );
    }
}
