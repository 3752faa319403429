//! Integration test: RtpWriter -> UDP loopback -> RtpReader.
//!
//! Binds a reader on an ephemeral even port, sends a burst of packets with
//! the writer and checks that fields survive the trip and arrive in order.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::mpsc;
use std::time::Duration;

use mediabridge::{ReaderConfig, RolloverContext, RtpPacket, RtpReader, RtpWriter, WriterConfig};

const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

fn recv_n(rx: &mpsc::Receiver<RtpPacket>, n: usize) -> Vec<RtpPacket> {
    (0..n)
        .map(|i| {
            rx.recv_timeout(Duration::from_secs(2))
                .unwrap_or_else(|_| panic!("packet {i} not received"))
        })
        .collect()
}

#[test]
fn packets_survive_loopback() {
    let reader = RtpReader::new(ReaderConfig {
        bind_ip: LOCALHOST,
        ..Default::default()
    })
    .expect("bind reader");
    assert_eq!(reader.local_addr().port() % 2, 0);

    let (tx, rx) = mpsc::channel();
    reader
        .start(move |packet| {
            let _ = tx.send(packet);
        })
        .expect("start reader");

    let mut writer = RtpWriter::new(WriterConfig {
        bind_ip: LOCALHOST,
        destination: Some(reader.local_addr().to_string()),
        payload_type: 111,
        ssrc: 0xDEAD_BEEF,
    })
    .expect("bind writer");

    let sent: Vec<RtpPacket> = (0..5u64)
        .map(|i| RtpPacket::new(vec![i as u8; 10 + i as usize], 100 + i, 960 * i, i == 4))
        .collect();
    for packet in &sent {
        assert!(writer.write(packet).expect("write"));
    }
    assert_eq!(writer.packets_sent(), 5);

    let received = recv_n(&rx, sent.len());
    for (got, want) in received.iter().zip(&sent) {
        assert_eq!(got.sequence_number, want.sequence_number);
        assert_eq!(got.timestamp, want.timestamp);
        assert_eq!(got.marker, want.marker);
        assert_eq!(got.payload, want.payload);
        assert_eq!(got.payload_type, 111);
        assert_eq!(got.ssrc, 0xDEAD_BEEF);
    }

    reader.stop();
    assert!(!reader.is_running());
    let stats = reader.stats();
    assert_eq!(stats.received, 5);
    assert_eq!(stats.dispatched, 5);
    assert_eq!(stats.dropped, 0);
}

#[test]
fn receiver_unwraps_wrapping_sequence_numbers() {
    let reader = RtpReader::new(ReaderConfig {
        bind_ip: LOCALHOST,
        ..Default::default()
    })
    .expect("bind reader");

    let (tx, rx) = mpsc::channel();
    let mut seq = RolloverContext::for_sequence_numbers();
    reader
        .start(move |packet| {
            let _ = tx.send(seq.get_index(packet.sequence_number).index);
        })
        .expect("start reader");

    let mut writer = RtpWriter::new(WriterConfig {
        bind_ip: LOCALHOST,
        ..Default::default()
    })
    .expect("bind writer");
    writer.set_destination(reader.local_addr());

    // Sequence numbers past 16 bits are truncated on the wire.
    for seq in 65_534..65_538u64 {
        writer
            .write(&RtpPacket::new(vec![0; 4], seq, 0, false))
            .expect("write");
    }

    let indices: Vec<i64> = (0..4)
        .map(|_| rx.recv_timeout(Duration::from_secs(2)).expect("index"))
        .collect();
    assert_eq!(indices, vec![65_534, 65_535, 65_536, 65_537]);
}

#[test]
fn writer_without_destination_reports_not_sent() {
    let mut writer = RtpWriter::new(WriterConfig {
        bind_ip: LOCALHOST,
        ..Default::default()
    })
    .expect("bind writer");
    let sent = writer
        .write(&RtpPacket::new(vec![1, 2, 3], 0, 0, true))
        .expect("write");
    assert!(!sent);
    assert_eq!(writer.packets_sent(), 0);
}
