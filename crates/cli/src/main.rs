use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use mediabridge::transport::writer::MAX_DATAGRAM_LEN;
use mediabridge::{
    BridgeError, MatroskaReader, NoPacing, Pacer, ReaderConfig, RealtimePacer, RolloverContext,
    RtpReader, RtpSequencer, RtpWriter, WriterConfig,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "mediabridge",
    about = "Bridge Matroska files and RTP over UDP"
)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Stream one track of a Matroska/WebM file as RTP, paced in real time
    Send {
        /// Input .mkv/.webm file
        #[arg(long, short)]
        input: PathBuf,
        /// Destination (host:port)
        #[arg(long, short)]
        destination: String,
        /// Track number to send
        #[arg(long, default_value_t = 1)]
        track: u64,
        /// RTP clock rate in Hz
        #[arg(long, default_value_t = 90_000)]
        clock_rate: u32,
        /// RTP payload type
        #[arg(long, default_value_t = 96)]
        payload_type: u8,
        /// SSRC (random if omitted)
        #[arg(long)]
        ssrc: Option<u32>,
        /// Send as fast as possible instead of in real time
        #[arg(long)]
        no_pacing: bool,
    },
    /// Receive RTP on a UDP port and log unwrapped sequence numbers
    Recv {
        /// Local address to bind
        #[arg(long, default_value = "0.0.0.0")]
        bind: IpAddr,
        /// UDP port (even-port search from 49152 if omitted)
        #[arg(long, short)]
        port: Option<u16>,
        /// Append received payloads to this file
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let result = match args.command {
        Command::Send {
            input,
            destination,
            track,
            clock_rate,
            payload_type,
            ssrc,
            no_pacing,
        } => {
            let sender = Sender {
                destination,
                track,
                clock_rate,
                payload_type,
                ssrc,
            };
            if no_pacing {
                sender.run(&input, NoPacing)
            } else {
                sender.run(&input, RealtimePacer::new())
            }
        }
        Command::Recv { bind, port, output } => receive(bind, port, output),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("mediabridge: {e}");
            ExitCode::FAILURE
        }
    }
}

struct Sender {
    destination: String,
    track: u64,
    clock_rate: u32,
    payload_type: u8,
    ssrc: Option<u32>,
}

impl Sender {
    fn run<P: Pacer>(self, input: &Path, pacer: P) -> mediabridge::Result<()> {
        let file = BufReader::new(File::open(input)?);
        let mut reader = MatroskaReader::with_pacer(file, pacer).target_track(self.track);
        reader.read_stream_header()?;

        let mut config = WriterConfig {
            destination: Some(self.destination.clone()),
            payload_type: self.payload_type,
            ..Default::default()
        };
        if let Some(ssrc) = self.ssrc {
            config.ssrc = ssrc;
        }
        let mut writer = RtpWriter::new(config)?;
        let mut sequencer = RtpSequencer::new(writer.payload_type(), writer.ssrc());

        tracing::info!(
            input = %input.display(),
            destination = %self.destination,
            track = self.track,
            clock_rate = self.clock_rate,
            ssrc = format_args!("{:#010X}", writer.ssrc()),
            "sending"
        );

        let mut frames = 0u64;
        let mut skipped = 0u64;
        while let Some(frame) = reader.read_frame()? {
            let timestamp = reader.wait_for_frame_timestamp(self.clock_rate);
            sequencer.set_timestamp(timestamp);
            let packet = sequencer.next_packet(frame, true);
            match writer.write(&packet) {
                Ok(true) => frames += 1,
                Ok(false) => skipped += 1,
                Err(BridgeError::PacketTooLarge(len)) => {
                    tracing::warn!(len, max = MAX_DATAGRAM_LEN, timestamp, "frame too large, skipped");
                    skipped += 1;
                }
                Err(e) => return Err(e),
            }
        }

        tracing::info!(
            frames,
            skipped,
            packets_sent = writer.packets_sent(),
            "end of input"
        );
        Ok(())
    }
}

/// Per-SSRC counter unwrapping.
struct StreamState {
    sequence: RolloverContext,
    timestamp: RolloverContext,
    packets: u64,
}

fn receive(bind: IpAddr, port: Option<u16>, output: Option<PathBuf>) -> mediabridge::Result<()> {
    let reader = RtpReader::new(ReaderConfig {
        bind_ip: bind,
        port,
        ..Default::default()
    })?;

    let mut sink = match output {
        Some(path) => Some(BufWriter::new(File::create(path)?)),
        None => None,
    };
    let mut streams: HashMap<u32, StreamState> = HashMap::new();

    reader.start(move |packet| {
        let stream = streams.entry(packet.ssrc).or_insert_with(|| {
            tracing::info!(
                ssrc = format_args!("{:#010X}", packet.ssrc),
                payload_type = packet.payload_type,
                "new stream"
            );
            StreamState {
                sequence: RolloverContext::for_sequence_numbers(),
                timestamp: RolloverContext::for_timestamps(),
                packets: 0,
            }
        });
        stream.packets += 1;
        let sequence = stream.sequence.get_index(packet.sequence_number);
        let timestamp = stream.timestamp.get_index(packet.timestamp);

        tracing::debug!(
            ssrc = format_args!("{:#010X}", packet.ssrc),
            sequence = sequence.index,
            timestamp = timestamp.index,
            marker = packet.marker,
            len = packet.payload.len(),
            packets = stream.packets,
            "packet"
        );

        if let Some(sink) = &mut sink
            && let Err(e) = sink.write_all(&packet.payload)
        {
            tracing::error!(error = %e, "failed to write payload");
        }
    })?;

    println!("Receiving RTP on {}. Press Enter to stop", reader.local_addr());
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;

    reader.stop();
    Ok(())
}
