//! Dumps every decoded Aurora packet of a recorded capture.

use std::collections::HashMap;
use std::fs::File;
use std::io;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::warn;

use aurora::capture::{CaptureReader, Event};
use aurora::packet::decode_packet;
use aurora::schema;
use aurora::split::AuroraSplitter;
use aurora::util::hexdump;

#[derive(Parser)]
#[command(name = "capture-dump", about = "Decode an HCaptureV0 recording")]
struct Args {
    /// Capture file to decode.
    capture: PathBuf,
}

struct Stream {
    peers: [(Ipv4Addr, u16); 2],
    splitters: [AuroraSplitter; 2],
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();
    match run(&args.capture) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("capture-dump: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(path: &PathBuf) -> io::Result<()> {
    let mut reader = CaptureReader::new(File::open(path)?)?;
    println!("recording started at {}", reader.timestamp());

    let mut streams: HashMap<u32, Stream> = HashMap::new();
    while let Some((time, event)) = reader.next_event()? {
        match event {
            Event::NewConnection {
                stream_id,
                source,
                dest,
            } => {
                println!(
                    "[{time}] stream {stream_id}: {}:{} -> {}:{}",
                    source.0, source.1, dest.0, dest.1
                );
                streams.insert(
                    stream_id,
                    Stream {
                        peers: [source, dest],
                        splitters: [AuroraSplitter::new(), AuroraSplitter::new()],
                    },
                );
            }
            Event::Close { stream_id } => {
                println!("[{time}] stream {stream_id}: closed");
                streams.remove(&stream_id);
            }
            Event::Data {
                stream_id,
                who,
                data,
            } => {
                let Some(stream) = streams.get_mut(&stream_id) else {
                    warn!("data for unknown stream {stream_id}");
                    continue;
                };
                let who = usize::from(who & 1);
                dump_direction(stream, stream_id, who, time, &data)?;
            }
        }
    }
    Ok(())
}

fn dump_direction(
    stream: &mut Stream,
    stream_id: u32,
    who: usize,
    time: i64,
    data: &[u8],
) -> io::Result<()> {
    let registry = schema::registry();
    stream.splitters[who].feed(data)?;
    while let Some((packet_type, body)) = stream.splitters[who].pull_segment() {
        let (from, to) = (stream.peers[who], stream.peers[1 - who]);
        println!(
            "[{time}] stream {stream_id}: {}:{} -> {}:{}",
            from.0, from.1, to.0, to.1
        );
        print!("{}", hexdump(&body));
        let packet = decode_packet(registry, packet_type, &body)?;
        println!("{:?}: {:?}", packet.packet_type, packet.body);
    }
    Ok(())
}
