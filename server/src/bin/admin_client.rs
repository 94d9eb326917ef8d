use bincode::{deserialize, serialize};
use clap::Parser;
use shared::{Packet, Presentation, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::{interval, timeout, Instant};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Sends an operator command to a roulette server",
    long_about = None
)]
struct Args {
    /// Server address to connect to
    #[arg(short, long, default_value = "127.0.0.1:8080")]
    server: String,

    /// How long to keep printing presentations after the command (seconds)
    #[arg(short, long, default_value = "10")]
    watch: u64,

    /// Join as a player instead of a spectator
    #[arg(short, long)]
    play: bool,

    /// Command text, e.g. `test poison power 3 target all` or `status`
    #[arg(required = true)]
    command: Vec<String>,
}

fn describe(presentation: &Presentation) -> String {
    match presentation {
        Presentation::RollStarted { full, duration_ms, .. } => format!(
            "roll started ({}, {} ms)",
            if *full { "full" } else { "quick" },
            duration_ms
        ),
        Presentation::Countdown { remaining_secs } => format!("{}...", remaining_secs),
        Presentation::TargetRevealed { target } => format!("target: {}", target),
        Presentation::EffectRevealed { name, category, .. } => {
            format!("effect: {} ({:?})", name, category)
        }
        Presentation::PowerRevealed { level, label } => format!("power: {} ({})", label, level),
        Presentation::EffectApplied {
            target, name, level, ends_at, ..
        } => format!("{} level {} applied to {} until {}", name, level, target, ends_at),
        Presentation::EffectEnded {
            participant,
            effect,
            reason,
        } => match participant {
            Some(id) => format!("{} ended on participant {} ({:?})", effect, id, reason),
            None => format!("global {} ended ({:?})", effect, reason),
        },
        Presentation::Frozen { until } => format!("frozen until {}", until),
        Presentation::Unfrozen => "unfrozen".to_string(),
        Presentation::Notice { text } => text.clone(),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let server_addr = args.server.parse::<SocketAddr>()?;
    let text = args.command.join(" ");

    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    println!("Client socket bound to {}", socket.local_addr()?);

    let join = Packet::Join {
        client_version: PROTOCOL_VERSION,
        spectator: !args.play,
    };
    socket.send_to(&serialize(&join)?, server_addr).await?;

    let mut buf = [0u8; 2048];
    let joined = loop {
        let (len, _) = timeout(Duration::from_secs(3), socket.recv_from(&mut buf)).await??;
        match deserialize::<Packet>(&buf[..len]) {
            Ok(Packet::Joined {
                participant_id,
                team,
            }) => break (participant_id, team),
            Ok(Packet::Rejected { reason }) => {
                println!("Join rejected: {}", reason);
                return Ok(());
            }
            // Presentations can arrive before the join reply
            Ok(_) => continue,
            Err(e) => println!("Failed to deserialize response: {}", e),
        }
    };
    println!("Joined as participant {} (team {:?})", joined.0, joined.1);

    println!("Sending command: {}", text);
    socket
        .send_to(&serialize(&Packet::Command { text })?, server_addr)
        .await?;

    let deadline = Instant::now() + Duration::from_secs(args.watch);
    let mut heartbeat = interval(Duration::from_secs(1));
    let heartbeat_data = serialize(&Packet::Heartbeat)?;

    loop {
        tokio::select! {
            _ = tokio::time::sleep_until(deadline) => break,
            _ = heartbeat.tick() => {
                socket.send_to(&heartbeat_data, server_addr).await?;
            }
            received = socket.recv_from(&mut buf) => {
                let (len, _) = received?;
                match deserialize::<Packet>(&buf[..len]) {
                    Ok(Packet::Presentation(presentation)) => {
                        println!("  {}", describe(&presentation))
                    }
                    Ok(Packet::Rejected { reason }) => println!("Rejected: {}", reason),
                    Ok(other) => println!("Unexpected packet: {:?}", other),
                    Err(e) => println!("Failed to deserialize packet: {}", e),
                }
            }
        }
    }

    socket
        .send_to(&serialize(&Packet::Leave)?, server_addr)
        .await?;
    println!("Admin client finished");

    Ok(())
}
