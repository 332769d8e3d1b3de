use clap::Parser;
use shared::protocol::{JoinRoom, PlayerUpdate};
use shared::{CharType, ClientMessage, Envelope, ServerMessage, Vec3, MAX_DATAGRAM_SIZE};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::{sleep, timeout};

/// Bot survivor that joins a room, wanders around and prints what it sees
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Server address
    #[clap(short, long, default_value = "127.0.0.1:8080")]
    server: SocketAddr,
    /// Room to join
    #[clap(short, long, default_value = "default")]
    room: String,
    /// How many movement updates to send (one per 100 ms)
    #[clap(short, long, default_value = "100")]
    updates: u32,
}

async fn send(
    socket: &UdpSocket,
    server: SocketAddr,
    envelope: Envelope<ClientMessage>,
) -> Result<(), Box<dyn std::error::Error>> {
    let data = envelope.encode()?;
    socket.send_to(&data, server).await?;
    Ok(())
}

/// Prints every datagram that arrives within `wait`.
async fn drain(socket: &UdpSocket, buf: &mut [u8], wait: Duration) -> Option<Vec3> {
    let mut spawn = None;

    while let Ok(Ok((len, _))) = timeout(wait, socket.recv_from(buf)).await {
        match Envelope::<ServerMessage>::decode(&buf[..len]) {
            Ok(envelope) => match envelope.message {
                ServerMessage::Welcome(welcome) => println!("Welcomed as client {}", welcome.id),
                ServerMessage::JoinRoomAck(ack) => println!(
                    "Joined room '{}' (seed {}, {} killer, {} walls)",
                    ack.room_id,
                    ack.world_seed,
                    ack.killer_type,
                    ack.world_data.walls.len()
                ),
                ServerMessage::GameState(state) => {
                    if let Some(me) = state.survivors.values().next() {
                        spawn.get_or_insert(me.position);
                    }
                    if state.tick % 20 == 0 {
                        println!(
                            "Tick {}: phase {}, timer {:.1}, {} alive, killer at {:?}",
                            state.tick,
                            state.phase.as_str(),
                            state.match_timer,
                            state.living_survivor_count,
                            state.killer.position
                        );
                    }
                }
                ServerMessage::ScoutPing(ping) => println!("Killer spotted at {:?}", ping.position),
                ServerMessage::Pong {} => println!("Pong (reply to {:?})", envelope.reply_to),
                ServerMessage::Disconnected(reason) => println!("Disconnected: {}", reason.reason),
            },
            Err(e) => println!("Failed to decode datagram: {}", e),
        }
    }

    spawn
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    println!("Client socket bound to {}", socket.local_addr()?);
    let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];

    let join = ClientMessage::JoinRoom(JoinRoom {
        room_id: Some(args.room.clone()),
        char_type: Some(CharType::Scout),
    });
    println!("Joining room '{}' on {}", args.room, args.server);
    send(&socket, args.server, Envelope::new(join).with_seq(1)).await?;

    let origin = drain(&socket, &mut buf, Duration::from_millis(500))
        .await
        .unwrap_or(Vec3::new(5.0, 1.0, 5.0));

    for i in 0..args.updates {
        let angle = i as f32 / 10.0;
        let position = Vec3::new(origin.x + angle.sin() * 3.0, origin.y, origin.z + angle.cos() * 3.0);
        let update = ClientMessage::PlayerUpdate(PlayerUpdate {
            position,
            is_hiding: Some(false),
            rotation: Some(angle),
            is_sprinting: Some(i % 30 < 10),
        });
        send(&socket, args.server, Envelope::new(update)).await?;

        if i % 25 == 0 {
            send(&socket, args.server, Envelope::new(ClientMessage::Ping {}).with_seq(i + 2)).await?;
        }
        if i == args.updates / 2 {
            send(&socket, args.server, Envelope::new(ClientMessage::UseScoutAbility {})).await?;
        }

        drain(&socket, &mut buf, Duration::from_millis(5)).await;
        sleep(Duration::from_millis(100)).await;
    }

    println!("Sending disconnect");
    send(&socket, args.server, Envelope::new(ClientMessage::Disconnect {})).await?;
    println!("Test client finished");

    Ok(())
}
