use std::time::Duration;

use futures::future::join_all;
use random::Source;
use relay::{
    channel::{channel_id_from_workshop_id, ChannelConfig, Registry},
    host::{config::HostConfig, Host},
    Channel, Payload, PeerID, ReceiveInfo, RelayDecision, Result,
};
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

const PUBLISHER_ID: u64 = 777_777_777_777;

#[derive(Serialize, Deserialize, Debug, Clone)]
enum DemoPacket {
    Simple { text: String, number: u64 },
}

#[derive(Debug, Default)]
struct Board {
    name: String,
    lines: Vec<String>,
}

impl Payload for DemoPacket {
    type Context = Board;

    fn kind(&self) -> &'static str {
        match self {
            DemoPacket::Simple { .. } => "Simple",
        }
    }

    fn received(&mut self, origin: PeerID, info: &ReceiveInfo, board: &mut Board) -> RelayDecision {
        match self {
            DemoPacket::Simple { text, number } => {
                tracing::info!("{}: \"{text}\" #{number} from {origin}", board.name);
                board.lines.push(text.clone());

                if info.is_authority {
                    text.push_str(" (seen by server)");
                    return RelayDecision::to_everyone().reserialized();
                }
                RelayDecision::none()
            }
        }
    }
}

async fn run_peer(mut channel: Channel<DemoPacket>, mut board: Board, expected: usize) -> Board {
    while board.lines.len() < expected {
        tokio::select! {
            alive = channel.poll(&mut board) => {
                if !alive {
                    break;
                }
            },
            _ = tokio::time::sleep(Duration::from_secs(2)) => {
                tracing::warn!("{}: timed out with {} packets", board.name, board.lines.len());
                break;
            }
        }
    }

    for notice in channel.drain_notices() {
        tracing::warn!("{}", notice.text);
    }
    channel.dispose();
    board
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let channel_id = channel_id_from_workshop_id(PUBLISHER_ID);
    let host = Host::new(HostConfig::new(10)?);
    let mut source = random::default(10);

    let names = ["server", "alice", "bob"];
    let mut channels = Vec::new();
    for (i, name) in names.iter().enumerate() {
        let id: PeerID = (i as u64 + 1).into();
        let endpoint = match i {
            0 => host.connect_authority(id, *name, false)?,
            _ => host.connect(id, *name)?,
        };

        // Every simulated peer stands in for its own process
        let config = ChannelConfig::new(channel_id, "Demo Mod")?;
        let channel = Channel::new(config, endpoint, &Registry::new())?;
        let board = Board {
            name: name.to_string(),
            lines: Vec::new(),
        };
        channels.push((channel, board));
    }

    for (channel, board) in channels.iter_mut() {
        let packet = channel.packet(DemoPacket::Simple {
            text: format!("hello from {}", board.name),
            number: source.read::<u64>(),
        })?;
        channel.send_to_authority(packet, None, board)?;
    }

    let expected = names.len();
    let tasks = channels
        .into_iter()
        .map(|(channel, board)| tokio::spawn(run_peer(channel, board, expected)));

    for board in join_all(tasks).await.into_iter().flatten() {
        tracing::info!("{} got {:?}", board.name, board.lines);
    }

    Ok(())
}
