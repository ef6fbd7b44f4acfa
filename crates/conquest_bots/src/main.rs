//! # Conquest Bots
//!
//! Connects a swarm of scripted clients to a conquest server. Every bot joins,
//! then steers its agent around square loops starting from its spawn so that
//! each completed loop captures territory. Useful both as a demo and as load.
//!
//! ```bash
//! conquest-bots --url ws://127.0.0.1:8080 --bots 16 --side 6 --duration 120
//! ```

mod pilot;

use clap::Parser;
use conquest_core::protocol::{IntentUpdate, JoinRequest};
use conquest_core::{AgentId, AgentSnapshot, ClientMessage, ServerMessage};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use pilot::SquarePilot;
use rand::Rng;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::{interval, sleep, sleep_until, Instant};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

type BotError = Box<dyn std::error::Error + Send + Sync>;
type WsSender = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

#[derive(Parser, Debug, Clone)]
#[command(name = "conquest-bots")]
#[command(about = "Scripted clients that capture territory on a conquest server")]
struct Args {
    /// Server WebSocket URL
    #[arg(short, long, default_value = "ws://127.0.0.1:8080")]
    url: String,

    /// Number of simultaneous bots
    #[arg(short, long, default_value = "4")]
    bots: u32,

    /// Side length of each square loop in cells
    #[arg(short, long, default_value = "6")]
    side: i32,

    /// Session duration in seconds
    #[arg(short, long, default_value = "60")]
    duration: u64,

    /// Delay between bot connections in milliseconds
    #[arg(long, default_value = "100")]
    stagger_ms: u64,

    /// Boost while flying
    #[arg(long)]
    boost: bool,

    /// Name prefix; each bot gets a short random suffix
    #[arg(long, default_value = "bot")]
    name_prefix: String,
}

/// What one bot saw during its session.
#[derive(Debug, Default, Clone, Copy)]
struct BotReport {
    captures: u32,
    deaths: u32,
    kills: u32,
    best_territory: usize,
    snapshots: u64,
}

/// The bot's view of its own agent between snapshots.
struct BotState {
    agent: Option<AgentId>,
    pilot: Option<SquarePilot>,
    alive: bool,
    territory: usize,
    side: i32,
    first_leg: usize,
    report: BotReport,
}

impl BotState {
    fn new(side: i32, first_leg: usize) -> Self {
        Self {
            agent: None,
            pilot: None,
            alive: false,
            territory: 0,
            side,
            first_leg,
            report: BotReport::default(),
        }
    }

    /// Applies a snapshot. Returns the new heading when the pilot turned
    /// or the agent (re)spawned.
    fn observe(&mut self, me: &AgentSnapshot, cell_size: f32) -> Option<f32> {
        self.report.snapshots += 1;
        let cell = me.position.cell(cell_size);
        let territory = me.territory.len();

        if !me.alive {
            self.alive = false;
            return None;
        }

        if territory > self.territory && self.alive {
            self.report.captures += 1;
        }
        self.territory = territory;
        self.report.best_territory = self.report.best_territory.max(territory);

        let respawned = !self.alive;
        self.alive = true;

        let pilot = self
            .pilot
            .get_or_insert_with(|| SquarePilot::new(self.side, self.first_leg, cell));
        if respawned {
            pilot.anchor(cell);
            return Some(pilot.heading());
        }
        pilot.update(cell).then(|| pilot.heading())
    }
}

async fn send(ws_sender: &mut WsSender, message: &ClientMessage) -> Result<(), BotError> {
    let json = serde_json::to_string(message)?;
    ws_sender.send(Message::Text(json.into())).await?;
    Ok(())
}

/// Runs a single bot until the deadline or until the server closes.
async fn run_bot(index: u32, args: Args, first_leg: usize) -> Result<BotReport, BotError> {
    let name = format!("{}-{}", args.name_prefix, &Uuid::new_v4().simple().to_string()[..6]);
    let (ws_stream, _) = connect_async(&args.url).await?;
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    send(&mut ws_sender, &ClientMessage::Join(JoinRequest { name: name.clone() })).await?;
    info!("🤖 Bot {} connected as '{}'", index, name);

    let mut state = BotState::new(args.side, first_leg);
    let mut keepalive = interval(Duration::from_secs(5));
    let deadline = Instant::now() + Duration::from_secs(args.duration);

    loop {
        let mut steer = None;

        tokio::select! {
            incoming = ws_receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    match serde_json::from_str::<ServerMessage>(text.as_str()) {
                        Ok(ServerMessage::Welcome(welcome)) => {
                            state.agent = Some(welcome.you);
                            info!("👋 Bot {} joined as {} in a {}x{} world", index, welcome.you, welcome.snapshot.width, welcome.snapshot.height);
                            if let Some(me) = welcome.snapshot.agents.iter().find(|a| a.id == welcome.you) {
                                steer = state.observe(me, welcome.snapshot.cell_size);
                            }
                        }
                        Ok(ServerMessage::Snapshot(snapshot)) => {
                            if let Some(me) = state.agent.and_then(|id| snapshot.agents.iter().find(|a| a.id == id)) {
                                steer = state.observe(me, snapshot.cell_size);
                            }
                        }
                        Ok(ServerMessage::Eliminated(notice)) => {
                            if Some(notice.victim_id) == state.agent {
                                state.report.deaths += 1;
                                info!("💀 Bot {} eliminated at tick {} ({:?})", index, notice.tick, notice.cause);
                            } else if notice.killer_id.is_some() && notice.killer_id == state.agent {
                                state.report.kills += 1;
                                info!("⚔️ Bot {} eliminated {}", index, notice.victim_id);
                            }
                        }
                        Ok(ServerMessage::Error(notice)) => warn!("⚠️ Bot {} got error: {}", index, notice.message),
                        Ok(ServerMessage::Pong) => debug!("Bot {} pong", index),
                        Err(e) => warn!("❌ Bot {} failed to parse frame: {}", index, e),
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    info!("🔌 Bot {} closed by server: {:?}", index, frame);
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("⚠️ Bot {} WebSocket error: {}", index, e);
                    break;
                }
                None => break,
            },
            _ = keepalive.tick() => send(&mut ws_sender, &ClientMessage::Ping).await?,
            _ = sleep_until(deadline) => {
                info!("⏰ Bot {} session complete", index);
                send(&mut ws_sender, &ClientMessage::Leave).await?;
                let _ = ws_sender.close().await;
                break;
            }
        }

        if let Some(heading) = steer {
            let update = IntentUpdate { heading, boosting: args.boost };
            send(&mut ws_sender, &ClientMessage::SetIntent(update)).await?;
        }
    }

    Ok(state.report)
}

#[tokio::main]
async fn main() -> Result<(), BotError> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args = Args::parse();

    info!("🚀 Starting {} bots against {}", args.bots, args.url);
    info!("   • Loop side: {} cells", args.side);
    info!("   • Duration: {} seconds", args.duration);

    let mut handles = Vec::new();
    for index in 0..args.bots {
        let first_leg = rand::thread_rng().gen_range(0..4);
        let bot_args = args.clone();
        handles.push(tokio::spawn(async move {
            match run_bot(index, bot_args, first_leg).await {
                Ok(report) => Some(report),
                Err(e) => {
                    error!("❌ Bot {} failed: {}", index, e);
                    None
                }
            }
        }));

        // Stagger connections so spawns spread out
        sleep(Duration::from_millis(args.stagger_ms)).await;
    }

    let mut total = BotReport::default();
    let mut finished = 0;
    for handle in handles {
        if let Ok(Some(report)) = handle.await {
            finished += 1;
            total.captures += report.captures;
            total.deaths += report.deaths;
            total.kills += report.kills;
            total.snapshots += report.snapshots;
            total.best_territory = total.best_territory.max(report.best_territory);
        }
    }

    info!("✅ {}/{} bots finished", finished, args.bots);
    info!("📊 Captures: {} | Deaths: {} | Kills: {}", total.captures, total.deaths, total.kills);
    info!("📊 Largest territory: {} cells | Snapshots received: {}", total.best_territory, total.snapshots);

    Ok(())
}
