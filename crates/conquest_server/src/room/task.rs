//! The room's event loop.

use super::{Frame, JoinTicket, RoomCommand, RoomMetrics};
use crate::config::RoomConfig;
use conquest_core::protocol::{EliminationNotice, Welcome};
use conquest_core::{AgentId, Intent, JoinError, ServerMessage, World};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

pub(super) struct Room {
    world: World,
    config: RoomConfig,
    commands: mpsc::Receiver<RoomCommand>,
    frames: broadcast::Sender<Frame>,
    mailboxes: BTreeMap<AgentId, watch::Receiver<Intent>>,
    metrics: Arc<RoomMetrics>,
}

impl Room {
    pub(super) fn new(
        config: RoomConfig,
        commands: mpsc::Receiver<RoomCommand>,
        frames: broadcast::Sender<Frame>,
        metrics: Arc<RoomMetrics>,
    ) -> Self {
        let seed = config.rng_seed.unwrap_or_else(rand::random);
        let world = World::new(config.bounds(), config.rules.clone(), seed);
        Self {
            world,
            config,
            commands,
            frames,
            mailboxes: BTreeMap::new(),
            metrics,
        }
    }

    /// Runs until a `Shutdown` command arrives or every handle is dropped.
    ///
    /// The simulation and broadcast clocks are independent and only run
    /// while the room has agents.
    pub(super) async fn run(mut self) {
        let mut sim_ticker = interval(self.config.tick_interval());
        sim_ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut broadcast_ticker = interval(self.config.broadcast_interval());
        broadcast_ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            "🌍 Room started: {}x{} cells, tick {}ms, broadcast {}ms",
            self.config.width, self.config.height, self.config.tick_interval_ms, self.config.broadcast_interval_ms
        );

        loop {
            let active = !self.world.is_empty();
            tokio::select! {
                command = self.commands.recv() => {
                    let Some(command) = command else {
                        debug!("All room handles dropped");
                        break;
                    };
                    if matches!(command, RoomCommand::Shutdown) {
                        info!("🛑 Room shutting down");
                        break;
                    }
                    self.handle_command(command);
                    if !active && !self.world.is_empty() {
                        // Start both clocks fresh on the first join
                        sim_ticker.reset();
                        broadcast_ticker.reset();
                    }
                }
                _ = sim_ticker.tick(), if active => self.step(),
                _ = broadcast_ticker.tick(), if active => self.broadcast_snapshot(),
            }
        }

        info!("✅ Room stopped after {} ticks", self.world.current_tick());
    }

    fn handle_command(&mut self, command: RoomCommand) {
        match command {
            RoomCommand::Join { name, reply } => self.join(name, reply),
            RoomCommand::Leave { agent } => self.remove(agent),
            RoomCommand::Shutdown => {}
        }
    }

    fn join(&mut self, name: String, reply: oneshot::Sender<Result<JoinTicket, JoinError>>) {
        let result = self.world.join(name).map(|agent| {
            let (intents, mailbox) = watch::channel(Intent::default());
            self.mailboxes.insert(agent, mailbox);
            let welcome = ServerMessage::Welcome(Welcome { you: agent, snapshot: self.world.snapshot() });
            JoinTicket { agent, welcome, intents }
        });

        match &result {
            Ok(_) => self.metrics.set_agents(self.world.len()),
            Err(e) => warn!("⚠️ Join rejected: {}", e),
        }

        if let Err(Ok(ticket)) = reply.send(result) {
            // The client went away while waiting for its welcome
            self.remove(ticket.agent);
        }
    }

    fn remove(&mut self, agent: AgentId) {
        self.mailboxes.remove(&agent);
        if self.world.leave(agent).is_some() {
            self.metrics.set_agents(self.world.len());
        }
    }

    /// Moves the latest intents into the world. A closed mailbox means its
    /// connection is gone, so the agent is removed.
    fn drain_mailboxes(&mut self) {
        let mut disconnected = Vec::new();
        for (agent, mailbox) in self.mailboxes.iter_mut() {
            match mailbox.has_changed() {
                Ok(true) => {
                    let intent = *mailbox.borrow_and_update();
                    if !self.world.set_intent(*agent, intent) {
                        debug!("Ignored malformed intent from {}", agent);
                    }
                }
                Ok(false) => {}
                Err(_) => disconnected.push(*agent),
            }
        }

        for agent in disconnected {
            debug!("Intent mailbox of {} closed", agent);
            self.remove(agent);
        }
    }

    fn step(&mut self) {
        let started = Instant::now();
        self.drain_mailboxes();
        if self.world.is_empty() {
            return;
        }

        let report = self.world.tick();
        for elimination in &report.eliminations {
            self.publish(&ServerMessage::Eliminated(EliminationNotice::new(report.tick, elimination)));
        }
        for agent in &report.repaired {
            error!("❌ {} was reset by the world audit at tick {}", agent, report.tick);
        }

        self.metrics.record_tick(started.elapsed(), &report);
    }

    fn broadcast_snapshot(&self) {
        self.publish(&ServerMessage::Snapshot(self.world.snapshot()));
    }

    /// Serialises once and fans the frame out to every subscriber.
    fn publish(&self, message: &ServerMessage) {
        let frame: Frame = match message.to_json() {
            Ok(json) => Arc::from(json),
            Err(e) => {
                error!("Failed to serialize frame: {}", e);
                self.metrics.record_failed_frame();
                return;
            }
        };

        // An error only means nobody is subscribed right now
        let _ = self.frames.send(frame);
        self.metrics.record_frame();
    }
}
