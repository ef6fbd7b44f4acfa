//! Room runtime: one tokio task per room owns the [`World`](conquest_core::World).
//!
//! Nothing outside the room task ever touches the world. Connections talk to
//! it through three channels:
//!
//! * commands (`join`, `leave`, `shutdown`) over an `mpsc` queue,
//! * steering input over a per-agent `watch` mailbox, where only the latest
//!   value matters,
//! * outbound frames over a `broadcast` channel of pre-serialised JSON. A
//!   subscriber that falls behind loses frames; the room never waits for it.

pub mod metrics;
mod task;

pub use metrics::{MetricsSnapshot, RoomMetrics};

use crate::config::RoomConfig;
use crate::error::ServerError;
use conquest_core::{AgentId, Intent, JoinError, ServerMessage};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;

/// A pre-serialised server frame shared by every subscriber.
pub type Frame = Arc<str>;

const COMMAND_QUEUE: usize = 256;

/// Commands accepted by the room task.
#[derive(Debug)]
pub enum RoomCommand {
    Join {
        name: String,
        reply: oneshot::Sender<Result<JoinTicket, JoinError>>,
    },
    Leave {
        agent: AgentId,
    },
    Shutdown,
}

/// Everything a connection needs after a successful join.
#[derive(Debug)]
pub struct JoinTicket {
    pub agent: AgentId,
    /// Reply for the joining client, carrying its id and the current world
    pub welcome: ServerMessage,
    /// Mailbox for steering input. Dropping it removes the agent.
    pub intents: watch::Sender<Intent>,
}

/// Cloneable handle to a running room.
#[derive(Debug, Clone)]
pub struct RoomHandle {
    commands: mpsc::Sender<RoomCommand>,
    frames: broadcast::Sender<Frame>,
    metrics: Arc<RoomMetrics>,
}

impl RoomHandle {
    /// Starts a room task on the current tokio runtime.
    ///
    /// # Returns
    ///
    /// The handle used to talk to the room, and the task's join handle.
    pub fn spawn(config: RoomConfig) -> (Self, JoinHandle<()>) {
        let (commands, command_rx) = mpsc::channel(COMMAND_QUEUE);
        let (frames, _) = broadcast::channel(config.broadcast_capacity.max(1));
        let metrics = Arc::new(RoomMetrics::new());

        let room = task::Room::new(config, command_rx, frames.clone(), metrics.clone());
        let task = tokio::spawn(room.run());

        (Self { commands, frames, metrics }, task)
    }

    /// Admits a new agent. Fails when the world is full or the room is gone.
    pub async fn join(&self, name: String) -> Result<JoinTicket, ServerError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(RoomCommand::Join { name, reply })
            .await
            .map_err(|_| ServerError::RoomClosed)?;
        let ticket = response.await.map_err(|_| ServerError::RoomClosed)??;
        Ok(ticket)
    }

    pub async fn leave(&self, agent: AgentId) -> Result<(), ServerError> {
        self.commands
            .send(RoomCommand::Leave { agent })
            .await
            .map_err(|_| ServerError::RoomClosed)
    }

    /// Asks the room task to stop after its current tick.
    pub async fn shutdown(&self) {
        let _ = self.commands.send(RoomCommand::Shutdown).await;
    }

    /// Subscribes to every frame published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Frame> {
        self.frames.subscribe()
    }

    pub fn metrics(&self) -> Arc<RoomMetrics> {
        self.metrics.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }
}
