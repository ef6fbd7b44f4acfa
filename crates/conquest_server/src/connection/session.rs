//! Per-connection game session state.

use super::ConnectionId;
use crate::room::JoinTicket;
use conquest_core::{AgentId, Intent, ServerMessage};
use tokio::sync::watch;

/// Game state owned by a single connection task.
///
/// A session is either idle or controls exactly one agent. The intent sender
/// lives here, so dropping the session closes the agent's mailbox and the
/// room removes the agent on its next tick.
#[derive(Debug)]
pub struct Session {
    pub connection_id: ConnectionId,
    agent: Option<AgentId>,
    intents: Option<watch::Sender<Intent>>,
}

impl Session {
    pub fn new(connection_id: ConnectionId) -> Self {
        Self { connection_id, agent: None, intents: None }
    }

    pub fn agent(&self) -> Option<AgentId> {
        self.agent
    }

    pub fn is_joined(&self) -> bool {
        self.agent.is_some()
    }

    /// Takes control of a freshly joined agent and returns its welcome message.
    pub fn attach(&mut self, ticket: JoinTicket) -> ServerMessage {
        self.agent = Some(ticket.agent);
        self.intents = Some(ticket.intents);
        ticket.welcome
    }

    /// Releases the agent, if any.
    pub fn detach(&mut self) -> Option<AgentId> {
        self.intents = None;
        self.agent.take()
    }

    /// Replaces the pending intent. Returns `false` when not joined.
    pub fn steer(&self, intent: Intent) -> bool {
        match &self.intents {
            Some(intents) => {
                intents.send_replace(intent);
                true
            }
            None => false,
        }
    }
}
