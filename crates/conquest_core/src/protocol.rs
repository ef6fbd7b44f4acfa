//! Wire protocol between clients and the room.
//!
//! Every frame is a JSON text message of the form
//! `{"event": "<name>", "data": { ... }}` with camelCase field names.
//! Snapshots are full state, so a client that misses frames only needs the
//! next one to resynchronise.

use crate::agent::{AgentId, AgentState};
use crate::collision::{Elimination, EliminationCause};
use crate::grid::{Cell, Vec2};
use serde::{Deserialize, Serialize};

/// Messages accepted from clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientMessage {
    /// Request to enter the room under a display name
    Join(JoinRequest),
    /// Latest steering input; only the most recent one per tick is used
    SetIntent(IntentUpdate),
    Leave,
    Ping,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinRequest {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntentUpdate {
    pub heading: f32,
    #[serde(default)]
    pub boosting: bool,
}

impl ClientMessage {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// Messages sent from the room to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerMessage {
    /// Reply to a successful join, carrying the assigned id
    Welcome(Welcome),
    Snapshot(WorldSnapshot),
    Eliminated(EliminationNotice),
    Pong,
    Error(ErrorNotice),
}

impl ServerMessage {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error(ErrorNotice { message: message.into() })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Welcome {
    pub you: AgentId,
    pub snapshot: WorldSnapshot,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EliminationNotice {
    pub tick: u64,
    pub victim_id: AgentId,
    pub killer_id: Option<AgentId>,
    pub cause: EliminationCause,
}

impl EliminationNotice {
    pub fn new(tick: u64, elimination: &Elimination) -> Self {
        Self {
            tick,
            victim_id: elimination.victim,
            killer_id: elimination.killer,
            cause: elimination.cause,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorNotice {
    pub message: String,
}

/// Full world state as seen by clients on one broadcast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldSnapshot {
    pub tick: u64,
    pub width: i32,
    pub height: i32,
    pub cell_size: f32,
    pub agents: Vec<AgentSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentSnapshot {
    pub id: AgentId,
    pub name: String,
    pub color: String,
    pub position: Vec2,
    pub heading: f32,
    pub alive: bool,
    pub state: AgentState,
    /// Trail cells in the order they were laid
    pub trail: Vec<Cell>,
    /// Territory cells, sorted row-major
    pub territory: Vec<Cell>,
    pub score: u32,
    pub kills: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn test_client_messages_parse() {
        let join = ClientMessage::from_json(r#"{"event":"join","data":{"name":"ada"}}"#).unwrap();
        assert_eq!(join, ClientMessage::Join(JoinRequest { name: "ada".to_string() }));

        let intent = ClientMessage::from_json(r#"{"event":"setIntent","data":{"heading":1.5}}"#).unwrap();
        assert_eq!(intent, ClientMessage::SetIntent(IntentUpdate { heading: 1.5, boosting: false }));

        assert_eq!(ClientMessage::from_json(r#"{"event":"ping"}"#).unwrap(), ClientMessage::Ping);
        assert_eq!(ClientMessage::from_json(r#"{"event":"leave"}"#).unwrap(), ClientMessage::Leave);
    }

    #[test]
    fn test_unknown_event_is_rejected() {
        assert!(ClientMessage::from_json(r#"{"event":"teleport","data":{}}"#).is_err());
        assert!(ClientMessage::from_json("not json").is_err());
    }

    #[test]
    fn test_elimination_wire_shape() {
        let message = ServerMessage::Eliminated(EliminationNotice {
            tick: 12,
            victim_id: AgentId(2),
            killer_id: Some(AgentId(1)),
            cause: EliminationCause::TrailCut,
        });
        let value: Value = serde_json::from_str(&message.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "event": "eliminated",
                "data": { "tick": 12, "victimId": 2, "killerId": 1, "cause": "trailCut" }
            })
        );
    }

    #[test]
    fn test_snapshot_uses_camel_case() {
        let snapshot = WorldSnapshot { tick: 1, width: 8, height: 8, cell_size: 1.0, agents: Vec::new() };
        let value: Value = serde_json::from_str(&ServerMessage::Snapshot(snapshot).to_json().unwrap()).unwrap();
        assert_eq!(value["event"], "snapshot");
        assert_eq!(value["data"]["cellSize"], 1.0);
        assert!(value["data"]["agents"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_error_helper() {
        let value: Value = serde_json::from_str(&ServerMessage::error("bad input").to_json().unwrap()).unwrap();
        assert_eq!(value, json!({ "event": "error", "data": { "message": "bad input" } }));
    }
}
