//! Message routing logic for dispatching client messages to the room.

use crate::config::SecurityConfig;
use crate::connection::{ConnectionManager, Session};
use crate::error::ServerError;
use crate::room::RoomHandle;
use crate::security::{parse_client_message, sanitize_name};
use conquest_core::{ClientMessage, Intent, ServerMessage};
use tracing::{debug, trace};

/// Routes a raw client message to the room.
///
/// # Arguments
///
/// * `text` - The raw message text from the client (expected to be JSON)
/// * `session` - The connection's session, updated on join and leave
/// * `room` - The room the connection plays in
/// * `connection_manager` - Registry updated with the controlled agent
/// * `security` - Input limits
///
/// # Returns
///
/// The direct reply for this client, if the message has one. Validation
/// failures and rejected joins come back as errors for the caller to report.
///
/// # Message Flow
///
/// 1. Check the frame size and parse it as a `ClientMessage`
/// 2. `join` sanitises the name and asks the room for an agent; a second
///    join on a joined session is ignored
/// 3. `setIntent` replaces the session's pending intent
/// 4. `leave` releases the agent but keeps the connection open
/// 5. `ping` is answered with `pong`
pub async fn route_client_message(
    text: &str,
    session: &mut Session,
    room: &RoomHandle,
    connection_manager: &ConnectionManager,
    security: &SecurityConfig,
) -> Result<Option<ServerMessage>, ServerError> {
    let message = parse_client_message(text, security)?;

    match message {
        ClientMessage::Join(request) => {
            if let Some(agent) = session.agent() {
                debug!(
                    "Connection {} already controls {}, ignoring join",
                    session.connection_id, agent
                );
                return Ok(None);
            }

            let name = sanitize_name(&request.name, security);
            let ticket = room.join(name).await?;
            connection_manager.set_agent(session.connection_id, Some(ticket.agent)).await;
            debug!("📨 Connection {} now controls {}", session.connection_id, ticket.agent);
            Ok(Some(session.attach(ticket)))
        }
        ClientMessage::SetIntent(update) => {
            let intent = Intent { heading: update.heading, boosting: update.boosting };
            if intent.sanitized().is_none() {
                debug!("Dropping malformed intent from connection {}", session.connection_id);
            } else if !session.steer(intent) {
                trace!("Connection {} steered before joining", session.connection_id);
            }
            Ok(None)
        }
        ClientMessage::Leave => {
            if let Some(agent) = session.detach() {
                connection_manager.set_agent(session.connection_id, None).await;
                room.leave(agent).await?;
            }
            Ok(None)
        }
        ClientMessage::Ping => Ok(Some(ServerMessage::Pong)),
    }
}
