//! Input validation and sanitization utilities.

use super::SecurityError;
use crate::config::SecurityConfig;
use conquest_core::ClientMessage;

/// Checks a raw text frame against the configured limits and parses it.
pub fn parse_client_message(text: &str, config: &SecurityConfig) -> Result<ClientMessage, SecurityError> {
    if text.len() > config.max_message_size {
        return Err(SecurityError::MessageTooLarge(text.len()));
    }

    ClientMessage::from_json(text).map_err(|e| SecurityError::InvalidMessageFormat(e.to_string()))
}

/// Sanitizes a display name: control characters are removed, surrounding
/// whitespace trimmed and the result truncated to `max_name_length`
/// characters. Empty names fall back to `default_name`.
pub fn sanitize_name(input: &str, config: &SecurityConfig) -> String {
    let cleaned: String = input.chars().filter(|c| !c.is_control()).collect();
    let name: String = cleaned.trim().chars().take(config.max_name_length).collect();
    let name = name.trim_end();

    if name.is_empty() {
        config.default_name.clone()
    } else {
        name.to_string()
    }
}
