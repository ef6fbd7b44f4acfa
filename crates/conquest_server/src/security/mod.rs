//! Input validation for everything a client sends.
//!
//! Clients are never trusted: oversized frames and malformed JSON are
//! rejected with an error frame, display names are sanitised, and nothing a
//! client sends can reach the simulation without passing through here.

pub mod input_validation;

pub use input_validation::{parse_client_message, sanitize_name};

/// Security-related errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SecurityError {
    #[error("Message too large: {0} bytes")]
    MessageTooLarge(usize),

    #[error("Invalid message format: {0}")]
    InvalidMessageFormat(String),
}
