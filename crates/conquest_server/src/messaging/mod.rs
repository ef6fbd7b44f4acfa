//! Message handling and routing for client-server communication.
//!
//! This module parses client frames and turns them into room commands or
//! direct replies.

pub mod router;

pub use router::route_client_message;
