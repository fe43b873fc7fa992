//! GazeSync Relay - WebSocket fan-out hub for gaze sessions
//!
//! Stateless broker: accepts subject and observer connections on one
//! endpoint, rebroadcasts gaze and page-change envelopes to every peer,
//! and announces the connected-client count on join and leave.

pub mod server;
pub mod ws;

pub use server::{Relay, RelayConfig, RelayState};
