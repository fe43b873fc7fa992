//! GazeSync Client - Session transport and the subject/observer roles
//!
//! [`SessionTransport`] owns one reconnecting duplex channel to the relay.
//! [`SubjectSession`] resolves gaze coordinates and publishes them;
//! [`ObserverSession`] feeds the inbound stream into the engagement engine
//! and runs the liveness tick.

pub mod observer;
pub mod subject;
pub mod transport;

mod sync;

pub use observer::*;
pub use subject::*;
pub use transport::*;
