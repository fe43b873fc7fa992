//! GazeSync Engine - Engagement accumulation, liveness, coordinate resolution
//!
//! Deterministic core: no network, no timers, clock injected. The transport
//! layer in `gazesync-client` feeds events in arrival order; everything here
//! is synchronous and single-writer.

pub mod accumulator;
pub mod liveness;
pub mod resolver;

pub use accumulator::*;
pub use liveness::*;
pub use resolver::*;
