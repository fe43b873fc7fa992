//! GazeSync Core - Wire protocol, section catalog, config, and error handling

pub mod catalog;
pub mod config;
pub mod error;
pub mod protocol;
pub mod types;

pub use catalog::*;
pub use config::*;
pub use error::{Error, Result};
pub use protocol::*;
pub use types::*;
