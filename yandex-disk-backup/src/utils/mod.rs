//! Utility modules for the backup agent.

pub mod errors;
pub mod logger;

pub use errors::{AgentError, ErrorKind, Result};
