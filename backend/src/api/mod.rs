//! HTTP API module.
//!
//! Serves list-model stores over REST, plus the log stream.

pub mod server;
pub mod types;

pub use server::{router, start_server};
pub use types::*;
