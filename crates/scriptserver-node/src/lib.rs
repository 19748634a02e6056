//! Script runner for the RF conformance script server.
//!
//! This crate reads the TOML configuration, sets up logging, and drives
//! script lines through a [`Transport`](scriptserver_interfaces::Transport):
//! wait for the response, copy and store fields, then send.

pub mod config;
pub mod error;
pub mod logging;
pub mod runner;
pub mod wait;

pub use config::ServerConfig;
pub use error::{NodeError, WaitError};
pub use runner::{RunStatus, RunnerSettings, ScriptRunner};
pub use wait::{WaitOutcome, WaitSettings};
