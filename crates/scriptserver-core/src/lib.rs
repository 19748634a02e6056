//! Core of the RF conformance script server.
//!
//! Everything here is free of I/O: message layouts, the line parser, the
//! placeholder expander, the matcher and the field copy/store engine. All
//! run-wide state lives in a [`ScriptContext`] passed by reference.

pub mod constants;
pub mod context;
pub mod copy;
pub mod desync;
pub mod directory;
pub mod error;
pub mod field;
pub mod layout;
pub mod matcher;
pub mod placeholder;
pub mod policy;
pub mod script;
pub mod store;

pub use constants::{Field, MessageType, Operator};
pub use context::{Clock, ScriptContext};
pub use directory::{NodeDirectory, RfNode};
pub use matcher::MatchOutcome;
pub use policy::Policy;
pub use script::{CopyRule, Expectation, LoopSpec, ScriptLineParams, StoreRule};
