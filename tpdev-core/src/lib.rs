//! tpdev Core - Types and plumbing for pinned Telepresence dev sessions
//!
//! This library holds the pieces shared by the session runtime and the CLI:
//! the data model, the error type, run configuration, the process executor
//! and the output classifiers used to decide success for idempotent commands.

pub mod classify;
pub mod config;
pub mod error;
pub mod exec;
pub mod model;
pub mod version;

pub use config::{InterceptOptions, Platform, RequestedActions, RunConfig, Settings};
pub use error::{ErrorEnvelope, TpError};
pub use exec::{CommandOutput, CommandRunner, SystemRunner};
pub use model::{
    ActionLog, BinaryHandle, BinarySource, ConnectResult, InterceptResult, InterceptTarget,
    LeaveResult, ManagerStatus, StatusSnapshot,
};

#[cfg(any(test, feature = "testing"))]
pub use exec::ScriptedRunner;

/// Result type alias for tpdev operations
pub type Result<T> = std::result::Result<T, TpError>;
