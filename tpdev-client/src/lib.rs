//! tpdev Client - Session runtime for pinned Telepresence dev sessions
//!
//! Provides the `Orchestrator` that provisions the client binary, bootstraps
//! the traffic manager and drives connect/intercept/leave/quit/status, so the
//! CLI only resolves configuration and prints the summary.

pub mod intercept;
pub mod kube;
pub mod manager;
pub mod provision;
pub mod runtime;
pub mod session;
pub mod status;
pub mod summary;

pub use intercept::InterceptController;
pub use kube::Kubectl;
pub use manager::ManagerBootstrapper;
pub use provision::{AssetFetcher, HttpFetcher, Provisioner, ReleaseAsset};
pub use runtime::{Orchestrator, RunFailure};
pub use session::{QuitOutcome, SessionController};
pub use status::StatusReporter;
pub use summary::{
    Attempt, ClientReport, ConnectReport, InterceptReport, LeaveReport, ManagerReport,
    QuitReport, StatusReport, Summary,
};
