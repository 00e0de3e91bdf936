//! Error types for tpdev operations

use serde::{Deserialize, Serialize};

/// Structured error payload printed by the CLI when a run aborts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub code: String,
    pub message: String,
    pub hint: String,
}

impl ErrorEnvelope {
    pub fn new(
        code: impl Into<String>,
        message: impl Into<String>,
        hint: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            hint: hint.into(),
        }
    }
}

impl From<&TpError> for ErrorEnvelope {
    fn from(err: &TpError) -> Self {
        Self::new(err.code(), err.to_string(), err.hint())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TpError {
    #[error("Failed to launch {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid client version {0:?} (expected a release tag such as v2.24.0)")]
    InvalidVersion(String),

    #[error("Unsupported operating system: {0}")]
    UnsupportedOs(String),

    #[error("Unsupported architecture: {0}")]
    UnsupportedArch(String),

    #[error("Failed to download {url}: {message}")]
    Download { url: String, message: String },

    #[error("Failed to download {url}: HTTP {status}")]
    DownloadStatus { url: String, status: u16 },

    #[error("Failed to create namespace {namespace}: {message}")]
    NamespaceCreate { namespace: String, message: String },

    #[error("telepresence helm install failed in {namespace}: {message}")]
    InstallFailed { namespace: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl TpError {
    /// Stable machine-readable code for the error envelope
    pub fn code(&self) -> &'static str {
        match self {
            TpError::Launch { .. } => "launch_failed",
            TpError::InvalidVersion(_) => "invalid_version",
            TpError::UnsupportedOs(_) => "unsupported_os",
            TpError::UnsupportedArch(_) => "unsupported_arch",
            TpError::Download { .. } => "download_failed",
            TpError::DownloadStatus { .. } => "download_status",
            TpError::NamespaceCreate { .. } => "namespace_create_failed",
            TpError::InstallFailed { .. } => "install_failed",
            TpError::Io(_) => "io_error",
            TpError::ConfigParse(_) => "config_parse",
            TpError::Serialization(_) => "serialization",
        }
    }

    pub fn hint(&self) -> &'static str {
        match self {
            TpError::Launch { .. } => "Check that the program is installed and on PATH",
            TpError::InvalidVersion(_) => {
                "Set TELEPRESENCE_VERSION or [client].version to a published tag"
            }
            TpError::UnsupportedOs(_) => "Run from Linux or macOS",
            TpError::UnsupportedArch(_) => "Only amd64 and arm64 release assets are published",
            TpError::Download { .. } => "Check network access to the release host",
            TpError::DownloadStatus { .. } => {
                "Check that TELEPRESENCE_VERSION names a published release"
            }
            TpError::NamespaceCreate { .. } => {
                "Check kubectl context and permissions to create namespaces"
            }
            TpError::InstallFailed { .. } => {
                "Check cluster permissions; re-run once the cluster is reachable"
            }
            TpError::Io(_) => "Check permissions on the cache directory",
            TpError::ConfigParse(_) => "Fix the settings file and re-run",
            TpError::Serialization(_) => "",
        }
    }
}
