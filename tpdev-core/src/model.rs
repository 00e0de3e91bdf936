//! Data model for a tpdev run

use serde::Serialize;
use std::fmt;

/// Where the telepresence client came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BinarySource {
    /// Found on PATH at the pinned version
    System,
    /// Downloaded into the local cache
    Bundled,
}

impl fmt::Display for BinarySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BinarySource::System => write!(f, "system"),
            BinarySource::Bundled => write!(f, "bundled"),
        }
    }
}

/// The one client binary used for every telepresence command in a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BinaryHandle {
    path: String,
    version: Option<String>,
    source: BinarySource,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha256: Option<String>,
}

impl BinaryHandle {
    pub fn system(path: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            version: Some(version.into()),
            source: BinarySource::System,
            sha256: None,
        }
    }

    pub fn bundled(path: impl Into<String>, version: Option<String>, sha256: Option<String>) -> Self {
        Self {
            path: path.into(),
            version,
            source: BinarySource::Bundled,
            sha256,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn source(&self) -> BinarySource {
        self.source
    }

    pub fn sha256(&self) -> Option<&str> {
        self.sha256.as_deref()
    }
}

/// Observed state of the traffic-manager deployment.
///
/// Built only through the constructors below, which keep `ready` equal to
/// `available_replicas > 0` and `ready` implying `installed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagerStatus {
    installed: bool,
    ready: bool,
    available_replicas: u32,
}

impl ManagerStatus {
    /// Deployment lookup failed: not installed
    pub fn absent() -> Self {
        Self {
            installed: false,
            ready: false,
            available_replicas: 0,
        }
    }

    /// Deployment exists but its status could not be read
    pub fn unreadable() -> Self {
        Self {
            installed: true,
            ready: false,
            available_replicas: 0,
        }
    }

    pub fn with_replicas(available_replicas: u32) -> Self {
        Self {
            installed: true,
            ready: available_replicas > 0,
            available_replicas,
        }
    }

    pub fn installed(&self) -> bool {
        self.installed
    }

    pub fn ready(&self) -> bool {
        self.ready
    }

    pub fn available_replicas(&self) -> u32 {
        self.available_replicas
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectResult {
    pub connected: bool,
    pub message: Option<String>,
    /// The stale-configuration retry fired
    pub retried: bool,
}

/// Service to intercept and where its traffic goes locally
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InterceptTarget {
    pub service: String,
    pub namespace: String,
    pub local_port: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InterceptResult {
    pub intercepted: bool,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaveResult {
    pub ok: bool,
    pub message: Option<String>,
}

/// `telepresence status` output; exactly one of `structured`/`raw` is set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusSnapshot {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    structured: Option<serde_json::Map<String, serde_json::Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    raw: Option<String>,
}

impl StatusSnapshot {
    pub fn structured(object: serde_json::Map<String, serde_json::Value>) -> Self {
        Self {
            ok: true,
            structured: Some(object),
            raw: None,
        }
    }

    pub fn raw(text: impl Into<String>) -> Self {
        Self {
            ok: false,
            structured: None,
            raw: Some(text.into()),
        }
    }

    pub fn ok(&self) -> bool {
        self.ok
    }

    pub fn structured_body(&self) -> Option<&serde_json::Map<String, serde_json::Value>> {
        self.structured.as_ref()
    }

    pub fn raw_body(&self) -> Option<&str> {
        self.raw.as_deref()
    }
}

/// Ordered, append-only record of what a run did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ActionLog(Vec<String>);

impl ActionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, action: impl Into<String>) {
        self.0.push(action.into());
    }

    pub fn entries(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
