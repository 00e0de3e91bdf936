//! The structured summary a run emits

use serde::Serialize;
use tpdev_core::{
    ActionLog, BinaryHandle, BinarySource, InterceptResult, LeaveResult, StatusSnapshot,
};

/// Per-action report: `{"attempted": false}` or `{"attempted": true, ...detail}`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attempt<T> {
    pub attempted: bool,
    #[serde(flatten)]
    pub detail: Option<T>,
}

impl<T> Attempt<T> {
    pub fn skipped() -> Self {
        Self {
            attempted: false,
            detail: None,
        }
    }

    pub fn done(detail: T) -> Self {
        Self {
            attempted: true,
            detail: Some(detail),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientReport {
    pub version_pinned: String,
    pub used_version: Option<String>,
    pub path: String,
    pub source: BinarySource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

impl ClientReport {
    pub fn new(pinned: &str, binary: &BinaryHandle) -> Self {
        Self {
            version_pinned: pinned.to_string(),
            used_version: binary.version().map(str::to_string),
            path: binary.path().to_string(),
            source: binary.source(),
            sha256: binary.sha256().map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagerReport {
    pub namespace: String,
    pub installed: bool,
    pub installed_this_run: bool,
    pub ready: bool,
    pub available_replicas: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectReport {
    pub connected: bool,
    pub retried: bool,
    pub namespace: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InterceptReport {
    pub service: String,
    pub namespace: String,
    pub port: String,
    pub result: InterceptResult,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaveReport {
    pub name: String,
    pub result: LeaveResult,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusReport {
    pub result: StatusSnapshot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QuitReport {
    pub attempted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub client: ClientReport,
    pub manager: ManagerReport,
    pub connect: Attempt<ConnectReport>,
    pub intercept: Attempt<InterceptReport>,
    pub leave: Attempt<LeaveReport>,
    pub quit: QuitReport,
    pub status: Attempt<StatusReport>,
    pub actions: ActionLog,
}

impl Summary {
    pub fn to_json_pretty(&self) -> tpdev_core::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_skipped_attempt_serializes_flag_only() {
        let attempt: Attempt<LeaveReport> = Attempt::skipped();
        assert_eq!(serde_json::to_value(&attempt).unwrap(), json!({ "attempted": false }));
    }

    #[test]
    fn test_done_attempt_flattens_detail() {
        let attempt = Attempt::done(LeaveReport {
            name: "fresh-app".to_string(),
            result: LeaveResult {
                ok: true,
                message: None,
            },
        });
        assert_eq!(
            serde_json::to_value(&attempt).unwrap(),
            json!({
                "attempted": true,
                "name": "fresh-app",
                "result": { "ok": true, "message": null }
            })
        );
    }

    #[test]
    fn test_client_report_from_bundled_handle() {
        let handle = BinaryHandle::bundled("/repo/.bin/v2.24.0/telepresence", None, Some("ab12".to_string()));
        let report = ClientReport::new("v2.24.0", &handle);
        assert_eq!(
            serde_json::to_value(&report).unwrap(),
            json!({
                "versionPinned": "v2.24.0",
                "usedVersion": null,
                "path": "/repo/.bin/v2.24.0/telepresence",
                "source": "bundled",
                "sha256": "ab12"
            })
        );
    }
}
