//! Configuration for tpdev
//!
//! `Settings` is the optional TOML file; `RunConfig` is the fully resolved
//! configuration for one run, built once by the CLI and passed by reference.

use crate::model::InterceptTarget;
use crate::version::is_release_tag;
use crate::TpError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Pinned telepresence client version
pub const DEFAULT_CLIENT_VERSION: &str = "v2.24.0";

/// Where pinned release assets are published
pub const DEFAULT_RELEASE_BASE_URL: &str =
    "https://github.com/telepresenceio/telepresence/releases/download";

/// Interval between traffic-manager readiness polls
pub const READY_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Default settings file as TOML
pub const DEFAULT_SETTINGS: &str = r#"# tpdev settings

[client]
# Exact telepresence client version (TELEPRESENCE_VERSION overrides)
version = "v2.24.0"
# Directory holding downloaded clients, one subdirectory per version
cache_dir = ".bin"
release_base_url = "https://github.com/telepresenceio/telepresence/releases/download"
# Client looked up on PATH before downloading
program = "telepresence"

[manager]
namespace = "ambassador"
# How long to wait for the traffic manager (e.g., "120s", "5m")
ready_timeout = "120s"

[intercept]
service = "fresh-app"
namespace = "app"
port = "8000"

[tools]
kubectl = "kubectl"
"#;

/// tpdev settings file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub client: ClientSettings,
    #[serde(default)]
    pub manager: ManagerSettings,
    #[serde(default)]
    pub intercept: InterceptSettings,
    #[serde(default)]
    pub tools: ToolSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientSettings {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "default_cache_dir")]
    pub cache_dir: String,
    #[serde(default = "default_release_base_url")]
    pub release_base_url: String,
    #[serde(default = "default_program")]
    pub program: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagerSettings {
    #[serde(default = "default_manager_namespace")]
    pub namespace: String,
    #[serde(default = "default_ready_timeout")]
    pub ready_timeout: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterceptSettings {
    #[serde(default = "default_service")]
    pub service: String,
    #[serde(default = "default_service_namespace")]
    pub namespace: String,
    #[serde(default = "default_port")]
    pub port: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSettings {
    #[serde(default = "default_kubectl")]
    pub kubectl: String,
}

// Default value functions
fn default_version() -> String {
    DEFAULT_CLIENT_VERSION.to_string()
}
fn default_cache_dir() -> String {
    ".bin".to_string()
}
fn default_release_base_url() -> String {
    DEFAULT_RELEASE_BASE_URL.to_string()
}
fn default_program() -> String {
    "telepresence".to_string()
}
fn default_manager_namespace() -> String {
    "ambassador".to_string()
}
fn default_ready_timeout() -> String {
    "120s".to_string()
}
fn default_service() -> String {
    "fresh-app".to_string()
}
fn default_service_namespace() -> String {
    "app".to_string()
}
fn default_port() -> String {
    "8000".to_string()
}
fn default_kubectl() -> String {
    "kubectl".to_string()
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            version: default_version(),
            cache_dir: default_cache_dir(),
            release_base_url: default_release_base_url(),
            program: default_program(),
        }
    }
}

impl Default for ManagerSettings {
    fn default() -> Self {
        Self {
            namespace: default_manager_namespace(),
            ready_timeout: default_ready_timeout(),
        }
    }
}

impl Default for InterceptSettings {
    fn default() -> Self {
        Self {
            service: default_service(),
            namespace: default_service_namespace(),
            port: default_port(),
        }
    }
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            kubectl: default_kubectl(),
        }
    }
}

impl Settings {
    /// Load settings from a TOML file
    pub fn load(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse settings from TOML string
    pub fn from_toml(content: &str) -> crate::Result<Self> {
        toml::from_str(content).map_err(|e| TpError::ConfigParse(e.to_string()))
    }

    /// Readiness timeout as Duration
    pub fn ready_timeout(&self) -> crate::Result<Duration> {
        parse_duration(&self.manager.ready_timeout).ok_or_else(|| {
            TpError::ConfigParse(format!(
                "invalid manager.ready_timeout {:?} (expected e.g. \"120s\", \"5m\")",
                self.manager.ready_timeout
            ))
        })
    }
}

/// Parse duration string (e.g., "30s", "5m", "1h", "1d")
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    let (unit_start, _) = s.char_indices().last()?;
    let (num_str, unit) = s.split_at(unit_start);
    let num: u64 = num_str.parse().ok()?;

    let scale = match unit {
        "s" => 1,
        "m" => 60,
        "h" => 3600,
        "d" => 86400,
        _ => return None,
    };
    // Out-of-range values are rejected, not wrapped
    num.checked_mul(scale).map(Duration::from_secs)
}

/// Host OS and CPU architecture, as reported by the Rust target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    pub os: String,
    pub arch: String,
}

impl Platform {
    pub fn new(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            arch: arch.into(),
        }
    }

    pub fn current() -> Self {
        Self::new(std::env::consts::OS, std::env::consts::ARCH)
    }
}

/// Which session actions a run should perform
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestedActions {
    pub connect: bool,
    pub intercept: bool,
    pub leave: bool,
    pub quit: bool,
    pub status: bool,
}

impl RequestedActions {
    /// Intercept needs a session, so it implies connect.
    pub fn needs_session(&self) -> bool {
        self.connect || self.intercept
    }
}

/// Intercept flags the pinned client does not support. Accepted so existing
/// invocations keep working, but never forwarded to telepresence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InterceptOptions {
    pub preview_url: bool,
    pub http_header: Option<String>,
}

impl InterceptOptions {
    /// One note per ignored option, in a stable order
    pub fn ignored_notes(&self) -> Vec<String> {
        let mut notes = Vec::new();
        if self.preview_url {
            notes.push("(preview-url ignored)".to_string());
        }
        if let Some(header) = &self.http_header {
            notes.push(format!("(http-header {} ignored)", header));
        }
        notes
    }
}

/// Fully resolved configuration for one run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub pinned_version: String,
    pub client_program: String,
    pub kubectl_program: String,
    pub cache_dir: PathBuf,
    pub release_base_url: String,
    pub platform: Platform,
    pub manager_namespace: String,
    pub ready_timeout: Duration,
    pub poll_interval: Duration,
    pub actions: RequestedActions,
    pub target: InterceptTarget,
    pub leave_name: String,
    pub intercept_options: InterceptOptions,
}

impl RunConfig {
    /// Run config from settings alone, with no actions requested.
    pub fn from_settings(settings: &Settings) -> crate::Result<Self> {
        Ok(Self {
            pinned_version: settings.client.version.clone(),
            client_program: settings.client.program.clone(),
            kubectl_program: settings.tools.kubectl.clone(),
            cache_dir: PathBuf::from(&settings.client.cache_dir),
            release_base_url: settings
                .client
                .release_base_url
                .trim_end_matches('/')
                .to_string(),
            platform: Platform::current(),
            manager_namespace: settings.manager.namespace.clone(),
            ready_timeout: settings.ready_timeout()?,
            poll_interval: READY_POLL_INTERVAL,
            actions: RequestedActions::default(),
            target: InterceptTarget {
                service: settings.intercept.service.clone(),
                namespace: settings.intercept.namespace.clone(),
                local_port: settings.intercept.port.clone(),
            },
            leave_name: settings.intercept.service.clone(),
            intercept_options: InterceptOptions::default(),
        })
    }
}

impl RunConfig {
    /// Reject values that would escape the cache directory or the release URL.
    pub fn validate(&self) -> crate::Result<()> {
        if !is_release_tag(&self.pinned_version) {
            return Err(TpError::InvalidVersion(self.pinned_version.clone()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_parse() {
        let settings = Settings::from_toml(DEFAULT_SETTINGS).unwrap();
        assert_eq!(settings.client.version, "v2.24.0");
        assert_eq!(settings.manager.namespace, "ambassador");
        assert_eq!(settings.intercept.port, "8000");
        assert_eq!(settings.ready_timeout().unwrap(), Duration::from_secs(120));
    }

    #[test]
    fn test_partial_settings_fill_defaults() {
        let settings = Settings::from_toml("[intercept]\nservice = \"api\"\n").unwrap();
        assert_eq!(settings.intercept.service, "api");
        assert_eq!(settings.intercept.namespace, "app");
        assert_eq!(settings.client.program, "telepresence");
        assert_eq!(settings.tools.kubectl, "kubectl");
    }

    #[test]
    fn test_bad_settings_is_config_error() {
        let err = Settings::from_toml("[client\nversion = 1").unwrap_err();
        assert!(matches!(err, TpError::ConfigParse(_)));

        let settings = Settings::from_toml("[manager]\nready_timeout = \"soon\"\n").unwrap();
        assert!(matches!(settings.ready_timeout(), Err(TpError::ConfigParse(_))));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tpdev.toml");
        std::fs::write(&path, "[manager]\nnamespace = \"tp\"\nready_timeout = \"5m\"\n").unwrap();
        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.manager.namespace, "tp");
        assert_eq!(settings.ready_timeout().unwrap(), Duration::from_secs(300));
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("30s"), Some(Duration::from_secs(30)));
        assert_eq!(parse_duration("5m"), Some(Duration::from_secs(300)));
        assert_eq!(parse_duration("1h"), Some(Duration::from_secs(3600)));
        assert_eq!(parse_duration("2d"), Some(Duration::from_secs(172800)));
        assert_eq!(parse_duration("invalid"), None);
        assert_eq!(parse_duration(""), None);
    }

    #[test]
    fn test_parse_duration_overflow_rejected() {
        assert_eq!(parse_duration("999999999999999999d"), None);
        assert_eq!(parse_duration("18446744073709551615m"), None);
        assert_eq!(
            parse_duration("18446744073709551615s"),
            Some(Duration::from_secs(u64::MAX))
        );

        let settings = Settings::from_toml("[manager]\nready_timeout = \"999999999999999999d\"\n").unwrap();
        assert!(matches!(settings.ready_timeout(), Err(TpError::ConfigParse(_))));
    }

    #[test]
    fn test_run_config_from_settings() {
        let mut settings = Settings::default();
        settings.client.release_base_url = "https://mirror.example/releases/".to_string();
        let config = RunConfig::from_settings(&settings).unwrap();
        assert_eq!(config.release_base_url, "https://mirror.example/releases");
        assert_eq!(config.leave_name, "fresh-app");
        assert_eq!(config.poll_interval, READY_POLL_INTERVAL);
        assert!(!config.actions.needs_session());
    }

    #[test]
    fn test_run_config_rejects_path_like_version() {
        let mut config = RunConfig::from_settings(&Settings::default()).unwrap();
        assert!(config.validate().is_ok());

        config.pinned_version = "../x".to_string();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, TpError::InvalidVersion(ref v) if v == "../x"));
        assert_eq!(err.code(), "invalid_version");
    }

    #[test]
    fn test_ignored_intercept_notes() {
        let opts = InterceptOptions {
            preview_url: true,
            http_header: Some("x-user=me".to_string()),
        };
        assert_eq!(
            opts.ignored_notes(),
            vec!["(preview-url ignored)", "(http-header x-user=me ignored)"]
        );
        assert!(InterceptOptions::default().ignored_notes().is_empty());
    }
}
