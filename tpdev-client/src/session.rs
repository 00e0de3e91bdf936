//! Connect/quit against the cluster

use tpdev_core::classify::is_stale_cluster_config;
use tpdev_core::{ActionLog, BinaryHandle, CommandRunner, ConnectResult};
use tracing::{debug, info, warn};

/// What a best-effort quit observed. Callers are free to ignore it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuitOutcome {
    /// None when the client could not be started
    pub exit_code: Option<i32>,
}

pub struct SessionController<'a> {
    binary: &'a BinaryHandle,
    runner: &'a dyn CommandRunner,
}

impl<'a> SessionController<'a> {
    pub fn new(binary: &'a BinaryHandle, runner: &'a dyn CommandRunner) -> Self {
        Self { binary, runner }
    }

    /// Connect, optionally scoped to `namespace`.
    ///
    /// A first failure reporting "cluster configuration changed" gets one
    /// quit and one more attempt with the same arguments. Nothing else is
    /// retried.
    pub fn connect(&self, namespace: Option<&str>, log: &mut ActionLog) -> ConnectResult {
        let first = self.connect_once(namespace);
        if first.connected {
            log.push("connected");
            return first;
        }

        let stale = first
            .message
            .as_deref()
            .is_some_and(is_stale_cluster_config);
        if !stale {
            log.push("connect failed");
            return first;
        }

        warn!("cluster configuration changed; resetting daemon and reconnecting");
        log.push("connect failed (cluster configuration changed), retrying");
        let _ = self.quit();
        log.push("quit");

        let mut second = self.connect_once(namespace);
        second.retried = true;
        log.push(if second.connected {
            "connected"
        } else {
            "connect failed"
        });
        second
    }

    fn connect_once(&self, namespace: Option<&str>) -> ConnectResult {
        let mut args = vec!["connect"];
        if let Some(ns) = namespace {
            args.extend(["--namespace", ns]);
        }

        match self.runner.run(self.binary.path(), &args) {
            Ok(out) if out.success() => {
                info!(namespace, "connected");
                ConnectResult {
                    connected: true,
                    message: non_empty(&out.stdout),
                    retried: false,
                }
            }
            Ok(out) => {
                debug!(namespace, exit_code = out.exit_code, "connect failed");
                ConnectResult {
                    connected: false,
                    message: non_empty(out.failure_text()),
                    retried: false,
                }
            }
            Err(e) => ConnectResult {
                connected: false,
                message: Some(e.to_string()),
                retried: false,
            },
        }
    }

    /// Stop the daemons. Fire-and-forget: the outcome is only logged.
    pub fn quit(&self) -> QuitOutcome {
        match self.runner.run(self.binary.path(), &["quit"]) {
            Ok(out) => {
                debug!(exit_code = out.exit_code, "quit");
                QuitOutcome {
                    exit_code: Some(out.exit_code),
                }
            }
            Err(e) => {
                debug!(error = %e, "quit could not start");
                QuitOutcome { exit_code: None }
            }
        }
    }
}

pub(crate) fn non_empty(text: &str) -> Option<String> {
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tpdev_core::{CommandOutput, ScriptedRunner};

    const STALE: &str = "telepresence connect: error: Cluster configuration changed, please quit telepresence and reconnect";

    fn binary() -> BinaryHandle {
        BinaryHandle::system("telepresence", "v2.24.0")
    }

    #[test]
    fn test_connect_success_uses_stdout() {
        let runner = ScriptedRunner::new();
        runner.reply(
            "telepresence",
            &["connect"],
            CommandOutput::new(0, "Connected to context kind-dev", ""),
        );
        let binary = binary();
        let mut log = ActionLog::new();

        let result = SessionController::new(&binary, &runner).connect(None, &mut log);
        assert!(result.connected);
        assert!(!result.retried);
        assert_eq!(result.message.as_deref(), Some("Connected to context kind-dev"));
        assert_eq!(log.entries(), ["connected"]);
    }

    #[test]
    fn test_connect_scoped_to_namespace() {
        let runner = ScriptedRunner::new();
        runner.reply("telepresence", &["connect"], CommandOutput::new(0, "ok", ""));
        let binary = binary();

        SessionController::new(&binary, &runner).connect(Some("app"), &mut ActionLog::new());
        assert_eq!(runner.calls()[0].args, ["connect", "--namespace", "app"]);
    }

    #[test]
    fn test_other_failures_not_retried() {
        let runner = ScriptedRunner::new();
        runner.reply("telepresence", &["connect"], CommandOutput::new(1, "partial", ""));
        let binary = binary();
        let mut log = ActionLog::new();

        let result = SessionController::new(&binary, &runner).connect(None, &mut log);
        assert!(!result.connected);
        // stderr empty: falls back to stdout
        assert_eq!(result.message.as_deref(), Some("partial"));
        assert_eq!(runner.count("telepresence", &["connect"]), 1);
        assert_eq!(runner.count("telepresence", &["quit"]), 0);
        assert_eq!(log.entries(), ["connect failed"]);
    }

    #[test]
    fn test_stale_config_retried_once_with_quit_between() {
        let runner = ScriptedRunner::new();
        runner
            .reply("telepresence", &["connect"], CommandOutput::new(1, "", STALE))
            .reply("telepresence", &["connect"], CommandOutput::new(0, "Connected", ""))
            .reply("telepresence", &["quit"], CommandOutput::new(0, "", ""));
        let binary = binary();
        let mut log = ActionLog::new();

        let result = SessionController::new(&binary, &runner).connect(Some("app"), &mut log);
        assert!(result.connected);
        assert!(result.retried);

        let lines: Vec<String> = runner.calls().iter().map(|c| c.line()).collect();
        assert_eq!(
            lines,
            [
                "telepresence connect --namespace app",
                "telepresence quit",
                "telepresence connect --namespace app",
            ]
        );
        assert_eq!(log.entries().iter().filter(|a| *a == "quit").count(), 1);
        assert_eq!(log.entries().last().map(String::as_str), Some("connected"));
    }

    #[test]
    fn test_no_third_attempt() {
        let runner = ScriptedRunner::new();
        runner.reply("telepresence", &["connect"], CommandOutput::new(1, "", STALE));
        let binary = binary();
        let mut log = ActionLog::new();

        let result = SessionController::new(&binary, &runner).connect(None, &mut log);
        assert!(!result.connected);
        assert!(result.retried);
        assert_eq!(runner.count("telepresence", &["connect"]), 2);
        assert_eq!(runner.count("telepresence", &["quit"]), 1);
        assert_eq!(log.entries().last().map(String::as_str), Some("connect failed"));
    }

    #[test]
    fn test_launch_failure_becomes_result() {
        let runner = ScriptedRunner::new();
        runner.fail_launch("telepresence", &[]);
        let binary = binary();

        let controller = SessionController::new(&binary, &runner);
        let result = controller.connect(None, &mut ActionLog::new());
        assert!(!result.connected);
        assert!(result.message.unwrap().contains("Failed to launch telepresence"));
        assert_eq!(controller.quit(), QuitOutcome { exit_code: None });
    }
}
