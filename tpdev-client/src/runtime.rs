//! Run orchestration for the CLI
//!
//! One run: provision the client once, bootstrap the traffic manager, then
//! leave, quit, status, connect and intercept as requested, in that order.
//! Every step lands in the action log; fatal errors abort with the log so far.

use crate::intercept::InterceptController;
use crate::kube::Kubectl;
use crate::manager::ManagerBootstrapper;
use crate::provision::{AssetFetcher, Provisioner};
use crate::session::SessionController;
use crate::status::StatusReporter;
use crate::summary::{
    Attempt, ClientReport, ConnectReport, InterceptReport, LeaveReport, QuitReport, StatusReport,
    Summary,
};
use tpdev_core::{ActionLog, CommandRunner, InterceptResult, RunConfig, TpError};
use tracing::info;

/// A run that hit a fatal error, with what it had done before failing.
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct RunFailure {
    #[source]
    pub error: TpError,
    pub actions: ActionLog,
}

pub struct Orchestrator<'a> {
    config: &'a RunConfig,
    runner: &'a dyn CommandRunner,
    fetcher: &'a dyn AssetFetcher,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        config: &'a RunConfig,
        runner: &'a dyn CommandRunner,
        fetcher: &'a dyn AssetFetcher,
    ) -> Self {
        Self {
            config,
            runner,
            fetcher,
        }
    }

    pub fn run(&self) -> Result<Summary, RunFailure> {
        let mut log = ActionLog::new();
        match self.execute(&mut log) {
            Ok(mut summary) => {
                summary.actions = log;
                Ok(summary)
            }
            Err(error) => Err(RunFailure {
                error,
                actions: log,
            }),
        }
    }

    fn execute(&self, log: &mut ActionLog) -> tpdev_core::Result<Summary> {
        let config = self.config;
        let actions = config.actions;

        let binary = Provisioner::new(config, self.runner, self.fetcher).ensure_binary()?;
        info!(path = binary.path(), source = %binary.source(), "client resolved");
        log.push(format!(
            "client {} ({})",
            binary.version().unwrap_or("unknown version"),
            binary.source()
        ));

        let kubectl = Kubectl::new(&config.kubectl_program, self.runner);
        let manager = ManagerBootstrapper::new(&kubectl, &binary, self.runner)
            .with_poll_interval(config.poll_interval);
        let manager_report =
            manager.bootstrap(&config.manager_namespace, config.ready_timeout, log)?;

        let session = SessionController::new(&binary, self.runner);
        let intercepts = InterceptController::new(&binary, self.runner);

        let leave = if actions.leave {
            let result = intercepts.leave(&config.leave_name);
            log.push(if result.ok {
                format!("left {}", config.leave_name)
            } else {
                format!("leave failed ({})", config.leave_name)
            });
            Attempt::done(LeaveReport {
                name: config.leave_name.clone(),
                result,
            })
        } else {
            Attempt::skipped()
        };

        if actions.quit {
            let _ = session.quit();
            log.push("quit");
        }

        let status = if actions.status {
            let result = StatusReporter::new(&binary, self.runner).status();
            log.push(if result.ok() { "status" } else { "status failed" });
            Attempt::done(StatusReport { result })
        } else {
            Attempt::skipped()
        };

        let mut connect = Attempt::skipped();
        let mut intercept = Attempt::skipped();
        if actions.needs_session() {
            let target = &config.target;
            let namespace = if actions.intercept {
                if kubectl.ensure_namespace(&target.namespace)? {
                    log.push(format!("created namespace {}", target.namespace));
                }
                Some(target.namespace.as_str())
            } else {
                None
            };

            let connected = session.connect(namespace, log);

            if actions.intercept {
                let result = if connected.connected {
                    let result = intercepts.intercept(target, &config.intercept_options);
                    log.push(if result.intercepted {
                        "intercepted"
                    } else {
                        "intercept failed"
                    });
                    result
                } else {
                    log.push("intercept skipped (not connected)");
                    InterceptResult {
                        intercepted: false,
                        message: Some("skipped: not connected".to_string()),
                    }
                };
                intercept = Attempt::done(InterceptReport {
                    service: target.service.clone(),
                    namespace: target.namespace.clone(),
                    port: target.local_port.clone(),
                    result,
                });
            }

            connect = Attempt::done(ConnectReport {
                connected: connected.connected,
                retried: connected.retried,
                namespace: namespace.map(str::to_string),
                message: connected.message,
            });
        }

        Ok(Summary {
            client: ClientReport::new(&config.pinned_version, &binary),
            manager: manager_report,
            connect,
            intercept,
            leave,
            quit: QuitReport {
                attempted: actions.quit,
            },
            status,
            actions: ActionLog::new(),
        })
    }
}
