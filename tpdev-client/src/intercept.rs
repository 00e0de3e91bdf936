//! Intercept/leave for a single target

use crate::session::non_empty;
use tpdev_core::classify::{intercept_succeeded, leave_succeeded};
use tpdev_core::{
    BinaryHandle, CommandRunner, InterceptOptions, InterceptResult, InterceptTarget, LeaveResult,
};
use tracing::{debug, info};

/// Protocol suffix for the `--port` mapping
const PORT_PROTOCOL: &str = "http";

pub struct InterceptController<'a> {
    binary: &'a BinaryHandle,
    runner: &'a dyn CommandRunner,
}

impl<'a> InterceptController<'a> {
    pub fn new(binary: &'a BinaryHandle, runner: &'a dyn CommandRunner) -> Self {
        Self { binary, runner }
    }

    /// Route the target service's traffic to the local port.
    ///
    /// An intercept that already exists is success. `options` are never
    /// forwarded; each set option is noted at the top of the message.
    pub fn intercept(
        &self,
        target: &InterceptTarget,
        options: &InterceptOptions,
    ) -> InterceptResult {
        let port = format!("{}:{}", target.local_port, PORT_PROTOCOL);
        let args = ["intercept", target.service.as_str(), "--port", port.as_str()];
        let notes = options.ignored_notes();

        match self.runner.run(self.binary.path(), &args) {
            Ok(out) => {
                let intercepted = intercept_succeeded(&out);
                let text = if intercepted {
                    out.stdout.as_str()
                } else {
                    out.failure_text()
                };
                if intercepted {
                    info!(service = %target.service, exit_code = out.exit_code, "intercepted");
                } else {
                    debug!(service = %target.service, exit_code = out.exit_code, "intercept failed");
                }
                InterceptResult {
                    intercepted,
                    message: annotate(&notes, text),
                }
            }
            Err(e) => InterceptResult {
                intercepted: false,
                message: annotate(&notes, &e.to_string()),
            },
        }
    }

    /// Remove the named intercept. Leaving one that does not exist is success.
    pub fn leave(&self, name: &str) -> LeaveResult {
        match self.runner.run(self.binary.path(), &["leave", name]) {
            Ok(out) => {
                let ok = leave_succeeded(&out);
                debug!(name, ok, exit_code = out.exit_code, "leave");
                let text = if ok { out.stdout.as_str() } else { out.failure_text() };
                LeaveResult {
                    ok,
                    message: non_empty(text),
                }
            }
            Err(e) => LeaveResult {
                ok: false,
                message: Some(e.to_string()),
            },
        }
    }
}

fn annotate(notes: &[String], text: &str) -> Option<String> {
    let mut lines: Vec<&str> = notes.iter().map(String::as_str).collect();
    if !text.is_empty() {
        lines.push(text);
    }
    non_empty(&lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tpdev_core::{CommandOutput, ScriptedRunner};

    fn target() -> InterceptTarget {
        InterceptTarget {
            service: "fresh-app".to_string(),
            namespace: "app".to_string(),
            local_port: "8000".to_string(),
        }
    }

    fn binary() -> BinaryHandle {
        BinaryHandle::system("telepresence", "v2.24.0")
    }

    #[test]
    fn test_intercept_args() {
        let runner = ScriptedRunner::new();
        runner.reply("telepresence", &["intercept"], CommandOutput::new(0, "Using Deployment fresh-app", ""));
        let binary = binary();

        let result = InterceptController::new(&binary, &runner)
            .intercept(&target(), &InterceptOptions::default());
        assert!(result.intercepted);
        assert_eq!(result.message.as_deref(), Some("Using Deployment fresh-app"));
        assert_eq!(
            runner.calls()[0].args,
            ["intercept", "fresh-app", "--port", "8000:http"]
        );
    }

    #[test]
    fn test_intercept_twice_succeeds_twice() {
        let runner = ScriptedRunner::new();
        runner
            .reply("telepresence", &["intercept"], CommandOutput::new(0, "Using Deployment fresh-app", ""))
            .reply(
                "telepresence",
                &["intercept"],
                CommandOutput::new(1, "", "telepresence intercept: error: intercept fresh-app already exists"),
            );
        let binary = binary();
        let controller = InterceptController::new(&binary, &runner);

        assert!(controller.intercept(&target(), &InterceptOptions::default()).intercepted);
        assert!(controller.intercept(&target(), &InterceptOptions::default()).intercepted);
    }

    #[test]
    fn test_unsupported_options_annotated_not_forwarded() {
        let runner = ScriptedRunner::new();
        runner.reply("telepresence", &["intercept"], CommandOutput::new(1, "", "no such service fresh-app"));
        let binary = binary();
        let options = InterceptOptions {
            preview_url: true,
            http_header: Some("x-user=me".to_string()),
        };

        let result = InterceptController::new(&binary, &runner).intercept(&target(), &options);
        assert!(!result.intercepted);
        assert_eq!(
            result.message.as_deref(),
            Some("(preview-url ignored)\n(http-header x-user=me ignored)\nno such service fresh-app")
        );
        let args = &runner.calls()[0].args;
        assert!(!args.iter().any(|a| a.contains("preview") || a.contains("header")));
    }

    #[test]
    fn test_leave_missing_target_is_ok() {
        let runner = ScriptedRunner::new();
        runner.reply(
            "telepresence",
            &["leave", "nonexistent"],
            CommandOutput::new(1, "", "no such intercept nonexistent"),
        );
        let binary = binary();

        let result = InterceptController::new(&binary, &runner).leave("nonexistent");
        assert!(result.ok);
        assert_eq!(runner.calls()[0].args, ["leave", "nonexistent"]);
    }

    #[test]
    fn test_leave_twice_second_never_fails() {
        let runner = ScriptedRunner::new();
        runner
            .reply("telepresence", &["leave"], CommandOutput::new(0, "", ""))
            .reply("telepresence", &["leave"], CommandOutput::new(1, "", "intercept \"fresh-app\" not found"));
        let binary = binary();
        let controller = InterceptController::new(&binary, &runner);

        let first = controller.leave("fresh-app");
        let second = controller.leave("fresh-app");
        assert!(first.ok);
        assert_eq!(first.message, None);
        assert!(second.ok);
    }

    #[test]
    fn test_leave_real_failure() {
        let runner = ScriptedRunner::new();
        runner.reply("telepresence", &["leave"], CommandOutput::new(1, "", "unable to reach daemon"));
        let binary = binary();

        let result = InterceptController::new(&binary, &runner).leave("fresh-app");
        assert!(!result.ok);
        assert_eq!(result.message.as_deref(), Some("unable to reach daemon"));
    }
}
