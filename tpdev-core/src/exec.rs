//! Process execution for kubectl and the telepresence client
//!
//! Commands run to completion with captured output. A non-zero exit is an
//! ordinary result for callers to inspect; only a failure to start the
//! process is an error.

use crate::TpError;
use std::process::{Command, Stdio};

/// Captured result of a finished command, output trimmed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn new(exit_code: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: stdout.into().trim().to_string(),
            stderr: stderr.into().trim().to_string(),
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// stderr when present, stdout otherwise
    pub fn failure_text(&self) -> &str {
        if self.stderr.is_empty() {
            &self.stdout
        } else {
            &self.stderr
        }
    }

    /// stderr followed by stdout, for pattern matching over everything the tool said
    pub fn combined(&self) -> String {
        format!("{}{}", self.stderr, self.stdout)
    }
}

/// Seam over process execution so components can be driven without a cluster.
pub trait CommandRunner {
    fn run(&self, program: &str, args: &[&str]) -> crate::Result<CommandOutput>;
}

/// Runs commands on the host via `std::process::Command`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[&str]) -> crate::Result<CommandOutput> {
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| TpError::Launch {
                program: program.to_string(),
                source,
            })?;

        // Signal-terminated processes have no exit code
        let exit_code = output.status.code().unwrap_or(-1);
        Ok(CommandOutput::new(
            exit_code,
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr),
        ))
    }
}

#[cfg(any(test, feature = "testing"))]
pub use scripted::{RecordedCall, ScriptedRunner};

#[cfg(any(test, feature = "testing"))]
mod scripted {
    use super::{CommandOutput, CommandRunner};
    use crate::TpError;
    use std::cell::RefCell;
    use std::collections::VecDeque;

    /// A command invocation seen by [`ScriptedRunner`]
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct RecordedCall {
        pub program: String,
        pub args: Vec<String>,
    }

    impl RecordedCall {
        pub fn line(&self) -> String {
            let mut parts = vec![self.program.clone()];
            parts.extend(self.args.iter().cloned());
            parts.join(" ")
        }
    }

    enum Reply {
        Output(CommandOutput),
        LaunchFailure,
    }

    struct Rule {
        program: String,
        prefix: Vec<String>,
        replies: VecDeque<Reply>,
    }

    impl Rule {
        fn matches(&self, program: &str, args: &[&str]) -> bool {
            self.program == program
                && self.prefix.len() <= args.len()
                && self.prefix.iter().zip(args).all(|(want, got)| want == got)
        }
    }

    /// Replays canned outputs keyed by program and argument prefix.
    ///
    /// Replies queued for the same rule are consumed in order; the last one is
    /// sticky and answers every later call. The first matching rule wins, so
    /// register narrower prefixes first. Unscripted calls exit 127.
    #[derive(Default)]
    pub struct ScriptedRunner {
        rules: RefCell<Vec<Rule>>,
        calls: RefCell<Vec<RecordedCall>>,
    }

    impl ScriptedRunner {
        pub fn new() -> Self {
            Self::default()
        }

        /// Queue an output for calls to `program` whose args start with `prefix`.
        pub fn reply(&self, program: &str, prefix: &[&str], output: CommandOutput) -> &Self {
            self.push(program, prefix, Reply::Output(output));
            self
        }

        /// Queue a launch failure (as if `program` was missing from PATH).
        pub fn fail_launch(&self, program: &str, prefix: &[&str]) -> &Self {
            self.push(program, prefix, Reply::LaunchFailure);
            self
        }

        pub fn calls(&self) -> Vec<RecordedCall> {
            self.calls.borrow().clone()
        }

        /// Number of recorded calls to `program` whose args start with `prefix`
        pub fn count(&self, program: &str, prefix: &[&str]) -> usize {
            self.calls
                .borrow()
                .iter()
                .filter(|c| {
                    c.program == program
                        && c.args.len() >= prefix.len()
                        && c.args.iter().zip(prefix).all(|(got, want)| got == want)
                })
                .count()
        }

        fn push(&self, program: &str, prefix: &[&str], reply: Reply) {
            let mut rules = self.rules.borrow_mut();
            if let Some(rule) = rules.iter_mut().find(|r| {
                r.program == program
                    && r.prefix.len() == prefix.len()
                    && r.prefix.iter().zip(prefix).all(|(a, b)| a == b)
            }) {
                rule.replies.push_back(reply);
                return;
            }
            rules.push(Rule {
                program: program.to_string(),
                prefix: prefix.iter().map(|s| s.to_string()).collect(),
                replies: VecDeque::from([reply]),
            });
        }
    }

    impl CommandRunner for ScriptedRunner {
        fn run(&self, program: &str, args: &[&str]) -> crate::Result<CommandOutput> {
            self.calls.borrow_mut().push(RecordedCall {
                program: program.to_string(),
                args: args.iter().map(|s| s.to_string()).collect(),
            });

            let mut rules = self.rules.borrow_mut();
            let Some(rule) = rules.iter_mut().find(|r| r.matches(program, args)) else {
                return Ok(CommandOutput::new(127, "", format!("unscripted: {program}")));
            };

            let reply = if rule.replies.len() > 1 {
                rule.replies.pop_front()
            } else {
                None
            };
            match reply.as_ref().or(rule.replies.front()) {
                Some(Reply::Output(out)) => Ok(out.clone()),
                Some(Reply::LaunchFailure) | None => Err(TpError::Launch {
                    program: program.to_string(),
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
                }),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_trimmed() {
        let out = CommandOutput::new(0, "  hello\n", "\n");
        assert_eq!(out.stdout, "hello");
        assert_eq!(out.stderr, "");
        assert!(out.success());
    }

    #[test]
    fn test_failure_text_prefers_stderr() {
        let out = CommandOutput::new(1, "out", "err");
        assert_eq!(out.failure_text(), "err");
        let out = CommandOutput::new(1, "out", "");
        assert_eq!(out.failure_text(), "out");
    }

    #[cfg(unix)]
    #[test]
    fn test_system_runner_nonzero_is_not_error() {
        let out = SystemRunner
            .run("sh", &["-c", "echo ' out '; echo err >&2; exit 3"])
            .unwrap();
        assert_eq!(out.exit_code, 3);
        assert_eq!(out.stdout, "out");
        assert_eq!(out.stderr, "err");
    }

    #[test]
    fn test_system_runner_missing_binary_is_launch_error() {
        let err = SystemRunner
            .run("tpdev-definitely-not-a-real-binary", &["version"])
            .unwrap_err();
        assert!(matches!(err, TpError::Launch { ref program, .. } if program == "tpdev-definitely-not-a-real-binary"));
    }

    #[test]
    fn test_scripted_runner_replays_in_order_then_sticks() {
        let runner = ScriptedRunner::new();
        runner
            .reply("tp", &["connect"], CommandOutput::new(1, "", "first"))
            .reply("tp", &["connect"], CommandOutput::new(0, "second", ""));

        assert_eq!(runner.run("tp", &["connect"]).unwrap().stderr, "first");
        assert_eq!(runner.run("tp", &["connect"]).unwrap().stdout, "second");
        assert_eq!(runner.run("tp", &["connect", "--namespace", "app"]).unwrap().stdout, "second");
        assert_eq!(runner.count("tp", &["connect"]), 3);
    }

    #[test]
    fn test_scripted_runner_unscripted_and_launch_failure() {
        let runner = ScriptedRunner::new();
        runner.fail_launch("kubectl", &[]);

        assert_eq!(runner.run("tp", &["status"]).unwrap().exit_code, 127);
        assert!(matches!(
            runner.run("kubectl", &["get", "ns"]),
            Err(TpError::Launch { .. })
        ));
        assert_eq!(runner.calls().len(), 2);
        assert_eq!(runner.calls()[1].line(), "kubectl get ns");
    }
}
