//! Output classifiers for telepresence commands.
//!
//! Telepresence reports several "already in the desired state" conditions
//! as failures. Each operation gets one function here so the matching rules
//! live in one place and call sites only ask a yes/no question.

use crate::exec::CommandOutput;

const CONFIG_CHANGED: &[&str] = &["cluster configuration changed"];
const INTERCEPT_PRESENT: &[&str] = &["already exists", "already intercepted"];
const INTERCEPT_ABSENT: &[&str] = &["not found", "no such intercept"];

fn contains_any(text: &str, needles: &[&str]) -> bool {
    let lower = text.to_lowercase();
    needles.iter().any(|n| lower.contains(n))
}

/// Connect failed because the daemon holds stale cluster state; a quit
/// followed by one reconnect clears it.
pub fn is_stale_cluster_config(message: &str) -> bool {
    contains_any(message, CONFIG_CHANGED)
}

/// Intercept reached its end state: it ran, or the intercept was already active.
pub fn intercept_succeeded(output: &CommandOutput) -> bool {
    output.success() || contains_any(&output.combined(), INTERCEPT_PRESENT)
}

/// Leave reached its end state: it ran, or there was nothing to leave.
pub fn leave_succeeded(output: &CommandOutput) -> bool {
    output.success() || contains_any(&output.combined(), INTERCEPT_ABSENT)
}
