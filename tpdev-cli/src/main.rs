//! tpdev CLI - Pinned Telepresence setup for remote development
//!
//! Resolves configuration once (flags > env > tpdev.toml > defaults), runs the
//! orchestrator and prints a single JSON summary on stdout.

use clap::Parser;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tpdev_client::{HttpFetcher, Orchestrator, RunFailure, Summary};
use tpdev_core::{
    ActionLog, ErrorEnvelope, InterceptOptions, RequestedActions, RunConfig, Settings,
    SystemRunner,
};
use tracing::debug;

/// Settings file picked up from the working directory when --config is not given
const DEFAULT_SETTINGS_FILE: &str = "tpdev.toml";

#[derive(Parser, Debug)]
#[command(name = "tpdev")]
#[command(about = "Idempotent Telepresence setup for remote development", long_about = None)]
struct Cli {
    /// Namespace holding the traffic manager [default: ambassador]
    #[arg(long)]
    manager_namespace: Option<String>,

    /// Connect to the cluster
    #[arg(long)]
    connect: bool,

    /// Intercept the service (implies --connect into --service-namespace)
    #[arg(long)]
    intercept: bool,

    /// Leave the intercept named by --name
    #[arg(long)]
    leave: bool,

    /// Quit the telepresence daemons
    #[arg(long)]
    quit: bool,

    /// Report telepresence status
    #[arg(long)]
    status: bool,

    /// Service to intercept [default: fresh-app]
    #[arg(long)]
    service: Option<String>,

    /// Intercept to leave [default: value of --service]
    #[arg(long)]
    name: Option<String>,

    /// Namespace of the service to intercept [default: app]
    #[arg(long)]
    service_namespace: Option<String>,

    /// Local port receiving intercepted traffic [default: 8000]
    #[arg(long, value_parser = parse_port)]
    port: Option<String>,

    /// Accepted for compatibility; the pinned client does not support it
    #[arg(long)]
    preview_url: bool,

    /// Accepted for compatibility (e.g., x-user=me); not forwarded
    #[arg(long)]
    http_header: Option<String>,

    /// Telepresence client version to pin [default: v2.24.0]
    #[arg(long = "client-version", env = "TELEPRESENCE_VERSION")]
    client_version: Option<String>,

    /// How long to wait for the traffic manager (e.g., 120s, 5m) [default: 120s]
    #[arg(long, value_parser = parse_timeout)]
    ready_timeout: Option<Duration>,

    /// Directory for downloaded clients [default: .bin]
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Settings file [default: ./tpdev.toml when present]
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print a human-readable report instead of JSON
    #[arg(long)]
    text: bool,
}

fn main() {
    let cli = Cli::parse();
    init_tracing();

    match run(&cli) {
        Ok(summary) => {
            if cli.text {
                print_text(&summary);
            } else {
                match summary.to_json_pretty() {
                    Ok(body) => println!("{}", body),
                    Err(e) => {
                        report_failure(&e, &ActionLog::new(), false);
                        std::process::exit(1);
                    }
                }
            }
        }
        Err(failure) => {
            report_failure(&failure.error, &failure.actions, cli.text);
            std::process::exit(1);
        }
    }
}

fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    // stdout carries the summary; logs go to stderr
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_env("TPDEV_LOG")
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn run(cli: &Cli) -> Result<Summary, RunFailure> {
    let config = resolve_config(cli, Path::new(DEFAULT_SETTINGS_FILE)).map_err(|error| {
        RunFailure {
            error,
            actions: ActionLog::new(),
        }
    })?;
    debug!(
        version = %config.pinned_version,
        manager_namespace = %config.manager_namespace,
        cache_dir = %config.cache_dir.display(),
        ready_timeout = ?config.ready_timeout,
        actions = ?config.actions,
        "resolved configuration"
    );

    let fetcher = HttpFetcher::new();
    Orchestrator::new(&config, &SystemRunner, &fetcher).run()
}

/// Build the run configuration. `default_settings` is read only when it exists.
fn resolve_config(cli: &Cli, default_settings: &Path) -> tpdev_core::Result<RunConfig> {
    let settings = match &cli.config {
        Some(path) => Settings::load(path)?,
        None if default_settings.is_file() => Settings::load(default_settings)?,
        None => Settings::default(),
    };
    let mut config = RunConfig::from_settings(&settings)?;

    if let Some(version) = &cli.client_version {
        config.pinned_version = version.clone();
    }
    if let Some(ns) = &cli.manager_namespace {
        config.manager_namespace = ns.clone();
    }
    if let Some(timeout) = cli.ready_timeout {
        config.ready_timeout = timeout;
    }
    if let Some(dir) = &cli.cache_dir {
        config.cache_dir = dir.clone();
    }
    if let Some(service) = &cli.service {
        config.target.service = service.clone();
    }
    if let Some(ns) = &cli.service_namespace {
        config.target.namespace = ns.clone();
    }
    if let Some(port) = &cli.port {
        config.target.local_port = port.clone();
    }

    config.leave_name = cli
        .name
        .clone()
        .unwrap_or_else(|| config.target.service.clone());
    config.actions = RequestedActions {
        connect: cli.connect,
        intercept: cli.intercept,
        leave: cli.leave,
        quit: cli.quit,
        status: cli.status,
    };
    config.intercept_options = InterceptOptions {
        preview_url: cli.preview_url,
        http_header: cli.http_header.clone(),
    };
    config.validate()?;
    Ok(config)
}

fn parse_port(s: &str) -> Result<String, String> {
    match s.parse::<u16>() {
        Ok(0) | Err(_) => Err(format!("invalid port {:?} (expected 1-65535)", s)),
        Ok(_) => Ok(s.to_string()),
    }
}

fn parse_timeout(s: &str) -> Result<Duration, String> {
    tpdev_core::config::parse_duration(s)
        .ok_or_else(|| format!("invalid duration {:?} (expected e.g. 120s, 5m)", s))
}

fn report_failure(error: &tpdev_core::TpError, actions: &ActionLog, text: bool) {
    use colored::Colorize;

    if text {
        eprintln!("{}: {}", "Error".red(), error);
        let hint = error.hint();
        if !hint.is_empty() {
            eprintln!("{}: {}", "Hint".yellow(), hint);
        }
        print_actions(actions, true);
        return;
    }

    let envelope = ErrorEnvelope::from(error);
    let body = serde_json::json!({
        "code": envelope.code,
        "message": envelope.message,
        "hint": envelope.hint,
        "actions": actions,
    });
    match serde_json::to_string_pretty(&body) {
        Ok(s) => eprintln!("{}", s),
        Err(_) => eprintln!("Error: {}", error),
    }
}

fn print_actions(actions: &ActionLog, to_stderr: bool) {
    use colored::Colorize;

    if actions.is_empty() {
        return;
    }
    let header = format!("{}:", "Actions".blue());
    let lines = actions
        .entries()
        .iter()
        .enumerate()
        .map(|(i, a)| format!("  {}. {}", i + 1, a));
    if to_stderr {
        eprintln!("{}", header);
        lines.for_each(|l| eprintln!("{}", l));
    } else {
        println!("{}", header);
        lines.for_each(|l| println!("{}", l));
    }
}

fn print_text(summary: &Summary) {
    use colored::Colorize;

    let client = &summary.client;
    println!(
        "{}: {} ({}) {}",
        "Client".blue(),
        client.used_version.as_deref().unwrap_or("unknown"),
        client.source,
        client.path.dimmed()
    );
    if client.used_version.as_deref() != Some(client.version_pinned.as_str()) {
        println!("{}: pinned {}", "Note".yellow(), client.version_pinned);
    }

    let manager = &summary.manager;
    let state = if manager.ready {
        format!("ready ({} replicas)", manager.available_replicas).green()
    } else {
        "not ready".yellow()
    };
    println!(
        "{}: {} {}{}",
        "Manager".blue(),
        manager.namespace,
        state,
        if manager.installed_this_run {
            " (installed)"
        } else {
            ""
        }
    );

    if let Some(leave) = &summary.leave.detail {
        let outcome = if leave.result.ok {
            "left".green()
        } else {
            "failed".red()
        };
        println!("{}: {} {}", "Leave".blue(), leave.name, outcome);
        print_message(leave.result.message.as_deref(), leave.result.ok);
    }

    if summary.quit.attempted {
        println!("{}: {}", "Quit".blue(), "done".green());
    }

    if let Some(status) = &summary.status.detail {
        if let Some(body) = status.result.structured_body() {
            let pretty = serde_json::to_string_pretty(body).unwrap_or_default();
            println!("{}:\n{}", "Status".blue(), pretty);
        } else {
            println!("{}: {}", "Status".blue(), "unavailable".yellow());
            print_message(status.result.raw_body(), false);
        }
    }

    if let Some(connect) = &summary.connect.detail {
        let outcome = if connect.connected {
            "connected".green()
        } else {
            "failed".red()
        };
        let scope = connect
            .namespace
            .as_ref()
            .map(|ns| format!(" to {}", ns))
            .unwrap_or_default();
        let retried = if connect.retried { " (after reset)" } else { "" };
        println!("{}: {}{}{}", "Connect".blue(), outcome, scope, retried);
        print_message(connect.message.as_deref(), connect.connected);
    }

    if let Some(intercept) = &summary.intercept.detail {
        let outcome = if intercept.result.intercepted {
            "intercepted".green()
        } else {
            "failed".red()
        };
        println!(
            "{}: {}.{} -> localhost:{} {}",
            "Intercept".blue(),
            intercept.service.cyan(),
            intercept.namespace,
            intercept.port,
            outcome
        );
        print_message(intercept.result.message.as_deref(), intercept.result.intercepted);
    }

    print_actions(&summary.actions, false);
}

fn print_message(message: Option<&str>, ok: bool) {
    use colored::Colorize;

    if let Some(message) = message {
        for line in message.lines() {
            if ok {
                println!("  {}", line.dimmed());
            } else {
                println!("  {}", line.red());
            }
        }
    }
}
