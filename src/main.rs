// Main entrypoint for perflock: the lock daemon and its command wrapper.

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use perflock::app::App;
use perflock::config::{Config, ConfigTrait, GovernorSetting};
use perflock::runner::{self, RunOptions};
use perflock::shutdown::GracefulShutdown;

const CONFIG_PATH: &str = "cfg/perflock.cfg.yaml";
const CONFIG_PATH_LOCAL: &str = "cfg/perflock.cfg.local.yaml";

/// perflock - a locking wrapper for running benchmarks on shared hosts
///
/// Exclusive mode (the default) keeps every other perflock'd command from
/// running. Shared mode runs alongside other shared commands.
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about,
    override_usage = "perflock [OPTIONS] <COMMAND>...\n       perflock --list\n       perflock --daemon"
)]
struct Args {
    /// Start the perflock daemon
    #[arg(long, conflicts_with_all = ["list", "shared", "governor", "command"])]
    daemon: bool,

    /// Print current and pending commands
    #[arg(long, conflicts_with_all = ["shared", "governor", "command"])]
    list: bool,

    /// Daemon socket path; a leading '@' names an abstract socket
    #[arg(long, value_name = "PATH")]
    socket: Option<String>,

    /// Acquire the lock in shared mode
    #[arg(long)]
    shared: bool,

    /// Pin CPU frequency to PERCENT between min and max while the command
    /// runs, or "none" for no adjustment [default: 90%]
    #[arg(long, value_name = "PERCENT")]
    governor: Option<GovernorSetting>,

    /// Custom config file path
    #[arg(short, long, value_name = "FILE")]
    cfg: Option<PathBuf>,

    /// Command to run under the lock
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

/// Loads the configuration struct from YAML file.
/// Tries local config first, then the default config, then built-in defaults.
fn load_cfg(path: Option<&Path>) -> Result<(Config, Option<PathBuf>)> {
    if let Some(custom_path) = path {
        let cfg = Config::load(custom_path)
            .with_context(|| format!("failed to load custom config from {:?}", custom_path))?;
        return Ok((cfg, Some(custom_path.to_path_buf())));
    }

    for candidate in [CONFIG_PATH_LOCAL, CONFIG_PATH] {
        if Path::new(candidate).exists() {
            let cfg = Config::load(candidate).with_context(|| format!("failed to load config from {}", candidate))?;
            return Ok((cfg, Some(PathBuf::from(candidate))));
        }
    }

    Ok((Config::default(), None))
}

/// Configures structured logging on stderr.
///
/// The wrapper defaults to warnings only so that it stays out of the
/// wrapped command's output.
fn configure_logger(cfg: &Config, daemon: bool) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let log_level = match cfg.logs().and_then(|logs| logs.level.as_deref()) {
        Some(level) if daemon => level,
        _ if daemon => "info",
        _ => "warn",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    if cfg.is_prod() {
        // Production: JSON format
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else if daemon {
        // Development: Pretty console format
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().pretty().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact().without_time().with_target(false).with_writer(std::io::stderr))
            .init();
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    if !args.daemon && !args.list && args.command.is_empty() {
        Args::command()
            .error(clap::error::ErrorKind::MissingRequiredArgument, "a command to run is required")
            .exit();
    }

    let (mut cfg, cfg_path) = load_cfg(args.cfg.as_deref())?;
    if let Some(socket) = &args.socket {
        cfg.set_socket(socket.clone());
    }

    configure_logger(&cfg, args.daemon);
    if let Some(path) = &cfg_path {
        info!(
            component = "config",
            event = "load_success",
            path = ?path,
            "config loaded"
        );
    }

    let runtime = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;

    if args.daemon {
        return runtime.block_on(serve_daemon(cfg));
    }

    if args.list {
        for entry in runtime.block_on(runner::list(cfg.socket()))? {
            println!("{entry}");
        }
        return Ok(());
    }

    let opts = RunOptions {
        socket: cfg.socket().to_string(),
        shared: args.shared,
        governor: args.governor.unwrap_or_else(|| cfg.governor_setting()),
        command: args.command,
    };
    let code = runtime.block_on(runner::run(&opts))?;

    drop(runtime);
    std::process::exit(code);
}

async fn serve_daemon(cfg: Config) -> Result<()> {
    if cfg.metrics().is_some_and(|m| m.enabled) {
        let addr = cfg.metrics_addr()?;
        perflock::metrics::init_prometheus_exporter(addr)?;
        info!(
            component = "main",
            event = "metrics_listening",
            addr = %addr,
            "prometheus exporter started"
        );
    }

    let graceful_shutdown = GracefulShutdown::new(CancellationToken::new(), cfg.shutdown_timeout());
    let app = Arc::new(App::new(&cfg, graceful_shutdown.clone()));

    let served = tokio::spawn({
        let app = app.clone();
        async move { app.serve().await }
    });

    // Listen for OS signals or cancellation and wait for live sessions.
    if let Err(e) = graceful_shutdown.await_shutdown().await {
        error!(
            component = "main",
            scope = "service",
            event = "graceful_shutdown_failed",
            error = %e,
            "failed to gracefully shut down service"
        );
    }

    served.await.context("daemon task panicked")?
}
