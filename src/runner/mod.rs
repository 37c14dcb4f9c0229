//! Client mode: take the lock, optionally pin the CPU frequency, run a
//! command and report its exit status.

use anyhow::{anyhow, Context, Result};
use std::io;
use std::process::ExitStatus;
use tokio::process::{Child, Command};
use tokio::signal::unix::{signal, SignalKind};
use tracing::{debug, warn};

use crate::client::Client;
use crate::config::GovernorSetting;

/// What to run and how to lock for it.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub socket: String,
    pub shared: bool,
    pub governor: GovernorSetting,
    pub command: Vec<String>,
}

/// Prints the lock queue, head first.
pub async fn list(socket: &str) -> Result<Vec<String>> {
    let mut client = Client::connect(socket).await?;
    Ok(client.list().await?)
}

/// Runs the command under the lock and returns its exit code.
///
/// The lock is held until the command exits. Interrupt and quit signals sent
/// to the wrapper are forwarded to the command instead of ending the wrapper.
pub async fn run(opts: &RunOptions) -> Result<i32> {
    let (program, args) = opts.command.split_first().ok_or_else(|| anyhow!("no command given"))?;
    let label = shell_words::join(&opts.command);

    let mut client = Client::connect(&opts.socket).await?;
    acquire(&mut client, opts.shared, &label).await?;

    if let (false, GovernorSetting::Percent(percent)) = (opts.shared, opts.governor) {
        if let Err(e) = client.set_governor(percent).await {
            warn!(
                component = "runner",
                event = "governor_failed",
                percent,
                error = %e,
                "running without governor adjustment"
            );
        }
    }

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigquit = signal(SignalKind::quit())?;

    let mut child = Command::new(program)
        .args(args)
        .spawn()
        .with_context(|| format!("starting {program}"))?;

    let status = loop {
        tokio::select! {
            status = child.wait() => break status.with_context(|| format!("waiting for {program}"))?,
            _ = sigint.recv() => forward(&child, libc::SIGINT, "SIGINT"),
            _ = sigquit.recv() => forward(&child, libc::SIGQUIT, "SIGQUIT"),
        }
    };

    drop(client);
    exit_code(&label, status)
}

async fn acquire(client: &mut Client, shared: bool, label: &str) -> Result<()> {
    if client.acquire(shared, true, label).await? {
        return Ok(());
    }

    let queue = client.list().await?;
    eprintln!("Waiting for lock...");
    for entry in &queue {
        eprintln!("{entry}");
    }

    // A blocking request is always granted eventually.
    client.acquire(shared, false, label).await?;
    Ok(())
}

fn forward(child: &Child, signal: libc::c_int, name: &'static str) {
    // Already reaped; nothing left to signal.
    let Some(pid) = child.id() else {
        return;
    };

    // SAFETY: kill(2) takes plain integers and touches no memory of ours.
    if unsafe { libc::kill(pid as libc::pid_t, signal) } == 0 {
        debug!(component = "runner", event = "signal_forwarded", signal = name, pid, "forwarded to the command");
    } else {
        warn!(
            component = "runner",
            event = "signal_forward_failed",
            signal = name,
            pid,
            error = %io::Error::last_os_error(),
            "failed to forward signal"
        );
    }
}

fn exit_code(label: &str, status: ExitStatus) -> Result<i32> {
    status.code().ok_or_else(|| anyhow!("{label}: {status}"))
}
