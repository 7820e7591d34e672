//! Subprocess execution for the OS introspection tools (`ip`, `ping`, `fping`,
//! `nmap`, `tracepath`, `traceroute`).

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, bail};
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::debug;

#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Captured stdout, whatever the exit status. `None` when the program is
    /// missing, cannot be spawned, or exceeds `timeout`.
    async fn output(&self, program: &str, args: &[&str], timeout: Duration) -> Option<String>;

    /// Hands each stdout line to `on_line` as it arrives. The child is killed
    /// when `timeout` expires.
    async fn stream(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
        on_line: &mut (dyn FnMut(&str) + Send),
    ) -> anyhow::Result<()>;

    /// Whether `program` resolves to an executable on `PATH`.
    fn has_program(&self, program: &str) -> bool;
}

pub struct SystemRunner;

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn output(&self, program: &str, args: &[&str], timeout: Duration) -> Option<String> {
        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .output();

        match tokio::time::timeout(timeout, child).await {
            Ok(Ok(out)) => Some(String::from_utf8_lossy(&out.stdout).into_owned()),
            Ok(Err(e)) => {
                debug!("Command {program} failed: {e}");
                None
            }
            Err(_) => {
                debug!("Command {program} timed out after {}s", timeout.as_secs());
                None
            }
        }
    }

    async fn stream(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
        on_line: &mut (dyn FnMut(&str) + Send),
    ) -> anyhow::Result<()> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("spawning {program}"))?;

        let stdout = child.stdout.take().context("child stdout was not captured")?;
        let mut lines = BufReader::new(stdout).lines();

        let read_all = async {
            while let Some(line) = lines.next_line().await? {
                on_line(&line);
            }
            Ok::<_, std::io::Error>(())
        };

        let outcome = tokio::time::timeout(timeout, read_all).await;
        match outcome {
            Ok(read) => {
                read.with_context(|| format!("reading {program} output"))?;
                child.wait().await.with_context(|| format!("waiting for {program}"))?;
                Ok(())
            }
            Err(_) => {
                let _ = child.start_kill();
                let _ = child.wait().await;
                bail!("{program} timed out after {}s", timeout.as_secs())
            }
        }
    }

    fn has_program(&self, program: &str) -> bool {
        find_in_path(program, std::env::var_os("PATH").as_deref())
    }
}

fn find_in_path(program: &str, path: Option<&std::ffi::OsStr>) -> bool {
    let Some(path) = path else {
        return false;
    };
    std::env::split_paths(path).any(|dir| is_executable(&dir.join(program)))
}

#[cfg(unix)]
fn is_executable(candidate: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    candidate
        .metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(candidate: &Path) -> bool {
    candidate.is_file()
}
