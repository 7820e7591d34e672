//! [`RemoteExec`] over libssh2 with batch-mode authentication.
//!
//! Authentication never prompts: the SSH agent is tried first, then the
//! default identity files in `~/.ssh`. Unknown host keys are trusted and
//! recorded on first contact; a key that differs from the recorded one
//! rejects the host.

use std::io::Read;
use std::net::{SocketAddr, TcpStream};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use ssh2::{CheckResult, KnownHostFileKind, Session};
use tracing::debug;

use lanscope_common::error::RemoteExecError;

use super::RemoteExec;

const SSH_PORT: u16 = 22;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const SESSION_TIMEOUT: Duration = Duration::from_secs(15);
const IDENTITY_FILES: &[&str] = &["id_ed25519", "id_ecdsa", "id_rsa"];

/// Serializes read-modify-write cycles on `known_hosts` across sessions.
static KNOWN_HOSTS_LOCK: Mutex<()> = Mutex::new(());

pub struct SshExec {
    user: String,
    ssh_dir: Option<PathBuf>,
}

impl SshExec {
    pub fn new(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            ssh_dir: std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".ssh")),
        }
    }
}

#[async_trait]
impl RemoteExec for SshExec {
    async fn run(&self, host: &str, command: &str) -> Result<String, RemoteExecError> {
        let target = host.to_string();
        let user = self.user.clone();
        let command = command.to_string();
        let ssh_dir = self.ssh_dir.clone();

        let task = tokio::task::spawn_blocking(move || {
            exec_blocking(&target, &user, &command, ssh_dir.as_deref())
        });
        match tokio::time::timeout(SESSION_TIMEOUT, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(RemoteExecError::Command {
                host: host.to_string(),
                reason: e.to_string(),
            }),
            Err(_) => Err(RemoteExecError::Timeout(host.to_string())),
        }
    }
}

fn exec_blocking(
    host: &str,
    user: &str,
    command: &str,
    ssh_dir: Option<&Path>,
) -> Result<String, RemoteExecError> {
    let addr: SocketAddr = format!("{host}:{SSH_PORT}")
        .parse()
        .map_err(|e: std::net::AddrParseError| RemoteExecError::Connect(host.into(), e.to_string()))?;
    let tcp = TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT)
        .map_err(|e| RemoteExecError::Connect(host.into(), e.to_string()))?;

    let mut session = Session::new().map_err(|e| RemoteExecError::Handshake(host.into(), e.to_string()))?;
    session.set_timeout(SESSION_TIMEOUT.as_millis() as u32);
    session.set_tcp_stream(tcp);
    session
        .handshake()
        .map_err(|e| RemoteExecError::Handshake(host.into(), e.to_string()))?;

    if let Some(dir) = ssh_dir {
        trust_on_first_use(&session, host, &dir.join("known_hosts"))?;
    }
    authenticate(&session, host, user, ssh_dir)?;

    let command_err = |e: ssh2::Error| RemoteExecError::Command {
        host: host.into(),
        reason: e.to_string(),
    };
    let mut channel = session.channel_session().map_err(command_err)?;
    channel.exec(command).map_err(command_err)?;
    let mut output = String::new();
    channel
        .read_to_string(&mut output)
        .map_err(|e| RemoteExecError::Command {
            host: host.into(),
            reason: e.to_string(),
        })?;
    channel.wait_close().map_err(command_err)?;

    let status = channel.exit_status().map_err(command_err)?;
    if status != 0 {
        return Err(RemoteExecError::Command {
            host: host.into(),
            reason: format!("exit status {status}"),
        });
    }
    Ok(output)
}

fn authenticate(
    session: &Session,
    host: &str,
    user: &str,
    ssh_dir: Option<&Path>,
) -> Result<(), RemoteExecError> {
    if let Err(e) = session.userauth_agent(user) {
        debug!("{host}: agent authentication failed: {e}");
    }

    if !session.authenticated()
        && let Some(dir) = ssh_dir
    {
        for name in IDENTITY_FILES {
            let key = dir.join(name);
            if !key.is_file() {
                continue;
            }
            match session.userauth_pubkey_file(user, None, &key, None) {
                Ok(()) => break,
                Err(e) => debug!("{host}: key {} rejected: {e}", key.display()),
            }
        }
    }

    if session.authenticated() {
        Ok(())
    } else {
        Err(RemoteExecError::Auth {
            host: host.into(),
            user: user.into(),
        })
    }
}

fn trust_on_first_use(session: &Session, host: &str, known_hosts: &Path) -> Result<(), RemoteExecError> {
    let handshake_err = |e: ssh2::Error| RemoteExecError::Handshake(host.into(), e.to_string());
    let Some((key, key_type)) = session.host_key() else {
        return Err(RemoteExecError::Handshake(host.into(), "no host key offered".into()));
    };

    let _guard = KNOWN_HOSTS_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let mut known = session.known_hosts().map_err(handshake_err)?;
    if known_hosts.is_file()
        && let Err(e) = known.read_file(known_hosts, KnownHostFileKind::OpenSSH)
    {
        debug!("cannot read {}: {e}", known_hosts.display());
    }

    match known.check_port(host, SSH_PORT, key) {
        CheckResult::Match => Ok(()),
        CheckResult::Mismatch => Err(RemoteExecError::HostKeyMismatch(host.into())),
        CheckResult::NotFound | CheckResult::Failure => {
            known
                .add(host, key, host, key_type.into())
                .map_err(handshake_err)?;
            if let Err(e) = known.write_file(known_hosts, KnownHostFileKind::OpenSSH) {
                debug!("cannot record host key for {host}: {e}");
            }
            Ok(())
        }
    }
}
