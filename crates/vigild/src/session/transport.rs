//! SSH transport for remote command execution.
//!
//! The `SessionTransport` trait is the seam between the session
//! registry and the wire: production uses libssh2 driven from blocking
//! tasks, tests use an in-memory fake.

use crate::error::{AuditError, Result};
use async_trait::async_trait;
use ssh2::Session;
use std::io::Read;
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use vigil_common::{CommandResult, Credential, Target};

/// One open remote-execution context. Implementations must serialize
/// command execution internally: a session has exactly one owner.
#[async_trait]
pub trait SessionTransport: Send + Sync {
    /// Run a command, capturing stdout, stderr, and exit code verbatim.
    async fn exec(&self, command: &str, timeout_secs: u64) -> Result<CommandResult>;

    /// Close the underlying connection. Idempotent.
    async fn close(&self);
}

/// Establishes transports for targets. The seam that lets tests swap
/// in a fake without a reachable host.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, target: &Target, timeout_secs: u64)
        -> Result<Arc<dyn SessionTransport>>;
}

/// libssh2-backed transport. The session handle moves between blocking
/// tasks behind a mutex, which also enforces one command at a time.
pub struct SshTransport {
    session: Arc<Mutex<Session>>,
    addr: String,
}

impl SshTransport {
    /// Open a TCP connection, handshake, and authenticate per the
    /// target's credential method. The whole establishment is bounded
    /// by `timeout_secs`.
    pub async fn connect(target: &Target, timeout_secs: u64) -> Result<Self> {
        let addr = target.addr();
        let username = target.username.clone();
        let credential = target.credential.clone();
        let connect_addr = addr.clone();

        let session = tokio::task::spawn_blocking(move || {
            let sock_addr = connect_addr
                .to_socket_addrs()
                .map_err(|e| AuditError::connection(format!("{connect_addr}: {e}")))?
                .next()
                .ok_or_else(|| {
                    AuditError::connection(format!("{connect_addr}: no address resolved"))
                })?;

            let tcp = TcpStream::connect_timeout(&sock_addr, Duration::from_secs(timeout_secs))
                .map_err(|e| AuditError::connection(format!("{connect_addr}: {e}")))?;
            tcp.set_read_timeout(Some(Duration::from_secs(timeout_secs))).ok();
            tcp.set_write_timeout(Some(Duration::from_secs(timeout_secs))).ok();

            let mut sess = Session::new()
                .map_err(|e| AuditError::connection(format!("session init: {e}")))?;
            sess.set_tcp_stream(tcp);
            sess.set_timeout((timeout_secs * 1000) as u32);
            sess.handshake()
                .map_err(|e| AuditError::connection(format!("handshake: {e}")))?;

            match &credential {
                Credential::Password(password) => {
                    sess.userauth_password(&username, password)
                        .map_err(|e| AuditError::connection(format!("authentication: {e}")))?;
                }
                Credential::KeyFile(path) => {
                    sess.userauth_pubkey_file(&username, None, path, None)
                        .map_err(|e| AuditError::connection(format!("key authentication: {e}")))?;
                }
            }
            if !sess.authenticated() {
                return Err(AuditError::connection("authentication rejected"));
            }

            Ok::<Session, AuditError>(sess)
        })
        .await
        .map_err(|e| AuditError::connection(format!("connect task: {e}")))??;

        debug!("SSH session established to {}", addr);
        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            addr,
        })
    }
}

#[async_trait]
impl SessionTransport for SshTransport {
    async fn exec(&self, command: &str, timeout_secs: u64) -> Result<CommandResult> {
        let session = Arc::clone(&self.session);
        let command = command.to_string();
        let addr = self.addr.clone();

        tokio::task::spawn_blocking(move || {
            let started = Instant::now();
            let sess = session
                .lock()
                .map_err(|_| AuditError::connection(format!("{addr}: session poisoned")))?;
            sess.set_timeout((timeout_secs * 1000) as u32);

            let run = || -> std::result::Result<CommandResult, ssh2::Error> {
                let mut channel = sess.channel_session()?;
                channel.exec(&format!(
                    "sh -c {}",
                    shell_escape::escape(command.clone().into())
                ))?;

                let mut stdout = String::new();
                channel.read_to_string(&mut stdout).ok();
                let mut stderr = String::new();
                channel.stderr().read_to_string(&mut stderr).ok();

                channel.wait_close().ok();
                let exit_code = channel.exit_status().unwrap_or(-1);
                Ok(CommandResult::new(command.clone(), stdout, stderr, exit_code))
            };

            run().map_err(|e| {
                if started.elapsed() >= Duration::from_secs(timeout_secs) {
                    AuditError::CommandTimeout {
                        command: command.clone(),
                        timeout_secs,
                    }
                } else {
                    AuditError::connection(format!("{addr}: exec failed: {e}"))
                }
            })
        })
        .await
        .map_err(|e| AuditError::connection(format!("exec task: {e}")))?
    }

    async fn close(&self) {
        let session = Arc::clone(&self.session);
        let addr = self.addr.clone();
        let result = tokio::task::spawn_blocking(move || {
            if let Ok(sess) = session.lock() {
                sess.disconnect(None, "session closed", None).ok();
            }
        })
        .await;
        if result.is_err() {
            warn!("SSH disconnect task failed for {}", addr);
        }
        debug!("SSH session to {} closed", self.addr);
    }
}

/// Production connector: real SSH.
pub struct SshConnector;

#[async_trait]
impl Connector for SshConnector {
    async fn connect(
        &self,
        target: &Target,
        timeout_secs: u64,
    ) -> Result<Arc<dyn SessionTransport>> {
        let transport = SshTransport::connect(target, timeout_secs).await?;
        Ok(Arc::new(transport))
    }
}
