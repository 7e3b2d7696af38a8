use crate::constants::{DEFAULT_SSH_CONNECT_TIMEOUT_SECS, DEFAULT_SSH_USER};
use crate::error::{self, Result};
use crate::provider_error_for_cmd_output;
use cluster_agent::{ErrorKind, ProviderResult, RemoteExec};
use log::{debug, trace, warn};
use openssh::{KnownHosts, Session, SessionBuilder, Stdio};
use snafu::ResultExt;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Output;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Runs commands on cluster instances over SSH. One multiplexed session is kept per host.
pub struct SshExecutor {
    user: String,
    keyfile: Option<PathBuf>,
    connect_timeout: Duration,
    sessions: SessionCache<Session>,
}

/// Open sessions by host. A session that stopped working is evicted so the next call reconnects.
struct SessionCache<S> {
    sessions: Mutex<HashMap<String, Arc<S>>>,
}

impl<S> Default for SessionCache<S> {
    fn default() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
        }
    }
}

impl<S> SessionCache<S> {
    async fn get(&self, host: &str) -> Option<Arc<S>> {
        self.sessions.lock().await.get(host).map(Arc::clone)
    }

    /// Caches `session` unless another task connected to `host` first, in which case that
    /// session is kept and returned.
    async fn insert(&self, host: &str, session: S) -> Arc<S> {
        Arc::clone(
            self.sessions
                .lock()
                .await
                .entry(host.to_string())
                .or_insert_with(|| Arc::new(session)),
        )
    }

    /// Removes `stale` from the cache. A newer session for the same host is left alone.
    async fn evict(&self, host: &str, stale: &Arc<S>) {
        let mut sessions = self.sessions.lock().await;
        if sessions
            .get(host)
            .map_or(false, |cached| Arc::ptr_eq(cached, stale))
        {
            sessions.remove(host);
        }
    }
}

impl Default for SshExecutor {
    fn default() -> Self {
        Self::new(DEFAULT_SSH_USER)
    }
}

impl SshExecutor {
    pub fn new<S: Into<String>>(user: S) -> Self {
        Self {
            user: user.into(),
            keyfile: None,
            connect_timeout: Duration::from_secs(DEFAULT_SSH_CONNECT_TIMEOUT_SECS),
            sessions: SessionCache::default(),
        }
    }

    pub fn with_keyfile<P: Into<PathBuf>>(mut self, keyfile: P) -> Self {
        self.keyfile = Some(keyfile.into());
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Instances are recreated under reused addresses, so host keys are never pinned.
    async fn connect(&self, host: &str) -> Result<Session> {
        trace!("Opening SSH session to '{}@{}'", self.user, host);
        let mut builder = SessionBuilder::default();
        builder
            .user(self.user.clone())
            .known_hosts_check(KnownHosts::Accept)
            .user_known_hosts_file("/dev/null")
            .connect_timeout(self.connect_timeout);
        if let Some(keyfile) = &self.keyfile {
            builder.keyfile(keyfile);
        }
        ResultExt::context(
            builder.connect_mux(host).await,
            error::ConnectSnafu { host },
        )
    }

    /// The cached session of `host` if its control master still answers, otherwise a new one.
    async fn session(&self, host: &str) -> Result<Arc<Session>> {
        if let Some(session) = self.sessions.get(host).await {
            match session.check().await {
                Ok(()) => return Ok(session),
                Err(e) => {
                    debug!("SSH session to '{}' is gone ({}), reconnecting", host, e);
                    self.sessions.evict(host, &session).await;
                }
            }
        }
        let session = self.connect(host).await?;
        Ok(self.sessions.insert(host, session).await)
    }

    /// Runs `command` once on `session`.
    async fn exec_on(session: &Session, host: &str, command: &str, stdin: &str) -> Result<Output> {
        let mut child = ResultExt::context(
            session
                .raw_command(command)
                .stdin(if stdin.is_empty() {
                    Stdio::null()
                } else {
                    Stdio::piped()
                })
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .spawn()
                .await,
            error::SpawnSnafu { host, command },
        )?;

        if let Some(mut child_stdin) = child.stdin().take() {
            child_stdin
                .write_all(stdin.as_bytes())
                .await
                .context(error::WriteStdinSnafu { host, command })?;
            child_stdin
                .shutdown()
                .await
                .context(error::WriteStdinSnafu { host, command })?;
        }

        child
            .wait_with_output()
            .await
            .context(error::WaitSnafu { host, command })
    }

    /// Runs `command`, reconnecting once when the session breaks underneath it.
    async fn exec(&self, host: &str, command: &str, stdin: &str) -> Result<Output> {
        let session = self.session(host).await?;
        match Self::exec_on(&session, host, command, stdin).await {
            Err(e) if e.is_session_failure() => {
                warn!("SSH session to '{}' failed, retrying once: {}", host, e);
                self.sessions.evict(host, &session).await;
                let session = self.session(host).await?;
                Self::exec_on(&session, host, command, stdin).await
            }
            result => result,
        }
    }
}

#[async_trait::async_trait]
impl RemoteExec for SshExecutor {
    async fn run(
        &self,
        host: &str,
        command: &str,
        stdin: &str,
        sudo: bool,
    ) -> ProviderResult<String> {
        use cluster_agent::IntoProviderError;
        let command = remote_command_line(command, sudo);
        debug!("Running '{}' on '{}'", command, host);
        let output = IntoProviderError::context(
            self.exec(host, &command, stdin).await,
            ErrorKind::Remote,
            format!("Unable to run '{}' on '{}'", command, host),
        )?;
        provider_error_for_cmd_output(output, &command)
    }
}

fn remote_command_line(command: &str, sudo: bool) -> String {
    if sudo {
        format!("sudo {}", command)
    } else {
        command.to_string()
    }
}
