//! UCI engine process management
//!
//! Spawns the engine binary, performs the `uci`/`isready` handshake and
//! exposes the raw command/output streams to the coordinator. Stderr is
//! forwarded to the log and never influences a pending request.

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::scanner::contains_line;
use super::{EngineError, SessionState};

const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);
const READ_CHUNK: usize = 4096;

/// Where to find the engine and how to start it. Resolved once at startup.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Display name, also used in log fields
    pub name: String,
    pub executable: PathBuf,
    pub args: Vec<String>,
    /// Upper bound for `uciok`/`readyok` acknowledgements
    pub handshake_timeout: Duration,
}

impl EngineConfig {
    pub fn new(name: impl Into<String>, executable: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            executable: executable.into(),
            args: Vec::new(),
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        }
    }

    /// Selects the platform build below `base_dir`:
    /// `Windows/<binary>.exe`, `OSX/<binary>` or `Linux/<binary>`.
    pub fn for_host(
        name: impl Into<String>,
        base_dir: impl AsRef<Path>,
        binary: &str,
    ) -> Result<Self, EngineError> {
        let executable = platform_artifact(base_dir.as_ref(), binary, std::env::consts::OS)?;
        Ok(Self::new(name, executable))
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }
}

fn platform_artifact(base_dir: &Path, binary: &str, os: &str) -> Result<PathBuf, EngineError> {
    match os {
        "windows" => Ok(base_dir.join("Windows").join(format!("{binary}.exe"))),
        "macos" => Ok(base_dir.join("OSX").join(binary)),
        "linux" => Ok(base_dir.join("Linux").join(binary)),
        other => Err(EngineError::Unavailable(format!(
            "no {binary} build for platform '{other}'"
        ))),
    }
}

/// Per-session engine settings sent during the handshake
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineOptions {
    /// Playing strength passed as `UCI_Elo`
    pub elo: Option<u32>,
}

impl EngineOptions {
    pub fn with_elo(elo: u32) -> Self {
        Self { elo: Some(elo) }
    }
}

/// Kill switch for whatever sits behind a session's streams.
pub trait ProcessHandle: Send {
    /// Sends a kill signal. Must tolerate an already-dead process.
    fn kill(&mut self) -> io::Result<()>;

    fn id(&self) -> Option<u32> {
        None
    }
}

impl ProcessHandle for Child {
    fn kill(&mut self) -> io::Result<()> {
        Child::start_kill(self)
    }

    fn id(&self) -> Option<u32> {
        Child::id(self)
    }
}

/// Something that can produce handshaken sessions.
pub trait EngineLauncher: Send + Sync + 'static {
    fn launch(
        &self,
        options: &EngineOptions,
    ) -> impl Future<Output = Result<EngineSession, EngineError>> + Send;

    fn engine_name(&self) -> &str;
}

/// Launches real engine subprocesses from an [`EngineConfig`].
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    config: EngineConfig,
}

impl ProcessLauncher {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

impl EngineLauncher for ProcessLauncher {
    fn launch(
        &self,
        options: &EngineOptions,
    ) -> impl Future<Output = Result<EngineSession, EngineError>> + Send {
        spawn(&self.config, options)
    }

    fn engine_name(&self) -> &str {
        &self.config.name
    }
}

enum EngineOutput {
    Data(String),
    Closed,
}

/// One engine subprocess and its protocol state
pub struct EngineSession {
    name: String,
    state: SessionState,
    elo: Option<u32>,
    stdin: Box<dyn AsyncWrite + Send + Unpin>,
    output: mpsc::UnboundedReceiver<EngineOutput>,
    process: Box<dyn ProcessHandle>,
    reader: JoinHandle<()>,
    ready_timeout: Duration,
    closed: bool,
    killed: bool,
}

/// Starts the engine binary and completes the UCI handshake.
///
/// # Example
/// ```ignore
/// let config = EngineConfig::new("stockfish", "stockfish");
/// let session = spawn(&config, &EngineOptions::with_elo(1500)).await?;
/// ```
pub async fn spawn(
    config: &EngineConfig,
    options: &EngineOptions,
) -> Result<EngineSession, EngineError> {
    let mut child = Command::new(&config.executable)
        .args(&config.args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| match e.kind() {
            io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied => {
                EngineError::Unavailable(format!("{}: {e}", config.executable.display()))
            }
            _ => EngineError::Spawn(e.to_string()),
        })?;

    let stdin = child
        .stdin
        .take()
        .ok_or_else(|| EngineError::Spawn("Failed to open stdin".into()))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| EngineError::Spawn("Failed to open stdout".into()))?;
    if let Some(stderr) = child.stderr.take() {
        forward_diagnostics(config.name.clone(), stderr);
    }

    debug!(engine = %config.name, pid = ?child.id(), "engine spawned");

    let mut session = EngineSession::from_transport(&config.name, stdin, stdout, Box::new(child))
        .with_ready_timeout(config.handshake_timeout);

    if let Err(e) = session.handshake(options).await {
        warn!(engine = %config.name, error = %e, "engine handshake failed");
        session.terminate();
        return Err(e);
    }

    Ok(session)
}

fn forward_diagnostics<R>(engine: String, stderr: R)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            warn!(target: "engine::stderr", engine = %engine, "{line}");
        }
    });
}

fn spawn_reader<R>(mut stdout: R, tx: mpsc::UnboundedSender<EngineOutput>) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = vec![0u8; READ_CHUNK];
        loop {
            match stdout.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    let chunk = String::from_utf8_lossy(&buf[..n]).into_owned();
                    if tx.send(EngineOutput::Data(chunk)).is_err() {
                        return;
                    }
                }
                Err(e) => {
                    debug!(error = %e, "engine stdout read failed");
                    break;
                }
            }
        }
        let _ = tx.send(EngineOutput::Closed);
    })
}

impl EngineSession {
    /// Wraps an arbitrary command sink and output source.
    ///
    /// The session starts in [`SessionState::Spawned`]; call
    /// [`EngineSession::handshake`] before issuing commands.
    pub fn from_transport<W, R>(
        name: impl Into<String>,
        stdin: W,
        stdout: R,
        process: Box<dyn ProcessHandle>,
    ) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
        R: AsyncRead + Send + Unpin + 'static,
    {
        let (tx, output) = mpsc::unbounded_channel();
        let reader = spawn_reader(stdout, tx);

        Self {
            name: name.into(),
            state: SessionState::Spawned,
            elo: None,
            stdin: Box::new(stdin),
            output,
            process,
            reader,
            ready_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            closed: false,
            killed: false,
        }
    }

    pub fn with_ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = timeout;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn elo(&self) -> Option<u32> {
        self.elo
    }

    pub fn ready_timeout(&self) -> Duration {
        self.ready_timeout
    }

    /// True if a reset can bring the session back to `Ready`.
    pub fn is_reusable(&self) -> bool {
        !self.closed && matches!(self.state, SessionState::Ready | SessionState::Responded)
    }

    pub(crate) fn set_state(&mut self, state: SessionState) {
        debug!(engine = %self.name, from = %self.state, to = %state, "session state");
        self.state = state;
    }

    /// Sends `uci`, the options and `isready`, waiting for each acknowledgement.
    pub async fn handshake(&mut self, options: &EngineOptions) -> Result<(), EngineError> {
        if self.state != SessionState::Spawned {
            return Err(EngineError::NotReady(self.state));
        }

        self.send("uci").await?;
        self.wait_for_line("uciok").await?;
        self.set_state(SessionState::UciInitialized);

        if let Some(elo) = options.elo {
            self.send(&format!("setoption name UCI_Elo value {elo}")).await?;
        }
        self.elo = options.elo;

        self.send("isready").await?;
        self.wait_for_line("readyok").await?;
        self.set_state(SessionState::Ready);
        Ok(())
    }

    /// Re-applies options on a `Ready` session if they differ from the current ones.
    pub async fn apply_options(&mut self, options: &EngineOptions) -> Result<(), EngineError> {
        if self.state != SessionState::Ready {
            return Err(EngineError::NotReady(self.state));
        }
        if options.elo == self.elo || options.elo.is_none() {
            return Ok(());
        }
        if let Some(elo) = options.elo {
            self.send(&format!("setoption name UCI_Elo value {elo}")).await?;
        }
        self.send("isready").await?;
        self.wait_for_line("readyok").await?;
        self.elo = options.elo;
        Ok(())
    }

    /// Writes one command line to the engine.
    pub(crate) async fn send(&mut self, cmd: &str) -> Result<(), EngineError> {
        debug!(engine = %self.name, cmd, "engine <");
        let result = async {
            self.stdin.write_all(cmd.as_bytes()).await?;
            self.stdin.write_all(b"\n").await?;
            self.stdin.flush().await
        }
        .await;

        result.map_err(|e| match e.kind() {
            io::ErrorKind::BrokenPipe | io::ErrorKind::ConnectionReset => {
                self.closed = true;
                EngineError::Exited
            }
            _ => EngineError::Io(e),
        })
    }

    /// Next chunk of stdout, or `None` once the process has gone away.
    pub(crate) async fn next_output(&mut self) -> Option<String> {
        if self.closed {
            return None;
        }
        match self.output.recv().await {
            Some(EngineOutput::Data(chunk)) => {
                debug!(engine = %self.name, chunk = chunk.trim_end(), "engine >");
                Some(chunk)
            }
            Some(EngineOutput::Closed) | None => {
                self.closed = true;
                None
            }
        }
    }

    /// Drops output that arrived after the previous command resolved.
    pub(crate) fn discard_pending(&mut self) -> usize {
        let mut discarded = 0;
        while let Ok(message) = self.output.try_recv() {
            match message {
                EngineOutput::Data(_) => discarded += 1,
                EngineOutput::Closed => self.closed = true,
            }
        }
        discarded
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed
    }

    /// Reads output until a complete line equal to `keyword` shows up.
    pub(crate) async fn wait_for_line(&mut self, keyword: &str) -> Result<(), EngineError> {
        let limit = self.ready_timeout;
        let mut transcript = String::new();

        let wait = async {
            while let Some(chunk) = self.next_output().await {
                transcript.push_str(&chunk);
                if contains_line(&transcript, keyword) {
                    return Ok(());
                }
            }
            Err(EngineError::Handshake(format!(
                "engine exited before '{keyword}'"
            )))
        };

        match tokio::time::timeout(limit, wait).await {
            Ok(result) => result,
            Err(_) => Err(EngineError::Handshake(format!(
                "no '{keyword}' within {}ms",
                limit.as_millis()
            ))),
        }
    }

    /// Kills the process. Safe to call any number of times.
    pub fn terminate(&mut self) {
        if self.killed {
            return;
        }
        self.killed = true;

        if let Err(e) = self.process.kill() {
            debug!(engine = %self.name, error = %e, "kill failed (process already gone?)");
        }
        self.reader.abort();
        self.closed = true;
        self.state = SessionState::Terminated;
        debug!(engine = %self.name, pid = ?self.process.id(), "engine terminated");
    }
}

impl Drop for EngineSession {
    fn drop(&mut self) {
        self.terminate();
    }
}

impl std::fmt::Debug for EngineSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineSession")
            .field("name", &self.name)
            .field("state", &self.state)
            .field("elo", &self.elo)
            .field("closed", &self.closed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::{Reply, StubLauncher};

    #[test]
    fn test_platform_artifacts() {
        let base = Path::new("engines/komodo");
        assert_eq!(
            platform_artifact(base, "komodo-14.1-64bit", "windows").unwrap(),
            base.join("Windows").join("komodo-14.1-64bit.exe")
        );
        assert_eq!(
            platform_artifact(base, "komodo-14.1-64bit", "macos").unwrap(),
            base.join("OSX").join("komodo-14.1-64bit")
        );
        assert_eq!(
            platform_artifact(base, "komodo-14.1-64bit", "linux").unwrap(),
            base.join("Linux").join("komodo-14.1-64bit")
        );
        assert!(matches!(
            platform_artifact(base, "komodo", "haiku"),
            Err(EngineError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_executable_is_unavailable() {
        let config = EngineConfig::new("ghost", "/definitely/not/here/engine-binary");
        let err = spawn(&config, &EngineOptions::default()).await.unwrap_err();
        assert!(matches!(err, EngineError::Unavailable(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn test_handshake_sends_bootstrap_sequence() {
        let launcher = StubLauncher::new(|_, _| Reply::Move("e2e4".into()));
        let session = launcher.launch(&EngineOptions::with_elo(1800)).await.unwrap();

        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(session.elo(), Some(1800));
        assert_eq!(
            launcher.commands(),
            vec!["uci", "setoption name UCI_Elo value 1800", "isready"]
        );
    }

    #[tokio::test]
    async fn test_handshake_fails_when_engine_dies() {
        let launcher = StubLauncher::new(|_, _| Reply::Silent).exit_on_handshake();
        let err = launcher.launch(&EngineOptions::default()).await.unwrap_err();
        assert!(matches!(err, EngineError::Handshake(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn test_terminate_is_idempotent() {
        let launcher = StubLauncher::new(|_, _| Reply::Silent);
        let mut session = launcher.launch(&EngineOptions::default()).await.unwrap();

        session.terminate();
        session.terminate();
        drop(session);

        assert_eq!(launcher.kills(), 1);
    }

    #[tokio::test]
    #[ignore] // Requires stockfish on PATH
    async fn test_stockfish_handshake() {
        let config = EngineConfig::new("stockfish", "stockfish");
        let session = spawn(&config, &EngineOptions::with_elo(1500)).await.unwrap();
        assert_eq!(session.state(), SessionState::Ready);
    }
}
