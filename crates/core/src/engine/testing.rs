//! In-process stub engine for tests
//!
//! Speaks just enough UCI over a `tokio::io::duplex` pipe to exercise the
//! session, coordinator, pool and validator without a real binary.

use std::future::Future;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::oneshot;

use super::process::{EngineLauncher, EngineOptions, EngineSession, ProcessHandle};
use super::EngineError;

/// What the stub does when it receives `go`
#[derive(Debug, Clone)]
pub enum Reply {
    /// Prints some search info, then `bestmove <move>`
    Move(String),
    /// Prints the move in two separate writes, splitting the token
    Split(String),
    /// Never answers
    Silent,
    /// Closes its output as if the process crashed
    Exit,
}

type Responder = dyn Fn(&str, usize) -> Reply + Send + Sync;

#[derive(Default)]
struct Counters {
    launches: AtomicUsize,
    kills: AtomicUsize,
    commands: Mutex<Vec<String>>,
}

/// Launches stub sessions. `responder(fen, go_index)` decides each reply,
/// where `go_index` counts `go` commands across all launched sessions.
#[derive(Clone)]
pub struct StubLauncher {
    responder: Arc<Responder>,
    counters: Arc<Counters>,
    handshake_exit: HandshakeExit,
}

/// Which launches die on `uci`
#[derive(Debug, Clone, Copy)]
enum HandshakeExit {
    Never,
    Always,
    /// Only the launch with this 0-based index
    At(usize),
}

impl StubLauncher {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&str, usize) -> Reply + Send + Sync + 'static,
    {
        Self {
            responder: Arc::new(responder),
            counters: Arc::new(Counters::default()),
            handshake_exit: HandshakeExit::Never,
        }
    }

    /// Makes the stub die as soon as it receives `uci`.
    pub fn exit_on_handshake(mut self) -> Self {
        self.handshake_exit = HandshakeExit::Always;
        self
    }

    /// Makes only the `launch`-th session (0-based) die on `uci`.
    pub fn exit_on_handshake_at(mut self, launch: usize) -> Self {
        self.handshake_exit = HandshakeExit::At(launch);
        self
    }

    pub fn launches(&self) -> usize {
        self.counters.launches.load(Ordering::SeqCst)
    }

    pub fn kills(&self) -> usize {
        self.counters.kills.load(Ordering::SeqCst)
    }

    /// Every command line received by any stub, in arrival order.
    pub fn commands(&self) -> Vec<String> {
        self.counters
            .commands
            .lock()
            .map(|c| c.clone())
            .unwrap_or_default()
    }

    /// A raw session whose handshake has not run yet.
    pub fn raw_session(&self) -> EngineSession {
        let (session_side, engine_side) = tokio::io::duplex(8192);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let launch = self.counters.launches.fetch_add(1, Ordering::SeqCst);
        let exit_on_handshake = match self.handshake_exit {
            HandshakeExit::Never => false,
            HandshakeExit::Always => true,
            HandshakeExit::At(index) => index == launch,
        };

        tokio::spawn(run_stub(
            engine_side,
            shutdown_rx,
            Arc::clone(&self.responder),
            Arc::clone(&self.counters),
            exit_on_handshake,
        ));

        let (stdout, stdin) = tokio::io::split(session_side);
        let process = StubProcess {
            counters: Arc::clone(&self.counters),
            shutdown: Some(shutdown_tx),
        };
        EngineSession::from_transport("stub", stdin, stdout, Box::new(process))
    }
}

impl EngineLauncher for StubLauncher {
    fn launch(
        &self,
        options: &EngineOptions,
    ) -> impl Future<Output = Result<EngineSession, EngineError>> + Send {
        let mut session = self.raw_session();
        let options = options.clone();
        async move {
            session.handshake(&options).await?;
            Ok(session)
        }
    }

    fn engine_name(&self) -> &str {
        "stub"
    }
}

struct StubProcess {
    counters: Arc<Counters>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl ProcessHandle for StubProcess {
    fn kill(&mut self) -> io::Result<()> {
        self.counters.kills.fetch_add(1, Ordering::SeqCst);
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        Ok(())
    }
}

async fn run_stub(
    io: tokio::io::DuplexStream,
    mut shutdown: oneshot::Receiver<()>,
    responder: Arc<Responder>,
    counters: Arc<Counters>,
    exit_on_handshake: bool,
) {
    let (reader, mut writer) = tokio::io::split(io);
    let mut lines = BufReader::new(reader).lines();
    let mut fen = String::new();

    loop {
        let line = tokio::select! {
            _ = &mut shutdown => return,
            line = lines.next_line() => match line {
                Ok(Some(line)) => line,
                _ => return,
            },
        };

        if let Ok(mut log) = counters.commands.lock() {
            log.push(line.clone());
        }

        let reply = match line.as_str() {
            "uci" if exit_on_handshake => return,
            "uci" => "id name Stub\nid author tests\nuciok\n".to_string(),
            "isready" => "readyok\n".to_string(),
            "quit" => return,
            cmd if cmd.starts_with("position fen ") => {
                fen = cmd["position fen ".len()..].to_string();
                continue;
            }
            cmd if cmd.starts_with("go") => {
                let index = counters.commands_seen_go();
                match responder(&fen, index) {
                    Reply::Move(mv) => format!("info depth 1 score cp 20 pv {mv}\nbestmove {mv}\n"),
                    Reply::Split(mv) => {
                        let (head, tail) = mv.split_at(2);
                        let partial = format!("info depth 1\nbestmove {head}");
                        if writer.write_all(partial.as_bytes()).await.is_err() {
                            return;
                        }
                        let _ = writer.flush().await;
                        tokio::task::yield_now().await;
                        format!("{tail}\n")
                    }
                    Reply::Silent => continue,
                    Reply::Exit => return,
                }
            }
            _ => continue,
        };

        if writer.write_all(reply.as_bytes()).await.is_err() {
            return;
        }
        let _ = writer.flush().await;
    }
}

impl Counters {
    fn commands_seen_go(&self) -> usize {
        self.commands
            .lock()
            .map(|log| log.iter().filter(|c| c.starts_with("go")).count().saturating_sub(1))
            .unwrap_or(0)
    }
}
