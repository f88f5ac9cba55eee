//! Out-of-process diff backend.
//!
//! The child process reads one JSON request per line on stdin and answers
//! each request with a single `<id>:<json>` line on stdout. A keep-alive
//! `{"ping":true}` line is written periodically so the child can exit on
//! its own once its parent disappears.

use std::collections::HashMap;
use std::ffi::OsString;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::diff::backend::DiffBackend;
use crate::diff::mapping::LineChange;
use crate::error::CovdiffError;
use crate::Result;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(5);

/// How to launch and talk to the diff process
#[derive(Debug, Clone)]
pub struct ExternalDiffConfig {
    pub program: OsString,
    pub args: Vec<OsString>,
    pub envs: Vec<(OsString, OsString)>,
    /// Per-request response deadline
    pub timeout: Duration,
    pub ping_interval: Duration,
}

impl ExternalDiffConfig {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: vec![
                ("RESPONSE_ID_PREFIX".into(), "true".into()),
                ("EXIT_AFTER_PING_TIMEOUT".into(), "true".into()),
            ],
            timeout: DEFAULT_TIMEOUT,
            ping_interval: DEFAULT_PING_INTERVAL,
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval;
        self
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Request<'a> {
    id: String,
    old_lines: &'a [&'a str],
    new_lines: &'a [&'a str],
}

#[derive(Deserialize)]
struct Response {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    changes: Option<Vec<LineChange>>,
}

type Pending = Arc<Mutex<HashMap<u64, mpsc::Sender<String>>>>;

/// A running diff process shared by any number of callers.
///
/// Requests are multiplexed over the child's stdin and matched to their
/// responses by id. Dropping the client shuts the child down.
pub struct ExternalDiffClient {
    child: Mutex<Option<Child>>,
    stdin: Arc<Mutex<Option<ChildStdin>>>,
    pending: Pending,
    alive: Arc<AtomicBool>,
    next_id: AtomicU64,
    timeout: Duration,
    stop: Mutex<Option<mpsc::Sender<()>>>,
    threads: Mutex<Vec<JoinHandle<()>>>,
}

impl ExternalDiffClient {
    /// Start the diff process and its reader and keep-alive threads
    pub fn spawn(config: &ExternalDiffConfig) -> Result<Self> {
        let mut child = Command::new(&config.program)
            .args(&config.args)
            .envs(config.envs.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| {
                CovdiffError::DiffBackend(format!(
                    "failed to start {}: {}",
                    config.program.to_string_lossy(),
                    e
                ))
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| CovdiffError::DiffBackend("child stdout unavailable".to_string()))?;
        let stdin = Arc::new(Mutex::new(child.stdin.take()));
        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        let alive = Arc::new(AtomicBool::new(true));

        let reader = {
            let pending = Arc::clone(&pending);
            let alive = Arc::clone(&alive);
            std::thread::spawn(move || {
                for line in BufReader::new(stdout).lines() {
                    let Ok(line) = line else { break };
                    let Some((id, content)) = line.split_once(':') else {
                        debug!(%line, "ignoring diff output without id");
                        continue;
                    };
                    let Ok(id) = id.trim().parse::<u64>() else {
                        debug!(%line, "ignoring diff output with malformed id");
                        continue;
                    };
                    if let Some(tx) = pending.lock().remove(&id) {
                        let _ = tx.send(content.to_string());
                    }
                }
                alive.store(false, Ordering::SeqCst);
                // dropping the senders wakes every waiting request
                pending.lock().clear();
                debug!("diff process output closed");
            })
        };

        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let pinger = {
            let stdin = Arc::clone(&stdin);
            let interval = config.ping_interval;
            std::thread::spawn(move || loop {
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        let mut guard = stdin.lock();
                        let Some(w) = guard.as_mut() else { break };
                        if writeln!(w, r#"{{"ping":true}}"#)
                            .and_then(|_| w.flush())
                            .is_err()
                        {
                            break;
                        }
                    }
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            })
        };

        debug!(program = %config.program.to_string_lossy(), "started diff process");
        Ok(Self {
            child: Mutex::new(Some(child)),
            stdin,
            pending,
            alive,
            next_id: AtomicU64::new(1),
            timeout: config.timeout,
            stop: Mutex::new(Some(stop_tx)),
            threads: Mutex::new(vec![reader, pinger]),
        })
    }

    /// Send one diff request and wait for its answer.
    ///
    /// A missing answer yields [`CovdiffError::DiffTimeout`]; the request is
    /// never retried.
    pub fn request(&self, old: &[&str], new: &[&str]) -> Result<Vec<LineChange>> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let line = serde_json::to_string(&Request {
            id: id.to_string(),
            old_lines: old,
            new_lines: new,
        })?;

        let (tx, rx) = mpsc::channel();
        self.pending.lock().insert(id, tx);
        if !self.alive.load(Ordering::SeqCst) {
            self.pending.lock().remove(&id);
            return Err(CovdiffError::DiffBackend(
                "diff process has exited".to_string(),
            ));
        }

        if let Err(e) = self.write_line(&line) {
            self.pending.lock().remove(&id);
            return Err(e);
        }

        let content = match rx.recv_timeout(self.timeout) {
            Ok(content) => content,
            Err(RecvTimeoutError::Timeout) => {
                self.pending.lock().remove(&id);
                return Err(CovdiffError::DiffTimeout {
                    request_id: id,
                    timeout: self.timeout,
                });
            }
            Err(RecvTimeoutError::Disconnected) => {
                return Err(CovdiffError::DiffBackend(
                    "diff process exited before answering".to_string(),
                ))
            }
        };

        let response: Response = serde_json::from_str(&content)?;
        match response.error {
            Some(message) if !message.is_empty() => Err(CovdiffError::DiffBackend(message)),
            _ => Ok(response.changes.unwrap_or_default()),
        }
    }

    fn write_line(&self, line: &str) -> Result<()> {
        let mut guard = self.stdin.lock();
        let w = guard
            .as_mut()
            .ok_or_else(|| CovdiffError::DiffBackend("diff client is shut down".to_string()))?;
        writeln!(w, "{}", line)
            .and_then(|_| w.flush())
            .map_err(|e| CovdiffError::DiffBackend(format!("failed to write request: {}", e)))
    }

    /// Kill the child process, reap it and join the helper threads.
    ///
    /// Calling this more than once is harmless.
    pub fn shutdown(&self) -> Result<()> {
        self.stop.lock().take();
        self.stdin.lock().take();

        if let Some(mut child) = self.child.lock().take() {
            // the child may already have exited on its own
            let _ = child.kill();
            child
                .wait()
                .map_err(|e| CovdiffError::DiffBackend(format!("failed to reap child: {}", e)))?;
        }

        let handles: Vec<_> = self.threads.lock().drain(..).collect();
        for handle in handles {
            if handle.join().is_err() {
                warn!("diff helper thread panicked");
            }
        }
        Ok(())
    }
}

impl DiffBackend for ExternalDiffClient {
    fn line_changes(&self, old: &[&str], new: &[&str]) -> Result<Vec<LineChange>> {
        self.request(old, new)
    }
}

impl Drop for ExternalDiffClient {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            warn!("failed to shut down diff process: {}", e);
        }
    }
}
