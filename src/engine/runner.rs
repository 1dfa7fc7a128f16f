//! Long-lived helper processes that speak JSON lines over stdio.
//!
//! A runner prints one ready line after loading its model, then answers each
//! request line with exactly one reply line. The process is spawned on first
//! use and kept until it fails, times out, or the `Runner` is dropped.

use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::collections::{BTreeMap, VecDeque};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info};

const STDERR_TAIL_LINES: usize = 20;

#[derive(Debug, Clone)]
pub struct RunnerSpec {
    pub name: &'static str,
    pub program: PathBuf,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
    /// Per request; `None` waits forever.
    pub timeout: Option<Duration>,
    /// For the ready line, which includes model loading.
    pub startup_timeout: Option<Duration>,
    /// Forward the runner's stderr lines to the debug log.
    pub log_stderr: bool,
}

#[derive(Debug, Deserialize)]
struct Ready {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

pub struct Runner {
    spec: RunnerSpec,
    live: Option<LiveProcess>,
}

impl Runner {
    pub fn new(spec: RunnerSpec) -> Self {
        Self { spec, live: None }
    }

    pub fn name(&self) -> &'static str {
        self.spec.name
    }

    /// Process id of the running child, if one is up.
    pub fn pid(&self) -> Option<u32> {
        self.live.as_ref().map(|l| l.child.id())
    }

    /// Sends one request and waits for its reply. Any transport failure tears
    /// the process down; the next call starts a fresh one.
    pub fn call<I: Serialize, O: DeserializeOwned>(&mut self, input: &I) -> Result<O> {
        let timeout = self.spec.timeout;
        let name = self.spec.name;
        let result = self
            .ensure_started()
            .and_then(|live| live.exchange(input, timeout));

        match result {
            Ok(reply) => serde_json::from_str(&reply)
                .with_context(|| format!("parsing {name} runner reply")),
            Err(err) => {
                let tail = self.live.as_ref().map(LiveProcess::stderr_tail);
                self.shutdown();
                match tail.filter(|t| !t.is_empty()) {
                    Some(tail) => Err(err.context(format!("{name} runner failed; stderr: {tail}"))),
                    None => Err(err.context(format!("{name} runner failed"))),
                }
            }
        }
    }

    pub fn shutdown(&mut self) {
        if let Some(live) = self.live.take() {
            debug!("stopping {} runner pid={}", self.spec.name, live.child.id());
        }
    }

    fn ensure_started(&mut self) -> Result<&mut LiveProcess> {
        if self.live.is_none() {
            self.live = Some(LiveProcess::spawn(&self.spec)?);
        }
        self.live
            .as_mut()
            .ok_or_else(|| anyhow!("{} runner not started", self.spec.name))
    }
}

struct LiveProcess {
    child: Child,
    stdin: ChildStdin,
    lines: Receiver<std::io::Result<String>>,
    stderr: Arc<Mutex<VecDeque<String>>>,
}

impl LiveProcess {
    fn spawn(spec: &RunnerSpec) -> Result<Self> {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        for (k, v) in &spec.env {
            cmd.env(k, v);
        }

        let mut child = cmd
            .spawn()
            .with_context(|| format!("spawning {} runner: {}", spec.name, spec.program.display()))?;
        let stdin = child.stdin.take().ok_or_else(|| anyhow!("no stdin"))?;
        let stdout = child.stdout.take().ok_or_else(|| anyhow!("no stdout"))?;
        let stderr_pipe = child.stderr.take().ok_or_else(|| anyhow!("no stderr"))?;

        let (tx, lines) = mpsc::channel();
        std::thread::spawn(move || {
            for line in BufReader::new(stdout).lines() {
                let failed = line.is_err();
                if tx.send(line).is_err() || failed {
                    break;
                }
            }
        });

        // Drained continuously so a chatty runner can't block on a full pipe.
        let stderr = Arc::new(Mutex::new(VecDeque::with_capacity(STDERR_TAIL_LINES)));
        let tail = stderr.clone();
        let (name, log) = (spec.name, spec.log_stderr);
        std::thread::spawn(move || {
            for line in BufReader::new(stderr_pipe).lines().map_while(Result::ok) {
                if log {
                    debug!(runner = name, "{line}");
                }
                if let Ok(mut buf) = tail.lock() {
                    if buf.len() == STDERR_TAIL_LINES {
                        buf.pop_front();
                    }
                    buf.push_back(line);
                }
            }
        });

        let mut live = Self {
            child,
            stdin,
            lines,
            stderr,
        };

        let ready = live
            .read_line(spec.startup_timeout)
            .and_then(|line| serde_json::from_str::<Ready>(&line).context("parsing ready line"));
        match ready {
            Ok(Ready { ok: true, .. }) => {}
            Ok(Ready { error, .. }) => bail!(
                "{} runner failed to start: {}",
                spec.name,
                error.unwrap_or_else(|| "no reason given".into())
            ),
            Err(err) => {
                let tail = live.stderr_tail();
                return Err(err.context(format!("{} runner did not start; stderr: {tail}", spec.name)));
            }
        }

        info!("{} runner ready pid={}", spec.name, live.child.id());
        Ok(live)
    }

    fn exchange<I: Serialize>(&mut self, input: &I, timeout: Option<Duration>) -> Result<String> {
        let mut line = serde_json::to_string(input)?;
        line.push('\n');
        self.stdin
            .write_all(line.as_bytes())
            .and_then(|_| self.stdin.flush())
            .context("writing request")?;
        self.read_line(timeout)
    }

    fn read_line(&mut self, timeout: Option<Duration>) -> Result<String> {
        let next = match timeout {
            Some(t) => self.lines.recv_timeout(t).map_err(|e| match e {
                RecvTimeoutError::Timeout => anyhow!("timed out after {t:?}"),
                RecvTimeoutError::Disconnected => anyhow!("runner exited"),
            }),
            None => self.lines.recv().map_err(|_| anyhow!("runner exited")),
        }?;
        next.context("reading runner stdout")
    }

    fn stderr_tail(&self) -> String {
        self.stderr
            .lock()
            .map(|t| t.iter().cloned().collect::<Vec<_>>().join("\n"))
            .unwrap_or_default()
    }
}

impl Drop for LiveProcess {
    fn drop(&mut self) {
        if let Err(err) = self.child.kill() {
            debug!("killing runner pid={}: {err}", self.child.id());
        }
        let _ = self.child.wait();
    }
}
