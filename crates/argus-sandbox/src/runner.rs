//! Runs the subject as a child process.
//!
//! stdout and stderr are drained by one reader thread each into unbounded
//! queues. The calling thread never blocks on either stream: it polls both
//! queues, checks the deadline and the abort flag, and sleeps for one poll
//! interval between rounds.

use std::collections::BTreeMap;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use argus_ir::output::{CoverageSnapshot, Output, RunStatus};
use crossbeam::channel::{unbounded, Receiver, Sender, TryRecvError};

use crate::config::SandboxConfig;
use crate::watchdog::{Decoded, WatchdogDecoder};

#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    #[error("Program not found: {}", .0.display())]
    ProgramNotFound(PathBuf),

    #[error("Failed to spawn {}: {source}", .program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Lost track of child process: {0}")]
    Wait(#[source] std::io::Error),

    /// The watchdog reported that the sandbox itself failed.
    #[error("Watchdog failure: {0}")]
    Watchdog(String),
}

/// Captured result of one execution, before coverage is attached.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRun {
    pub stdout: String,
    pub stderr: String,
    pub permissions: BTreeMap<String, u64>,
    pub status: RunStatus,
    pub elapsed_ms: u64,
    /// A stream hit `max_output_bytes`; everything after that was dropped.
    pub truncated: bool,
}

impl RawRun {
    pub fn into_output(self, args: Vec<String>, coverage: CoverageSnapshot) -> Output {
        Output {
            args,
            stdout: self.stdout,
            stderr: self.stderr,
            permissions: self.permissions,
            coverage,
            status: self.status,
            elapsed_ms: self.elapsed_ms,
        }
    }
}

/// Something that can be run with an argument vector.
///
/// `abort` is polled while the run is in flight; once set, the run ends
/// with [`RunStatus::Aborted`] within one poll interval.
pub trait Subject {
    fn execute(&mut self, args: &[String], abort: &AtomicBool) -> Result<RawRun, SandboxError>;
}

pub struct ProcessSubject {
    config: SandboxConfig,
    /// Children left running because `kill_on_timeout` is off. Reaped once
    /// they exit.
    detached: Vec<Child>,
}

impl ProcessSubject {
    pub fn new(config: SandboxConfig) -> Self {
        Self {
            config,
            detached: Vec::new(),
        }
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// Children still running from earlier timed-out or aborted runs.
    pub fn detached(&mut self) -> usize {
        self.reap_detached();
        self.detached.len()
    }

    fn reap_detached(&mut self) {
        self.detached.retain_mut(|child| match child.try_wait() {
            Ok(None) => true,
            Ok(Some(_)) => false,
            Err(e) => {
                tracing::debug!(pid = child.id(), error = %e, "dropping detached child");
                false
            }
        });
    }

    /// Verify the program can be located, directly or on `PATH`.
    pub fn check(&self) -> Result<PathBuf, SandboxError> {
        locate(&self.config.program)
            .ok_or_else(|| SandboxError::ProgramNotFound(self.config.program.clone()))
    }

    fn spawn(&self, args: &[String]) -> Result<Child, SandboxError> {
        let mut cmd = Command::new(&self.config.program);
        cmd.args(&self.config.base_args)
            .args(args)
            .envs(&self.config.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &self.config.working_dir {
            cmd.current_dir(dir);
        }
        cmd.spawn().map_err(|source| SandboxError::Spawn {
            program: self.config.program.clone(),
            source,
        })
    }
}

impl Subject for ProcessSubject {
    fn execute(&mut self, args: &[String], abort: &AtomicBool) -> Result<RawRun, SandboxError> {
        self.reap_detached();
        let start = Instant::now();
        let mut child = self.spawn(args)?;
        let out_rx = child.stdout.take().map(spawn_reader);
        let err_rx = child.stderr.take().map(spawn_reader);

        let mut capture = Capture::new(&self.config);
        let mut stdout = Stream::new(out_rx);
        let mut stderr = Stream::new(err_rx);
        let deadline = start + Duration::from_millis(self.config.timeout_ms);
        let poll = Duration::from_millis(self.config.poll_interval_ms);
        let mut exited: Option<ExitStatus> = None;

        let status = loop {
            if abort.load(Ordering::SeqCst) {
                break RunStatus::Aborted;
            }

            stdout.drain(|line| capture.stdout_line(line));
            stderr.drain(|line| capture.stderr_line(line));
            if let Some(message) = capture.failure.take() {
                stop(&mut child);
                return Err(SandboxError::Watchdog(message));
            }

            if exited.is_none() {
                exited = child.try_wait().map_err(SandboxError::Wait)?;
            }
            if let Some(st) = exited {
                if stdout.closed && stderr.closed {
                    break RunStatus::Exited { code: st.code() };
                }
            }
            if Instant::now() >= deadline {
                break match exited {
                    Some(st) => RunStatus::Exited { code: st.code() },
                    None => RunStatus::TimedOut,
                };
            }

            thread::sleep(poll);
        };

        if exited.is_none() {
            if self.config.kill_on_timeout {
                tracing::debug!(?status, "stopping subject before exit");
                stop(&mut child);
            } else {
                tracing::warn!(?status, pid = child.id(), "subject left running");
                self.detached.push(child);
            }
        }
        capture.finish()?;
        let truncated = capture.truncated();
        if truncated {
            tracing::warn!(limit = self.config.max_output_bytes, "subject output truncated");
        }

        Ok(RawRun {
            stdout: capture.stdout,
            stderr: capture.stderr,
            permissions: capture.permissions,
            status,
            elapsed_ms: start.elapsed().as_millis() as u64,
            truncated,
        })
    }
}

fn stop(child: &mut Child) {
    if let Err(e) = child.kill() {
        tracing::debug!(error = %e, "kill failed, subject already gone");
    }
    let _ = child.wait();
}

/// Find `program` as given or in one of the `PATH` directories.
fn locate(program: &Path) -> Option<PathBuf> {
    if program.as_os_str().is_empty() {
        return None;
    }
    if program.components().count() > 1 || program.is_absolute() {
        return program.is_file().then(|| program.to_path_buf());
    }
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
}

fn spawn_reader<R: Read + Send + 'static>(stream: R) -> Receiver<String> {
    let (tx, rx) = unbounded();
    thread::spawn(move || read_lines(stream, tx));
    rx
}

fn read_lines<R: Read>(stream: R, tx: Sender<String>) {
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) | Err(_) => break,
            Ok(_) => {
                while matches!(buf.last(), Some(b'\n' | b'\r')) {
                    buf.pop();
                }
                if tx.send(String::from_utf8_lossy(&buf).into_owned()).is_err() {
                    break;
                }
            }
        }
    }
}

struct Stream {
    rx: Option<Receiver<String>>,
    closed: bool,
}

impl Stream {
    fn new(rx: Option<Receiver<String>>) -> Self {
        let closed = rx.is_none();
        Self { rx, closed }
    }

    fn drain(&mut self, mut on_line: impl FnMut(String)) {
        let Some(rx) = &self.rx else {
            return;
        };
        loop {
            match rx.try_recv() {
                Ok(line) => on_line(line),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.closed = true;
                    break;
                }
            }
        }
    }
}

/// Accumulates decoded output from both streams.
struct Capture {
    stdout: String,
    stderr: String,
    permissions: BTreeMap<String, u64>,
    failure: Option<String>,
    stdout_full: bool,
    stderr_full: bool,
    out_decoder: WatchdogDecoder,
    err_decoder: WatchdogDecoder,
    limit: usize,
}

impl Capture {
    fn new(config: &SandboxConfig) -> Self {
        Self {
            stdout: String::new(),
            stderr: String::new(),
            permissions: BTreeMap::new(),
            failure: None,
            stdout_full: false,
            stderr_full: false,
            out_decoder: WatchdogDecoder::new(&config.begin_sentinel, &config.end_sentinel),
            err_decoder: WatchdogDecoder::new(&config.begin_sentinel, &config.end_sentinel),
            limit: config.max_output_bytes,
        }
    }

    fn stdout_line(&mut self, line: String) {
        match self.out_decoder.feed(line) {
            Decoded::Text(text) => append(&mut self.stdout, &mut self.stdout_full, &text, self.limit),
            Decoded::Block(events) => self.count(events),
            Decoded::Pending => {}
        }
    }

    fn stderr_line(&mut self, line: String) {
        match self.err_decoder.feed(line) {
            Decoded::Text(text) => append(&mut self.stderr, &mut self.stderr_full, &text, self.limit),
            Decoded::Block(lines) => self.fail(lines),
            Decoded::Pending => {}
        }
    }

    fn truncated(&self) -> bool {
        self.stdout_full || self.stderr_full
    }

    fn count(&mut self, events: Vec<String>) {
        for event in events {
            *self.permissions.entry(event).or_insert(0) += 1;
        }
    }

    fn fail(&mut self, lines: Vec<String>) {
        if self.failure.is_none() {
            self.failure = Some(lines.join("\n"));
        }
    }

    /// Settle blocks left open when the streams stopped.
    fn finish(&mut self) -> Result<(), SandboxError> {
        if let Some(events) = self.out_decoder.finish() {
            self.count(events);
        }
        if let Some(lines) = self.err_decoder.finish() {
            self.fail(lines);
        }
        match self.failure.take() {
            Some(message) => Err(SandboxError::Watchdog(message)),
            None => Ok(()),
        }
    }
}

/// Append one line. The first line that does not fit closes the stream
/// for good, so the kept text is always a prefix of the real output.
fn append(buf: &mut String, full: &mut bool, line: &str, limit: usize) {
    if *full {
        return;
    }
    if buf.len() + line.len() + 1 > limit {
        *full = true;
        return;
    }
    buf.push_str(line);
    buf.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_splits_watchdog_blocks() {
        let config = SandboxConfig::default();
        let mut c = Capture::new(&config);
        c.stdout_line("start".into());
        c.stdout_line(config.begin_sentinel.clone());
        c.stdout_line("fs.read".into());
        c.stdout_line("fs.read".into());
        c.stdout_line("net.bind".into());
        c.stdout_line(config.end_sentinel.clone());
        c.stdout_line("done".into());

        assert_eq!(c.stdout, "start\ndone\n");
        assert_eq!(c.permissions["fs.read"], 2);
        assert_eq!(c.permissions["net.bind"], 1);
        assert!(c.finish().is_ok());
    }

    #[test]
    fn test_stderr_block_is_watchdog_failure() {
        let config = SandboxConfig::default();
        let mut c = Capture::new(&config);
        c.stderr_line("warning: x".into());
        c.stderr_line(config.begin_sentinel.clone());
        c.stderr_line("policy file unreadable".into());
        c.stderr_line(config.end_sentinel.clone());

        assert_eq!(c.stderr, "warning: x\n");
        assert_eq!(c.failure.as_deref(), Some("policy file unreadable"));
    }

    #[test]
    fn test_unterminated_stderr_block_fails_on_finish() {
        let config = SandboxConfig::default();
        let mut c = Capture::new(&config);
        c.stderr_line(config.begin_sentinel.clone());
        c.stderr_line("crashed".into());
        assert!(matches!(c.finish(), Err(SandboxError::Watchdog(m)) if m == "crashed"));
    }

    #[test]
    fn test_output_limit_keeps_prefix_only() {
        let config = SandboxConfig {
            max_output_bytes: 8,
            ..SandboxConfig::default()
        };
        let mut c = Capture::new(&config);
        c.stdout_line("abc".into());
        c.stdout_line("defgh".into());
        c.stdout_line("ij".into());
        c.stderr_line("kl".into());
        assert_eq!(c.stdout, "abc\n");
        assert_eq!(c.stderr, "kl\n");
        assert!(c.truncated());
    }

    #[test]
    fn test_output_under_limit_not_truncated() {
        let mut c = Capture::new(&SandboxConfig::default());
        c.stdout_line("abc".into());
        c.stderr_line("def".into());
        assert!(!c.truncated());
    }

    #[test]
    fn test_locate_rejects_empty_and_missing() {
        assert!(locate(Path::new("")).is_none());
        assert!(locate(Path::new("/definitely/not/here")).is_none());
    }
}
