// Subprocess runner implementation
// reason: async-trait, tokio for async process management (ADR-001)
use async_trait::async_trait;
use encoding_rs::Encoding;
use std::io;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use netprobe_core::application::constants::DEFAULT_STOP_GRACE;
use netprobe_core::application::StopToken;
use netprobe_core::domain::ProbeCommand;
use netprobe_core::port::{ProbeExit, ProbeProcess, ProcessError, ProcessRunner};

use crate::host_encoding::host_encoding;
use crate::line_decoder::decode_line;

/// Subprocess runner settings
#[derive(Debug, Clone)]
pub struct SubprocessRunnerConfig {
    /// Time between SIGTERM and SIGKILL on stop. Zero kills immediately.
    /// Only honoured on Unix.
    pub stop_grace: Duration,
    /// Encoding of the probe's output
    pub encoding: &'static Encoding,
}

impl Default for SubprocessRunnerConfig {
    fn default() -> Self {
        Self {
            stop_grace: DEFAULT_STOP_GRACE,
            encoding: host_encoding(),
        }
    }
}

/// Spawns probe commands as OS child processes
///
/// stdout and stderr are both captured and merged at line granularity.
pub struct SubprocessRunner {
    config: SubprocessRunnerConfig,
}

impl SubprocessRunner {
    /// Create a new subprocess runner
    ///
    /// # Example
    /// ```ignore
    /// let runner = SubprocessRunner::new(SubprocessRunnerConfig::default());
    /// ```
    pub fn new(config: SubprocessRunnerConfig) -> Self {
        Self { config }
    }
}

impl Default for SubprocessRunner {
    fn default() -> Self {
        Self::new(SubprocessRunnerConfig::default())
    }
}

#[async_trait]
impl ProcessRunner for SubprocessRunner {
    async fn spawn(
        &self,
        command: &ProbeCommand,
        stop: StopToken,
    ) -> Result<Box<dyn ProbeProcess>, ProcessError> {
        let mut child = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ProcessError::SpawnFailed {
                command: command.to_string(),
                reason: e.to_string(),
            })?;

        let pid = child.id();
        let stdout = child.stdout.take().map(LineReader::new);
        let stderr = child.stderr.take().map(LineReader::new);

        info!(command = %command, pid = ?pid, "Spawned probe process");

        Ok(Box::new(SubprocessProbe {
            child,
            pid,
            stdout,
            stderr,
            stop,
            stop_requested: false,
            stop_grace: self.config.stop_grace,
            encoding: self.config.encoding,
        }))
    }
}

/// Incremental line reader over one pipe
///
/// Keeps partial lines across cancelled reads, so it can sit in a `select!`.
struct LineReader<R> {
    reader: BufReader<R>,
    buf: Vec<u8>,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    fn new(inner: R) -> Self {
        Self {
            reader: BufReader::new(inner),
            buf: Vec::new(),
        }
    }

    /// Next raw line including its terminator; `None` at end of stream
    async fn next(&mut self) -> io::Result<Option<Vec<u8>>> {
        let read = self.reader.read_until(b'\n', &mut self.buf).await?;
        if read == 0 && self.buf.is_empty() {
            return Ok(None);
        }
        Ok(Some(std::mem::take(&mut self.buf)))
    }
}

async fn next_from<R: AsyncRead + Unpin>(
    reader: &mut Option<LineReader<R>>,
) -> io::Result<Option<Vec<u8>>> {
    match reader {
        Some(reader) => reader.next().await,
        None => std::future::pending().await,
    }
}

#[derive(Debug, Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

enum ReadEvent {
    Stop,
    Line(Stream, io::Result<Option<Vec<u8>>>),
}

struct SubprocessProbe {
    child: Child,
    pid: Option<u32>,
    stdout: Option<LineReader<ChildStdout>>,
    stderr: Option<LineReader<ChildStderr>>,
    stop: StopToken,
    stop_requested: bool,
    stop_grace: Duration,
    encoding: &'static Encoding,
}

impl SubprocessProbe {
    /// Decode a line, or drop the pipe on end-of-stream / read error
    fn on_read(&mut self, stream: Stream, result: io::Result<Option<Vec<u8>>>) -> Option<String> {
        match result {
            Ok(Some(raw)) => return Some(decode_line(&raw, self.encoding)),
            Ok(None) => debug!(pid = ?self.pid, stream = ?stream, "Output stream closed"),
            Err(e) => warn!(pid = ?self.pid, stream = ?stream, error = %e, "Output read failed"),
        }
        match stream {
            Stream::Stdout => self.stdout = None,
            Stream::Stderr => self.stderr = None,
        }
        None
    }

    fn force_kill(&mut self) {
        if let Err(e) = self.child.start_kill() {
            debug!(pid = ?self.pid, error = %e, "Kill failed (process already exited?)");
        }
    }

    #[cfg(unix)]
    fn terminate(&mut self) {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        let Some(pid) = self.pid else {
            return;
        };
        if self.stop_grace.is_zero() {
            self.force_kill();
            return;
        }
        info!(pid = %pid, "Sending SIGTERM for graceful shutdown");
        if let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
            warn!(pid = %pid, error = %e, "SIGTERM failed, killing");
            self.force_kill();
        }
    }

    #[cfg(not(unix))]
    fn terminate(&mut self) {
        self.force_kill();
    }
}

#[async_trait]
impl ProbeProcess for SubprocessProbe {
    fn pid(&self) -> Option<u32> {
        self.pid
    }

    async fn next_line(&mut self) -> Option<String> {
        loop {
            if self.stop_requested {
                return None;
            }
            if self.stdout.is_none() && self.stderr.is_none() {
                return None;
            }

            let event = tokio::select! {
                biased;
                _ = self.stop.stopped() => ReadEvent::Stop,
                line = next_from(&mut self.stdout) => ReadEvent::Line(Stream::Stdout, line),
                line = next_from(&mut self.stderr) => ReadEvent::Line(Stream::Stderr, line),
            };

            let line = match event {
                ReadEvent::Stop => {
                    self.request_stop();
                    return None;
                }
                ReadEvent::Line(stream, result) => self.on_read(stream, result),
            };
            if line.is_some() {
                return line;
            }
        }
    }

    fn request_stop(&mut self) {
        if self.stop_requested {
            return;
        }
        self.stop_requested = true;
        self.terminate();
    }

    async fn wait(&mut self) -> Result<ProbeExit, ProcessError> {
        // Nobody reads the pipes from here on
        self.stdout = None;
        self.stderr = None;

        if self.stop_requested && !self.stop_grace.is_zero() {
            match timeout(self.stop_grace, self.child.wait()).await {
                Ok(status) => {
                    let status = status.map_err(|e| ProcessError::WaitFailed(e.to_string()))?;
                    return Ok(ProbeExit {
                        code: status.code(),
                        forced: true,
                    });
                }
                Err(_) => {
                    warn!(pid = ?self.pid, "Process did not exit after SIGTERM, sending SIGKILL");
                    self.force_kill();
                }
            }
        }

        let status = self
            .child
            .wait()
            .await
            .map_err(|e| ProcessError::WaitFailed(e.to_string()))?;

        debug!(pid = ?self.pid, exit_code = ?status.code(), "Probe process reaped");

        Ok(ProbeExit {
            code: status.code(),
            forced: self.stop_requested,
        })
    }
}
