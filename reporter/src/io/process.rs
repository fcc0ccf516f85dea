//! Helpers for running a child process whose stdout is consumed line by line.
//!
//! Stderr is drained on a helper thread with a byte limit so a chatty child
//! can never block on a full pipe while stdout is being read.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::Path;
use std::process::{Child, ChildStdout, Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

type StderrHandle = thread::JoinHandle<Result<(Vec<u8>, usize)>>;

/// Final state of a streamed child.
#[derive(Debug)]
pub struct ChildExit {
    pub status: ExitStatus,
    pub stderr: Vec<u8>,
    pub stderr_truncated: usize,
    /// The child outlived the grace period and was killed.
    pub killed: bool,
}

impl ChildExit {
    /// Last `max_chars` characters of stderr, trimmed.
    pub fn stderr_tail(&self, max_chars: usize) -> String {
        let text = String::from_utf8_lossy(&self.stderr);
        let text = text.trim();
        let count = text.chars().count();
        if count <= max_chars {
            return text.to_string();
        }
        text.chars().skip(count - max_chars).collect()
    }
}

/// A running child whose stdout is read one line at a time.
pub struct StreamingChild {
    child: Child,
    stdout: BufReader<ChildStdout>,
    stderr: Option<StderrHandle>,
    transcript: Option<BufWriter<File>>,
    exit_grace: Duration,
    finished: bool,
}

/// Spawn `cmd`, start draining stderr, and feed `stdin` to it.
///
/// A child that exits without reading its input is not an error here; its
/// exit status and stderr surface through [`StreamingChild::finish`].
///
/// When `transcript_path` is `Some`, every stdout line is copied to that file
/// and flushed immediately for real-time observability. `exit_grace` bounds
/// how long the child may keep running once its output is no longer read.
#[instrument(skip_all, fields(stderr_limit_bytes, exit_grace_secs = exit_grace.as_secs(), transcript = transcript_path.is_some()))]
pub fn spawn_streaming(
    mut cmd: Command,
    stdin: &[u8],
    stderr_limit_bytes: usize,
    exit_grace: Duration,
    transcript_path: Option<&Path>,
) -> Result<StreamingChild> {
    cmd.stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let transcript = match transcript_path {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("create transcript dir {}", parent.display()))?;
            }
            let file = File::create(path)
                .with_context(|| format!("create transcript {}", path.display()))?;
            Some(BufWriter::new(file))
        }
        None => None,
    };

    debug!("spawning child process");
    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => {
            error!(err = %e, "failed to spawn command");
            return Err(e).context("spawn command");
        }
    };

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;
    let mut child_stdin = child
        .stdin
        .take()
        .ok_or_else(|| anyhow!("stdin was not piped"))?;
    let stderr_handle = thread::spawn(move || read_stream_limited(stderr, stderr_limit_bytes));

    let mut streaming = StreamingChild {
        child,
        stdout: BufReader::new(stdout),
        stderr: Some(stderr_handle),
        transcript,
        exit_grace,
        finished: false,
    };

    // Dropping the handle closes the child's stdin.
    let written = child_stdin.write_all(stdin);
    drop(child_stdin);
    match written {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::BrokenPipe => {
            warn!("child closed stdin before reading all input");
        }
        Err(e) => {
            error!(err = %e, "failed to write stdin, killing child");
            let _ = streaming.child.kill();
            let _ = streaming.child.wait();
            streaming.finished = true;
            return Err(e).context("write stdin");
        }
    }

    Ok(streaming)
}

impl StreamingChild {
    /// Next stdout line without its terminator, or `None` at end of stream.
    pub fn next_line(&mut self) -> Result<Option<String>> {
        let mut line = Vec::new();
        let n = self
            .stdout
            .read_until(b'\n', &mut line)
            .context("read agent stdout")?;
        if n == 0 {
            return Ok(None);
        }

        if let Some(writer) = self.transcript.as_mut() {
            if let Err(e) = writer.write_all(&line) {
                warn!(err = %e, "failed to write transcript");
            } else if let Err(e) = writer.flush() {
                warn!(err = %e, "failed to flush transcript");
            }
        }

        while matches!(line.last(), Some(b'\n' | b'\r')) {
            line.pop();
        }
        let line = String::from_utf8(line).context("agent stdout is not valid UTF-8")?;
        Ok(Some(line))
    }

    /// Wait up to the exit grace period for the child, killing it afterwards.
    #[instrument(skip_all, fields(grace_secs = self.exit_grace.as_secs()))]
    pub fn finish(&mut self) -> Result<ChildExit> {
        let mut killed = false;
        let status = match self
            .child
            .wait_timeout(self.exit_grace)
            .context("wait for agent")?
        {
            Some(status) => status,
            None => {
                warn!(grace_secs = self.exit_grace.as_secs(), "agent did not exit, killing");
                killed = true;
                self.child.kill().context("kill agent")?;
                self.child.wait().context("wait agent after kill")?
            }
        };
        self.finished = true;

        let (stderr, stderr_truncated) = match self.stderr.take() {
            Some(handle) => join_output(handle).context("join stderr")?,
            None => (Vec::new(), 0),
        };
        if stderr_truncated > 0 {
            warn!(stderr_truncated, "agent stderr truncated");
        }

        debug!(exit_code = ?status.code(), killed, "agent finished");
        Ok(ChildExit {
            status,
            stderr,
            stderr_truncated,
            killed,
        })
    }
}

impl Drop for StreamingChild {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Ok(None) = self.child.wait_timeout(self.exit_grace) {
            debug!("stream dropped while agent still running, killing agent");
            let _ = self.child.kill();
        }
        let _ = self.child.wait();
    }
}

fn join_output(handle: StderrHandle) -> Result<(Vec<u8>, usize)> {
    match handle.join() {
        Ok(result) => result,
        Err(_) => Err(anyhow!("output reader thread panicked")),
    }
}

fn read_stream_limited<R: Read>(mut reader: R, limit: usize) -> Result<(Vec<u8>, usize)> {
    let mut buf = Vec::new();
    let mut truncated = 0usize;
    let mut chunk = [0u8; 8192];

    loop {
        let n = reader.read(&mut chunk).context("read output")?;
        if n == 0 {
            break;
        }
        let remaining = limit.saturating_sub(buf.len());
        if remaining > 0 {
            let keep = n.min(remaining);
            buf.extend_from_slice(&chunk[..keep]);
            truncated += n.saturating_sub(keep);
        } else {
            truncated += n;
        }
    }

    Ok((buf, truncated))
}
