//! Upstream line sources: a spawned producer process or our own stdin.

use crate::config::FeedConfig;
use crate::error::{FeedError, FeedResult};
use std::process::{ExitStatus, Stdio};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, info};

/// How the producer process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpstreamExit {
    pub code: Option<i32>,
    pub signal: Option<i32>,
}

impl UpstreamExit {
    pub fn from_status(status: ExitStatus) -> Self {
        #[cfg(unix)]
        let signal = {
            use std::os::unix::process::ExitStatusExt;
            status.signal()
        };
        #[cfg(not(unix))]
        let signal = None;

        Self {
            code: status.code(),
            signal,
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    pub fn into_error(self) -> FeedError {
        FeedError::UpstreamTerminated {
            code: self.code,
            signal: self.signal,
        }
    }
}

/// Line-oriented reader over the producer output.
pub struct Upstream {
    reader: Box<dyn AsyncBufRead + Unpin + Send>,
    buf: Vec<u8>,
    child: Option<Child>,
    label: String,
}

impl Upstream {
    /// Spawn the configured producer, or read stdin when no command is set.
    pub fn open(config: &FeedConfig) -> FeedResult<Self> {
        if config.reads_stdin() {
            Ok(Self::stdin())
        } else {
            Self::spawn(&config.command, &config.args)
        }
    }

    /// Spawn `command` with its stdout piped to us. Stderr is inherited.
    pub fn spawn(command: &str, args: &[String]) -> FeedResult<Self> {
        let mut child = Command::new(command)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| FeedError::Spawn {
                command: command.to_string(),
                source,
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::other("producer stdout was not captured"))?;

        info!(command, ?args, pid = ?child.id(), "Spawned producer process");
        Ok(Self {
            reader: Box::new(BufReader::new(stdout)),
            buf: Vec::new(),
            child: Some(child),
            label: command.to_string(),
        })
    }

    pub fn stdin() -> Self {
        Self::from_reader(BufReader::new(tokio::io::stdin()), "stdin")
    }

    /// Read lines from any buffered reader.
    pub fn from_reader(reader: impl AsyncBufRead + Unpin + Send + 'static, label: &str) -> Self {
        Self {
            reader: Box::new(reader),
            buf: Vec::new(),
            child: None,
            label: label.to_string(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Next line without its terminator. `None` at end of stream.
    ///
    /// Invalid UTF-8 is replaced rather than rejected.
    pub async fn next_line(&mut self) -> FeedResult<Option<String>> {
        self.buf.clear();
        let n = self.reader.read_until(b'\n', &mut self.buf).await?;
        if n == 0 {
            return Ok(None);
        }
        while matches!(self.buf.last(), Some(b'\n' | b'\r')) {
            self.buf.pop();
        }
        Ok(Some(String::from_utf8_lossy(&self.buf).into_owned()))
    }

    /// Wait for the producer process to exit. `None` for non-process sources.
    pub async fn wait(mut self) -> FeedResult<Option<UpstreamExit>> {
        match self.child.take() {
            Some(mut child) => {
                let status = child.wait().await?;
                Ok(Some(UpstreamExit::from_status(status)))
            }
            None => Ok(None),
        }
    }

    /// Kill the producer process and reap it.
    pub async fn kill(mut self) -> FeedResult<Option<UpstreamExit>> {
        match self.child.take() {
            Some(mut child) => {
                debug!(source = %self.label, "Killing producer process");
                // Fails only if the child already exited; `wait` reaps either way.
                let _ = child.start_kill();
                let status = child.wait().await?;
                Ok(Some(UpstreamExit::from_status(status)))
            }
            None => Ok(None),
        }
    }
}
