//! Producer output -> hub relay.
//!
//! The producer is started only once the hub link is up, so its first lines
//! are not lost to a connection still in progress. Every stdout line is
//! encoded according to `ForwardMode` and queued on the link. When the
//! producer exits the queue is flushed, the hub socket is closed and the exit
//! code and signal are reported.

use crate::config::{FeedConfig, ForwardMode};
use crate::connection::{HubLink, LinkHandle};
use crate::error::{FeedError, FeedResult};
use crate::source::{Upstream, UpstreamExit};
use std::time::Duration;
use tick_core::{parse_line, CoreError};
use tick_telemetry::Metrics;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// How long to wait for queued lines to reach the hub after the producer exits.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// What happened to one producer line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineOutcome {
    Forwarded,
    ParseError,
    Dropped,
    Skipped,
}

impl LineOutcome {
    /// Metric label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Forwarded => "forwarded",
            Self::ParseError => "parse_error",
            Self::Dropped => "dropped",
            Self::Skipped => "skipped",
        }
    }
}

/// Per-run line counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedStats {
    pub forwarded: u64,
    pub parse_errors: u64,
    pub dropped: u64,
    pub skipped: u64,
}

impl FeedStats {
    fn record(&mut self, outcome: LineOutcome) {
        match outcome {
            LineOutcome::Forwarded => self.forwarded += 1,
            LineOutcome::ParseError => self.parse_errors += 1,
            LineOutcome::Dropped => self.dropped += 1,
            LineOutcome::Skipped => self.skipped += 1,
        }
    }
}

/// Hub payload for one producer line.
pub fn encode_line(line: &str, mode: ForwardMode) -> Result<String, CoreError> {
    match mode {
        ForwardMode::Json => parse_line(line)?.to_json(),
        ForwardMode::Raw => Ok(line.to_string()),
    }
}

enum Stop {
    EndOfStream,
    Shutdown,
    LinkLost(FeedResult<()>),
}

/// Feed relay.
pub struct FeedRelay {
    config: FeedConfig,
}

impl FeedRelay {
    pub fn new(config: FeedConfig) -> Self {
        Self { config }
    }

    /// Run until the producer exits, the link gives up, or `shutdown` fires.
    ///
    /// A producer that exits with anything but status 0 is reported as
    /// `FeedError::UpstreamTerminated`.
    pub async fn run(&self, shutdown: CancellationToken) -> FeedResult<FeedStats> {
        let link_token = shutdown.child_token();
        let (link, handle) = HubLink::new(&self.config, link_token.clone());
        let mut link_task = tokio::spawn(link.run());

        tokio::select! {
            connected = handle.wait_connected() => {
                if !connected {
                    join_link(link_task).await?;
                    return Err(FeedError::ConnectionFailed(
                        "hub link stopped before connecting".to_string(),
                    ));
                }
            }
            () = shutdown.cancelled() => {
                join_link(link_task).await?;
                return Ok(FeedStats::default());
            }
        }

        let mut upstream = match Upstream::open(&self.config) {
            Ok(upstream) => upstream,
            Err(e) => {
                link_token.cancel();
                let _ = join_link(link_task).await;
                return Err(e);
            }
        };
        info!(source = upstream.label(), forward = ?self.config.forward, "Relaying producer output");

        let mut stats = FeedStats::default();
        let stop = loop {
            let line = tokio::select! {
                () = shutdown.cancelled() => break Stop::Shutdown,
                result = &mut link_task => break Stop::LinkLost(flatten_join(result)),
                line = upstream.next_line() => line,
            };
            match line {
                Ok(Some(line)) => stats.record(self.relay_line(&handle, &line)),
                Ok(None) => break Stop::EndOfStream,
                Err(e) => {
                    warn!(error = %e, "Failed to read producer output");
                    break Stop::EndOfStream;
                }
            }
        };

        // Dropping the last handle closes the queue; the link flushes it and
        // sends Close.
        drop(handle);

        let exit = match stop {
            Stop::EndOfStream => {
                let exit = upstream.wait().await?;
                finish_link(link_task, &link_token).await;
                exit
            }
            Stop::Shutdown => {
                let exit = upstream.kill().await?;
                finish_link(link_task, &link_token).await;
                exit
            }
            Stop::LinkLost(result) => {
                if let Err(e) = result {
                    warn!(error = %e, "Hub link lost, stopping producer");
                }
                upstream.kill().await?
            }
        };

        info!(
            forwarded = stats.forwarded,
            parse_errors = stats.parse_errors,
            dropped = stats.dropped,
            "Feed relay finished"
        );

        match exit {
            Some(exit) => report_exit(exit).map(|()| stats),
            None => Ok(stats),
        }
    }

    fn relay_line(&self, handle: &LinkHandle, line: &str) -> LineOutcome {
        let outcome = if line.trim().is_empty() {
            LineOutcome::Skipped
        } else {
            match encode_line(line, self.config.forward) {
                Ok(payload) => match handle.try_send(payload) {
                    Ok(()) => LineOutcome::Forwarded,
                    Err(e) => {
                        trace!(reason = e.reason(), "Dropping producer line");
                        LineOutcome::Dropped
                    }
                },
                Err(e) => {
                    Metrics::parse_error();
                    debug!(error = %e, "Skipping unparseable producer line");
                    LineOutcome::ParseError
                }
            }
        };
        Metrics::feed_line(outcome.as_str());
        outcome
    }
}

fn report_exit(exit: UpstreamExit) -> FeedResult<()> {
    if exit.success() {
        info!(code = ?exit.code, "Producer exited");
        return Ok(());
    }
    let err = exit.into_error();
    warn!(code = ?exit.code, signal = ?exit.signal, error = %err, "Producer terminated");
    Err(err)
}

fn flatten_join(
    result: Result<FeedResult<()>, tokio::task::JoinError>,
) -> FeedResult<()> {
    result.map_err(|e| FeedError::ConnectionFailed(format!("hub link task failed: {e}")))?
}

async fn join_link(task: JoinHandle<FeedResult<()>>) -> FeedResult<()> {
    flatten_join(task.await)
}

/// Give the link time to flush, then cancel it.
async fn finish_link(mut task: JoinHandle<FeedResult<()>>, token: &CancellationToken) {
    let result = match tokio::time::timeout(DRAIN_TIMEOUT, &mut task).await {
        Ok(result) => flatten_join(result),
        Err(_) => {
            warn!("Hub link did not drain in time, closing");
            token.cancel();
            join_link(task).await
        }
    };
    if let Err(e) = result {
        warn!(error = %e, "Hub link ended with error");
    }
}
