//! Live tail of a run's logs.
//!
//! A background task pages logs by offset and forwards each line over a
//! channel. Transient failures are retried with capped exponential backoff;
//! the task stops when the run finishes, retries run out, the receiver goes
//! away, or the handle is stopped or dropped.

use crate::api::{LogLine, RunHandle};
use crate::config::{BackoffConfig, RemoteConfig};
use crate::error::RemoteError;
use crate::remote::RemoteSync;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TailConfig {
    pub poll_interval: Duration,
    pub backoff: BackoffConfig,
}

impl Default for TailConfig {
    fn default() -> Self {
        Self::from(&RemoteConfig::default())
    }
}

impl From<&RemoteConfig> for TailConfig {
    fn from(config: &RemoteConfig) -> Self {
        Self {
            poll_interval: config.log_poll_interval,
            backoff: config.backoff,
        }
    }
}

/// How a tail ended.
#[derive(Debug)]
pub enum TailOutcome {
    /// The run finished and every line was delivered.
    Finished { lines: usize },
    /// Stopped through the handle.
    Stopped { lines: usize },
    /// The receiving side was dropped.
    Detached { lines: usize },
    /// A non-retryable error, or retries exhausted.
    Failed { lines: usize, error: RemoteError },
}

/// Handle to a running tail. Dropping it tears the connection down.
#[derive(Debug)]
pub struct LogTail {
    stop: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<TailOutcome>>,
}

impl LogTail {
    /// Start tailing `run`; lines arrive on the returned receiver.
    pub fn spawn<R>(remote: Arc<R>, run: RunHandle, config: TailConfig) -> (Self, mpsc::Receiver<LogLine>)
    where
        R: RemoteSync + ?Sized + 'static,
    {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (stop_tx, stop_rx) = oneshot::channel();
        let task = tokio::spawn(tail_loop(remote, run, config, tx, stop_rx));
        let tail = Self {
            stop: Some(stop_tx),
            task: Some(task),
        };
        (tail, rx)
    }

    /// Stop tailing and wait for the background task to end.
    pub async fn stop(mut self) -> Option<TailOutcome> {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        self.join_inner().await
    }

    /// Wait for the tail to end on its own.
    pub async fn join(mut self) -> Option<TailOutcome> {
        self.join_inner().await
    }

    async fn join_inner(&mut self) -> Option<TailOutcome> {
        let task = self.task.take()?;
        match task.await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                log::warn!("log tail task ended abnormally: {e}");
                None
            }
        }
    }
}

impl Drop for LogTail {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn tail_loop<R>(
    remote: Arc<R>,
    run: RunHandle,
    config: TailConfig,
    tx: mpsc::Sender<LogLine>,
    mut stop: oneshot::Receiver<()>,
) -> TailOutcome
where
    R: RemoteSync + ?Sized,
{
    let mut offset = 0usize;
    let mut failures = 0u32;

    loop {
        let page = tokio::select! {
            _ = &mut stop => return TailOutcome::Stopped { lines: offset },
            page = remote.fetch_run_logs(&run, offset) => page,
        };

        let wait = match page {
            Ok(page) => {
                failures = 0;
                for line in page.lines {
                    if tx.send(line).await.is_err() {
                        return TailOutcome::Detached { lines: offset };
                    }
                    offset += 1;
                }
                if page.finished {
                    log::info!("run {} finished after {offset} log lines", run.run_id);
                    return TailOutcome::Finished { lines: offset };
                }
                config.poll_interval
            }
            Err(error) if error.is_transient() && failures < config.backoff.max_retries => {
                let delay = config.backoff.delay(failures);
                failures += 1;
                log::warn!(
                    "log tail for run {} dropped ({error}); retry {failures} in {delay:?}",
                    run.run_id
                );
                delay
            }
            Err(error) => {
                log::warn!("log tail for run {} gave up: {error}", run.run_id);
                return TailOutcome::Failed {
                    lines: offset,
                    error,
                };
            }
        };

        tokio::select! {
            _ = &mut stop => return TailOutcome::Stopped { lines: offset },
            _ = tokio::time::sleep(wait) => {}
        }
    }
}
