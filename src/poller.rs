//! Poller commands
//!
//! Each poller selects a bounded batch of tasks in one status and hands them to the
//! matching runner, one task at a time. The status partitioning keeps pollers of
//! different kinds off each other's tasks:
//!
//! | Poller     | Selects                                   | Runs                            |
//! |------------|-------------------------------------------|---------------------------------|
//! | `transfer` | `inited`, not failed                      | [`Leecher::transfer`]           |
//! | `sampling` | `transferred`, not failed                 | [`Leecher::download_samples`]   |
//! | `leech`    | `sample_downloaded`, gate open, not failed| [`Leecher::download_files`]     |
//! | `resume`   | failed                                    | [`Leecher::resume_failed`]      |
//!
//! # Example
//!
//! ```no_run
//! use baidupcs_leecher::{Config, Leecher};
//! use baidupcs_leecher::poller::{Poller, PollerKind};
//! use baidupcs_leecher::remote::MemoryRemote;
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let leecher = Leecher::new(Config::default(), Arc::new(MemoryRemote::new())).await?;
//! let shutdown = CancellationToken::new();
//!
//! // One sweep, then return
//! Poller::new(PollerKind::Transfer, leecher, shutdown).run(true).await;
//! # Ok(())
//! # }
//! ```

use crate::error::{Error, Result, TaskError};
use crate::leecher::Leecher;
use crate::types::{Status, TaskId};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Which runner a poller drives
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollerKind {
    /// Transfer Runner over `inited` tasks
    Transfer,
    /// Sample Download Runner over `transferred` tasks
    Sampling,
    /// Full Download Runner over gated `sample_downloaded` tasks
    Leech,
    /// Automatic resume of recoverable failures
    Resume,
}

impl PollerKind {
    /// Command name
    pub fn as_str(&self) -> &'static str {
        match self {
            PollerKind::Transfer => "transfer",
            PollerKind::Sampling => "sampling",
            PollerKind::Leech => "leech",
            PollerKind::Resume => "resume",
        }
    }
}

impl std::fmt::Display for PollerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one sweep
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Sweep {
    /// Tasks the runner was invoked for (or resumed)
    pub processed: Vec<TaskId>,
    /// Tasks whose runner returned an error
    pub errors: usize,
}

/// A polling loop over one status partition
pub struct Poller {
    kind: PollerKind,
    leecher: Leecher,
    shutdown: CancellationToken,
}

impl Poller {
    /// Creates a poller; cancelling `shutdown` ends the loop after the current task
    pub fn new(kind: PollerKind, leecher: Leecher, shutdown: CancellationToken) -> Self {
        Self {
            kind,
            leecher,
            shutdown,
        }
    }

    /// Sweep once, or keep sweeping with `poll_sleep_seconds` between sweeps
    ///
    /// Per-task failures are logged and never stop the loop.
    pub async fn run(self, once: bool) {
        let interval = self.leecher.config().pipeline.poll_interval();
        info!(poller = %self.kind, once, interval_secs = interval.as_secs(), "poller started");

        loop {
            if self.shutdown.is_cancelled() {
                break;
            }

            match self.sweep().await {
                Ok(sweep) if !sweep.processed.is_empty() || sweep.errors > 0 => {
                    info!(
                        poller = %self.kind,
                        processed = sweep.processed.len(),
                        errors = sweep.errors,
                        "sweep finished"
                    );
                }
                Ok(_) => debug!(poller = %self.kind, "nothing to do"),
                Err(e) => error!(poller = %self.kind, error = %e, "sweep failed"),
            }

            if once {
                info!(poller = %self.kind, "swept once, exiting");
                break;
            }

            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }

        info!(poller = %self.kind, "poller stopped");
    }

    /// Process the current batch of eligible tasks
    ///
    /// `Err` only when the batch itself could not be selected.
    pub async fn sweep(&self) -> Result<Sweep> {
        let batch = self.leecher.config().pipeline.batch_size;
        let db = &self.leecher.db;

        let ids: Vec<TaskId> = match self.kind {
            PollerKind::Resume => {
                return Ok(Sweep {
                    processed: self.leecher.resume_failed(batch).await?,
                    errors: 0,
                });
            }
            PollerKind::Transfer => db.list_by_status(Status::Inited, batch).await?,
            PollerKind::Sampling => db.list_by_status(Status::Transferred, batch).await?,
            PollerKind::Leech => db.list_ready_for_download(batch).await?,
        }
        .into_iter()
        .map(|task| task.id)
        .collect();

        let mut sweep = Sweep::default();
        for id in ids {
            if self.shutdown.is_cancelled() {
                break;
            }

            let result = match self.kind {
                PollerKind::Transfer => self.leecher.transfer(id).await,
                PollerKind::Sampling => self.leecher.download_samples(id).await,
                PollerKind::Leech => self.leecher.download_files(id).await,
                PollerKind::Resume => continue,
            };

            match result {
                Ok(_) => sweep.processed.push(id),
                // another poller got there first
                Err(Error::Task(TaskError::InvalidState { .. })) => {
                    debug!(poller = %self.kind, task_id = %id, "task moved on, skipping");
                }
                Err(e) => {
                    error!(poller = %self.kind, task_id = %id, error = %e, "runner error");
                    sweep.errors += 1;
                }
            }
        }
        Ok(sweep)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::leecher::test_helpers::{create_test_leecher, create_task, publish_share};
    use crate::remote::Operation;
    use crate::error::RemoteError;

    #[tokio::test]
    async fn transfer_sweep_processes_inited_tasks() {
        let (leecher, remote, _temp_dir) = create_test_leecher().await;
        publish_share(&remote).await;
        let a = create_task(&leecher).await;
        let b = create_task(&leecher).await;

        let poller = Poller::new(PollerKind::Transfer, leecher.clone(), CancellationToken::new());
        let sweep = poller.sweep().await.unwrap();
        assert_eq!(sweep.processed, vec![a.id, b.id], "oldest first");

        for id in [a.id, b.id] {
            assert_eq!(leecher.get_task(id).await.unwrap().status, Status::Transferred);
        }
        assert!(poller.sweep().await.unwrap().processed.is_empty());
    }

    #[tokio::test]
    async fn one_failure_does_not_block_the_batch() {
        let (leecher, remote, _temp_dir) = create_test_leecher().await;
        publish_share(&remote).await;
        let a = create_task(&leecher).await;
        let b = create_task(&leecher).await;
        remote
            .fail_next(
                Operation::Save,
                RemoteError::Request("Connection reset by peer".to_string()),
            )
            .await;

        Poller::new(PollerKind::Transfer, leecher.clone(), CancellationToken::new())
            .run(true)
            .await;

        let a = leecher.get_task(a.id).await.unwrap();
        let b = leecher.get_task(b.id).await.unwrap();
        assert!(a.failed);
        assert!(!b.failed);
        assert_eq!(b.status, Status::Transferred);
    }

    #[tokio::test]
    async fn leech_sweep_skips_closed_gate() {
        let (leecher, remote, _temp_dir) = create_test_leecher().await;
        publish_share(&remote).await;
        let task = create_task(&leecher).await;
        let shutdown = CancellationToken::new();

        for kind in [PollerKind::Transfer, PollerKind::Sampling, PollerKind::Leech] {
            Poller::new(kind, leecher.clone(), shutdown.clone()).run(true).await;
        }
        let task = leecher.get_task(task.id).await.unwrap();
        assert_eq!(task.status, Status::SampleDownloaded);

        leecher.set_full_download_now(task.id, true).await.unwrap();
        Poller::new(PollerKind::Leech, leecher.clone(), shutdown).run(true).await;
        assert!(leecher.get_task(task.id).await.unwrap().done());
    }

    #[tokio::test]
    async fn cancelled_loop_returns() {
        let (leecher, _remote, _temp_dir) = create_test_leecher().await;
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(
            Poller::new(PollerKind::Resume, leecher, shutdown.clone()).run(false),
        );

        shutdown.cancel();
        tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
