//! # baidupcs-leecher
//!
//! Leech files shared on Baidu Pan. A shared link becomes a task that moves
//! through a fixed pipeline:
//!
//! 1. **transfer** - the shared link is saved into our own remote directory and listed
//! 2. **sampling** - the head of every file is downloaded for inspection
//! 3. **leech** - once permitted, every file is downloaded in full
//!
//! Each stage is driven by a poller ([`poller::Poller`]) selecting tasks by
//! status; failures are recorded on the task, classified as recoverable or
//! not, and recoverable ones are resumed automatically.
//!
//! ## Quick Start
//!
//! ```no_run
//! use baidupcs_leecher::{BaiduPcsClient, Config, CreateTask, Leecher};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load(None)?;
//!     let remote = Arc::new(BaiduPcsClient::from_config(&config)?);
//!     let leecher = Leecher::new(config, remote).await?;
//!
//!     let task = leecher
//!         .create_task(CreateTask {
//!             shared_link: "https://pan.baidu.com/s/1abc?pwd=wxyz".to_string(),
//!             ..Default::default()
//!         })
//!         .await?;
//!
//!     let task = leecher.transfer(task.id).await?;
//!     println!("{} files in {}", task.total_files(), task.path_name());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// REST API module
pub mod api;
/// Configuration types
pub mod config;
/// Database persistence layer
pub mod db;
/// Error types
pub mod error;
/// Leech service and pipeline runners (decomposed into focused submodules)
pub mod leecher;
/// Poller commands
pub mod poller;
/// Remote storage provider clients
pub mod remote;
/// Retry logic with backoff
pub mod retry;
/// Shared link parsing
pub mod shared_link;
/// Task entity, stage engine and recoverability classifier
pub mod task;
/// Core types
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use db::Database;
pub use error::{
    ApiError, DatabaseError, Error, ErrorDetail, RemoteError, Result, TaskError, ToHttpStatus,
};
pub use leecher::{CreateTask, Leecher};
pub use poller::{Poller, PollerKind};
pub use remote::{BaiduPcsClient, MemoryRemote, RemoteClient};
pub use task::Task;
pub use types::{
    CallbackAction, LocalFile, RemoteFile, ResumeAction, Stage, StageState, Status, TaskId,
    TaskInfo, TransferPolicy,
};

use tokio_util::sync::CancellationToken;

/// Token cancelled on the first termination signal.
///
/// Hand clones to every poller and to the API server so one signal stops them all.
///
/// # Example
///
/// ```no_run
/// use baidupcs_leecher::{Config, Leecher, MemoryRemote, Poller, PollerKind, shutdown_on_signal};
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let leecher = Leecher::new(Config::default(), Arc::new(MemoryRemote::new())).await?;
///     let shutdown = shutdown_on_signal();
///
///     Poller::new(PollerKind::Transfer, leecher, shutdown).run(false).await;
///     Ok(())
/// }
/// ```
pub fn shutdown_on_signal() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        trigger.cancel();
    });
    token
}

/// Wait for a termination signal.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
#[cfg(unix)]
pub async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Set up signal handlers - these may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

/// Wait for Ctrl+C.
#[cfg(not(unix))]
pub async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
