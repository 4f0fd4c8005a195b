//! Stage engine
//!
//! Stage labels are derived from a task's status, failure flag, timestamps and
//! `full_download_now` gate; nothing here is stored.

use super::Task;
use crate::types::{ResumeAction, Stage, StageState, Status};
use chrono::{DateTime, Utc};

/// Stages with a status transition, and the status at which each one starts
const STATUS_WALK: [(Stage, Status); 4] = [
    (Stage::WaitingAssign, Status::Inited),
    (Stage::Transferring, Status::Started),
    (Stage::DownloadingSamplings, Status::Transferred),
    (Stage::DownloadingFiles, Status::SampleDownloaded),
];

/// Label every stage of `task`, in pipeline order
pub fn stages(task: &Task) -> Vec<(Stage, StageState)> {
    if task.failed {
        failed_walk(task)
    } else {
        status_walk(task)
    }
}

fn gate_state(task: &Task) -> StageState {
    if task.full_download_now {
        StageState::Done
    } else {
        StageState::Todo
    }
}

fn status_walk(task: &Task) -> Vec<(Stage, StageState)> {
    let mut seen_current = false;
    Stage::ALL
        .iter()
        .map(|&stage| {
            if stage == Stage::WaitingPermitDownload {
                return (stage, gate_state(task));
            }
            let start = STATUS_WALK
                .iter()
                .find(|(s, _)| *s == stage)
                .map(|(_, status)| *status);
            let state = if seen_current {
                StageState::Todo
            } else if start == Some(task.status) {
                seen_current = true;
                StageState::Doing
            } else {
                StageState::Done
            };
            (stage, state)
        })
        .collect()
}

fn timestamps(task: &Task, stage: Stage) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
    match stage {
        Stage::WaitingAssign => (Some(task.created_at), task.started_at),
        Stage::Transferring => (task.started_at, task.transfer_completed_at),
        Stage::DownloadingSamplings => (task.transfer_completed_at, task.sample_downloaded_at),
        Stage::DownloadingFiles => (task.sample_downloaded_at, task.full_downloaded_at),
        Stage::WaitingPermitDownload => (None, None),
    }
}

fn failed_walk(task: &Task) -> Vec<(Stage, StageState)> {
    Stage::ALL
        .iter()
        .map(|&stage| {
            if stage == Stage::WaitingPermitDownload {
                return (stage, gate_state(task));
            }
            let state = match timestamps(task, stage) {
                (_, Some(_)) => StageState::Done,
                (Some(_), None) => StageState::Failed,
                (None, None) => StageState::Todo,
            };
            (stage, state)
        })
        .collect()
}

/// The stage the task is in, `None` once every stage is done
///
/// A closed download gate ahead of the active stage holds the task, so the gate is
/// reported instead of the stage behind it.
pub fn current_stage(task: &Task) -> Option<Stage> {
    stages(task)
        .into_iter()
        .find(|(stage, state)| match state {
            StageState::Doing | StageState::Failed => true,
            StageState::Todo => *stage == Stage::WaitingPermitDownload,
            StageState::Done => false,
        })
        .map(|(stage, _)| stage)
}

/// Restart operation that re-runs `stage`
///
/// The transfer has no provider-side cursor, so a failed transfer restarts from
/// `Inited`. Sampling and full-download failures both go back to `Transferred` so the
/// file inventory is re-sampled before the next full download. The gate has none.
pub fn resume_action(stage: Stage) -> Option<ResumeAction> {
    match stage {
        Stage::WaitingAssign | Stage::Transferring => Some(ResumeAction::Restart),
        Stage::DownloadingSamplings | Stage::DownloadingFiles => {
            Some(ResumeAction::RestartDownloading)
        }
        Stage::WaitingPermitDownload => None,
    }
}
