use super::test_helpers::*;
use super::*;
use crate::error::{Error, RemoteError, TaskError};
use crate::remote::{CaptchaAnswer, Operation};
use crate::types::{CaptchaChallenge, Stage, Status, TaskId, TransferPolicy};

mod callback;
mod download;
mod sampling;

fn connection_reset() -> RemoteError {
    RemoteError::Request("Connection reset by peer".to_string())
}

/// Inventory entries that would resolve outside the task directory
fn escaping_entries() -> Vec<crate::types::RemoteFile> {
    ["../../escape.bin", "/tmp/leecher-escape/escape.bin"]
        .into_iter()
        .map(|path| crate::types::RemoteFile {
            path: path.to_string(),
            is_dir: false,
            is_file: true,
            size: 4,
            md5: None,
        })
        .collect()
}

fn written_anywhere(root: &std::path::Path, name: &str) -> bool {
    walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .any(|entry| entry.file_name() == name)
        || std::path::Path::new("/tmp/leecher-escape").exists()
}
