//! Small filesystem and string helpers shared by the runners and the remote client

use crate::types::LocalFile;
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// Longest failure message stored on a task, in characters
pub const MAX_MESSAGE_CHARS: usize = 1000;

/// Truncate a failure message to [`MAX_MESSAGE_CHARS`] characters
pub fn truncate_message(message: &str) -> String {
    match message.char_indices().nth(MAX_MESSAGE_CHARS) {
        Some((end, _)) => message[..end].to_string(),
        None => message.to_string(),
    }
}

/// Parse a raw cookie header (`k1=v1; k2=v2`) into a map
///
/// Pairs without `=` are ignored; later duplicates win.
pub fn parse_cookies(raw: &str) -> BTreeMap<String, String> {
    raw.split(';')
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            let key = key.trim();
            if key.is_empty() {
                return None;
            }
            Some((key.to_string(), value.trim().to_string()))
        })
        .collect()
}

/// List regular files under `dir`, with paths relative to `dir` using `/` separators
///
/// A missing directory yields an empty list.
pub fn list_local_files(dir: &Path) -> std::io::Result<Vec<LocalFile>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(std::io::Error::other)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry.path().strip_prefix(dir).unwrap_or(entry.path());
        let path = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        files.push(LocalFile {
            path,
            size: entry.metadata().map_err(std::io::Error::other)?.len(),
        });
    }
    Ok(files)
}

/// Size of a local file, 0 if it does not exist
pub fn local_file_size(path: &Path) -> u64 {
    std::fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

/// `root/relative`, or `None` when `relative` could leave `root`
///
/// Only plain components are accepted: no root, drive prefix, `.` or `..`.
pub fn contained_path(root: &Path, relative: &str) -> Option<PathBuf> {
    let relative = Path::new(relative);
    let plain = relative.components().next().is_some()
        && relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
    plain.then(|| root.join(relative))
}

/// Closest existing ancestor of `path` (the path itself if it exists)
///
/// Task directories are created lazily, so free space is probed on whatever
/// part of the path already exists.
pub fn existing_ancestor(path: &Path) -> PathBuf {
    let mut current = path;
    loop {
        if current.exists() {
            return current.to_path_buf();
        }
        match current.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => current = parent,
            _ => return PathBuf::from("."),
        }
    }
}

/// Get available disk space for a given path
///
/// Returns the available disk space in bytes, or an IO error if the check fails.
pub fn get_available_space(path: &Path) -> std::io::Result<u64> {
    #[cfg(unix)]
    {
        use std::ffi::CString;
        use std::os::unix::ffi::OsStrExt;

        let c_path = CString::new(path.as_os_str().as_bytes())
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;

        // SAFETY: c_path is a valid null-terminated string, stat is zero-initialized
        // and only read after statvfs reports success.
        unsafe {
            let mut stat: libc::statvfs = std::mem::zeroed();
            if libc::statvfs(c_path.as_ptr(), &mut stat) != 0 {
                return Err(std::io::Error::last_os_error());
            }

            // f_bavail: blocks available to unprivileged users
            #[allow(clippy::unnecessary_cast)]
            let available_bytes = (stat.f_bavail as u64).saturating_mul(stat.f_frsize as u64);
            Ok(available_bytes)
        }
    }

    #[cfg(windows)]
    {
        use std::os::windows::ffi::OsStrExt;
        use winapi::um::fileapi::GetDiskFreeSpaceExW;

        let wide_path: Vec<u16> = path
            .as_os_str()
            .encode_wide()
            .chain(std::iter::once(0))
            .collect();

        // SAFETY: wide_path is null-terminated and every out pointer refers to a
        // live u64 that is only read after the call succeeds.
        unsafe {
            let mut free_bytes_available: u64 = 0;
            let mut _total_bytes: u64 = 0;
            let mut _total_free_bytes: u64 = 0;

            if GetDiskFreeSpaceExW(
                wide_path.as_ptr(),
                &mut free_bytes_available as *mut u64 as *mut _,
                &mut _total_bytes as *mut u64 as *mut _,
                &mut _total_free_bytes as *mut u64 as *mut _,
            ) == 0
            {
                return Err(std::io::Error::last_os_error());
            }

            Ok(free_bytes_available)
        }
    }

    #[cfg(not(any(unix, windows)))]
    {
        let _ = path;
        Err(std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            "disk space checking not supported on this platform",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn truncate_message_keeps_short_messages() {
        assert_eq!(truncate_message("boom"), "boom");
    }

    #[test]
    fn truncate_message_cuts_on_char_boundary() {
        let long = "该".repeat(MAX_MESSAGE_CHARS + 10);
        let truncated = truncate_message(&long);
        assert_eq!(truncated.chars().count(), MAX_MESSAGE_CHARS);
    }

    #[test]
    fn parse_cookies_splits_pairs() {
        let cookies = parse_cookies("BDUSS=abc; STOKEN=def ;broken; =x; PANPSC=a=b");
        assert_eq!(cookies.get("BDUSS").map(String::as_str), Some("abc"));
        assert_eq!(cookies.get("STOKEN").map(String::as_str), Some("def"));
        assert_eq!(cookies.get("PANPSC").map(String::as_str), Some("a=b"));
        assert_eq!(cookies.len(), 3);
    }

    #[test]
    fn list_local_files_is_relative_and_sorted() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("b.txt"), b"12345").unwrap();
        std::fs::write(dir.path().join("sub/a.bin"), b"1").unwrap();

        let files = list_local_files(dir.path()).unwrap();
        assert_eq!(
            files,
            vec![
                LocalFile {
                    path: "b.txt".to_string(),
                    size: 5
                },
                LocalFile {
                    path: "sub/a.bin".to_string(),
                    size: 1
                },
            ]
        );
    }

    #[test]
    fn list_local_files_missing_dir_is_empty() {
        let dir = TempDir::new().unwrap();
        let files = list_local_files(&dir.path().join("nope")).unwrap();
        assert!(files.is_empty());
    }

    #[test]
    fn local_file_size_of_missing_file_is_zero() {
        let dir = TempDir::new().unwrap();
        assert_eq!(local_file_size(&dir.path().join("missing")), 0);
    }

    #[test]
    fn contained_path_rejects_escapes() {
        let root = Path::new("/data/task");
        assert_eq!(
            contained_path(root, "movie/a.mkv"),
            Some(PathBuf::from("/data/task/movie/a.mkv"))
        );
        assert_eq!(contained_path(root, "/elsewhere/x"), None);
        assert_eq!(contained_path(root, "../x"), None);
        assert_eq!(contained_path(root, "movie/../../x"), None);
        assert_eq!(contained_path(root, "./x"), None);
        assert_eq!(contained_path(root, ""), None);
    }

    #[test]
    fn existing_ancestor_walks_up() {
        let dir = TempDir::new().unwrap();
        let deep = dir.path().join("a/b/c");
        assert_eq!(existing_ancestor(&deep), dir.path().to_path_buf());
    }

    #[test]
    fn test_get_available_space_valid_path() {
        let temp_dir = TempDir::new().unwrap();
        let available = get_available_space(temp_dir.path()).unwrap();
        assert!(available > 0, "Available space should be greater than 0");
    }

    #[test]
    fn test_get_available_space_nonexistent_path() {
        let result = get_available_space(Path::new("/nonexistent/path/that/should/not/exist"));
        assert!(result.is_err(), "Should return error for nonexistent path");
    }
}
