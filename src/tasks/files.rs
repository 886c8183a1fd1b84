//! Downloads sorting and temp cleanup.

use crate::error::Result;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Destination folder → extensions moved into it.
pub const DOWNLOAD_CATEGORIES: [(&str, &[&str]); 5] = [
    ("Images", &[".jpg", ".jpeg", ".png", ".gif", ".bmp"]),
    ("Documents", &[".pdf", ".docx", ".txt", ".xlsx", ".pptx"]),
    ("Installers", &[".exe", ".msi"]),
    ("Archives", &[".zip", ".rar", ".7z"]),
    ("Videos", &[".mp4", ".mkv", ".avi"]),
];

fn category_for(path: &Path) -> Option<&'static str> {
    let ext = format!(
        ".{}",
        path.extension()?.to_string_lossy().to_lowercase()
    );
    DOWNLOAD_CATEGORIES
        .iter()
        .find(|(_, exts)| exts.contains(&ext.as_str()))
        .map(|(folder, _)| *folder)
}

/// Move top-level files of `downloads` into category folders.
///
/// Returns the number of files moved. Files that fail to move are skipped.
///
/// # Errors
///
/// Returns an error if `downloads` cannot be listed.
pub fn organize_downloads(downloads: &Path) -> Result<usize> {
    let mut moved = 0;
    for entry in std::fs::read_dir(downloads)? {
        let Ok(entry) = entry else { continue };
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(folder) = category_for(&path) else {
            continue;
        };
        let target_dir = downloads.join(folder);
        let result = std::fs::create_dir_all(&target_dir)
            .and_then(|()| std::fs::rename(&path, target_dir.join(entry.file_name())));
        match result {
            Ok(()) => moved += 1,
            Err(e) => debug!("skipping {}: {e}", path.display()),
        }
    }
    info!("organized {moved} files in {}", downloads.display());
    Ok(moved)
}

/// The user's temp directory from `TEMP`, `TMP` or `TMPDIR`.
pub fn temp_dir_from_env() -> Option<PathBuf> {
    ["TEMP", "TMP", "TMPDIR"]
        .iter()
        .find_map(|var| std::env::var_os(var))
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

/// Delete every file under `root`, recursively. Directories are left in
/// place. Returns how many files were removed; locked files are skipped.
pub fn clean_temp(root: &Path) -> usize {
    let mut removed = 0;
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let entries = match std::fs::read_dir(&dir) {
            Ok(e) => e,
            Err(e) => {
                warn!("cannot read {}: {e}", dir.display());
                continue;
            }
        };
        for entry in entries.flatten() {
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            let path = entry.path();
            if file_type.is_dir() {
                stack.push(path);
            } else if std::fs::remove_file(&path).is_ok() {
                removed += 1;
            }
        }
    }
    info!("removed {removed} temp files under {}", root.display());
    removed
}
