//! Temporary file naming and cleanup.
//!
//! Every intermediate file of a job lives directly in the worker's temp
//! directory and is named `.<id>_<role>.<ext>`, where `<id>` is the job's
//! content-hash ID. Cleanup after a failed job removes everything with the
//! `.<id>_` prefix.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::Builder as TempFileBuilder;

use crate::error::CoreResult;

/// Placeholder the splitter replaces with the segment number.
pub const SEGMENT_PLACEHOLDER: &str = "%d";

/// Derives the temp paths of one job.
#[derive(Debug, Clone)]
pub struct TempNamer {
    dir: PathBuf,
    id: String,
}

impl TempNamer {
    pub fn new(dir: &Path, id: &str) -> Self {
        Self {
            dir: dir.to_path_buf(),
            id: id.to_string(),
        }
    }

    /// Prefix shared by all of this job's files.
    pub fn prefix(&self) -> String {
        format!(".{}_", self.id)
    }

    /// `<dir>/.<id>_<role>.<ext>`
    pub fn path(&self, role: &str, ext: &str) -> PathBuf {
        self.dir.join(format!("{}{}.{}", self.prefix(), role, ext))
    }

    /// Output template handed to the splitter.
    pub fn segment_template(&self, ext: &str) -> PathBuf {
        self.path(&format!("video_{SEGMENT_PLACEHOLDER}"), ext)
    }

    /// Segment `n` as written by the splitter.
    pub fn segment(&self, n: usize, ext: &str) -> PathBuf {
        self.path(&format!("video_{n}"), ext)
    }

    /// Encoded form of segment `n`.
    pub fn converted(&self, n: usize, ext: &str) -> PathBuf {
        self.path(&format!("video_{n}_converted"), ext)
    }

    pub fn concat_list(&self) -> PathBuf {
        self.path("concatlist", "txt")
    }

    pub fn video_concat(&self, ext: &str) -> PathBuf {
        self.path("videoconcat", ext)
    }

    pub fn mux(&self, ext: &str) -> PathBuf {
        self.path("mux", ext)
    }

    /// Removes this job's files whose role starts with `role_prefix`.
    pub fn remove_role_files(&self, role_prefix: &str) -> usize {
        remove_prefixed(&self.dir, &format!("{}{}", self.prefix(), role_prefix))
    }
}

/// Writes `contents` to `path` through a staging file in the same directory,
/// so the file at `path` is either absent or complete.
pub fn write_atomically(path: &Path, contents: &str) -> CoreResult<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)?;

    let mut staged = TempFileBuilder::new()
        .prefix(".staging_")
        .tempfile_in(dir)?;
    staged.write_all(contents.as_bytes())?;
    staged.as_file().sync_all()?;
    staged.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Removes every file in `dir` whose name starts with `.<id>_`.
/// Returns how many were removed. Failures are logged and skipped.
pub fn cleanup_job_files(dir: &Path, id: &str) -> usize {
    let removed = remove_prefixed(dir, &format!(".{id}_"));
    if removed > 0 {
        log::debug!("Removed {} temp files for job {}", removed, id);
    }
    removed
}

fn remove_prefixed(dir: &Path, prefix: &str) -> usize {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            log::warn!("Cannot list temp directory {}: {}", dir.display(), e);
            return 0;
        }
    };

    let mut removed = 0;
    for entry in entries.flatten() {
        let name = entry.file_name();
        if !name.to_string_lossy().starts_with(prefix) {
            continue;
        }
        match fs::remove_file(entry.path()) {
            Ok(()) => removed += 1,
            Err(e) => log::warn!("Failed to remove {}: {}", entry.path().display(), e),
        }
    }
    removed
}
