//! Output validation and replacement of the original file.
//!
//! The original is first moved to a hidden backup `.<name>.<ext>` next to
//! it, then the finished output is moved to `<name>.<target_ext>`. If the
//! second move fails the backup is moved back, so the directory always
//! holds either the original or its replacement.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{CoreError, CoreResult};
use crate::external::Prober;
use crate::media::{Category, TranscodeContext};

/// Smallest allowed drift between source and output duration, in seconds.
pub const MIN_DURATION_TOLERANCE_SECS: f64 = 1.0;

/// Allowed drift as a share of the source duration.
pub const DURATION_TOLERANCE_RATIO: f64 = 0.02;

/// Moves a file, falling back to copy and delete across filesystems.
pub fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(rename_err) => {
            log::debug!(
                "rename {} -> {} failed ({}), copying instead",
                from.display(),
                to.display(),
                rename_err
            );
            if let Err(e) = fs::copy(from, to) {
                let _ = fs::remove_file(to);
                return Err(e);
            }
            fs::remove_file(from)
        }
    }
}

/// Checks that `output` exists and is non-empty and, for video
/// categories, that its duration is within tolerance of the source.
pub fn validate_output(
    ctx: &TranscodeContext,
    prober: &dyn Prober,
    output: &Path,
    check_duration: bool,
) -> CoreResult<()> {
    let metadata = fs::metadata(output).map_err(|e| {
        CoreError::Validation(format!("output {} is missing: {}", output.display(), e))
    })?;
    if metadata.len() == 0 {
        return Err(CoreError::Validation(format!(
            "output {} is empty",
            output.display()
        )));
    }

    if check_duration && matches!(ctx.category, Category::Video | Category::VideoAndAudio) {
        let expected = prober.duration(&ctx.source_path())?;
        let actual = prober.duration(output)?;
        let tolerance = (expected * DURATION_TOLERANCE_RATIO).max(MIN_DURATION_TOLERANCE_SECS);
        if (expected - actual).abs() > tolerance {
            return Err(CoreError::Validation(format!(
                "output duration {actual:.3}s differs from source {expected:.3}s by more than {tolerance:.3}s"
            )));
        }
    }

    Ok(())
}

/// Replaces the original file of `ctx` with `output`.
///
/// Returns the final path `<dir>/<name>.<target_ext>`.
pub fn replace_original(
    ctx: &TranscodeContext,
    output: &Path,
    target_ext: &str,
    keep_backup: bool,
) -> CoreResult<PathBuf> {
    let source = ctx.source_path();
    let backup = ctx
        .file
        .with_name_ext(&format!(".{}", ctx.file.name), &ctx.file.ext);
    let destination = ctx.file.with_name_ext(&ctx.file.name, target_ext);

    if destination != source && destination.exists() {
        return Err(CoreError::Swap(format!(
            "{} already exists, refusing to overwrite",
            destination.display()
        )));
    }

    move_file(&source, &backup).map_err(|e| {
        CoreError::Swap(format!(
            "cannot move {} to {}: {}",
            source.display(),
            backup.display(),
            e
        ))
    })?;
    log::debug!("Moved {} -> {}", source.display(), backup.display());

    if let Err(e) = move_file(output, &destination) {
        if let Err(restore) = move_file(&backup, &source) {
            log::error!(
                "Could not restore {} from {}: {}",
                source.display(),
                backup.display(),
                restore
            );
        }
        return Err(CoreError::Swap(format!(
            "cannot move {} to {}: {}",
            output.display(),
            destination.display(),
            e
        )));
    }
    log::debug!("Moved {} -> {}", output.display(), destination.display());

    if !keep_backup {
        if let Err(e) = fs::remove_file(&backup) {
            log::warn!("Could not remove backup {}: {}", backup.display(), e);
        }
    }

    Ok(destination)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_move_file_renames() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let from = dir.path().join("a");
        let to = dir.path().join("b");
        fs::write(&from, "x")?;
        move_file(&from, &to)?;
        assert!(!from.exists());
        assert_eq!(fs::read_to_string(&to)?, "x");
        Ok(())
    }

    #[test]
    fn test_move_missing_file_fails() {
        let dir = tempdir().unwrap();
        assert!(move_file(&dir.path().join("nope"), &dir.path().join("b")).is_err());
        assert!(!dir.path().join("b").exists());
    }
}
