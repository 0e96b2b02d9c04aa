//! File discovery for the master's job queue.
//!
//! A producer thread walks the root directory and pushes every eligible
//! file into a bounded channel, blocking while the channel is full. When
//! the walk ends the thread sets the done flag and drops its sender, which
//! disconnects the channel once the queue drains.

use crossbeam_channel::{Receiver, bounded};
use walkdir::{DirEntry, WalkDir};

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};

use crate::error::{CoreError, CoreResult};
use crate::events::{Event, EventDispatcher};

/// Whether `path` should be handed to a worker.
///
/// Hidden files, files without an extension and files whose lowercase
/// extension is in `excluded` are not eligible.
pub fn is_eligible(path: &Path, excluded: &HashSet<String>) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    if name.starts_with('.') {
        return false;
    }
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if !ext.is_empty() => !excluded.contains(&ext.to_ascii_lowercase()),
        _ => false,
    }
}

fn is_hidden_dir(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry.file_name().to_string_lossy().starts_with('.')
}

/// A running discovery walk.
pub struct Discovery {
    pub receiver: Receiver<PathBuf>,
    done: Arc<AtomicBool>,
    queued: Arc<AtomicUsize>,
    handle: Option<JoinHandle<()>>,
}

impl Discovery {
    /// True once the walk has finished; the queue may still hold paths.
    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::SeqCst)
    }

    /// Paths pushed so far.
    pub fn queued(&self) -> usize {
        self.queued.load(Ordering::SeqCst)
    }

    /// A finished discovery over a fixed list of paths.
    pub fn from_paths(paths: Vec<PathBuf>) -> Self {
        let (tx, rx) = bounded(paths.len().max(1));
        let queued = paths.len();
        for path in paths {
            let _ = tx.send(path);
        }
        Self {
            receiver: rx,
            done: Arc::new(AtomicBool::new(true)),
            queued: Arc::new(AtomicUsize::new(queued)),
            handle: None,
        }
    }

    /// Waits for the producer thread to finish.
    pub fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("Discovery thread panicked");
            }
        }
    }
}

/// Starts walking `root` on a background thread.
///
/// Files are visited in file-name order within each directory. Hidden
/// directories are not entered.
pub fn spawn_discovery(
    root: &Path,
    excluded: &[String],
    capacity: usize,
    events: EventDispatcher,
) -> CoreResult<Discovery> {
    if !root.is_dir() {
        return Err(CoreError::Config(format!(
            "{} is not a directory",
            root.display()
        )));
    }

    let excluded: HashSet<String> = excluded
        .iter()
        .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
        .collect();
    let (tx, rx) = bounded(capacity.max(1));
    let done = Arc::new(AtomicBool::new(false));
    let queued = Arc::new(AtomicUsize::new(0));

    let root = root.to_path_buf();
    let thread_done = Arc::clone(&done);
    let thread_queued = Arc::clone(&queued);

    let handle = thread::Builder::new()
        .name("discovery".to_string())
        .spawn(move || {
            events.emit(Event::DiscoveryStarted {
                root: root.display().to_string(),
            });

            let walker = WalkDir::new(&root)
                .sort_by_file_name()
                .into_iter()
                .filter_entry(|entry| !is_hidden_dir(entry));

            for entry in walker {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        log::warn!("Skipping unreadable entry: {}", e);
                        continue;
                    }
                };
                if !entry.file_type().is_file() || !is_eligible(entry.path(), &excluded) {
                    continue;
                }
                log::trace!("Queueing {}", entry.path().display());
                if tx.send(entry.into_path()).is_err() {
                    log::debug!("Job queue closed, stopping discovery");
                    break;
                }
                thread_queued.fetch_add(1, Ordering::SeqCst);
            }

            thread_done.store(true, Ordering::SeqCst);
            events.emit(Event::DiscoveryComplete {
                queued: thread_queued.load(Ordering::SeqCst),
            });
        })
        .map_err(CoreError::Io)?;

    Ok(Discovery {
        receiver: rx,
        done,
        queued,
        handle: Some(handle),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_excluded_extensions;
    use std::fs;
    use tempfile::tempdir;

    fn excluded() -> HashSet<String> {
        default_excluded_extensions().into_iter().collect()
    }

    #[test]
    fn test_is_eligible() {
        let ex = excluded();
        assert!(is_eligible(Path::new("/m/a.mkv"), &ex));
        assert!(is_eligible(Path::new("/m/A.MP4"), &ex));
        assert!(!is_eligible(Path::new("/m/.a.mkv"), &ex));
        assert!(!is_eligible(Path::new("/m/README"), &ex));
        assert!(!is_eligible(Path::new("/m/notes.TXT"), &ex));
        assert!(!is_eligible(Path::new("/m/sub.srt"), &ex));
        assert!(!is_eligible(Path::new("/m/done.webm"), &ex));
        assert!(!is_eligible(Path::new("/m/trailing."), &ex));
    }

    #[test]
    fn test_walk_skips_hidden_dirs_and_finishes() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        fs::create_dir(dir.path().join("season1"))?;
        fs::create_dir(dir.path().join(".cache"))?;
        fs::write(dir.path().join("b.mkv"), "")?;
        fs::write(dir.path().join("a.mp4"), "")?;
        fs::write(dir.path().join("season1").join("c.avi"), "")?;
        fs::write(dir.path().join(".cache").join("d.mkv"), "")?;
        fs::write(dir.path().join("list.txt"), "")?;

        let mut discovery = spawn_discovery(
            dir.path(),
            &default_excluded_extensions(),
            1,
            EventDispatcher::new(),
        )?;
        let found: Vec<PathBuf> = discovery.receiver.iter().collect();
        discovery.join();

        assert!(discovery.is_done());
        assert_eq!(discovery.queued(), 3);
        assert_eq!(
            found,
            vec![
                dir.path().join("a.mp4"),
                dir.path().join("b.mkv"),
                dir.path().join("season1").join("c.avi"),
            ]
        );
        Ok(())
    }
}
