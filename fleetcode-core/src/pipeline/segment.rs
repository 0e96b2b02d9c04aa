// ============================================================================
// fleetcode-core/src/pipeline/segment.rs
// ============================================================================
//
// SEGMENTED VIDEO ENCODING: Split, Parallel Encode, Concatenate
//
// The video branch of a job cuts the video stream into time-bounded
// segments with one splitter call, encodes the segments on a bounded pool
// of encoder threads, then stream-copies the encoded segments back
// together in their original order.
//
// KEY COMPONENTS:
// - segment_plan: segment length and expected count
// - split_video: splitter call and on-disk segment discovery
// - encode_segments: worker pool over a shared (index, path) queue
// - concat_segments: concat list and stream-copy join
//
// ORDERING:
// Each encoded segment is stored in the slot of its position. Slots are
// written once by whichever worker encoded that segment, so the concat
// order never depends on which encode finished first.

// ---- External crate imports ----
use crossbeam_channel::unbounded;
use once_cell::sync::OnceCell;

// ---- Standard library imports ----
use std::fs;
use std::path::{Path, PathBuf};

// ---- Internal crate imports ----
use super::cancel::{CancellationToken, ErrorSlot};
use crate::error::{CoreError, CoreResult};
use crate::external::Transcoder;
use crate::external::ffmpeg::{EncodeKind, concat_args, concat_list_line, encode_args, split_args};
use crate::temp_files::{TempNamer, write_atomically};

/// One split piece of the source video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentFile {
    /// Position in playback order, also the number the splitter gave it
    pub index: usize,
    pub path: PathBuf,
}

/// Segment length in whole seconds and the number of segments it yields.
///
/// `unit = max(floor, ceil(total / workers))`, `count = ceil(total / unit)`.
pub fn segment_plan(total_secs: f64, workers: usize, floor_secs: u64) -> (u64, usize) {
    let workers = workers.max(1) as f64;
    let total = total_secs.max(0.0);
    let unit = ((total / workers).ceil() as u64).max(floor_secs).max(1);
    let count = ((total / unit as f64).ceil() as usize).max(1);
    (unit, count)
}

/// Splits stream `video_index` of `source` into segments of `unit_secs`.
///
/// Segment files left from an earlier run of the same job are removed
/// first. The splitter may write fewer or more files than `expected`; the
/// files it wrote are the numbers from 0 up to the first missing one.
pub fn split_video(
    transcoder: &dyn Transcoder,
    names: &TempNamer,
    source: &Path,
    source_ext: &str,
    video_index: usize,
    unit_secs: u64,
    expected: usize,
) -> CoreResult<Vec<SegmentFile>> {
    let stale = names.remove_role_files("video_");
    if stale > 0 {
        log::warn!("Removed {} stale segment files before splitting {}", stale, source.display());
    }

    let template = names.segment_template(source_ext);
    let args = split_args(source, &template, unit_secs, &format!("0:{video_index}"));
    transcoder
        .transcode(&args)
        .map_err(|e| CoreError::Encode(format!("split of {} failed: {}", source.display(), e)))?;

    let segments: Vec<SegmentFile> = (0..)
        .map(|number| names.segment(number, source_ext))
        .take_while(|path| path.is_file())
        .enumerate()
        .map(|(index, path)| SegmentFile { index, path })
        .collect();

    if segments.is_empty() {
        return Err(CoreError::Encode(format!(
            "splitter produced no segments for {}",
            source.display()
        )));
    }

    log::debug!(
        "Split {} into {} segments of {}s (expected {})",
        source.display(),
        segments.len(),
        unit_secs,
        expected
    );
    Ok(segments)
}

/// Encodes every segment with `params` on `workers` threads.
///
/// Returns the encoded paths in segment order. The first failing encode
/// cancels `token`; workers stop taking segments once it is cancelled.
/// A segment's input file is removed after its encode succeeds.
pub fn encode_segments(
    transcoder: &dyn Transcoder,
    names: &TempNamer,
    segments: Vec<SegmentFile>,
    params: &[String],
    target_ext: &str,
    workers: usize,
    token: &CancellationToken,
) -> CoreResult<Vec<PathBuf>> {
    let count = segments.len();
    let workers = workers.clamp(1, count.max(1));
    let slots: Vec<OnceCell<PathBuf>> = (0..count).map(|_| OnceCell::new()).collect();
    let errors = ErrorSlot::new(token.clone());

    let (tx, rx) = unbounded::<SegmentFile>();
    for segment in segments {
        // The receiver is alive, so sending cannot fail.
        let _ = tx.send(segment);
    }
    drop(tx);

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("segment-encoder-{i}"))
        .build()
        .map_err(|e| CoreError::Encode(format!("cannot start encoder pool: {e}")))?;

    log::info!("Encoding {} segments on {} threads", count, workers);

    pool.scope(|scope| {
        for _ in 0..workers {
            let rx = rx.clone();
            let slots = &slots;
            let errors = &errors;
            scope.spawn(move |_| {
                while let Ok(segment) = rx.recv() {
                    if errors.token().is_cancelled() {
                        break;
                    }
                    let output = names.converted(segment.index, target_ext);
                    let args = encode_args(EncodeKind::Video, &segment.path, &output, params, "0:v:0");

                    if let Err(e) = transcoder.transcode(&args) {
                        log::warn!("Segment {} failed: {}", segment.index, e);
                        errors.fail(CoreError::Encode(format!(
                            "segment {} ({}): {}",
                            segment.index,
                            segment.path.display(),
                            e
                        )));
                        break;
                    }
                    if let Err(e) = fs::remove_file(&segment.path) {
                        errors.fail(CoreError::Encode(format!(
                            "cannot remove segment {}: {}",
                            segment.path.display(),
                            e
                        )));
                        break;
                    }
                    log::debug!("Segment {} encoded", segment.index);
                    let _ = slots[segment.index].set(output);
                }
            });
        }
    });

    if let Some(err) = errors.into_error() {
        return Err(err);
    }
    if token.is_cancelled() {
        return Err(CoreError::Cancelled);
    }

    slots
        .into_iter()
        .enumerate()
        .map(|(i, slot)| {
            slot.into_inner()
                .ok_or_else(|| CoreError::Encode(format!("segment {i} produced no output")))
        })
        .collect()
}

/// Joins `parts` in order into `output` and removes the parts and the list.
pub fn concat_segments(
    transcoder: &dyn Transcoder,
    names: &TempNamer,
    parts: &[PathBuf],
    output: &Path,
) -> CoreResult<()> {
    if parts.is_empty() {
        return Err(CoreError::Concat("no segments to concatenate".to_string()));
    }

    let list = names.concat_list();
    let contents: String = parts.iter().map(|p| concat_list_line(p)).collect();
    write_atomically(&list, &contents)
        .map_err(|e| CoreError::Concat(format!("cannot write {}: {}", list.display(), e)))?;

    transcoder
        .transcode(&concat_args(&list, output))
        .map_err(|e| CoreError::Concat(e.to_string()))?;

    for path in parts.iter().chain(std::iter::once(&list)) {
        fs::remove_file(path).map_err(|e| {
            CoreError::Concat(format!("cannot remove {}: {}", path.display(), e))
        })?;
    }

    log::debug!("Concatenated {} segments into {}", parts.len(), output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_plan_floor() {
        // 30 s on 4 workers would be 8 s pieces, the floor raises them to 16.
        assert_eq!(segment_plan(30.0, 4, 16), (16, 2));
    }

    #[test]
    fn test_segment_plan_even_split() {
        assert_eq!(segment_plan(600.0, 4, 16), (150, 4));
        assert_eq!(segment_plan(601.0, 4, 16), (151, 4));
    }

    /// Writes the listed segment numbers for any split request.
    struct Splitter(Vec<usize>);

    impl Transcoder for Splitter {
        fn transcode(&self, args: &[String]) -> CoreResult<String> {
            let template = args.last().cloned().unwrap_or_default();
            for n in &self.0 {
                fs::write(template.replace("%d", &n.to_string()), format!("seg{n}"))?;
            }
            Ok(String::new())
        }
    }

    #[test]
    fn test_split_stops_at_first_gap() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let names = TempNamer::new(dir.path(), "9");
        let source = dir.path().join("in.mkv");

        let segments = split_video(&Splitter(vec![0, 1, 3]), &names, &source, "mkv", 0, 10, 4)?;
        let indexes: Vec<usize> = segments.iter().map(|s| s.index).collect();
        assert_eq!(indexes, vec![0, 1]);
        assert_eq!(segments[1].path, names.segment(1, "mkv"));
        Ok(())
    }

    #[test]
    fn test_split_clears_stale_segments() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let names = TempNamer::new(dir.path(), "9");
        fs::write(names.segment(2, "mkv"), "STALE")?;
        fs::write(names.converted(0, "webm"), "STALE")?;

        let segments = split_video(&Splitter(vec![0, 1]), &names, &dir.path().join("in.mkv"), "mkv", 0, 10, 2)?;
        assert_eq!(segments.len(), 2);
        assert!(!names.segment(2, "mkv").exists());
        assert!(!names.converted(0, "webm").exists());
        Ok(())
    }

    #[test]
    fn test_split_without_output_fails() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let names = TempNamer::new(dir.path(), "9");
        let err = split_video(&Splitter(vec![1]), &names, &dir.path().join("in.mkv"), "mkv", 0, 10, 2)
            .unwrap_err();
        assert!(matches!(err, CoreError::Encode(_)));
        Ok(())
    }

    #[test]
    fn test_segment_plan_degenerate_inputs() {
        assert_eq!(segment_plan(0.0, 0, 16), (16, 1));
        assert_eq!(segment_plan(5.0, 8, 16), (16, 1));
    }
}
