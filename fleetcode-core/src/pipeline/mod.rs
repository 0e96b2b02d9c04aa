// ============================================================================
// fleetcode-core/src/pipeline/mod.rs
// ============================================================================
//
// TRANSCODE PIPELINE: Per-Category Job Execution
//
// Dispatches a classified TranscodeContext to the matching pipeline:
//
//   image / audio / video      one encode -> validate -> swap
//   video_and_audio            audio branch || video branch
//                              -> mux -> validate -> swap
//
// The video branch of a video_and_audio job is segmented (see segment.rs).
// Both branches share a cancellation token: the first failure stops the
// other branch from starting new work and is the error the job reports.
//
// On any failure the job's temp files are removed and the original file
// is left in place.

// ---- Standard library imports ----
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;

// ---- Internal crate imports ----
use crate::config::{MediaKind, WorkerConfig};
use crate::error::{CoreError, CoreResult};
use crate::external::Toolset;
use crate::external::ffmpeg::{COPY_AUDIO_PARAMS, COPY_VIDEO_PARAMS, EncodeKind, encode_args, mux_args};
use crate::media::{Category, StreamType, TranscodeContext};
use crate::selection::{is_skippable, select_audio_stream};
use crate::temp_files::{TempNamer, cleanup_job_files};

// ============================================================================
// SUBMODULES
// ============================================================================

pub mod cancel;
pub mod segment;
pub mod swap;

pub use cancel::{CancellationToken, ErrorSlot};
pub use segment::{SegmentFile, segment_plan};

/// Tunables of one pipeline run, taken from [`WorkerConfig`].
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Parallel segment encoders
    pub workers: usize,
    /// Floor for the segment length in seconds
    pub min_segment_secs: u64,
    pub keep_backup: bool,
    pub validate_duration: bool,
}

impl From<&WorkerConfig> for PipelineSettings {
    fn from(config: &WorkerConfig) -> Self {
        Self {
            workers: config.segment_workers(),
            min_segment_secs: config.min_segment_secs,
            keep_backup: config.keep_backup,
            validate_duration: config.validate_duration,
        }
    }
}

/// Runs the pipeline for `ctx` and returns the path of the replacement.
///
/// Returns `Ok(None)` for categories that are not transcoded; nothing on
/// disk is touched in that case.
pub fn transcode(
    ctx: &TranscodeContext,
    tools: Toolset<'_>,
    settings: &PipelineSettings,
) -> CoreResult<Option<PathBuf>> {
    let Some(kind) = ctx.category.output_kind() else {
        log::debug!(
            "Nothing to transcode for {} ({})",
            ctx.source_path().display(),
            ctx.category
        );
        return Ok(None);
    };

    fs::create_dir_all(&ctx.temp_dir)?;
    log::info!(
        "Transcoding {} as {}",
        ctx.source_path().display(),
        ctx.category
    );

    let result = if ctx.category == Category::VideoAndAudio {
        video_and_audio(ctx, tools, settings)
    } else {
        single_stream(ctx, tools, settings, kind)
    };

    match result {
        Ok(path) => Ok(Some(path)),
        Err(e) => {
            cleanup_job_files(&ctx.temp_dir, &ctx.id);
            Err(e)
        }
    }
}

/// One encode of a single stream, then swap.
fn single_stream(
    ctx: &TranscodeContext,
    tools: Toolset<'_>,
    settings: &PipelineSettings,
    kind: MediaKind,
) -> CoreResult<PathBuf> {
    let names = TempNamer::new(&ctx.temp_dir, &ctx.id);
    let target_ext = ctx.policy.target_ext(kind)?;
    let output = names.path(kind.key(), &target_ext);
    let source = ctx.source_path();

    let (stream, encode_kind) = match kind {
        MediaKind::Audio => (select_audio_stream(ctx), EncodeKind::Audio),
        MediaKind::Image | MediaKind::Video => (
            ctx.first_stream_of(StreamType::Video).unwrap_or(0),
            EncodeKind::Video,
        ),
    };

    let params = stream_params(ctx, kind, stream);
    tools
        .transcoder
        .transcode(&encode_args(encode_kind, &source, &output, &params, &format!("0:{stream}")))
        .map_err(|e| CoreError::Encode(format!("{kind} encode of {}: {e}", source.display())))?;

    finish(ctx, tools, settings, &output, &target_ext)
}

/// Codec-copy parameters when the stream is skippable, otherwise the
/// policy's encoder arguments for `kind`.
fn stream_params(ctx: &TranscodeContext, kind: MediaKind, stream: usize) -> Vec<String> {
    if is_skippable(ctx, kind, stream) {
        log::debug!("Stream {} satisfies {}.skip_if, copying", stream, kind);
        let copy = match kind {
            MediaKind::Audio => COPY_AUDIO_PARAMS,
            MediaKind::Image | MediaKind::Video => COPY_VIDEO_PARAMS,
        };
        copy.iter().map(|s| s.to_string()).collect()
    } else {
        ctx.policy.ffmpeg_param(kind)
    }
}

fn finish(
    ctx: &TranscodeContext,
    tools: Toolset<'_>,
    settings: &PipelineSettings,
    output: &Path,
    target_ext: &str,
) -> CoreResult<PathBuf> {
    swap::validate_output(ctx, tools.prober, output, settings.validate_duration)?;
    let replaced = swap::replace_original(ctx, output, target_ext, settings.keep_backup)?;
    log::info!(
        "Replaced {} with {}",
        ctx.source_path().display(),
        replaced.display()
    );
    Ok(replaced)
}

/// Audio and video branches in parallel, then mux and swap.
fn video_and_audio(
    ctx: &TranscodeContext,
    tools: Toolset<'_>,
    settings: &PipelineSettings,
) -> CoreResult<PathBuf> {
    let names = TempNamer::new(&ctx.temp_dir, &ctx.id);
    let audio_ext = ctx.policy.target_ext(MediaKind::Audio)?;
    let video_ext = ctx.policy.target_ext(MediaKind::Video)?;
    let audio_out = names.path("audio", &audio_ext);
    let video_out = names.video_concat(&video_ext);

    let token = CancellationToken::new();
    let errors = ErrorSlot::new(token.clone());

    // A cancelled branch only reports Cancelled; the branch that caused
    // the cancellation stores the real error.
    let record = |branch: &str, result: CoreResult<()>| match result {
        Ok(()) => log::debug!("{} branch finished", branch),
        Err(CoreError::Cancelled) => log::debug!("{} branch cancelled", branch),
        Err(e) => {
            log::warn!("{} branch failed: {}", branch, e);
            errors.fail(e);
        }
    };

    thread::scope(|s| {
        let audio = s.spawn(|| record("audio", audio_branch(ctx, tools, &audio_out, &token)));
        let video = s.spawn(|| {
            record(
                "video",
                video_branch(ctx, tools, settings, &names, &video_out, &token),
            )
        });

        for (branch, handle) in [("audio", audio), ("video", video)] {
            if handle.join().is_err() {
                errors.fail(CoreError::Encode(format!("{branch} branch panicked")));
            }
        }
    });

    if let Some(err) = errors.into_error() {
        return Err(err);
    }
    if token.is_cancelled() {
        return Err(CoreError::Cancelled);
    }

    let mux_out = names.mux(&video_ext);
    tools
        .transcoder
        .transcode(&mux_args(&video_out, &audio_out, &mux_out))
        .map_err(|e| CoreError::Mux(e.to_string()))?;
    for intermediate in [&video_out, &audio_out] {
        fs::remove_file(intermediate).map_err(|e| {
            CoreError::Mux(format!("cannot remove {}: {}", intermediate.display(), e))
        })?;
    }

    finish(ctx, tools, settings, &mux_out, &video_ext)
}

fn audio_branch(
    ctx: &TranscodeContext,
    tools: Toolset<'_>,
    output: &Path,
    token: &CancellationToken,
) -> CoreResult<()> {
    let stream = select_audio_stream(ctx);
    let params = stream_params(ctx, MediaKind::Audio, stream);
    if token.is_cancelled() {
        return Err(CoreError::Cancelled);
    }

    let source = ctx.source_path();
    tools
        .transcoder
        .transcode(&encode_args(EncodeKind::Audio, &source, output, &params, &format!("0:{stream}")))
        .map_err(|e| CoreError::Encode(format!("audio encode of {}: {e}", source.display())))?;
    Ok(())
}

fn video_branch(
    ctx: &TranscodeContext,
    tools: Toolset<'_>,
    settings: &PipelineSettings,
    names: &TempNamer,
    output: &Path,
    token: &CancellationToken,
) -> CoreResult<()> {
    let source = ctx.source_path();
    let stream = ctx
        .first_stream_of(StreamType::Video)
        .ok_or_else(|| CoreError::Encode(format!("{} has no video stream", source.display())))?;

    if is_skippable(ctx, MediaKind::Video, stream) {
        log::debug!("Video stream {} satisfies video.skip_if, copying", stream);
        let copy: Vec<String> = COPY_VIDEO_PARAMS.iter().map(|s| s.to_string()).collect();
        tools
            .transcoder
            .transcode(&encode_args(EncodeKind::Video, &source, output, &copy, &format!("0:{stream}")))
            .map_err(|e| CoreError::Encode(format!("video copy of {}: {e}", source.display())))?;
        return Ok(());
    }

    let duration = tools.prober.duration(&source)?;
    let (unit, expected) = segment_plan(duration, settings.workers, settings.min_segment_secs);
    if token.is_cancelled() {
        return Err(CoreError::Cancelled);
    }

    let segments = segment::split_video(
        tools.transcoder,
        names,
        &source,
        &ctx.file.ext,
        stream,
        unit,
        expected,
    )?;
    if token.is_cancelled() {
        return Err(CoreError::Cancelled);
    }

    let target_ext = ctx.policy.target_ext(MediaKind::Video)?;
    let params = ctx.policy.ffmpeg_param(MediaKind::Video);
    let parts = segment::encode_segments(
        tools.transcoder,
        names,
        segments,
        &params,
        &target_ext,
        settings.workers,
        token,
    )?;

    segment::concat_segments(tools.transcoder, names, &parts, output)
}
