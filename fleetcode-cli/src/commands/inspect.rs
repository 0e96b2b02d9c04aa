// fleetcode-cli/src/commands/inspect.rs
//
// The `inspect` command: classify a single file the way a worker would and
// print the result as JSON, without transcoding anything.

use serde_json::{Value, json};

use fleetcode_core::config::{MediaKind, Policy};
use fleetcode_core::external::FfprobeProber;
use fleetcode_core::media::{Category, StreamType, TranscodeContext};
use fleetcode_core::{CoreResult, is_skippable, select_audio_stream};

use crate::cli::InspectArgs;

/// Describes what a worker would do with `ctx`.
pub fn describe(ctx: &TranscodeContext) -> Value {
    let streams: Vec<Value> = ctx
        .streams
        .iter()
        .map(|s| json!({ "index": s.index, "codec_type": s.codec_type.to_string() }))
        .collect();

    let audio = match ctx.category {
        Category::Audio | Category::VideoAndAudio => {
            let index = select_audio_stream(ctx);
            Some(json!({
                "stream": index,
                "skippable": is_skippable(ctx, MediaKind::Audio, index),
            }))
        }
        _ => None,
    };
    let video = match ctx.category {
        Category::Image | Category::Video | Category::VideoAndAudio => {
            ctx.first_stream_of(StreamType::Video).map(|index| {
                let kind = if ctx.category == Category::Image {
                    MediaKind::Image
                } else {
                    MediaKind::Video
                };
                json!({ "stream": index, "skippable": is_skippable(ctx, kind, index) })
            })
        }
        _ => None,
    };

    json!({
        "path": ctx.source_path().display().to_string(),
        "id": ctx.id,
        "category": ctx.category.to_string(),
        "frame_count": ctx.frame_count,
        "streams": streams,
        "audio": audio,
        "video": video,
    })
}

pub fn run_inspect(args: InspectArgs) -> CoreResult<Value> {
    let policy = Policy::from_file(&args.conf)?;
    let prober = FfprobeProber::new(args.ffprobe.clone());
    let ctx = TranscodeContext::build(&args.file, &policy, &std::env::temp_dir(), &prober)?;
    Ok(describe(&ctx))
}
