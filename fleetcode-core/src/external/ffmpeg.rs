//! ffmpeg adapter and argument builders.
//!
//! Every builder returns a complete argument list ending with the output
//! path. The common input flags make ffmpeg quiet, overwrite outputs and
//! probe the whole input; the common output flag widens the muxing queue
//! for files with sparse streams.

use std::path::Path;

use super::Transcoder;
use super::command::run_command;
use crate::error::CoreResult;

/// Flags placed before every input.
pub const COMMON_INPUT_ARGS: &[&str] = &[
    "-hide_banner",
    "-loglevel",
    "warning",
    "-avoid_negative_ts",
    "1",
    "-analyzeduration",
    "2147483647",
    "-probesize",
    "2147483647",
    "-y",
];

/// Flags placed before the output options.
pub const COMMON_OUTPUT_ARGS: &[&str] = &["-max_muxing_queue_size", "4096"];

/// Codec-copy parameters used when a stream already satisfies the policy.
pub const COPY_AUDIO_PARAMS: &[&str] = &["-vn", "-c:a", "copy"];
pub const COPY_VIDEO_PARAMS: &[&str] = &["-an", "-c:v", "copy"];

/// Runs the `ffmpeg` executable.
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    program: String,
}

impl FfmpegTranscoder {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for FfmpegTranscoder {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_FFMPEG)
    }
}

impl Transcoder for FfmpegTranscoder {
    fn transcode(&self, args: &[String]) -> CoreResult<String> {
        Ok(run_command(&self.program, args)?.combined())
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn extend(args: &mut Vec<String>, items: &[&str]) {
    args.extend(items.iter().map(|s| s.to_string()));
}

/// Which threading flags an encode gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeKind {
    Audio,
    Video,
}

/// Single-stream encode: `<common> [-threads 0] -i in <out> params -map <map> out`.
///
/// `map` is an ffmpeg stream specifier such as `0:3` or `0:v:0`.
pub fn encode_args(
    kind: EncodeKind,
    input: &Path,
    output: &Path,
    params: &[String],
    map: &str,
) -> Vec<String> {
    let mut args = Vec::new();
    extend(&mut args, COMMON_INPUT_ARGS);
    if kind == EncodeKind::Video {
        extend(&mut args, &["-threads", "0"]);
    }
    args.push("-i".to_string());
    args.push(path_arg(input));
    extend(&mut args, COMMON_OUTPUT_ARGS);
    args.extend(params.iter().cloned());
    args.push("-map".to_string());
    args.push(map.to_string());
    args.push(path_arg(output));
    args
}

/// Segment split of one video stream into `unit_secs` pieces.
///
/// `template` must contain a `%d` placeholder for the segment number.
pub fn split_args(input: &Path, template: &Path, unit_secs: u64, map: &str) -> Vec<String> {
    let mut args = Vec::new();
    extend(&mut args, COMMON_INPUT_ARGS);
    args.push("-i".to_string());
    args.push(path_arg(input));
    extend(&mut args, COMMON_OUTPUT_ARGS);
    extend(&mut args, &["-f", "segment", "-segment_time"]);
    args.push(unit_secs.to_string());
    extend(
        &mut args,
        &["-reset_timestamps", "1", "-c:v", "copy", "-an", "-map"],
    );
    args.push(map.to_string());
    args.push(path_arg(template));
    args
}

/// Stream-copy concatenation driven by a concat demuxer list file.
pub fn concat_args(list: &Path, output: &Path) -> Vec<String> {
    let mut args = Vec::new();
    extend(&mut args, COMMON_INPUT_ARGS);
    extend(&mut args, &["-f", "concat", "-safe", "0", "-i"]);
    args.push(path_arg(list));
    extend(&mut args, COMMON_OUTPUT_ARGS);
    extend(&mut args, &["-c:v", "copy"]);
    args.push(path_arg(output));
    args
}

/// Stream-copy mux of the first video of `video` and first audio of `audio`.
pub fn mux_args(video: &Path, audio: &Path, output: &Path) -> Vec<String> {
    let mut args = Vec::new();
    extend(&mut args, COMMON_INPUT_ARGS);
    args.push("-i".to_string());
    args.push(path_arg(video));
    args.push("-i".to_string());
    args.push(path_arg(audio));
    extend(&mut args, COMMON_OUTPUT_ARGS);
    extend(
        &mut args,
        &["-c:v", "copy", "-c:a", "copy", "-map", "0:v:0", "-map", "1:a:0"],
    );
    args.push(path_arg(output));
    args
}

/// One line of a concat demuxer list. Single quotes in the path are escaped.
pub fn concat_list_line(path: &Path) -> String {
    format!("file '{}'\n", path_arg(path).replace('\'', r"'\''"))
}
