// Shared fakes for integration tests: a transcoder that understands the
// argument lists the pipeline builds and writes small marker files, and a
// prober with canned answers.
#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use rand::Rng;
use serde_json::json;

use fleetcode_core::config::Policy;
use fleetcode_core::error::{CoreError, CoreResult};
use fleetcode_core::external::{Prober, Transcoder};
use fleetcode_core::media::{StreamDescriptor, parse_streams};

/// Writes `enc(<input>)` for encodes, numbered `seg<n>` files for splits,
/// `a|b|c` for concats and `mux[<video>+<audio>]` for muxes.
pub struct FakeTranscoder {
    total_secs: f64,
    max_latency_ms: u64,
    slow_when: Option<(String, u64)>,
    fail_when: Option<String>,
    split_shortfall: usize,
    calls: Mutex<Vec<Vec<String>>>,
}

impl FakeTranscoder {
    pub fn new(total_secs: f64) -> Self {
        Self {
            total_secs,
            max_latency_ms: 0,
            slow_when: None,
            fail_when: None,
            split_shortfall: 0,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Sleeps a random 0..=`ms` milliseconds in every call.
    pub fn with_latency(mut self, ms: u64) -> Self {
        self.max_latency_ms = ms;
        self
    }

    /// Sleeps `ms` milliseconds in every call whose output path contains
    /// `pattern`.
    pub fn slow_on(mut self, pattern: &str, ms: u64) -> Self {
        self.slow_when = Some((pattern.to_string(), ms));
        self
    }

    /// Splits write `n` fewer segments than the duration calls for.
    pub fn split_short_by(mut self, n: usize) -> Self {
        self.split_shortfall = n;
        self
    }

    /// Fails every call whose output path contains `pattern`.
    pub fn failing_on(mut self, pattern: &str) -> Self {
        self.fail_when = Some(pattern.to_string());
        self
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }

    /// Output paths of every call, in call order.
    pub fn outputs(&self) -> Vec<String> {
        self.calls()
            .iter()
            .filter_map(|args| args.last().cloned())
            .collect()
    }
}

fn flag<'a>(args: &'a [String], name: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == name)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

impl Transcoder for FakeTranscoder {
    fn transcode(&self, args: &[String]) -> CoreResult<String> {
        self.calls.lock().unwrap().push(args.to_vec());
        if self.max_latency_ms > 0 {
            let ms = rand::thread_rng().gen_range(0..=self.max_latency_ms);
            thread::sleep(Duration::from_millis(ms));
        }

        let output = args
            .last()
            .cloned()
            .ok_or_else(|| CoreError::Encode("no output".to_string()))?;
        if let Some((pattern, ms)) = &self.slow_when {
            if output.contains(pattern.as_str()) {
                thread::sleep(Duration::from_millis(*ms));
            }
        }
        if let Some(pattern) = &self.fail_when {
            if output.contains(pattern.as_str()) {
                return Err(CoreError::Encode(format!("injected failure for {output}")));
            }
        }

        if args.iter().any(|a| a == "segment") {
            let unit: f64 = flag(args, "-segment_time")
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| CoreError::Encode("bad segment_time".to_string()))?;
            let count = ((self.total_secs / unit).ceil() as usize).saturating_sub(self.split_shortfall);
            for n in 0..count {
                fs::write(output.replace("%d", &n.to_string()), format!("seg{n}"))?;
            }
        } else if args.iter().any(|a| a == "concat") {
            let list = fs::read_to_string(flag(args, "-i").unwrap_or_default())?;
            let mut parts = Vec::new();
            for line in list.lines() {
                let path = line
                    .strip_prefix("file '")
                    .and_then(|l| l.strip_suffix('\''))
                    .ok_or_else(|| CoreError::Concat(format!("bad list line {line:?}")))?
                    .replace(r"'\''", "'");
                parts.push(fs::read_to_string(path)?);
            }
            fs::write(&output, parts.join("|"))?;
        } else {
            let inputs = args
                .windows(2)
                .filter(|w| w[0] == "-i")
                .map(|w| fs::read_to_string(&w[1]))
                .collect::<Result<Vec<_>, _>>()?;
            let contents = match inputs.as_slice() {
                [video, audio] => format!("mux[{video}+{audio}]"),
                [input] => format!("enc({input})"),
                _ => return Err(CoreError::Encode("unexpected inputs".to_string())),
            };
            fs::write(&output, contents)?;
        }
        Ok(String::new())
    }
}

/// Answers every probe with the same streams, duration and frame count.
pub struct FakeProber {
    streams: Vec<StreamDescriptor>,
    duration: f64,
    frames: u64,
    probes: AtomicUsize,
}

impl FakeProber {
    pub fn new(streams_json: serde_json::Value, duration: f64) -> Self {
        let doc = json!({ "streams": streams_json }).to_string();
        Self {
            streams: parse_streams(&doc).unwrap(),
            duration,
            frames: 1,
            probes: AtomicUsize::new(0),
        }
    }

    pub fn with_frames(mut self, frames: u64) -> Self {
        self.frames = frames;
        self
    }

    /// How many probe calls were made.
    pub fn probes(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }
}

impl Prober for FakeProber {
    fn streams(&self, _path: &Path) -> CoreResult<Vec<StreamDescriptor>> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        Ok(self.streams.clone())
    }

    fn duration(&self, _path: &Path) -> CoreResult<f64> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        Ok(self.duration)
    }

    fn frame_count(&self, _path: &Path) -> CoreResult<u64> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        Ok(self.frames)
    }
}

/// One h264 video stream and two aac audio streams (eng at 1, jpn at 2).
pub fn movie_streams() -> serde_json::Value {
    json!([
        { "index": 0, "codec_type": "video", "codec_name": "h264" },
        { "index": 1, "codec_type": "audio", "codec_name": "aac", "tags": { "language": "eng" } },
        { "index": 2, "codec_type": "audio", "codec_name": "aac", "tags": { "language": "jpn" } }
    ])
}

pub fn policy() -> Policy {
    Policy::from_value(json!({
        "image": { "target_ext": "webp", "ffmpeg_param": "-c:v libwebp" },
        "audio": {
            "target_ext": "ogg",
            "ffmpeg_param": "-c:a libopus -b:a 128k",
            "skip_if": { "codec_name": "^opus$" },
            "selection_prefer": { "tags": { "language": "^jpn$" } },
            "selection_priority": ["tags.language"]
        },
        "video": { "target_ext": "webm", "ffmpeg_param": "-c:v libvpx-vp9 -crf 32" }
    }))
}

/// Temp files of job `id` left in `dir`.
pub fn leftover_job_files(dir: &Path, id: &str) -> Vec<PathBuf> {
    let prefix = format!(".{id}_");
    match fs::read_dir(dir) {
        Ok(entries) => entries
            .flatten()
            .filter(|e| e.file_name().to_string_lossy().starts_with(&prefix))
            .map(|e| e.path())
            .collect(),
        Err(_) => Vec::new(),
    }
}
