// ============================================================================
// fleetcode-core/src/media/context.rs
// ============================================================================
//
// TRANSCODE CONTEXT: Per-File Metadata and Classification
//
// A TranscodeContext is built once per job. It records the file's split
// path, the content-hash ID used to namespace temp files, the probed
// streams and the category that decides which pipeline runs.
//
// KEY COMPONENTS:
// - FileParts: directory / base name / extension
// - Category: processing path for a file
// - classify_extension: extension lookup, case-insensitive
// - content_hash_id: FNV-1a 64 of the base name, in decimal

// ---- Standard library imports ----
use std::fmt;
use std::path::{Path, PathBuf};

// ---- Internal crate imports ----
use super::stream::{StreamDescriptor, StreamType};
use crate::config::{MediaKind, Policy};
use crate::error::{CoreError, CoreResult};
use crate::external::Prober;

/// Image extensions. Frame count decides still vs animated.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

/// Audio-only container extensions.
pub const AUDIO_EXTENSIONS: &[&str] = &["m4a", "mp3", "ogg", "opus", "mka", "wav", "flac"];

/// Video container extensions. Streams decide the category.
pub const VIDEO_EXTENSIONS: &[&str] = &[
    "asf", "avi", "bik", "flv", "mkv", "mov", "mp4", "mpeg", "3gp", "ts", "webm", "wmv",
];

/// Maps an extension (without the dot, any case) to the policy section
/// that handles it. Unknown extensions yield `None`.
pub fn classify_extension(ext: &str) -> Option<MediaKind> {
    let ext = ext.to_ascii_lowercase();
    if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        Some(MediaKind::Image)
    } else if AUDIO_EXTENSIONS.contains(&ext.as_str()) {
        Some(MediaKind::Audio)
    } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
        Some(MediaKind::Video)
    } else {
        None
    }
}

/// 64-bit FNV-1a of `name`, formatted in decimal.
pub fn content_hash_id(name: &str) -> String {
    const OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    let hash = name.bytes().fold(OFFSET_BASIS, |acc, byte| {
        (acc ^ u64::from(byte)).wrapping_mul(PRIME)
    });
    hash.to_string()
}

/// Processing path decided for a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Image,
    ImageAnimated,
    Audio,
    Video,
    VideoAndAudio,
    /// Not a media file, or a media file with nothing to encode
    Skip,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Image => "image",
            Category::ImageAnimated => "image_animated",
            Category::Audio => "audio",
            Category::Video => "video",
            Category::VideoAndAudio => "video_and_audio",
            Category::Skip => "",
        }
    }

    /// Categories that are reported as `job_skip` without running a pipeline.
    pub fn is_skipped(self) -> bool {
        matches!(self, Category::Skip | Category::ImageAnimated)
    }

    /// Policy section whose target extension the final file gets.
    pub fn output_kind(self) -> Option<MediaKind> {
        match self {
            Category::Image => Some(MediaKind::Image),
            Category::Audio => Some(MediaKind::Audio),
            Category::Video | Category::VideoAndAudio => Some(MediaKind::Video),
            Category::ImageAnimated | Category::Skip => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Skip => f.write_str("skip"),
            other => f.write_str(other.as_str()),
        }
    }
}

/// A path split into directory, base name and extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileParts {
    pub dir: PathBuf,
    pub name: String,
    /// Extension without the dot, original case; empty when absent
    pub ext: String,
}

impl FileParts {
    pub fn from_path(path: &Path) -> CoreResult<Self> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| CoreError::Config(format!("{} has no file name", path.display())))?;
        let dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        let (name, ext) = match file_name.rfind('.') {
            Some(pos) if pos > 0 => (
                file_name[..pos].to_string(),
                file_name[pos + 1..].to_string(),
            ),
            _ => (file_name, String::new()),
        };

        Ok(Self { dir, name, ext })
    }

    /// Rebuilds `dir/name.ext`.
    pub fn join(&self) -> PathBuf {
        self.with_name_ext(&self.name, &self.ext)
    }

    /// `dir/<name>.<ext>`, or `dir/<name>` for an empty extension.
    pub fn with_name_ext(&self, name: &str, ext: &str) -> PathBuf {
        if ext.is_empty() {
            self.dir.join(name)
        } else {
            self.dir.join(format!("{name}.{ext}"))
        }
    }
}

/// Everything a pipeline needs to know about one job.
#[derive(Debug, Clone)]
pub struct TranscodeContext {
    /// Content-hash ID namespacing this job's temp files
    pub id: String,

    /// Source path components
    pub file: FileParts,

    /// Probed streams in container order; empty when not probed
    pub streams: Vec<StreamDescriptor>,

    /// Decided processing path
    pub category: Category,

    /// Frame count of the first video stream, probed for images only
    pub frame_count: Option<u64>,

    /// Encoding rules
    pub policy: Policy,

    /// Root for intermediate files
    pub temp_dir: PathBuf,
}

impl TranscodeContext {
    /// Probes and classifies `path`.
    ///
    /// Files with an unknown or missing extension are classified
    /// [`Category::Skip`] without running the prober.
    pub fn build(
        path: &Path,
        policy: &Policy,
        temp_dir: &Path,
        prober: &dyn Prober,
    ) -> CoreResult<Self> {
        let file = FileParts::from_path(path)?;
        let id = content_hash_id(&file.name);

        let mut frame_count = None;
        let (streams, category) = match classify_extension(&file.ext) {
            None => (Vec::new(), Category::Skip),
            Some(MediaKind::Image) => {
                let frames = prober.frame_count(path)?;
                frame_count = Some(frames);
                if frames > 1 {
                    (Vec::new(), Category::ImageAnimated)
                } else {
                    (prober.streams(path)?, Category::Image)
                }
            }
            Some(MediaKind::Audio) => (prober.streams(path)?, Category::Audio),
            Some(MediaKind::Video) => {
                let streams = prober.streams(path)?;
                let category = category_from_streams(&streams);
                (streams, category)
            }
        };

        log::debug!(
            "Classified {} as {} ({} streams, id {})",
            path.display(),
            category,
            streams.len(),
            id
        );

        Ok(Self {
            id,
            file,
            streams,
            category,
            frame_count,
            policy: policy.clone(),
            temp_dir: temp_dir.to_path_buf(),
        })
    }

    /// Original file path.
    pub fn source_path(&self) -> PathBuf {
        self.file.join()
    }

    /// The stream with container index `index`.
    pub fn stream(&self, index: usize) -> Option<&StreamDescriptor> {
        self.streams.iter().find(|s| s.index == index)
    }

    pub fn streams_of(&self, kind: StreamType) -> impl Iterator<Item = &StreamDescriptor> {
        self.streams.iter().filter(move |s| s.codec_type == kind)
    }

    /// Container index of the first stream of `kind`.
    pub fn first_stream_of(&self, kind: StreamType) -> Option<usize> {
        self.streams_of(kind).next().map(|s| s.index)
    }
}

fn category_from_streams(streams: &[StreamDescriptor]) -> Category {
    let has_video = streams.iter().any(|s| s.codec_type == StreamType::Video);
    let has_audio = streams.iter().any(|s| s.codec_type == StreamType::Audio);
    match (has_video, has_audio) {
        (true, true) => Category::VideoAndAudio,
        (true, false) => Category::Video,
        (false, true) => Category::Audio,
        (false, false) => Category::Skip,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fnv1a_known_vectors() {
        assert_eq!(content_hash_id(""), "14695981039346656037");
        assert_eq!(content_hash_id("a"), 0xaf63dc4c8601ec8c_u64.to_string());
    }

    #[test]
    fn test_classify_extension_case_insensitive() {
        assert_eq!(classify_extension("MKV"), Some(MediaKind::Video));
        assert_eq!(classify_extension("Flac"), Some(MediaKind::Audio));
        assert_eq!(classify_extension("jpg"), Some(MediaKind::Image));
        assert_eq!(classify_extension("srt"), None);
        assert_eq!(classify_extension(""), None);
    }

    #[test]
    fn test_file_parts_split_and_join() {
        let parts = FileParts::from_path(Path::new("/media/show/ep.01.mkv")).unwrap();
        assert_eq!(parts.dir, PathBuf::from("/media/show"));
        assert_eq!(parts.name, "ep.01");
        assert_eq!(parts.ext, "mkv");
        assert_eq!(parts.join(), PathBuf::from("/media/show/ep.01.mkv"));

        let bare = FileParts::from_path(Path::new("/media/README")).unwrap();
        assert_eq!(bare.name, "README");
        assert_eq!(bare.ext, "");
        assert_eq!(bare.join(), PathBuf::from("/media/README"));
    }

    #[test]
    fn test_category_skip_flags() {
        assert!(Category::Skip.is_skipped());
        assert!(Category::ImageAnimated.is_skipped());
        assert!(!Category::VideoAndAudio.is_skipped());
        assert_eq!(Category::VideoAndAudio.output_kind(), Some(MediaKind::Video));
        assert_eq!(Category::Skip.as_str(), "");
    }
}
