// ============================================================================
// fleetcode-core/src/config/policy.rs
// ============================================================================
//
// TRANSCODE POLICY: Per-Kind Encoding Rules
//
// The policy document is a JSON file with one section per media kind:
//
//   {
//     "image": { "target_ext": "webp", "ffmpeg_param": "-c:v libwebp", "skip_if": {...} },
//     "audio": { "target_ext": "ogg",  "ffmpeg_param": "-c:a libopus",
//                "skip_if": {...},
//                "selection_prefer":   { "tags.language": "jpn" },
//                "selection_priority": [ "tags.language" ] },
//     "video": { "target_ext": "webm", "ffmpeg_param": "-c:v libvpx-vp9", "skip_if": {...} }
//   }
//
// The document stays opaque apart from these typed accessors.

// ---- Standard library imports ----
use std::fmt;
use std::path::Path;

// ---- Internal crate imports ----
use crate::attributes::AttrValue;
use crate::error::{CoreError, CoreResult};

/// The three policy sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Image,
    Audio,
    Video,
}

impl MediaKind {
    pub const ALL: [MediaKind; 3] = [MediaKind::Image, MediaKind::Audio, MediaKind::Video];

    /// Section key in the policy document.
    pub fn key(self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Audio => "audio",
            MediaKind::Video => "video",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Queryable transcode policy loaded from JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct Policy {
    root: AttrValue,
}

impl Policy {
    /// Loads a policy from a JSON file.
    pub fn from_file(path: &Path) -> CoreResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            CoreError::Config(format!("Cannot read policy file {}: {}", path.display(), e))
        })?;
        let value: serde_json::Value = serde_json::from_str(&text)?;
        log::debug!("Loaded policy from {}", path.display());
        Ok(Self::from_value(value))
    }

    pub fn from_value(value: serde_json::Value) -> Self {
        Self {
            root: AttrValue::from(value),
        }
    }

    fn section(&self, kind: MediaKind) -> Option<&AttrValue> {
        self.root.get(kind.key())
    }

    fn field(&self, kind: MediaKind, name: &str) -> Option<&AttrValue> {
        self.section(kind).and_then(|s| s.get(name))
    }

    /// Target extension for a kind, without the leading dot.
    pub fn target_ext(&self, kind: MediaKind) -> CoreResult<String> {
        self.field(kind, "target_ext")
            .and_then(AttrValue::as_leaf_string)
            .map(|ext| ext.trim_start_matches('.').to_string())
            .filter(|ext| !ext.is_empty())
            .ok_or_else(|| CoreError::Config(format!("{kind}.target_ext is not set")))
    }

    /// Encoder arguments for a kind, split on whitespace.
    pub fn ffmpeg_param(&self, kind: MediaKind) -> Vec<String> {
        self.field(kind, "ffmpeg_param")
            .and_then(AttrValue::as_leaf_string)
            .map(|s| s.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// The `skip_if` predicate for a kind, if present.
    pub fn skip_if(&self, kind: MediaKind) -> Option<&AttrValue> {
        self.field(kind, "skip_if")
    }

    /// Audio `selection_prefer` document, if present.
    pub fn selection_prefer(&self) -> Option<&AttrValue> {
        self.field(MediaKind::Audio, "selection_prefer")
    }

    /// Audio `selection_priority` list, if present and made of strings.
    pub fn selection_priority(&self) -> Option<Vec<String>> {
        match self.field(MediaKind::Audio, "selection_priority")? {
            AttrValue::List(items) => items
                .iter()
                .map(|item| match item {
                    AttrValue::Str(s) => Some(s.clone()),
                    _ => None,
                })
                .collect(),
            _ => None,
        }
    }

    /// Checks that every section names a target extension.
    pub fn validate(&self) -> CoreResult<()> {
        for kind in MediaKind::ALL {
            self.target_ext(kind)?;
        }
        Ok(())
    }
}
