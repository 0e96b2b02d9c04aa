//! Audio stream selection and codec-copy decisions.
//!
//! Both decisions compare flattened stream attributes against regex
//! documents from the policy. Patterns are searched, not anchored, so
//! `"^jpn$"` is needed for an exact match.

use std::collections::BTreeMap;

use regex::Regex;

use crate::attributes::flatten;
use crate::config::MediaKind;
use crate::media::{StreamType, TranscodeContext};

/// At most this many priority keys carry weight.
pub const MAX_PRIORITY_KEYS: usize = 64;

/// Compiles `pattern` and tests it against `value`.
/// A pattern that does not compile never matches.
fn matches(pattern: &str, value: &str) -> bool {
    match Regex::new(pattern) {
        Ok(re) => re.is_match(value),
        Err(e) => {
            log::warn!("Ignoring invalid pattern {:?}: {}", pattern, e);
            false
        }
    }
}

/// Weight of the priority key at `position`: bit 63 for the first key,
/// bit 62 for the second, and so on.
fn weight(position: usize) -> u64 {
    1u64 << (MAX_PRIORITY_KEYS - 1 - position)
}

/// Picks the audio stream to encode and returns its container index.
///
/// With zero or one audio streams no scoring happens. When the policy
/// lacks `selection_prefer` or `selection_priority`, or a preference key
/// is missing from the priority list, the first audio stream is used.
/// Otherwise every stream is scored by the weights of the priority keys
/// whose preference pattern matches its attribute; the highest score
/// wins and ties go to the lowest index.
pub fn select_audio_stream(ctx: &TranscodeContext) -> usize {
    let mut candidates: Vec<_> = ctx.streams_of(StreamType::Audio).collect();
    candidates.sort_by_key(|s| s.index);

    let default = candidates.first().map(|s| s.index).unwrap_or(0);
    if candidates.len() <= 1 {
        return default;
    }

    let (Some(prefer), Some(priority)) =
        (ctx.policy.selection_prefer(), ctx.policy.selection_priority())
    else {
        return default;
    };

    let prefer = flatten(prefer);
    if let Some(key) = prefer.keys().find(|k| !priority.contains(k)) {
        log::warn!(
            "Preference key {:?} is not in selection_priority, using the first audio stream",
            key
        );
        return default;
    }

    let compiled: BTreeMap<&str, Option<Regex>> = prefer
        .iter()
        .map(|(key, pattern)| {
            let re = Regex::new(pattern)
                .map_err(|e| log::warn!("Ignoring invalid pattern {:?}: {}", pattern, e))
                .ok();
            (key.as_str(), re)
        })
        .collect();

    let mut best = (default, 0u64);
    for (n, stream) in candidates.iter().enumerate() {
        let attrs = flatten(&stream.attributes);
        let score = priority
            .iter()
            .take(MAX_PRIORITY_KEYS)
            .enumerate()
            .filter(|(_, key)| {
                match (attrs.get(key.as_str()), compiled.get(key.as_str())) {
                    (Some(value), Some(Some(re))) => re.is_match(value),
                    _ => false,
                }
            })
            .fold(0u64, |acc, (position, _)| acc | weight(position));

        log::trace!("Audio stream {} scored {:#x}", stream.index, score);
        if n == 0 || score > best.1 {
            best = (stream.index, score);
        }
    }

    log::debug!("Selected audio stream {} (score {:#x})", best.0, best.1);
    best.0
}

/// True when the stream at `stream_index` already satisfies the `skip_if`
/// predicate of the `kind` section, so it can be stream-copied.
///
/// An absent or empty predicate never skips. Predicate keys the stream
/// does not carry are ignored; every key it does carry must match.
pub fn is_skippable(ctx: &TranscodeContext, kind: MediaKind, stream_index: usize) -> bool {
    let Some(predicate) = ctx.policy.skip_if(kind) else {
        return false;
    };
    let predicate = flatten(predicate);
    if predicate.is_empty() {
        return false;
    }
    let Some(stream) = ctx.stream(stream_index) else {
        return false;
    };

    let attrs = flatten(&stream.attributes);
    predicate.iter().all(|(key, pattern)| match attrs.get(key) {
        Some(value) => matches(pattern, value),
        None => true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Policy;
    use crate::media::{Category, FileParts, StreamDescriptor};
    use serde_json::json;
    use std::path::{Path, PathBuf};

    fn context(streams: serde_json::Value, policy: serde_json::Value) -> TranscodeContext {
        let streams = streams
            .as_array()
            .unwrap()
            .iter()
            .enumerate()
            .map(|(i, v)| StreamDescriptor::from_json(i, v.clone()))
            .collect();
        TranscodeContext {
            id: "1".into(),
            file: FileParts::from_path(Path::new("/m/a.mkv")).unwrap(),
            streams,
            category: Category::VideoAndAudio,
            frame_count: None,
            policy: Policy::from_value(policy),
            temp_dir: PathBuf::from("/tmp"),
        }
    }

    #[test]
    fn test_weight_order() {
        assert_eq!(weight(0), 1 << 63);
        assert_eq!(weight(63), 1);
        assert!(weight(0) > (0..63).map(|i| weight(i + 1)).sum::<u64>());
    }

    #[test]
    fn test_single_audio_stream_short_circuits() {
        let ctx = context(
            json!([{ "codec_type": "video" }, { "codec_type": "audio" }]),
            json!({}),
        );
        assert_eq!(select_audio_stream(&ctx), 1);
    }

    fn tracks() -> serde_json::Value {
        json!([
            { "index": 0, "codec_type": "video", "codec_name": "h264" },
            { "index": 1, "codec_type": "audio", "codec_name": "flac", "channels": 6, "tags": { "language": "eng" } },
            { "index": 2, "codec_type": "audio", "codec_name": "aac", "channels": 2, "tags": { "language": "jpn" } },
            { "index": 3, "codec_type": "audio", "codec_name": "aac", "channels": 2, "tags": { "language": "jpn" } }
        ])
    }

    fn audio_policy(prefer: serde_json::Value, priority: serde_json::Value) -> serde_json::Value {
        json!({ "audio": { "selection_prefer": prefer, "selection_priority": priority } })
    }

    #[test]
    fn test_tie_goes_to_lowest_index() {
        let ctx = context(
            json!([
                { "index": 0, "codec_type": "video" },
                { "index": 5, "codec_type": "audio", "tags": { "language": "jpn" } },
                { "index": 2, "codec_type": "audio", "tags": { "language": "jpn" } },
                { "index": 1, "codec_type": "audio", "tags": { "language": "eng" } }
            ]),
            audio_policy(json!({ "tags": { "language": "^jpn$" } }), json!(["tags.language"])),
        );
        assert_eq!(select_audio_stream(&ctx), 2);
    }

    #[test]
    fn test_first_priority_key_outweighs_the_rest() {
        // Stream 1 matches the second and third keys, stream 2 only the first.
        let ctx = context(
            tracks(),
            audio_policy(
                json!({ "tags": { "language": "^jpn$" }, "channels": "^6$", "codec_name": "^flac$" }),
                json!(["tags.language", "channels", "codec_name"]),
            ),
        );
        assert_eq!(select_audio_stream(&ctx), 2);

        let ctx = context(
            tracks(),
            audio_policy(
                json!({ "tags": { "language": "^jpn$" }, "channels": "^6$", "codec_name": "^flac$" }),
                json!(["channels", "tags.language", "codec_name"]),
            ),
        );
        assert_eq!(select_audio_stream(&ctx), 1);
    }

    #[test]
    fn test_selection_is_deterministic() {
        let ctx = context(
            tracks(),
            audio_policy(
                json!({ "tags": { "language": "^jpn$" }, "codec_name": "aac" }),
                json!(["codec_name", "tags.language"]),
            ),
        );
        let first = select_audio_stream(&ctx);
        assert_eq!(first, 2);
        assert_eq!(select_audio_stream(&ctx), first);
    }

    #[test]
    fn test_preference_outside_priority_uses_first_audio() {
        let ctx = context(
            tracks(),
            audio_policy(
                json!({ "tags": { "language": "^jpn$" }, "codec_name": "^aac$" }),
                json!(["tags.language"]),
            ),
        );
        assert_eq!(select_audio_stream(&ctx), 1);
    }

    #[test]
    fn test_missing_documents_use_first_audio() {
        let no_prefer = context(
            tracks(),
            json!({ "audio": { "selection_priority": ["tags.language"] } }),
        );
        assert_eq!(select_audio_stream(&no_prefer), 1);

        let no_priority = context(
            tracks(),
            json!({ "audio": { "selection_prefer": { "tags": { "language": "^jpn$" } } } }),
        );
        assert_eq!(select_audio_stream(&no_priority), 1);
    }

    #[test]
    fn test_skippable_needs_a_predicate_and_a_stream() {
        let empty = context(tracks(), json!({ "audio": { "skip_if": {} } }));
        assert!(!is_skippable(&empty, MediaKind::Audio, 2));

        let absent = context(tracks(), json!({ "audio": {} }));
        assert!(!is_skippable(&absent, MediaKind::Audio, 2));

        let set = context(tracks(), json!({ "audio": { "skip_if": { "codec_name": "^aac$" } } }));
        assert!(is_skippable(&set, MediaKind::Audio, 2));
        assert!(!is_skippable(&set, MediaKind::Audio, 9));
    }

    #[test]
    fn test_skippable_checks_every_carried_key() {
        let ctx = context(
            tracks(),
            json!({ "audio": { "skip_if": { "codec_name": "^aac$", "channels": "^2$", "bit_rate": "^1$" } } }),
        );
        // bit_rate is not carried by the stream and is ignored.
        assert!(is_skippable(&ctx, MediaKind::Audio, 2));
        assert!(!is_skippable(&ctx, MediaKind::Audio, 1));
        // The video section has no predicate.
        assert!(!is_skippable(&ctx, MediaKind::Video, 0));
    }

    #[test]
    fn test_invalid_pattern_never_matches() {
        assert!(!matches("(", "("));
        assert!(matches("^a", "abc"));
    }
}
