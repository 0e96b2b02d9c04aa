use std::fmt;

use serde::Deserialize;
use serde_json::Value;

use crate::attributes::AttrValue;
use crate::error::CoreResult;

/// Media stream types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamType {
    Video,
    Audio,
    Subtitle,
    Attachment,
    Data,
    Unknown,
}

impl From<&str> for StreamType {
    fn from(s: &str) -> Self {
        match s {
            "video" => StreamType::Video,
            "audio" => StreamType::Audio,
            "subtitle" => StreamType::Subtitle,
            "attachment" => StreamType::Attachment,
            "data" => StreamType::Data,
            _ => StreamType::Unknown,
        }
    }
}

impl fmt::Display for StreamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamType::Video => write!(f, "video"),
            StreamType::Audio => write!(f, "audio"),
            StreamType::Subtitle => write!(f, "subtitle"),
            StreamType::Attachment => write!(f, "attachment"),
            StreamType::Data => write!(f, "data"),
            StreamType::Unknown => write!(f, "unknown"),
        }
    }
}

/// One probed stream.
///
/// `attributes` is the full stream object as reported by the prober,
/// including `codec_type` and `index`.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamDescriptor {
    /// Stream index within the container
    pub index: usize,

    /// Stream type
    pub codec_type: StreamType,

    /// Nested attribute tree
    pub attributes: AttrValue,
}

impl StreamDescriptor {
    /// Builds a descriptor from one entry of the prober's `streams` array.
    /// `position` is used when the entry carries no `index`.
    pub fn from_json(position: usize, value: Value) -> Self {
        let index = value
            .get("index")
            .and_then(Value::as_u64)
            .map(|i| i as usize)
            .unwrap_or(position);
        let codec_type = value
            .get("codec_type")
            .and_then(Value::as_str)
            .map(StreamType::from)
            .unwrap_or(StreamType::Unknown);
        Self {
            index,
            codec_type,
            attributes: AttrValue::from(value),
        }
    }
}

#[derive(Deserialize)]
struct StreamsDocument {
    #[serde(default)]
    streams: Vec<Value>,
}

/// Parses `ffprobe -print_format json -show_streams` output.
pub fn parse_streams(json: &str) -> CoreResult<Vec<StreamDescriptor>> {
    let doc: StreamsDocument = serde_json::from_str(json)?;
    Ok(doc
        .streams
        .into_iter()
        .enumerate()
        .map(|(position, value)| StreamDescriptor::from_json(position, value))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_streams() {
        let json = r#"{
            "streams": [
                { "index": 0, "codec_type": "video", "codec_name": "h264" },
                { "index": 1, "codec_type": "audio", "codec_name": "aac",
                  "tags": { "language": "eng" } },
                { "codec_type": "subtitle" }
            ]
        }"#;
        let streams = parse_streams(json).unwrap();
        assert_eq!(streams.len(), 3);
        assert_eq!(streams[0].codec_type, StreamType::Video);
        assert_eq!(streams[1].index, 1);
        assert_eq!(streams[1].codec_type, StreamType::Audio);
        assert_eq!(streams[2].index, 2);
        assert_eq!(streams[2].codec_type, StreamType::Subtitle);
    }

    #[test]
    fn test_parse_streams_empty_document() {
        assert!(parse_streams("{}").unwrap().is_empty());
        assert!(parse_streams("not json").is_err());
    }
}
