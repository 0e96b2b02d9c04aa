//! Media metadata and classification.
//!
//! [`StreamDescriptor`] holds one probed stream; [`TranscodeContext`]
//! aggregates everything the pipeline needs to know about a single job.

pub mod context;
pub mod stream;

pub use context::{
    Category, FileParts, TranscodeContext, classify_extension, content_hash_id,
};
pub use stream::{StreamDescriptor, StreamType, parse_streams};
