//! Raw comment threads and their normalization into flat records.
//!
//! A thread list arrives as a JSON array of single-entry objects keyed by
//! comment id, each optionally carrying a `replies` object keyed by composite
//! reply id. Key order is significant: it is the order comments are emitted
//! in, and every later stage aligns on it. Deserialize straight from text
//! (not through `serde_json::Value`, which sorts keys) to keep it.

mod normalize;
mod youtube;

pub use normalize::{derive_reply_id, normalize, CommentKind, NormalizedRecord, MAX_TEXT_CHARS};
pub use youtube::{extract_video_id, YoutubeCommentSource};

use crate::error::Result;
use async_trait::async_trait;
use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A comment as delivered by the comment source, keyed by its platform id.
#[derive(Debug, Clone, PartialEq)]
pub struct RawComment {
    /// Platform-assigned id. For nested replies this is the composite id.
    pub id: String,
    pub body: RawCommentBody,
}

/// The fields of a raw comment. Everything is optional on read; the
/// normalizer decides what is required.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCommentBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(alias = "like_count", skip_serializing_if = "Option::is_none")]
    pub like_count: Option<u64>,
    #[serde(alias = "total_reply_count", skip_serializing_if = "Option::is_none")]
    pub total_reply_count: Option<u64>,
    #[serde(alias = "published_at", skip_serializing_if = "Option::is_none")]
    pub published_at: Option<String>,
    /// Set on replies delivered flat, alongside top-level comments.
    #[serde(alias = "parent_id", skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replies: Option<ReplyMap>,
}

impl RawComment {
    /// Create a top-level comment with the given author and text.
    pub fn new(id: impl Into<String>, author: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            body: RawCommentBody {
                author: Some(author.into()),
                text: Some(text.into()),
                ..Default::default()
            },
        }
    }

    /// Attach a nested reply, keeping insertion order.
    pub fn with_reply(mut self, reply: RawComment) -> Self {
        self.body
            .replies
            .get_or_insert_with(ReplyMap::default)
            .0
            .push(reply);
        self
    }

    /// Number of nested replies carried by this comment.
    pub fn reply_count(&self) -> usize {
        self.body.replies.as_ref().map_or(0, |r| r.0.len())
    }
}

/// Nested replies in the order they were read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplyMap(pub Vec<RawComment>);

/// Parse a thread list from JSON text.
pub fn parse_threads(json: &str) -> Result<Vec<RawComment>> {
    Ok(serde_json::from_str(json)?)
}

/// Count every comment in a thread list, nested replies included.
pub fn total_comments(threads: &[RawComment]) -> usize {
    threads.iter().map(|t| 1 + t.reply_count()).sum()
}

/// Trait for comment sources.
#[async_trait]
pub trait CommentSource: Send + Sync {
    /// Fetch every comment thread of a video, following all pages.
    async fn fetch_threads(&self, video_id: &str) -> Result<Vec<RawComment>>;
}

struct EntriesVisitor;

impl<'de> Visitor<'de> for EntriesVisitor {
    type Value = Vec<RawComment>;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a map of comment ids to comments")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<Self::Value, A::Error> {
        let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
        while let Some((id, body)) = map.next_entry::<String, RawCommentBody>()? {
            entries.push(RawComment { id, body });
        }
        Ok(entries)
    }
}

impl<'de> Deserialize<'de> for RawComment {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let mut entries = deserializer.deserialize_map(EntriesVisitor)?;
        if entries.len() != 1 {
            return Err(de::Error::invalid_length(
                entries.len(),
                &"exactly one comment id per entry",
            ));
        }
        Ok(entries.remove(0))
    }
}

impl Serialize for RawComment {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.id, &self.body)?;
        map.end()
    }
}

impl<'de> Deserialize<'de> for ReplyMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_map(EntriesVisitor).map(ReplyMap)
    }
}

impl Serialize for ReplyMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for reply in &self.0 {
            map.serialize_entry(&reply.id, &reply.body)?;
        }
        map.end()
    }
}
