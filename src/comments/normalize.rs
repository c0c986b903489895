//! Flattening of nested comment threads into uniform records.

use super::{RawComment, RawCommentBody};
use crate::error::{Result, TubeTalkError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, warn};

/// Comment text is cut to this many characters at normalization time.
pub const MAX_TEXT_CHARS: usize = 4096;

/// Separator between parent and reply id in a composite reply id.
const REPLY_ID_SEPARATOR: char = '.';

/// A single comment in the flat, analyzable form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub comment_id: String,
    pub author: String,
    /// Truncated to [`MAX_TEXT_CHARS`].
    pub text: String,
    /// `None` for top-level comments.
    pub parent_comment_id: Option<String>,
    pub like_count: u64,
    pub published_at: Option<DateTime<Utc>>,
}

/// Whether a record starts a thread or answers another comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentKind<'a> {
    TopLevel,
    Reply { parent_id: &'a str },
}

impl NormalizedRecord {
    pub fn kind(&self) -> CommentKind<'_> {
        match self.parent_comment_id.as_deref() {
            Some(parent_id) => CommentKind::Reply { parent_id },
            None => CommentKind::TopLevel,
        }
    }

    pub fn is_reply(&self) -> bool {
        matches!(self.kind(), CommentKind::Reply { .. })
    }
}

/// Flatten comment threads into records, in traversal order.
///
/// Each top-level comment is followed by its nested replies. Fails with
/// `MalformedInput` on the first comment without text, or on a comment id
/// seen twice; nothing partial is returned.
pub fn normalize(threads: &[RawComment]) -> Result<Vec<NormalizedRecord>> {
    let mut records = Vec::with_capacity(super::total_comments(threads));
    let mut seen = HashSet::with_capacity(records.capacity());

    let mut emit = |record: NormalizedRecord| -> Result<()> {
        if !seen.insert(record.comment_id.clone()) {
            return Err(TubeTalkError::MalformedInput(format!(
                "comment id {} appears more than once",
                record.comment_id
            )));
        }
        records.push(record);
        Ok(())
    };

    for thread in threads {
        emit(to_record(
            thread.id.clone(),
            &thread.body,
            thread.body.parent_id.clone(),
        )?)?;

        if let Some(replies) = &thread.body.replies {
            for reply in &replies.0 {
                emit(to_record(
                    derive_reply_id(&reply.id, &thread.id),
                    &reply.body,
                    Some(thread.id.clone()),
                )?)?;
            }
        }
    }

    debug!(
        "Normalized {} threads into {} records",
        threads.len(),
        records.len()
    );
    Ok(records)
}

/// Derive a reply's own id from its composite `<parent>.<reply>` id.
///
/// Ids that do not start with the parent id are returned unchanged.
pub fn derive_reply_id(composite_id: &str, parent_id: &str) -> String {
    composite_id
        .strip_prefix(parent_id)
        .map(|rest| rest.strip_prefix(REPLY_ID_SEPARATOR).unwrap_or(rest))
        .filter(|rest| !rest.is_empty())
        .unwrap_or(composite_id)
        .to_string()
}

fn to_record(
    comment_id: String,
    body: &RawCommentBody,
    parent_comment_id: Option<String>,
) -> Result<NormalizedRecord> {
    let text = body.text.as_deref().ok_or_else(|| {
        TubeTalkError::MalformedInput(format!("comment {} has no text", comment_id))
    })?;

    let published_at = body.published_at.as_deref().and_then(|raw| {
        match DateTime::parse_from_rfc3339(raw) {
            Ok(dt) => Some(dt.with_timezone(&Utc)),
            Err(e) => {
                warn!("Ignoring publishedAt '{}' of comment {}: {}", raw, comment_id, e);
                None
            }
        }
    });

    Ok(NormalizedRecord {
        author: body.author.clone().unwrap_or_default(),
        text: truncate_chars(text, MAX_TEXT_CHARS),
        parent_comment_id,
        like_count: body.like_count.unwrap_or(0),
        published_at,
        comment_id,
    })
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comments::parse_threads;

    fn fixture() -> Vec<RawComment> {
        vec![
            RawComment::new("UgxA", "ana", "Great breakdown of the endgame"),
            RawComment::new("UgxB", "bob", "Why didn't he move the king?")
                .with_reply(RawComment::new("UgxB.r1", "cid", "Because of the rook check"))
                .with_reply(RawComment::new("UgxB.r2", "dee", "He ran out of time")),
        ]
    }

    #[test]
    fn test_fixture_flattens_to_four_records() {
        let records = normalize(&fixture()).unwrap();
        assert_eq!(records.len(), 4);

        let ids: Vec<&str> = records.iter().map(|r| r.comment_id.as_str()).collect();
        assert_eq!(ids, vec!["UgxA", "UgxB", "r1", "r2"]);

        assert_eq!(records[0].kind(), CommentKind::TopLevel);
        assert_eq!(records[1].kind(), CommentKind::TopLevel);
        for reply in &records[2..] {
            assert_eq!(reply.kind(), CommentKind::Reply { parent_id: "UgxB" });
        }
    }

    #[test]
    fn test_truncation_boundary() {
        let long = "x".repeat(5000);
        let threads = vec![
            RawComment::new("long", "a", long),
            RawComment::new("short", "b", "0123456789"),
        ];

        let records = normalize(&threads).unwrap();
        assert_eq!(records[0].text.chars().count(), 4096);
        assert_eq!(records[1].text, "0123456789");
    }

    #[test]
    fn test_truncation_counts_characters_not_bytes() {
        let threads = vec![RawComment::new("emoji", "a", "é".repeat(MAX_TEXT_CHARS + 10))];
        let records = normalize(&threads).unwrap();
        assert_eq!(records[0].text.chars().count(), MAX_TEXT_CHARS);
    }

    #[test]
    fn test_missing_text_is_malformed() {
        let mut reply = RawComment::new("t.r", "b", "");
        reply.body.text = None;
        let threads = vec![RawComment::new("t", "a", "ok").with_reply(reply)];

        let err = normalize(&threads).unwrap_err();
        assert!(matches!(err, TubeTalkError::MalformedInput(msg) if msg.contains("comment r ")));
    }

    #[test]
    fn test_optional_fields_default() {
        let threads = parse_threads(r#"[{"c1": {"text": "no author, no likes"}}]"#).unwrap();
        let records = normalize(&threads).unwrap();

        assert_eq!(records[0].author, "");
        assert_eq!(records[0].like_count, 0);
        assert_eq!(records[0].published_at, None);
    }

    #[test]
    fn test_flat_reply_keeps_parent_id() {
        let threads = parse_threads(
            r#"[
                {"p1": {"author": "a", "text": "top", "publishedAt": "2023-03-01T10:00:00Z"}},
                {"r9": {"author": "b", "text": "flat reply", "parentId": "p1", "likeCount": 2}}
            ]"#,
        )
        .unwrap();

        let records = normalize(&threads).unwrap();
        assert_eq!(records[1].comment_id, "r9");
        assert_eq!(records[1].parent_comment_id.as_deref(), Some("p1"));
        assert_eq!(records[1].like_count, 2);
        assert!(records[0].published_at.is_some());
    }

    #[test]
    fn test_unparseable_timestamp_is_dropped() {
        let threads = parse_threads(
            r#"[
                {"c1": {"text": "fine comment", "publishedAt": "2023-03-01"}},
                {"c2": {"text": "other"}}
            ]"#,
        )
        .unwrap();

        let records = normalize(&threads).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].comment_id, "c1");
        assert_eq!(records[0].text, "fine comment");
        assert_eq!(records[0].published_at, None);
    }

    #[test]
    fn test_duplicate_ids_are_malformed() {
        let threads = vec![RawComment::new("a", "x", "one"), RawComment::new("a", "y", "two")];
        let err = normalize(&threads).unwrap_err();
        assert!(matches!(err, TubeTalkError::MalformedInput(msg) if msg.contains("a appears")));
    }

    #[test]
    fn test_reply_colliding_with_top_level_is_malformed() {
        let threads = vec![
            RawComment::new("t", "a", "top").with_reply(RawComment::new("t.r1", "b", "reply")),
            RawComment::new("r1", "c", "clash"),
        ];
        assert!(matches!(
            normalize(&threads),
            Err(TubeTalkError::MalformedInput(_))
        ));
    }

    #[test]
    fn test_derive_reply_id() {
        assert_eq!(derive_reply_id("UgxB.AbC", "UgxB"), "AbC");
        assert_eq!(derive_reply_id("other.AbC", "UgxB"), "other.AbC");
        assert_eq!(derive_reply_id("UgxB", "UgxB"), "UgxB");
    }

    #[test]
    fn test_empty_input() {
        assert!(normalize(&[]).unwrap().is_empty());
    }
}
