//! YouTube Data API comment source.

use super::{derive_reply_id, CommentSource, RawComment, RawCommentBody, ReplyMap};
use crate::config::YoutubeSettings;
use crate::error::{Result, TubeTalkError};
use async_trait::async_trait;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, info, instrument};
use url::Url;

fn video_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // Matches various YouTube URL formats and bare video IDs
        Regex::new(
            r"(?x)
            (?:
                (?:https?://)?
                (?:www\.|m\.)?
                (?:youtube\.com/watch\?(?:.*&)?v=|youtu\.be/|youtube\.com/embed/|youtube\.com/shorts/)
                ([a-zA-Z0-9_-]{11})
            )
            |
            ^([a-zA-Z0-9_-]{11})$
        ",
        )
        .expect("video id pattern is valid")
    })
}

/// Extract a video ID from a YouTube URL or bare ID.
pub fn extract_video_id(input: &str) -> Option<String> {
    let caps = video_id_regex().captures(input.trim())?;
    caps.get(1)
        .or_else(|| caps.get(2))
        .map(|m| m.as_str().to_string())
}

/// Fetches comment threads through the YouTube Data API v3.
pub struct YoutubeCommentSource {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    page_size: u32,
}

impl YoutubeCommentSource {
    /// Create a source from settings. Fails when no API key is configured.
    pub fn new(settings: &YoutubeSettings) -> Result<Self> {
        let api_key = settings.resolve_api_key().ok_or_else(|| {
            TubeTalkError::Config(
                "YouTube API key not set. Set YOUTUBE_API_KEY or youtube.api_key".to_string(),
            )
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| TubeTalkError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            page_size: settings.page_size.clamp(1, 100),
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<T> {
        let mut url = Url::parse(&format!("{}/{}", self.base_url, endpoint))
            .map_err(|e| TubeTalkError::Config(format!("Invalid YouTube base URL: {}", e)))?;
        url.query_pairs_mut()
            .extend_pairs(params)
            .append_pair("key", &self.api_key);

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TubeTalkError::UpstreamUnavailable(format!(
                "YouTube {} returned {}: {}",
                endpoint, status, body
            )));
        }

        Ok(response.json::<T>().await?)
    }

    async fn fetch_thread_page(&self, video_id: &str, page_token: Option<&str>) -> Result<ThreadPage> {
        let mut params = vec![
            ("part", "id,snippet,replies".to_string()),
            ("videoId", video_id.to_string()),
            ("maxResults", self.page_size.to_string()),
            ("textFormat", "plainText".to_string()),
        ];
        if let Some(token) = page_token {
            params.push(("pageToken", token.to_string()));
        }
        self.get_json("commentThreads", &params).await
    }

    async fn fetch_reply_page(&self, parent_id: &str, page_token: Option<&str>) -> Result<ReplyPage> {
        let mut params = vec![
            ("part", "snippet".to_string()),
            ("parentId", parent_id.to_string()),
            ("maxResults", self.page_size.to_string()),
            ("textFormat", "plainText".to_string()),
        ];
        if let Some(token) = page_token {
            params.push(("pageToken", token.to_string()));
        }
        self.get_json("comments", &params).await
    }
}

#[async_trait]
impl CommentSource for YoutubeCommentSource {
    #[instrument(skip(self))]
    async fn fetch_threads(&self, video_id: &str) -> Result<Vec<RawComment>> {
        let mut threads = Vec::new();
        let mut pending = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page = self.fetch_thread_page(video_id, page_token.as_deref()).await?;
            for item in page.items {
                let (thread, complete) = thread_to_raw(item);
                if !complete {
                    pending.push(thread.id.clone());
                }
                threads.push(thread);
            }

            page_token = page.next_page_token;
            if page_token.is_none() {
                break;
            }
        }

        debug!("Fetched {} threads, {} need reply pages", threads.len(), pending.len());

        let mut fetched = Vec::with_capacity(pending.len());
        for parent_id in pending {
            let mut replies = Vec::new();
            let mut reply_token: Option<String> = None;

            loop {
                let page = self.fetch_reply_page(&parent_id, reply_token.as_deref()).await?;
                replies.extend(page.items);

                reply_token = page.next_page_token;
                if reply_token.is_none() {
                    break;
                }
            }

            fetched.push((parent_id, replies));
        }

        let threads = append_pending_replies(threads, fetched);
        info!(
            "Fetched {} comments for video {}",
            super::total_comments(&threads),
            video_id
        );
        Ok(threads)
    }
}

/// Convert a thread item, reporting whether its inline replies are complete.
fn thread_to_raw(item: ThreadItem) -> (RawComment, bool) {
    let total_reply_count = item.snippet.total_reply_count;
    let inline: Vec<ApiComment> = item.replies.map(|r| r.comments).unwrap_or_default();
    let complete = (total_reply_count as usize) <= inline.len();

    let mut body = snippet_to_body(item.snippet.top_level_comment.snippet);
    body.total_reply_count = Some(total_reply_count);
    if complete && !inline.is_empty() {
        body.replies = Some(ReplyMap(inline.into_iter().map(reply_to_raw).collect()));
    }

    (RawComment { id: item.id, body }, complete)
}

/// Append replies fetched separately as flat comments after every thread,
/// in fetch order. Each carries its parent id and its own short id.
fn append_pending_replies(
    mut threads: Vec<RawComment>,
    fetched: Vec<(String, Vec<ApiComment>)>,
) -> Vec<RawComment> {
    for (parent_id, replies) in fetched {
        threads.extend(replies.into_iter().map(|comment| {
            let mut body = snippet_to_body(comment.snippet);
            body.parent_id = Some(parent_id.clone());
            RawComment {
                id: derive_reply_id(&comment.id, &parent_id),
                body,
            }
        }));
    }
    threads
}

fn reply_to_raw(comment: ApiComment) -> RawComment {
    RawComment {
        id: comment.id,
        body: snippet_to_body(comment.snippet),
    }
}

fn snippet_to_body(snippet: CommentSnippet) -> RawCommentBody {
    RawCommentBody {
        author: Some(snippet.author_display_name),
        text: snippet.text_display,
        like_count: Some(snippet.like_count),
        total_reply_count: None,
        published_at: snippet.published_at,
        parent_id: None,
        replies: None,
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ThreadPage {
    next_page_token: Option<String>,
    #[serde(default)]
    items: Vec<ThreadItem>,
}

#[derive(Debug, Deserialize)]
struct ThreadItem {
    id: String,
    snippet: ThreadSnippet,
    replies: Option<InlineReplies>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ThreadSnippet {
    top_level_comment: ApiComment,
    #[serde(default)]
    total_reply_count: u64,
}

#[derive(Debug, Deserialize)]
struct InlineReplies {
    #[serde(default)]
    comments: Vec<ApiComment>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReplyPage {
    next_page_token: Option<String>,
    #[serde(default)]
    items: Vec<ApiComment>,
}

#[derive(Debug, Deserialize)]
struct ApiComment {
    id: String,
    snippet: CommentSnippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommentSnippet {
    #[serde(default)]
    author_display_name: String,
    text_display: Option<String>,
    #[serde(default)]
    like_count: u64,
    published_at: Option<String>,
}
