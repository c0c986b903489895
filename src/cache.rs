//! Bounded least-recently-used cache of analysis reports, keyed by video id.

use crate::analysis::AnalysisReport;
use lru::LruCache;
use std::num::NonZeroUsize;

/// Recent analysis reports. Capacity 0 disables caching.
pub struct ReportCache {
    entries: Option<LruCache<String, AnalysisReport>>,
}

impl ReportCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: NonZeroUsize::new(capacity).map(LruCache::new),
        }
    }

    pub fn capacity(&self) -> usize {
        self.entries.as_ref().map_or(0, |entries| entries.cap().get())
    }

    pub fn len(&self) -> usize {
        self.entries.as_ref().map_or(0, LruCache::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look up a report and mark it most recently used.
    pub fn get(&mut self, video_id: &str) -> Option<AnalysisReport> {
        self.entries.as_mut()?.get(video_id).cloned()
    }

    pub fn contains(&self, video_id: &str) -> bool {
        self.entries
            .as_ref()
            .is_some_and(|entries| entries.contains(video_id))
    }

    /// Store a report. Returns the video id evicted to make room, if any;
    /// replacing a video's own report evicts nothing.
    pub fn put(&mut self, video_id: String, report: AnalysisReport) -> Option<String> {
        let entries = self.entries.as_mut()?;
        match entries.push(video_id.clone(), report) {
            Some((evicted, _)) if evicted != video_id => Some(evicted),
            _ => None,
        }
    }
}
