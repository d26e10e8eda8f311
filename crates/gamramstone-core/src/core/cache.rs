//! Optimistic List Cache
//!
//! Holds the video list of the channel tab currently on screen. Confirmed
//! applies flip the matching tracks to `done` in place; the list is only
//! re-fetched on the next tab switch, channel switch or retry.
//!
//! Readers get immutable snapshots. A mutation builds a new snapshot and
//! swaps it in, so a reader never observes a half-updated list.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::models::{Video, WorkStatus};
use super::{AppliedPair, ChannelId};

/// The (channel, tab) a list belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ViewKey {
    pub channel: ChannelId,
    pub tab: WorkStatus,
}

impl ViewKey {
    pub fn new(channel: ChannelId, tab: WorkStatus) -> Self {
        Self { channel, tab }
    }
}

/// An immutable copy of one fetched list
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListSnapshot {
    pub key: ViewKey,
    pub videos: Vec<Video>,
    pub fetched_at: DateTime<Utc>,
    /// True once a confirmed apply was written locally since the fetch
    pub locally_modified: bool,
}

impl ListSnapshot {
    /// Returns a copy with the confirmed tracks set to `done`, or `None`
    /// when no track changes.
    fn with_confirmed(&self, pairs: &[AppliedPair]) -> Option<(Self, usize)> {
        let mut next = self.clone();
        let mut flipped = 0;

        for video in next.videos.iter_mut() {
            let languages: Vec<&str> = pairs
                .iter()
                .filter(|p| video.matches(&p.video_id))
                .map(|p| p.language.as_str())
                .collect();
            if languages.is_empty() {
                continue;
            }

            for track in video.captions.iter_mut() {
                if track.status != WorkStatus::Done && languages.contains(&track.language.as_str())
                {
                    track.status = WorkStatus::Done;
                    flipped += 1;
                }
            }
        }

        if flipped == 0 {
            return None;
        }
        next.locally_modified = true;
        Some((next, flipped))
    }
}

/// Cache of the current channel tab
#[derive(Debug, Default)]
pub struct ListCache {
    current: ArcSwapOption<ListSnapshot>,
}

impl ListCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a freshly fetched list, replacing whatever was cached
    pub fn replace(&self, key: ViewKey, videos: Vec<Video>) -> Arc<ListSnapshot> {
        let snapshot = Arc::new(ListSnapshot {
            key,
            videos,
            fetched_at: Utc::now(),
            locally_modified: false,
        });
        self.current.store(Some(Arc::clone(&snapshot)));
        snapshot
    }

    /// Drops the cached list
    pub fn evict(&self) {
        self.current.store(None);
    }

    pub fn snapshot(&self) -> Option<Arc<ListSnapshot>> {
        self.current.load_full()
    }

    /// View of the cached list, if one is loaded
    pub fn key(&self) -> Option<ViewKey> {
        self.current.load().as_ref().map(|s| s.key)
    }

    pub fn is_loaded(&self) -> bool {
        self.current.load().is_some()
    }

    /// Sets every track named by `pairs` to `done` without re-fetching.
    ///
    /// Returns the number of tracks that changed. Does nothing while no list
    /// is loaded, and applying the same pairs twice changes nothing the
    /// second time.
    pub fn apply_confirmed(&self, pairs: &[AppliedPair]) -> usize {
        let mut flipped = 0;
        self.current.rcu(|current| {
            flipped = 0;
            let snapshot = current.as_ref()?;
            match snapshot.with_confirmed(pairs) {
                Some((next, count)) => {
                    flipped = count;
                    Some(Arc::new(next))
                }
                None => Some(Arc::clone(snapshot)),
            }
        });

        if flipped > 0 {
            debug!(flipped, "Applied confirmed pairs to cached list");
        }
        flipped
    }
}

/// Lists the (video id, language) pairs whose track is still waiting
pub fn pending_works(videos: &[Video]) -> Vec<AppliedPair> {
    videos
        .iter()
        .flat_map(|video| {
            video
                .captions
                .iter()
                .filter(|t| t.status == WorkStatus::Waiting)
                .map(move |t| AppliedPair::new(video.id.clone(), t.language.clone()))
        })
        .collect()
}
