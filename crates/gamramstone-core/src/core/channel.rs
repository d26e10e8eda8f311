//! Channel View
//!
//! Tracks which channel tab is on screen, keeps its list in a [`ListCache`]
//! and the channel's upload progress next to it. Switching tab or channel
//! re-fetches; a fetch that finishes after the view moved on is dropped.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use tokio::sync::Notify;
use tracing::{debug, info};

use super::apply::AppliedCallback;
use super::cache::{ListCache, ListSnapshot, ViewKey};
use super::models::{ChannelStat, Video, WorkStatus};
use super::{AppliedPair, ChannelId, CoreError, CoreResult};

/// Where channel lists and statistics come from
#[async_trait]
pub trait ListSource: Send + Sync {
    async fn fetch_list(&self, channel: ChannelId, tab: WorkStatus) -> CoreResult<Vec<Video>>;

    async fn fetch_stats(&self, channel: ChannelId) -> CoreResult<ChannelStat>;
}

/// The channel tab currently displayed
pub struct ChannelView {
    source: Arc<dyn ListSource>,
    cache: Arc<ListCache>,
    stats: ArcSwapOption<ChannelStat>,
    target: ArcSwapOption<ViewKey>,
    generation: AtomicU64,
}

impl ChannelView {
    pub fn new(source: Arc<dyn ListSource>) -> Self {
        Self {
            source,
            cache: Arc::new(ListCache::new()),
            stats: ArcSwapOption::empty(),
            target: ArcSwapOption::empty(),
            generation: AtomicU64::new(0),
        }
    }

    pub fn cache(&self) -> &Arc<ListCache> {
        &self.cache
    }

    /// The view most recently asked for, loaded or not
    pub fn current(&self) -> Option<ViewKey> {
        self.target.load().as_deref().copied()
    }

    pub fn snapshot(&self) -> Option<Arc<ListSnapshot>> {
        self.cache.snapshot()
    }

    /// Last upload progress fetched for the current channel
    pub fn stats(&self) -> Option<ChannelStat> {
        self.stats.load().as_deref().copied()
    }

    /// Opens a channel tab, fetching its list and statistics.
    ///
    /// Returns `None` when another view was requested before the fetch
    /// completed.
    pub async fn open(
        &self,
        channel: ChannelId,
        tab: WorkStatus,
    ) -> CoreResult<Option<Arc<ListSnapshot>>> {
        let key = ViewKey::new(channel, tab);
        match self.current() {
            Some(current) if current == key => {}
            Some(current) if current.channel == channel => self.cache.evict(),
            _ => {
                self.cache.evict();
                self.stats.store(None);
            }
        }
        self.load(key, true).await
    }

    /// Switches tab within the current channel
    pub async fn switch_tab(&self, tab: WorkStatus) -> CoreResult<Option<Arc<ListSnapshot>>> {
        let current = self.require_current()?;
        let key = ViewKey::new(current.channel, tab);
        if key != current {
            self.cache.evict();
        }
        self.load(key, false).await
    }

    /// Switches channel, keeping the current tab
    pub async fn switch_channel(
        &self,
        channel: ChannelId,
    ) -> CoreResult<Option<Arc<ListSnapshot>>> {
        let tab = self.current().map(|k| k.tab).unwrap_or(WorkStatus::Waiting);
        self.cache.evict();
        self.stats.store(None);
        self.load(ViewKey::new(channel, tab), true).await
    }

    /// Re-fetches the current view
    pub async fn retry(&self) -> CoreResult<Option<Arc<ListSnapshot>>> {
        let current = self.require_current()?;
        self.load(current, true).await
    }

    /// Callback that writes confirmed applies into this view's cache
    pub fn applied_hook(&self) -> AppliedCallback {
        let cache = Arc::clone(&self.cache);
        Arc::new(move |pairs: &[AppliedPair]| {
            cache.apply_confirmed(pairs);
        })
    }

    fn require_current(&self) -> CoreResult<ViewKey> {
        self.current()
            .ok_or_else(|| CoreError::ValidationError("No channel is open".to_string()))
    }

    async fn load(&self, key: ViewKey, with_stats: bool) -> CoreResult<Option<Arc<ListSnapshot>>> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.target.store(Some(Arc::new(key)));

        let stats = async {
            if with_stats {
                self.source.fetch_stats(key.channel).await.map(Some)
            } else {
                Ok(None)
            }
        };
        let (videos, stats) = tokio::join!(self.source.fetch_list(key.channel, key.tab), stats);
        let (videos, stats) = (videos?, stats?);

        if self.generation.load(Ordering::SeqCst) != generation {
            debug!(channel = %key.channel, tab = %key.tab, "Discarding superseded fetch");
            return Ok(None);
        }

        if let Some(stats) = stats {
            self.stats.store(Some(Arc::new(stats)));
        }
        info!(channel = %key.channel, tab = %key.tab, count = videos.len(), "List loaded");
        Ok(Some(self.cache.replace(key, videos)))
    }
}

// =============================================================================
// Mock List Source
// =============================================================================

/// In-memory list source for testing
#[derive(Default)]
pub struct MockListSource {
    lists: Mutex<HashMap<ViewKey, Vec<Video>>>,
    stats: Mutex<HashMap<ChannelId, ChannelStat>>,
    gates: Mutex<HashMap<ChannelId, Arc<Notify>>>,
    list_calls: AtomicUsize,
}

impl MockListSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_list(self, channel: ChannelId, tab: WorkStatus, videos: Vec<Video>) -> Self {
        if let Ok(mut lists) = self.lists.lock() {
            lists.insert(ViewKey::new(channel, tab), videos);
        }
        self
    }

    pub fn with_stats(self, channel: ChannelId, stat: ChannelStat) -> Self {
        if let Ok(mut stats) = self.stats.lock() {
            stats.insert(channel, stat);
        }
        self
    }

    /// Holds list fetches of `channel` until `gate` is notified
    pub fn with_gate(self, channel: ChannelId, gate: Arc<Notify>) -> Self {
        if let Ok(mut gates) = self.gates.lock() {
            gates.insert(channel, gate);
        }
        self
    }

    /// Number of list fetches started
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ListSource for MockListSource {
    async fn fetch_list(&self, channel: ChannelId, tab: WorkStatus) -> CoreResult<Vec<Video>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);

        let gate = self
            .gates
            .lock()
            .ok()
            .and_then(|g| g.get(&channel).cloned());
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let lists = self
            .lists
            .lock()
            .map_err(|_| CoreError::Internal("mock list source poisoned".to_string()))?;
        Ok(lists
            .get(&ViewKey::new(channel, tab))
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_stats(&self, channel: ChannelId) -> CoreResult<ChannelStat> {
        let stats = self
            .stats
            .lock()
            .map_err(|_| CoreError::Internal("mock list source poisoned".to_string()))?;
        Ok(stats.get(&channel).copied().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::CaptionTrack;

    fn video(id: &str, status: WorkStatus) -> Video {
        Video {
            id: id.to_string(),
            url: String::new(),
            title: id.to_string(),
            description: String::new(),
            upload_date: String::new(),
            captions: vec![CaptionTrack {
                language: "en".to_string(),
                status,
                title: String::new(),
                description: String::new(),
                files: vec![],
            }],
        }
    }

    fn source() -> MockListSource {
        MockListSource::new()
            .with_list(
                ChannelId::Jururu,
                WorkStatus::Waiting,
                vec![video("a", WorkStatus::Waiting)],
            )
            .with_list(ChannelId::Jururu, WorkStatus::Done, vec![video("b", WorkStatus::Done)])
            .with_list(ChannelId::Ine, WorkStatus::Waiting, vec![video("c", WorkStatus::Waiting)])
            .with_stats(
                ChannelId::Jururu,
                ChannelStat {
                    uploaded: 3,
                    waiting: 1,
                },
            )
    }

    #[tokio::test]
    async fn test_open_loads_list_and_stats() {
        let view = ChannelView::new(Arc::new(source()));

        let snapshot = view
            .open(ChannelId::Jururu, WorkStatus::Waiting)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(snapshot.videos[0].id, "a");
        assert_eq!(view.stats().unwrap().uploaded, 3);
        assert_eq!(
            view.current(),
            Some(ViewKey::new(ChannelId::Jururu, WorkStatus::Waiting))
        );
    }

    #[tokio::test]
    async fn test_switch_tab_and_channel() {
        let view = ChannelView::new(Arc::new(source()));
        view.open(ChannelId::Jururu, WorkStatus::Waiting).await.unwrap();

        let done = view.switch_tab(WorkStatus::Done).await.unwrap().unwrap();
        assert_eq!(done.videos[0].id, "b");

        view.switch_tab(WorkStatus::Waiting).await.unwrap();
        let other = view.switch_channel(ChannelId::Ine).await.unwrap().unwrap();
        assert_eq!(other.key, ViewKey::new(ChannelId::Ine, WorkStatus::Waiting));
        assert_eq!(other.videos[0].id, "c");
        assert_eq!(view.stats(), Some(ChannelStat::default()));
    }

    #[tokio::test]
    async fn test_switch_tab_without_open_channel_fails() {
        let view = ChannelView::new(Arc::new(source()));
        assert!(matches!(
            view.switch_tab(WorkStatus::Done).await,
            Err(CoreError::ValidationError(_))
        ));
        assert!(view.retry().await.is_err());
    }

    #[tokio::test]
    async fn test_applied_hook_updates_cache_until_retry() {
        let view = ChannelView::new(Arc::new(source()));
        view.open(ChannelId::Jururu, WorkStatus::Waiting).await.unwrap();

        let hook = view.applied_hook();
        hook(&[AppliedPair::new("a", "en")]);
        let local = view.snapshot().unwrap();
        assert_eq!(local.videos[0].captions[0].status, WorkStatus::Done);
        assert!(local.locally_modified);

        let fresh = view.retry().await.unwrap().unwrap();
        assert_eq!(fresh.videos[0].captions[0].status, WorkStatus::Waiting);
        assert!(!fresh.locally_modified);
    }

    #[tokio::test]
    async fn test_switch_tab_drops_previous_list_while_loading() {
        let gate = Arc::new(Notify::new());
        let source = Arc::new(source().with_gate(ChannelId::Jururu, Arc::clone(&gate)));
        let view = Arc::new(ChannelView::new(source.clone()));

        gate.notify_one();
        view.open(ChannelId::Jururu, WorkStatus::Waiting).await.unwrap();
        assert!(view.snapshot().is_some());

        let pending = {
            let view = Arc::clone(&view);
            tokio::spawn(async move { view.switch_tab(WorkStatus::Done).await })
        };
        while source.list_calls() < 2 {
            tokio::task::yield_now().await;
        }

        assert_eq!(
            view.current(),
            Some(ViewKey::new(ChannelId::Jururu, WorkStatus::Done))
        );
        assert!(view.snapshot().is_none());
        // Nothing on screen for a confirmed apply to patch.
        assert_eq!(view.cache().apply_confirmed(&[AppliedPair::new("a", "en")]), 0);

        gate.notify_one();
        let loaded = pending.await.unwrap().unwrap().unwrap();
        assert_eq!(loaded.videos[0].id, "b");
    }

    #[tokio::test]
    async fn test_reopening_other_tab_of_same_channel_evicts_list() {
        let gate = Arc::new(Notify::new());
        let source = Arc::new(source().with_gate(ChannelId::Jururu, Arc::clone(&gate)));
        let view = Arc::new(ChannelView::new(source.clone()));

        gate.notify_one();
        view.open(ChannelId::Jururu, WorkStatus::Waiting).await.unwrap();
        assert!(view.stats().is_some());

        let pending = {
            let view = Arc::clone(&view);
            tokio::spawn(async move { view.open(ChannelId::Jururu, WorkStatus::Done).await })
        };
        while source.list_calls() < 2 {
            tokio::task::yield_now().await;
        }

        assert!(view.snapshot().is_none());
        assert!(view.stats().is_some());

        gate.notify_one();
        let loaded = pending.await.unwrap().unwrap().unwrap();
        assert_eq!(loaded.key.tab, WorkStatus::Done);
    }

    #[tokio::test]
    async fn test_superseded_fetch_is_discarded() {
        let gate = Arc::new(Notify::new());
        let source = Arc::new(source().with_gate(ChannelId::Jururu, Arc::clone(&gate)));
        let view = Arc::new(ChannelView::new(source.clone()));

        let slow = {
            let view = Arc::clone(&view);
            tokio::spawn(async move { view.open(ChannelId::Jururu, WorkStatus::Waiting).await })
        };
        while source.list_calls() == 0 {
            tokio::task::yield_now().await;
        }

        let fast = view.switch_channel(ChannelId::Ine).await.unwrap();
        assert!(fast.is_some());

        gate.notify_one();
        let stale = slow.await.unwrap().unwrap();
        assert!(stale.is_none());

        let snapshot = view.snapshot().unwrap();
        assert_eq!(snapshot.key.channel, ChannelId::Ine);
        assert_eq!(snapshot.videos[0].id, "c");
    }
}
