//! Remote Video Platform Adapters
//!
//! Defines the trait the apply service pushes through, and its
//! implementations:
//! - [`LivePlatform`]: YouTube for the content push, the backend for the
//!   status confirmation.
//! - [`MockCaptionPlatform`]: scripted responses for tests and dry runs.

pub mod youtube;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;

use super::api::ApiClient;
use super::envelope::ApiFailure;
use super::models::{CaptionFile, Video, WorkStatus};
use super::{CoreError, CoreResult, LanguageCode, VideoId};

pub use youtube::YouTubeClient;

// =============================================================================
// Apply Request
// =============================================================================

/// Everything pushed for one (video, language) pair
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyRequest {
    /// Platform-native video id
    pub video_id: VideoId,
    pub language: LanguageCode,
    pub title: String,
    pub description: String,
    pub files: Vec<CaptionFile>,
    /// Status of the track when the apply was requested
    pub status: WorkStatus,
}

impl ApplyRequest {
    /// Builds the request for one track of a cached video
    pub fn for_track(video: &Video, language: &str) -> CoreResult<Self> {
        let track = video.track(language).ok_or_else(|| {
            CoreError::ValidationError(format!(
                "Video {} has no {} caption track",
                video.id, language
            ))
        })?;

        Ok(Self {
            video_id: video.platform_id().to_string(),
            language: track.language.clone(),
            title: track.title.clone(),
            description: track.description.clone(),
            files: track.files.clone(),
            status: track.status,
        })
    }
}

// =============================================================================
// Platform Trait
// =============================================================================

/// Remote side of an apply operation
#[async_trait]
pub trait CaptionPlatform: Send + Sync {
    /// Returns the adapter name
    fn name(&self) -> &str;

    /// Pushes the localized title, description and caption files
    async fn apply_captions(&self, credential: &str, request: &ApplyRequest) -> CoreResult<()>;

    /// Records the applied status of `video_ids` for `language`
    async fn confirm_status(
        &self,
        language: &LanguageCode,
        video_ids: &[VideoId],
        simulated: bool,
    ) -> CoreResult<()>;
}

// =============================================================================
// Live Platform
// =============================================================================

/// YouTube push plus backend confirmation
#[derive(Debug, Clone)]
pub struct LivePlatform {
    youtube: YouTubeClient,
    api: ApiClient,
}

impl LivePlatform {
    pub fn new(youtube: YouTubeClient, api: ApiClient) -> Self {
        Self { youtube, api }
    }
}

#[async_trait]
impl CaptionPlatform for LivePlatform {
    fn name(&self) -> &str {
        "youtube"
    }

    async fn apply_captions(&self, credential: &str, request: &ApplyRequest) -> CoreResult<()> {
        self.youtube.apply_captions(credential, request).await
    }

    async fn confirm_status(
        &self,
        language: &LanguageCode,
        video_ids: &[VideoId],
        simulated: bool,
    ) -> CoreResult<()> {
        self.api.confirm_status(language, video_ids, simulated).await
    }
}

// =============================================================================
// Mock Platform
// =============================================================================

/// A call recorded by [`MockCaptionPlatform`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MockCall {
    Apply {
        video_id: VideoId,
        language: LanguageCode,
    },
    Confirm {
        language: LanguageCode,
        video_ids: Vec<VideoId>,
        simulated: bool,
    },
}

/// Mock platform for testing
#[derive(Default)]
pub struct MockCaptionPlatform {
    apply_failure: Option<ApiFailure>,
    confirm_failure: Option<ApiFailure>,
    push_gate: Option<Arc<Notify>>,
    calls: Mutex<Vec<MockCall>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockCaptionPlatform {
    /// Creates a mock whose calls all succeed
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the content push fail with `failure`
    pub fn with_apply_failure(mut self, failure: ApiFailure) -> Self {
        self.apply_failure = Some(failure);
        self
    }

    /// Makes the status confirmation fail with `failure`
    pub fn with_confirm_failure(mut self, failure: ApiFailure) -> Self {
        self.confirm_failure = Some(failure);
        self
    }

    /// Holds every content push until `gate` is notified
    pub fn with_push_gate(mut self, gate: Arc<Notify>) -> Self {
        self.push_gate = Some(gate);
        self
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Number of content pushes started
    pub fn apply_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, MockCall::Apply { .. }))
            .count()
    }

    /// Number of status confirmations issued
    pub fn confirm_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, MockCall::Confirm { .. }))
            .count()
    }

    /// Highest number of content pushes observed in flight at once
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn record(&self, call: MockCall) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }
}

#[async_trait]
impl CaptionPlatform for MockCaptionPlatform {
    fn name(&self) -> &str {
        "mock"
    }

    async fn apply_captions(&self, _credential: &str, request: &ApplyRequest) -> CoreResult<()> {
        self.record(MockCall::Apply {
            video_id: request.video_id.clone(),
            language: request.language.clone(),
        });

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(gate) = &self.push_gate {
            gate.notified().await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match &self.apply_failure {
            Some(failure) => Err(failure.clone().into()),
            None => Ok(()),
        }
    }

    async fn confirm_status(
        &self,
        language: &LanguageCode,
        video_ids: &[VideoId],
        simulated: bool,
    ) -> CoreResult<()> {
        self.record(MockCall::Confirm {
            language: language.clone(),
            video_ids: video_ids.to_vec(),
            simulated,
        });

        match &self.confirm_failure {
            Some(failure) => Err(failure.clone().into()),
            None => Ok(()),
        }
    }
}
