//! Caption Apply Service
//!
//! Runs one apply operation end to end: precondition checks, the upload
//! lock, the content push, the status confirmation, and the notifications
//! around them.
//!
//! Preconditions fail fast and in order, each with its own error and no side
//! effect beyond the error notice:
//! 1. a credential is present,
//! 2. the role may apply a track in its current status,
//! 3. the upload lock is free.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, instrument, warn};

use super::notify::{Notification, Notifier};
use super::platform::{ApplyRequest, CaptionPlatform};
use super::session::Session;
use super::settings::ApplyMode;
use super::status::can_initiate_apply;
use super::upload::UploadCoordinator;
use super::{AppliedPair, CoreError, CoreResult};

/// Called with the pairs that were just confirmed
pub type AppliedCallback = Arc<dyn Fn(&[AppliedPair]) + Send + Sync>;

const LOADING_MESSAGE: &str = "Uploading captions...";
const SUCCESS_MESSAGE: &str = "Captions applied";

/// Orchestrates apply operations against a [`CaptionPlatform`]
pub struct CaptionApplyService {
    platform: Arc<dyn CaptionPlatform>,
    uploads: Arc<UploadCoordinator>,
    notifier: Arc<dyn Notifier>,
    mode: ApplyMode,
    on_applied: Vec<AppliedCallback>,
}

impl CaptionApplyService {
    /// Creates a live-mode service
    pub fn new(
        platform: Arc<dyn CaptionPlatform>,
        uploads: Arc<UploadCoordinator>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            platform,
            uploads,
            notifier,
            mode: ApplyMode::Live,
            on_applied: Vec::new(),
        }
    }

    /// Selects live or simulated pushes
    pub fn with_mode(mut self, mode: ApplyMode) -> Self {
        self.mode = mode;
        self
    }

    /// Registers a callback run after every confirmed apply
    pub fn on_applied(mut self, callback: AppliedCallback) -> Self {
        self.on_applied.push(callback);
        self
    }

    pub fn mode(&self) -> &ApplyMode {
        &self.mode
    }

    pub fn uploads(&self) -> &Arc<UploadCoordinator> {
        &self.uploads
    }

    /// Applies the track described by `request` for the signed-in user.
    ///
    /// Returns the confirmed (video id, language) pairs. The upload lock is
    /// released before this returns, whatever the outcome.
    #[instrument(skip_all, fields(video_id = %request.video_id, language = %request.language))]
    pub async fn apply(
        &self,
        session: &Session,
        request: &ApplyRequest,
    ) -> CoreResult<Vec<AppliedPair>> {
        let Some(credential) = session.credential() else {
            return Err(self.reject(CoreError::NotAuthenticated));
        };

        if !can_initiate_apply(session.role, request.status) {
            return Err(self.reject(CoreError::PermissionDenied(format!(
                "{} cannot apply a track that is {}",
                session.role, request.status
            ))));
        }

        let Some(_guard) = self.uploads.try_lock() else {
            return Err(self.reject(CoreError::UploadInProgress));
        };

        let loading = Notification::loading(LOADING_MESSAGE);
        let loading_id = loading.id.clone();
        self.notifier.notify(loading);

        let result = self.push_and_confirm(credential, request).await;
        self.notifier.dismiss(&loading_id);

        match result {
            Ok(pairs) => {
                info!(simulated = self.mode.is_simulated(), "Captions applied");
                self.notifier.notify(Notification::success(SUCCESS_MESSAGE));
                self.notifier.celebrate();
                for callback in &self.on_applied {
                    callback(&pairs);
                }
                Ok(pairs)
            }
            Err(e) => {
                warn!(error = %e, "Apply failed");
                self.notifier.notify(Notification::error(e.user_message()));
                Err(e)
            }
        }
    }

    async fn push_and_confirm(
        &self,
        credential: &str,
        request: &ApplyRequest,
    ) -> CoreResult<Vec<AppliedPair>> {
        match &self.mode {
            ApplyMode::Live => self.platform.apply_captions(credential, request).await?,
            ApplyMode::Simulated { delay_ms } => {
                info!(delay_ms, "Simulated push, skipping platform upload");
                tokio::time::sleep(Duration::from_millis(*delay_ms)).await;
            }
        }

        let video_ids = [request.video_id.clone()];
        self.platform
            .confirm_status(&request.language, &video_ids, self.mode.is_simulated())
            .await?;

        Ok(vec![AppliedPair::new(
            request.video_id.clone(),
            request.language.clone(),
        )])
    }

    fn reject(&self, error: CoreError) -> CoreError {
        warn!(error = %error, "Apply rejected");
        self.notifier.notify(Notification::error(error.user_message()));
        error
    }
}

impl fmt::Debug for CaptionApplyService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptionApplyService")
            .field("platform", &self.platform.name())
            .field("mode", &self.mode)
            .field("callbacks", &self.on_applied.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::sync::{broadcast, Notify};

    use super::*;
    use crate::core::envelope::ApiFailure;
    use crate::core::models::WorkStatus;
    use crate::core::notify::{BroadcastNotifier, NotificationKind, NotifierEvent};
    use crate::core::platform::{MockCall, MockCaptionPlatform};
    use crate::core::session::Role;

    fn request(status: WorkStatus) -> ApplyRequest {
        ApplyRequest {
            video_id: "yt1".to_string(),
            language: "en".to_string(),
            title: "Title".to_string(),
            description: "Description".to_string(),
            files: vec![],
            status,
        }
    }

    fn service(
        platform: Arc<MockCaptionPlatform>,
    ) -> (CaptionApplyService, broadcast::Receiver<NotifierEvent>) {
        let notifier = Arc::new(BroadcastNotifier::new());
        let rx = notifier.subscribe();
        let service = CaptionApplyService::new(
            platform,
            Arc::new(UploadCoordinator::new()),
            notifier,
        );
        (service, rx)
    }

    fn drain(rx: &mut broadcast::Receiver<NotifierEvent>) -> Vec<NotifierEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn shown(events: &[NotifierEvent], kind: NotificationKind) -> Vec<String> {
        events
            .iter()
            .filter_map(|e| match e {
                NotifierEvent::Shown(n) if n.kind == kind => Some(n.message.clone()),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_unauthenticated_fails_without_adapter_call() {
        let platform = Arc::new(MockCaptionPlatform::new());
        let (service, mut rx) = service(Arc::clone(&platform));

        let err = service
            .apply(&Session::anonymous(), &request(WorkStatus::Waiting))
            .await
            .unwrap_err();

        assert!(matches!(err, CoreError::NotAuthenticated));
        assert!(platform.calls().is_empty());
        assert!(!service.uploads().is_busy());
        let events = drain(&mut rx);
        assert_eq!(
            shown(&events, NotificationKind::Error),
            vec!["Please sign in before applying captions".to_string()]
        );
    }

    #[tokio::test]
    async fn test_viewer_cannot_apply_wip_track() {
        let platform = Arc::new(MockCaptionPlatform::new());
        let (service, _rx) = service(Arc::clone(&platform));
        let session = Session::signed_in("token", Role::Viewer);

        let err = service
            .apply(&session, &request(WorkStatus::Wip))
            .await
            .unwrap_err();

        assert!(matches!(err, CoreError::PermissionDenied(_)));
        assert!(platform.calls().is_empty());
    }

    #[tokio::test]
    async fn test_translator_can_apply_wip_track() {
        let platform = Arc::new(MockCaptionPlatform::new());
        let (service, _rx) = service(Arc::clone(&platform));
        let session = Session::signed_in("token", Role::Translator);

        let pairs = service
            .apply(&session, &request(WorkStatus::Wip))
            .await
            .unwrap();
        assert_eq!(pairs, vec![AppliedPair::new("yt1", "en")]);
    }

    #[tokio::test]
    async fn test_success_notifies_once_and_runs_callback() {
        let platform = Arc::new(MockCaptionPlatform::new());
        let (service, mut rx) = service(Arc::clone(&platform));
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        let service = service.on_applied(Arc::new(move |pairs: &[AppliedPair]| {
            counter.fetch_add(pairs.len(), Ordering::SeqCst);
        }));

        let session = Session::signed_in("token", Role::Viewer);
        service
            .apply(&session, &request(WorkStatus::Waiting))
            .await
            .unwrap();

        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert_eq!(
            platform.calls(),
            vec![
                MockCall::Apply {
                    video_id: "yt1".to_string(),
                    language: "en".to_string()
                },
                MockCall::Confirm {
                    language: "en".to_string(),
                    video_ids: vec!["yt1".to_string()],
                    simulated: false
                },
            ]
        );

        let events = drain(&mut rx);
        assert_eq!(shown(&events, NotificationKind::Success).len(), 1);
        assert_eq!(shown(&events, NotificationKind::Loading).len(), 1);
        assert!(shown(&events, NotificationKind::Error).is_empty());
        assert!(events.iter().any(|e| matches!(e, NotifierEvent::Dismissed { .. })));
        assert!(events.contains(&NotifierEvent::Celebrated));
        assert!(!service.uploads().is_busy());
    }

    #[tokio::test]
    async fn test_push_failure_skips_confirm_and_releases_lock() {
        let platform = Arc::new(
            MockCaptionPlatform::new().with_apply_failure(ApiFailure::GatewayUnavailable),
        );
        let (service, mut rx) = service(Arc::clone(&platform));
        let called = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&called);
        let service = service.on_applied(Arc::new(move |_: &[AppliedPair]| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        let session = Session::signed_in("token", Role::Admin);
        let err = service
            .apply(&session, &request(WorkStatus::Waiting))
            .await
            .unwrap_err();

        assert_eq!(err.api_failure(), Some(&ApiFailure::GatewayUnavailable));
        assert_eq!(platform.confirm_count(), 0);
        assert_eq!(called.load(Ordering::SeqCst), 0);
        assert!(!service.uploads().is_busy());
        assert!(!*service.uploads().subscribe().borrow());

        let events = drain(&mut rx);
        assert_eq!(
            shown(&events, NotificationKind::Error),
            vec![ApiFailure::GatewayUnavailable.to_string()]
        );
        assert!(shown(&events, NotificationKind::Success).is_empty());
    }

    #[tokio::test]
    async fn test_confirm_failure_surfaces_application_message() {
        let platform = Arc::new(
            MockCaptionPlatform::new()
                .with_confirm_failure(ApiFailure::Application("quota exceeded".to_string())),
        );
        let (service, mut rx) = service(Arc::clone(&platform));

        let session = Session::signed_in("token", Role::Translator);
        let err = service
            .apply(&session, &request(WorkStatus::Done))
            .await
            .unwrap_err();

        assert_eq!(err.user_message(), "Error: quota exceeded");
        assert!(!service.uploads().is_busy());
        let events = drain(&mut rx);
        assert_eq!(
            shown(&events, NotificationKind::Error),
            vec!["Error: quota exceeded".to_string()]
        );

        // The lock is free again for the next attempt.
        assert!(service.uploads().try_lock().is_some());
    }

    #[tokio::test]
    async fn test_second_apply_is_rejected_while_first_is_in_flight() {
        let gate = Arc::new(Notify::new());
        let platform = Arc::new(MockCaptionPlatform::new().with_push_gate(Arc::clone(&gate)));
        let (service, _rx) = service(Arc::clone(&platform));
        let service = Arc::new(service);
        let mut uploading = service.uploads().subscribe();

        let first = {
            let service = Arc::clone(&service);
            tokio::spawn(async move {
                let session = Session::signed_in("token", Role::Translator);
                service.apply(&session, &request(WorkStatus::Waiting)).await
            })
        };

        uploading.wait_for(|busy| *busy).await.unwrap();

        let session = Session::signed_in("token", Role::Translator);
        let mut other = request(WorkStatus::Waiting);
        other.video_id = "yt2".to_string();
        let err = service.apply(&session, &other).await.unwrap_err();
        assert!(matches!(err, CoreError::UploadInProgress));

        gate.notify_one();
        first.await.unwrap().unwrap();

        assert_eq!(platform.apply_count(), 1);
        assert_eq!(platform.max_in_flight(), 1);
        assert!(!service.uploads().is_busy());
    }

    #[tokio::test(start_paused = true)]
    async fn test_simulated_mode_skips_push_but_confirms_as_test() {
        let platform = Arc::new(MockCaptionPlatform::new());
        let (service, _rx) = service(Arc::clone(&platform));
        let service = service.with_mode(ApplyMode::simulated());

        let session = Session::signed_in("token", Role::Translator);
        service
            .apply(&session, &request(WorkStatus::Waiting))
            .await
            .unwrap();

        assert_eq!(platform.apply_count(), 0);
        assert_eq!(
            platform.calls(),
            vec![MockCall::Confirm {
                language: "en".to_string(),
                video_ids: vec!["yt1".to_string()],
                simulated: true
            }]
        );
    }
}
