//! Upload Coordinator
//!
//! Enforces that at most one apply operation is in flight across the whole
//! client, whatever video or language it targets. A second attempt while the
//! lock is held is rejected immediately: there is no queue and no backoff.
//!
//! The lock is normally taken through [`UploadCoordinator::try_lock`], whose
//! guard releases it and clears the "uploading" flag on every exit path,
//! including early returns, errors and panics.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use tokio::sync::watch;
use tracing::debug;

static SHARED: OnceLock<Arc<UploadCoordinator>> = OnceLock::new();

/// Process-wide single-flight lock for apply operations
#[derive(Debug)]
pub struct UploadCoordinator {
    busy: AtomicBool,
    uploading: watch::Sender<bool>,
}

impl UploadCoordinator {
    pub fn new() -> Self {
        let (uploading, _) = watch::channel(false);
        Self {
            busy: AtomicBool::new(false),
            uploading,
        }
    }

    /// The coordinator shared by every apply service in this process
    pub fn shared() -> Arc<Self> {
        Arc::clone(SHARED.get_or_init(|| Arc::new(Self::new())))
    }

    /// Marks the lock held; returns false without waiting if it already is.
    ///
    /// Callers outside this module go through [`Self::try_lock`], whose guard
    /// is the only owner allowed to release.
    pub(crate) fn try_acquire(&self) -> bool {
        let acquired = self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if acquired {
            self.uploading.send_replace(true);
        }
        acquired
    }

    /// Frees the lock and clears the "uploading" flag.
    fn release(&self) {
        self.uploading.send_replace(false);
        self.busy.store(false, Ordering::Release);
    }

    /// Scoped acquisition: the returned guard releases the lock when dropped.
    pub fn try_lock(&self) -> Option<UploadGuard<'_>> {
        if self.try_acquire() {
            debug!("Upload lock acquired");
            Some(UploadGuard { coordinator: self })
        } else {
            debug!("Upload lock busy, rejecting attempt");
            None
        }
    }

    /// Returns true while an apply operation holds the lock
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Observes the "uploading" flag, e.g. to disable apply actions
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.uploading.subscribe()
    }
}

impl Default for UploadCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// Holds the upload lock until dropped
#[derive(Debug)]
#[must_use = "the upload lock is released as soon as the guard is dropped"]
pub struct UploadGuard<'a> {
    coordinator: &'a UploadCoordinator,
}

impl Drop for UploadGuard<'_> {
    fn drop(&mut self) {
        self.coordinator.release();
        debug!("Upload lock released");
    }
}
