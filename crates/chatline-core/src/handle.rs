//! A cloneable handle for observing and poking the controller from UI code.

use parking_lot::Mutex;
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};
use tokio_util::sync::CancellationToken;

/// A cloneable handle for observing and poking the controller.
///
/// All fields are `Arc`-wrapped, so cloning is cheap.
#[derive(Clone, Default)]
pub struct ControllerHandle {
    pub(crate) cancel: Arc<Mutex<CancellationToken>>,
    pub(crate) active_sessions: Arc<AtomicUsize>,
    pub(crate) active_uploads: Arc<AtomicUsize>,
    pub(crate) idle_notify: Arc<tokio::sync::Notify>,
}

impl ControllerHandle {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Cancel every session that is currently open.
    ///
    /// Sessions started afterwards get a fresh token and are unaffected.
    pub fn abort(&self) {
        let mut token = self.cancel.lock();
        token.cancel();
        *token = CancellationToken::new();
    }

    /// Token for a session that is about to start
    pub(crate) fn session_token(&self) -> CancellationToken {
        self.cancel.lock().clone()
    }

    /// Whether any response is still streaming ("AI is responding")
    pub fn is_responding(&self) -> bool {
        self.active_sessions.load(Ordering::Acquire) > 0
    }

    /// Whether a file upload is in progress
    pub fn is_uploading(&self) -> bool {
        self.active_uploads.load(Ordering::Acquire) > 0
    }

    /// Number of sessions that have not reached a terminal state
    pub fn active_sessions(&self) -> usize {
        self.active_sessions.load(Ordering::Acquire)
    }

    /// Register a new session.
    ///
    /// With `exclusive` set the registration only succeeds when no other
    /// session is open.
    pub(crate) fn begin_session(&self, exclusive: bool) -> Option<ActivityGuard> {
        if exclusive {
            self.active_sessions
                .compare_exchange(0, 1, Ordering::AcqRel, Ordering::Acquire)
                .ok()?;
        } else {
            self.active_sessions.fetch_add(1, Ordering::AcqRel);
        }
        Some(ActivityGuard {
            counter: Arc::clone(&self.active_sessions),
            idle_notify: Some(Arc::clone(&self.idle_notify)),
        })
    }

    pub(crate) fn begin_upload(&self) -> ActivityGuard {
        self.active_uploads.fetch_add(1, Ordering::AcqRel);
        ActivityGuard {
            counter: Arc::clone(&self.active_uploads),
            idle_notify: None,
        }
    }

    /// Wait until no session is responding.
    pub async fn wait_for_idle(&self) {
        let notified = self.idle_notify.notified();
        if !self.is_responding() {
            return;
        }
        notified.await;
    }

    /// Wait until idle, with a timeout.
    /// Returns `true` if idle was reached, `false` on timeout.
    pub async fn wait_for_idle_timeout(&self, timeout: std::time::Duration) -> bool {
        if !self.is_responding() {
            return true;
        }
        tokio::time::timeout(timeout, self.wait_for_idle())
            .await
            .is_ok()
    }
}

/// Keeps an activity counter raised for as long as it lives.
///
/// Dropping the guard lowers the counter even when the owning future is
/// dropped mid-stream.
pub(crate) struct ActivityGuard {
    counter: Arc<AtomicUsize>,
    idle_notify: Option<Arc<tokio::sync::Notify>>,
}

impl Drop for ActivityGuard {
    fn drop(&mut self) {
        let previous = self.counter.fetch_sub(1, Ordering::AcqRel);
        if previous == 1 {
            if let Some(notify) = &self.idle_notify {
                notify.notify_waiters();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_guard_tracks_responding() {
        let handle = ControllerHandle::new();
        assert!(!handle.is_responding());
        let a = handle.begin_session(false).unwrap();
        let b = handle.begin_session(false).unwrap();
        assert_eq!(handle.active_sessions(), 2);
        drop(a);
        assert!(handle.is_responding());
        drop(b);
        assert!(!handle.is_responding());
    }

    #[test]
    fn test_exclusive_session_rejected_while_busy() {
        let handle = ControllerHandle::new();
        let guard = handle.begin_session(true).unwrap();
        assert!(handle.begin_session(true).is_none());
        assert_eq!(handle.active_sessions(), 1);
        drop(guard);
        assert!(handle.begin_session(true).is_some());
    }

    #[test]
    fn test_abort_only_cancels_existing_tokens() {
        let handle = ControllerHandle::new();
        let before = handle.session_token();
        handle.abort();
        let after = handle.session_token();
        assert!(before.is_cancelled());
        assert!(!after.is_cancelled());
    }

    #[test]
    fn test_upload_flag() {
        let handle = ControllerHandle::new();
        let guard = handle.begin_upload();
        assert!(handle.is_uploading());
        assert!(!handle.is_responding());
        drop(guard);
        assert!(!handle.is_uploading());
    }

    #[tokio::test]
    async fn test_wait_for_idle() {
        let handle = ControllerHandle::new();
        assert!(handle.wait_for_idle_timeout(Duration::from_millis(10)).await);

        let guard = handle.begin_session(false).unwrap();
        assert!(!handle.wait_for_idle_timeout(Duration::from_millis(10)).await);

        let waiter = {
            let handle = handle.clone();
            tokio::spawn(async move { handle.wait_for_idle().await })
        };
        tokio::task::yield_now().await;
        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter woke")
            .unwrap();
    }
}
