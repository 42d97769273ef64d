//! Shared browser session with leases.
//!
//! The manager owns at most one live session. A dispatch takes an exclusive
//! [`SessionLease`]; the session is created by the first lease and closed
//! when the last outstanding lease is released, unless the manager keeps it
//! warm. [`SessionManager::shutdown`] always closes it.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::BrowserError;
use crate::session::{BrowserSession, SessionFactory};

type Slot = Option<Box<dyn BrowserSession>>;

/// Reference-counted owner of the shared session.
#[derive(Clone)]
pub struct SessionManager {
    factory: Arc<dyn SessionFactory>,
    slot: Arc<Mutex<Slot>>,
    leases: Arc<AtomicUsize>,
    keep_warm: bool,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("leases", &self.leases.load(Ordering::SeqCst))
            .field("keep_warm", &self.keep_warm)
            .finish()
    }
}

impl SessionManager {
    pub fn new(factory: Arc<dyn SessionFactory>) -> Self {
        Self {
            factory,
            slot: Arc::new(Mutex::new(None)),
            leases: Arc::new(AtomicUsize::new(0)),
            keep_warm: false,
        }
    }

    /// Builder: keep the session open after the last lease is released.
    pub fn keep_warm(mut self, keep_warm: bool) -> Self {
        self.keep_warm = keep_warm;
        self
    }

    /// Leases currently held or waiting.
    pub fn active_leases(&self) -> usize {
        self.leases.load(Ordering::SeqCst)
    }

    /// Whether a session is currently open.
    pub async fn is_open(&self) -> bool {
        self.slot.lock().await.is_some()
    }

    /// Wait for exclusive use of the session, creating it if needed.
    pub async fn acquire(&self) -> Result<SessionLease, BrowserError> {
        self.leases.fetch_add(1, Ordering::SeqCst);
        let mut guard = self.slot.clone().lock_owned().await;

        if guard.is_none() {
            match self.factory.create().await {
                Ok(session) => {
                    tracing::info!("Browser session opened");
                    *guard = Some(session);
                }
                Err(reason) => {
                    self.leases.fetch_sub(1, Ordering::SeqCst);
                    return Err(BrowserError::Session(reason));
                }
            }
        }

        Ok(SessionLease {
            guard: Some(guard),
            leases: self.leases.clone(),
            keep_warm: self.keep_warm,
        })
    }

    /// Close the session regardless of outstanding leases.
    pub async fn shutdown(&self) {
        let mut guard = self.slot.lock().await;
        if let Some(session) = guard.take() {
            close_session(session).await;
        }
    }
}

async fn close_session(mut session: Box<dyn BrowserSession>) {
    match session.close().await {
        Ok(()) => tracing::info!("Browser session closed"),
        Err(reason) => tracing::warn!(error = %reason, "Browser session did not close cleanly"),
    }
}

/// Exclusive use of the shared session for one dispatch.
///
/// Finish with [`SessionLease::release`] or [`SessionLease::invalidate`].
/// A lease that is merely dropped frees the session for the next dispatch
/// but leaves it open.
pub struct SessionLease {
    guard: Option<OwnedMutexGuard<Slot>>,
    leases: Arc<AtomicUsize>,
    keep_warm: bool,
}

impl SessionLease {
    /// The leased session, absent once invalidated.
    pub fn session(&mut self) -> Option<&mut (dyn BrowserSession + 'static)> {
        self.guard.as_mut().and_then(|g| g.as_deref_mut())
    }

    /// Return the session; it is closed if this was the last lease and the
    /// manager does not keep it warm.
    pub async fn release(mut self) {
        let Some(mut guard) = self.guard.take() else {
            return;
        };
        let remaining = self.leases.fetch_sub(1, Ordering::SeqCst) - 1;
        if remaining == 0 && !self.keep_warm {
            if let Some(session) = guard.take() {
                close_session(session).await;
            }
        }
    }

    /// Close the session after a failure so the next lease starts fresh.
    pub async fn invalidate(mut self) {
        let Some(mut guard) = self.guard.take() else {
            return;
        };
        self.leases.fetch_sub(1, Ordering::SeqCst);
        if let Some(session) = guard.take() {
            tracing::warn!("Invalidating browser session after failure");
            close_session(session).await;
        }
    }
}

impl Drop for SessionLease {
    fn drop(&mut self) {
        if self.guard.take().is_some() {
            self.leases.fetch_sub(1, Ordering::SeqCst);
        }
    }
}
