//! Session expiry for elevated principals.
//!
//! ```text
//! NoSession -> Active(expiry) -> Active(new expiry)   via refresh
//!                             -> Expired -> NoSession via forced logout
//! ```
//!
//! Only admin and superAdmin sessions expire. The [`SessionWatch`] polls on a
//! fixed interval and asks the identity store to enforce expiry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use super::identity::IdentityStore;
use crate::kernel::store::{load, save, StateKey, StoreError};
use crate::kernel::{BaseClock, BaseStateStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum SessionState {
    NoSession,
    Active { expires_at: DateTime<Utc> },
    Expired { expired_at: DateTime<Utc> },
}

impl SessionState {
    pub fn is_active(&self) -> bool {
        matches!(self, SessionState::Active { .. })
    }
}

/// User activity that slides an elevated session forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    Pointer,
    Keyboard,
    Touch,
    Scroll,
    Navigation,
}

/// Owns the persisted session expiry.
pub struct SessionManager {
    store: Arc<dyn BaseStateStore>,
    clock: Arc<dyn BaseClock>,
    timeout: chrono::Duration,
}

impl SessionManager {
    pub fn new(
        store: Arc<dyn BaseStateStore>,
        clock: Arc<dyn BaseClock>,
        timeout: Duration,
    ) -> Self {
        let timeout = chrono::Duration::milliseconds(
            i64::try_from(timeout.as_millis()).unwrap_or(i64::MAX),
        );
        Self {
            store,
            clock,
            timeout,
        }
    }

    pub fn timeout(&self) -> chrono::Duration {
        self.timeout
    }

    /// Set expiry to now + timeout and persist it.
    pub async fn refresh(&self) -> Result<DateTime<Utc>, StoreError> {
        let now = self.clock.now();
        let expires_at = now
            .checked_add_signed(self.timeout)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let (_, version) =
            load::<DateTime<Utc>>(self.store.as_ref(), StateKey::SessionExpiry).await?;
        save(
            self.store.as_ref(),
            StateKey::SessionExpiry,
            &expires_at,
            version,
        )
        .await?;
        debug!(%expires_at, "Session refreshed");
        Ok(expires_at)
    }

    pub async fn expiry(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        let (expiry, _) =
            load::<DateTime<Utc>>(self.store.as_ref(), StateKey::SessionExpiry).await?;
        Ok(expiry)
    }

    /// Expired only once now is strictly past the expiry.
    pub async fn state(&self) -> Result<SessionState, StoreError> {
        Ok(match self.expiry().await? {
            None => SessionState::NoSession,
            Some(expired_at) if self.clock.now() > expired_at => {
                SessionState::Expired { expired_at }
            }
            Some(expires_at) => SessionState::Active { expires_at },
        })
    }

    pub async fn clear(&self) -> Result<(), StoreError> {
        self.store.remove(StateKey::SessionExpiry).await
    }
}

/// Background expiry check. Aborted when dropped.
pub struct SessionWatch {
    handle: JoinHandle<()>,
}

impl SessionWatch {
    pub fn spawn(identity: Weak<IdentityStore>, poll: Duration) -> Self {
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(poll);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let Some(identity) = identity.upgrade() else {
                    debug!("Identity store dropped, session watch exiting");
                    break;
                };
                match identity.enforce_session().await {
                    Ok(SessionState::Active { .. }) => {}
                    Ok(state) => {
                        debug!(?state, "Session watch exiting");
                        break;
                    }
                    Err(e) => warn!(error = %e, "Session check failed"),
                }
            }
        });
        debug!(poll_secs = poll.as_secs(), "Session watch started");
        Self { handle }
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for SessionWatch {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::test_dependencies::MockClock;
    use crate::kernel::MemoryStateStore;

    fn manager() -> (SessionManager, Arc<MockClock>, Arc<MemoryStateStore>) {
        let clock = Arc::new(MockClock::default());
        let store = Arc::new(MemoryStateStore::new());
        let manager = SessionManager::new(store.clone(), clock.clone(), Duration::from_secs(1800));
        (manager, clock, store)
    }

    #[tokio::test]
    async fn test_refresh_sets_expiry_exactly_timeout_ahead() {
        let (manager, clock, _) = manager();
        let expires_at = manager.refresh().await.unwrap();
        assert_eq!(expires_at - clock.now(), chrono::Duration::minutes(30));
        assert_eq!(
            manager.state().await.unwrap(),
            SessionState::Active { expires_at }
        );
    }

    #[tokio::test]
    async fn test_expiry_boundary_is_exclusive() {
        let (manager, clock, _) = manager();
        let expires_at = manager.refresh().await.unwrap();

        clock.advance(chrono::Duration::minutes(30));
        assert!(manager.state().await.unwrap().is_active());

        clock.advance(chrono::Duration::seconds(1));
        assert_eq!(
            manager.state().await.unwrap(),
            SessionState::Expired {
                expired_at: expires_at
            }
        );
    }

    #[tokio::test]
    async fn test_refresh_slides_expiry() {
        let (manager, clock, _) = manager();
        let first = manager.refresh().await.unwrap();
        clock.advance(chrono::Duration::minutes(20));
        let second = manager.refresh().await.unwrap();
        assert_eq!(second - first, chrono::Duration::minutes(20));
    }

    #[tokio::test]
    async fn test_removing_principal_clears_session() {
        let (manager, _, store) = manager();
        manager.refresh().await.unwrap();
        store.remove(StateKey::CurrentPrincipal).await.unwrap();
        assert_eq!(manager.state().await.unwrap(), SessionState::NoSession);
    }
}
