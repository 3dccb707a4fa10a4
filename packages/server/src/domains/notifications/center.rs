//! Notification center.
//!
//! Persisted list of notices, newest first, with read tracking. Every notice
//! the auth core emits (OTP sent, login result, permission denied, session
//! expired) lands here through [`BaseNotifier`].

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::models::{Notice, Notification};
use crate::common::NotificationId;
use crate::kernel::store::{load, save, StateKey, StoreError};
use crate::kernel::{BaseClock, BaseNotifier, BaseStateStore};

pub struct NotificationCenter {
    store: Arc<dyn BaseStateStore>,
    clock: Arc<dyn BaseClock>,
    lock: Mutex<()>,
}

impl NotificationCenter {
    pub fn new(store: Arc<dyn BaseStateStore>, clock: Arc<dyn BaseClock>) -> Self {
        Self {
            store,
            clock,
            lock: Mutex::new(()),
        }
    }

    /// All notifications, newest first.
    pub async fn list(&self) -> Result<Vec<Notification>, StoreError> {
        let (notifications, _) = self.read().await?;
        Ok(notifications)
    }

    pub async fn unread_count(&self) -> Result<usize, StoreError> {
        let (notifications, _) = self.read().await?;
        Ok(notifications.iter().filter(|n| !n.read).count())
    }

    pub async fn add(&self, notice: Notice) -> Result<Notification, StoreError> {
        let notification = Notification::from_notice(notice, self.clock.now());
        let stored = notification.clone();
        self.mutate(move |notifications| {
            notifications.insert(0, stored);
        })
        .await?;
        debug!(id = %notification.id.short(), title = %notification.title, "Notification added");
        Ok(notification)
    }

    /// Returns false if no notification has that id.
    pub async fn mark_as_read(&self, id: NotificationId) -> Result<bool, StoreError> {
        self.mutate(move |notifications| {
            match notifications.iter_mut().find(|n| n.id == id) {
                Some(notification) => {
                    notification.read = true;
                    true
                }
                None => false,
            }
        })
        .await
    }

    pub async fn mark_all_as_read(&self) -> Result<(), StoreError> {
        self.mutate(|notifications| {
            for notification in notifications.iter_mut() {
                notification.read = true;
            }
        })
        .await
    }

    pub async fn remove(&self, id: NotificationId) -> Result<bool, StoreError> {
        self.mutate(move |notifications| {
            let before = notifications.len();
            notifications.retain(|n| n.id != id);
            notifications.len() != before
        })
        .await
    }

    pub async fn clear_all(&self) -> Result<(), StoreError> {
        self.mutate(|notifications| notifications.clear()).await
    }

    async fn read(&self) -> Result<(Vec<Notification>, u64), StoreError> {
        let (notifications, version) =
            load::<Vec<Notification>>(self.store.as_ref(), StateKey::Notifications).await?;
        Ok((notifications.unwrap_or_default(), version))
    }

    async fn mutate<R>(
        &self,
        apply: impl FnOnce(&mut Vec<Notification>) -> R,
    ) -> Result<R, StoreError> {
        let _guard = self.lock.lock().await;
        let (mut notifications, version) = self.read().await?;
        let result = apply(&mut notifications);
        save(
            self.store.as_ref(),
            StateKey::Notifications,
            &notifications,
            version,
        )
        .await?;
        Ok(result)
    }
}

#[async_trait]
impl BaseNotifier for NotificationCenter {
    async fn notify(&self, notice: Notice) {
        if let Err(e) = self.add(notice).await {
            warn!(error = %e, "Failed to store notification");
        }
    }
}
