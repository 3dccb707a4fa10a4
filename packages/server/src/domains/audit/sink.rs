//! Append-only audit log.
//!
//! Events are stored oldest first under `StateKey::AuditLog` together with the
//! next sequence number, so sequences stay monotonic even after retention has
//! dropped old events.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::models::{AuditEvent, AuditHandle, AuditQuery, NewAuditEvent};
use crate::common::AuditEventId;
use crate::kernel::store::{load, save, StateKey, StoreError};
use crate::kernel::{BaseClock, BaseStateStore, RetentionPolicy};

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuditDocument {
    next_sequence: u64,
    events: Vec<AuditEvent>,
}

// =============================================================================
// Retention policies
// =============================================================================

/// Keep everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unbounded;

impl RetentionPolicy for Unbounded {
    fn apply(&self, _events: &mut Vec<AuditEvent>) {}
}

/// Keep only the newest `n` events.
#[derive(Debug, Clone, Copy)]
pub struct KeepLatest(pub usize);

impl RetentionPolicy for KeepLatest {
    fn apply(&self, events: &mut Vec<AuditEvent>) {
        if events.len() > self.0 {
            let excess = events.len() - self.0;
            events.drain(..excess);
        }
    }
}

// =============================================================================
// Sink
// =============================================================================

pub struct AuditLogSink {
    store: Arc<dyn BaseStateStore>,
    clock: Arc<dyn BaseClock>,
    retention: Arc<dyn RetentionPolicy>,
    lock: Mutex<()>,
}

impl AuditLogSink {
    pub fn new(
        store: Arc<dyn BaseStateStore>,
        clock: Arc<dyn BaseClock>,
        retention: Arc<dyn RetentionPolicy>,
    ) -> Self {
        Self {
            store,
            clock,
            retention,
            lock: Mutex::new(()),
        }
    }

    /// Append one event at the end of the log.
    pub async fn append(&self, event: NewAuditEvent) -> Result<AuditHandle, StoreError> {
        let _guard = self.lock.lock().await;
        let (document, version) =
            load::<AuditDocument>(self.store.as_ref(), StateKey::AuditLog).await?;
        let mut document = document.unwrap_or_default();

        let sequence = document.next_sequence;
        let stored = AuditEvent {
            id: AuditEventId::new(),
            sequence,
            user_id: event.subject.user_id,
            username: event.subject.username,
            role: event.subject.role,
            action: event.action,
            details: event.details,
            timestamp: self.clock.now(),
        };
        let handle = AuditHandle {
            id: stored.id,
            sequence,
        };

        info!(
            action = %stored.action,
            username = %stored.username,
            role = %stored.role,
            sequence,
            "Audit event"
        );

        document.events.push(stored);
        document.next_sequence = sequence + 1;

        let before = document.events.len();
        self.retention.apply(&mut document.events);
        if document.events.len() < before {
            debug!(dropped = before - document.events.len(), "Audit retention applied");
        }

        save(self.store.as_ref(), StateKey::AuditLog, &document, version).await?;
        Ok(handle)
    }

    /// Matching events in insertion order (oldest first). `limit` keeps the
    /// newest matches.
    pub async fn query(&self, filter: &AuditQuery) -> Result<Vec<AuditEvent>, StoreError> {
        let mut events: Vec<AuditEvent> = self
            .events()
            .await?
            .into_iter()
            .filter(|event| filter.matches(event))
            .collect();
        if let Some(limit) = filter.limit {
            if events.len() > limit {
                events.drain(..events.len() - limit);
            }
        }
        Ok(events)
    }

    /// The newest `limit` events, newest first, for display.
    pub async fn recent(&self, limit: usize) -> Result<Vec<AuditEvent>, StoreError> {
        let mut events = self.events().await?;
        events.reverse();
        events.truncate(limit);
        Ok(events)
    }

    pub async fn len(&self) -> Result<usize, StoreError> {
        Ok(self.events().await?.len())
    }

    pub async fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len().await? == 0)
    }

    async fn events(&self) -> Result<Vec<AuditEvent>, StoreError> {
        let (document, _) = load::<AuditDocument>(self.store.as_ref(), StateKey::AuditLog).await?;
        Ok(document.map(|d| d.events).unwrap_or_default())
    }
}
