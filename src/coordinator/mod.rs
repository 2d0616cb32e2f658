//! Consumer Group Coordinator
//!
//! Tracks each (stream, group) pair through `Uninitialized → Created →
//! Active` and guarantees a group exists before the first group read, so
//! repeated or concurrent process restarts never fail just because an
//! earlier run already created the group.
//!
//! Pending and lag figures are never cached: every introspection call goes
//! to the store.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::BusResult;
use crate::streams::StreamStore;
use crate::types::{
    Entry, EntryId, GroupCreation, GroupInfo, GroupRead, GroupStart, PendingEntry,
    PendingSummary,
};

/// Start position for groups created implicitly by `consume` and `bootstrap`
const IMPLICIT_START: GroupStart = GroupStart::Beginning;

/// Client-side view of a consumer group
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupPhase {
    Uninitialized,
    Created,
    Active,
}

pub struct Coordinator {
    store: Arc<dyn StreamStore>,
    consumer: String,
    auto_create_streams: bool,
    phases: Mutex<HashMap<(String, String), GroupPhase>>,
}

impl Coordinator {
    /// Create a coordinator reading as `consumer` unless told otherwise
    pub fn new(store: Arc<dyn StreamStore>, consumer: impl Into<String>) -> Self {
        Self {
            store,
            consumer: consumer.into(),
            auto_create_streams: true,
            phases: Mutex::new(HashMap::new()),
        }
    }

    /// Whether lazily created groups may create their stream
    pub fn with_auto_create(mut self, auto_create_streams: bool) -> Self {
        self.auto_create_streams = auto_create_streams;
        self
    }

    pub fn store(&self) -> &Arc<dyn StreamStore> {
        &self.store
    }

    /// Default consumer identity of this process
    pub fn consumer(&self) -> &str {
        &self.consumer
    }

    pub fn auto_create_streams(&self) -> bool {
        self.auto_create_streams
    }

    pub fn phase(&self, stream: &str, group: &str) -> GroupPhase {
        self.phases
            .lock()
            .get(&key(stream, group))
            .copied()
            .unwrap_or(GroupPhase::Uninitialized)
    }

    /// Idempotently create a group. "Already existed" counts as success.
    pub async fn ensure_group(
        &self,
        stream: &str,
        group: &str,
        start: GroupStart,
        mkstream: bool,
    ) -> BusResult<GroupCreation> {
        let creation = self
            .store
            .create_group(stream, group, start, mkstream)
            .await?;
        if creation.created {
            info!(stream, group, start = %start.as_arg(), "consumer group created");
        } else {
            debug!(stream, group, "consumer group already existed");
        }
        self.advance(stream, group, GroupPhase::Created);
        Ok(creation)
    }

    /// Group read that establishes the group first when this process has not yet done so
    pub async fn consume(
        &self,
        stream: &str,
        group: &str,
        consumer: Option<&str>,
        read: GroupRead,
        count: usize,
    ) -> BusResult<Vec<Entry>> {
        let consumer = consumer.unwrap_or(self.consumer.as_str());

        if self.phase(stream, group) == GroupPhase::Uninitialized {
            self.ensure_group(stream, group, IMPLICIT_START, self.auto_create_streams)
                .await?;
        }

        let entries = match self
            .store
            .read_group(stream, group, consumer, read, count)
            .await
        {
            Err(err) if err.is_no_group() => {
                warn!(stream, group, "consumer group vanished from the store, re-creating");
                self.reset(stream, group);
                self.ensure_group(stream, group, IMPLICIT_START, self.auto_create_streams)
                    .await?;
                self.store
                    .read_group(stream, group, consumer, read, count)
                    .await?
            }
            other => other?,
        };

        self.advance(stream, group, GroupPhase::Active);
        debug!(stream, group, consumer, delivered = entries.len(), "group read");
        Ok(entries)
    }

    pub async fn acknowledge(&self, stream: &str, group: &str, ids: &[EntryId]) -> BusResult<u64> {
        let acked = self.store.ack(stream, group, ids).await?;
        debug!(stream, group, requested = ids.len(), acked, "acknowledged entries");
        Ok(acked)
    }

    pub async fn groups(&self, stream: &str) -> BusResult<Vec<GroupInfo>> {
        self.store.groups(stream).await
    }

    pub async fn pending_summary(&self, stream: &str, group: &str) -> BusResult<PendingSummary> {
        self.store.pending_summary(stream, group).await
    }

    pub async fn pending(
        &self,
        stream: &str,
        group: &str,
        count: usize,
        consumer: Option<&str>,
    ) -> BusResult<Vec<PendingEntry>> {
        self.store.pending(stream, group, count, consumer).await
    }

    /// Take over entries left pending by another consumer
    pub async fn claim(
        &self,
        stream: &str,
        group: &str,
        consumer: Option<&str>,
        min_idle: Duration,
        ids: &[EntryId],
    ) -> BusResult<Vec<Entry>> {
        let consumer = consumer.unwrap_or(self.consumer.as_str());
        let claimed = self
            .store
            .claim(stream, group, consumer, min_idle, ids)
            .await?;
        if !claimed.is_empty() {
            info!(stream, group, consumer, claimed = claimed.len(), "claimed pending entries");
        }
        Ok(claimed)
    }

    /// Establish `group` on every stream at startup. Failures are logged and
    /// left to the lazy path in [`Coordinator::consume`].
    pub async fn bootstrap(&self, streams: &[String], group: &str) -> usize {
        let mut established = 0;
        for stream in streams {
            match self
                .ensure_group(stream, group, IMPLICIT_START, self.auto_create_streams)
                .await
            {
                Ok(_) => established += 1,
                Err(err) => {
                    warn!(stream = %stream, group, error = %err, "could not establish consumer group at startup")
                }
            }
        }
        established
    }

    fn advance(&self, stream: &str, group: &str, to: GroupPhase) {
        let mut phases = self.phases.lock();
        let phase = phases
            .entry(key(stream, group))
            .or_insert(GroupPhase::Uninitialized);
        if to > *phase {
            *phase = to;
        }
    }

    fn reset(&self, stream: &str, group: &str) {
        self.phases.lock().remove(&key(stream, group));
    }
}

fn key(stream: &str, group: &str) -> (String, String) {
    (stream.to_string(), group.to_string())
}
