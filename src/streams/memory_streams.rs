//! In-process stream store
//!
//! Mirrors the external store's stream semantics closely enough to run the
//! whole gateway without a server: monotonic `<ms>-<seq>` IDs, a delivery
//! cursor per group, and a pending entries list where each entry belongs to
//! exactly one consumer.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use globset::Glob;
use parking_lot::Mutex;

use super::{check_count, check_fields, no_group, StreamStore};
use crate::error::{BusError, BusResult};
use crate::types::{
    ConsumerPending, Entry, EntryId, Fields, GroupCreation, GroupInfo, GroupRead, GroupStart,
    PendingEntry, PendingSummary, ReadFrom, ReadResult, StreamInfo,
};

#[derive(Default)]
struct MemStream {
    entries: BTreeMap<EntryId, Fields>,
    last_id: EntryId,
    groups: BTreeMap<String, MemGroup>,
}

impl MemStream {
    fn next_id(&self) -> EntryId {
        let now = crate::utils::now_millis();
        if now > self.last_id.ms {
            EntryId::new(now, 0)
        } else {
            self.last_id.next()
        }
    }

    fn all(&self) -> impl Iterator<Item = Entry> + '_ {
        self.entries
            .iter()
            .map(|(id, fields)| Entry::new(*id, fields.clone()))
    }

    fn after(&self, id: EntryId) -> impl Iterator<Item = Entry> + '_ {
        self.entries
            .range((Bound::Excluded(id), Bound::Unbounded))
            .map(|(id, fields)| Entry::new(*id, fields.clone()))
    }
}

struct MemGroup {
    last_delivered: EntryId,
    entries_read: u64,
    consumers: BTreeSet<String>,
    pending: BTreeMap<EntryId, MemPending>,
}

struct MemPending {
    consumer: String,
    delivered_at: Instant,
    deliveries: u64,
}

#[derive(Default)]
pub struct MemoryStreams {
    streams: Mutex<BTreeMap<String, MemStream>>,
}

impl MemoryStreams {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StreamStore for MemoryStreams {
    async fn append(&self, stream: &str, fields: &Fields) -> BusResult<EntryId> {
        check_fields(fields)?;
        let mut streams = self.streams.lock();
        let state = streams.entry(stream.to_string()).or_default();
        let id = state.next_id();
        state.entries.insert(id, fields.clone());
        state.last_id = id;
        Ok(id)
    }

    async fn read(&self, stream: &str, from: ReadFrom, count: usize) -> BusResult<ReadResult> {
        let count = check_count(count)?;
        let streams = self.streams.lock();
        let state = streams.get(stream);

        let result = match from {
            ReadFrom::Start => {
                let entries: Vec<Entry> = state
                    .map(|s| s.all().take(count).collect())
                    .unwrap_or_default();
                let cursor = entries.last().map(|e| e.id);
                ReadResult { entries, cursor }
            }
            ReadFrom::After(id) => {
                let entries: Vec<Entry> = state
                    .map(|s| s.after(id).take(count).collect())
                    .unwrap_or_default();
                let cursor = entries.last().map(|e| e.id).or(Some(id));
                ReadResult { entries, cursor }
            }
            ReadFrom::End => ReadResult {
                entries: Vec::new(),
                cursor: Some(state.map(|s| s.last_id).unwrap_or(EntryId::ZERO)),
            },
        };
        Ok(result)
    }

    async fn create_group(
        &self,
        stream: &str,
        group: &str,
        start: GroupStart,
        mkstream: bool,
    ) -> BusResult<GroupCreation> {
        let mut streams = self.streams.lock();
        if !streams.contains_key(stream) {
            if !mkstream {
                return Err(BusError::store(
                    Some("ERR"),
                    format!("stream '{}' does not exist and MKSTREAM was not requested", stream),
                ));
            }
            streams.insert(stream.to_string(), MemStream::default());
        }
        let state = streams
            .get_mut(stream)
            .ok_or_else(|| no_group(stream, group))?;

        if state.groups.contains_key(group) {
            return Ok(GroupCreation::existing(stream, group));
        }

        let last_delivered = match start {
            GroupStart::Beginning => EntryId::ZERO,
            GroupStart::Latest => state.last_id,
            GroupStart::At(id) => id,
        };
        let entries_read = state.entries.range(..=last_delivered).count() as u64;
        state.groups.insert(
            group.to_string(),
            MemGroup {
                last_delivered,
                entries_read,
                consumers: BTreeSet::new(),
                pending: BTreeMap::new(),
            },
        );
        Ok(GroupCreation::created(stream, group))
    }

    async fn read_group(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        read: GroupRead,
        count: usize,
    ) -> BusResult<Vec<Entry>> {
        let count = check_count(count)?;
        let mut streams = self.streams.lock();
        let state = streams
            .get_mut(stream)
            .ok_or_else(|| no_group(stream, group))?;
        let MemStream {
            entries, groups, ..
        } = state;
        let group_state = groups.get_mut(group).ok_or_else(|| no_group(stream, group))?;
        group_state.consumers.insert(consumer.to_string());

        match read {
            GroupRead::New => {
                let delivered: Vec<Entry> = entries
                    .range((Bound::Excluded(group_state.last_delivered), Bound::Unbounded))
                    .take(count)
                    .map(|(id, fields)| Entry::new(*id, fields.clone()))
                    .collect();
                let now = Instant::now();
                for entry in &delivered {
                    group_state.pending.insert(
                        entry.id,
                        MemPending {
                            consumer: consumer.to_string(),
                            delivered_at: now,
                            deliveries: 1,
                        },
                    );
                    group_state.last_delivered = entry.id;
                    group_state.entries_read += 1;
                }
                Ok(delivered)
            }
            GroupRead::Pending(from) => Ok(group_state
                .pending
                .range((Bound::Excluded(from), Bound::Unbounded))
                .filter(|(_, p)| p.consumer == consumer)
                .take(count)
                .map(|(id, _)| Entry::new(*id, entries.get(id).cloned().unwrap_or_default()))
                .collect()),
        }
    }

    async fn ack(&self, stream: &str, group: &str, ids: &[EntryId]) -> BusResult<u64> {
        let mut streams = self.streams.lock();
        let Some(group_state) = streams
            .get_mut(stream)
            .and_then(|s| s.groups.get_mut(group))
        else {
            return Ok(0);
        };
        Ok(ids
            .iter()
            .filter(|id| group_state.pending.remove(*id).is_some())
            .count() as u64)
    }

    async fn groups(&self, stream: &str) -> BusResult<Vec<GroupInfo>> {
        let streams = self.streams.lock();
        let Some(state) = streams.get(stream) else {
            return Ok(Vec::new());
        };
        Ok(state
            .groups
            .iter()
            .map(|(name, group)| GroupInfo {
                name: name.clone(),
                consumers: group.consumers.len() as u64,
                pending: group.pending.len() as u64,
                last_delivered_id: group.last_delivered,
                entries_read: Some(group.entries_read),
                lag: Some(state.after(group.last_delivered).count() as u64),
            })
            .collect())
    }

    async fn streams(&self, pattern: &str) -> BusResult<Vec<StreamInfo>> {
        let matcher = Glob::new(pattern)
            .map_err(|e| BusError::store(Some("ERR"), format!("invalid pattern: {}", e)))?
            .compile_matcher();
        let streams = self.streams.lock();
        Ok(streams
            .iter()
            .filter(|(name, _)| matcher.is_match(name.as_str()))
            .map(|(name, state)| StreamInfo {
                name: name.clone(),
                length: state.entries.len() as u64,
                first_id: state.entries.keys().next().copied(),
                last_id: state.entries.keys().next_back().copied(),
                last_generated_id: state.last_id,
                groups: state.groups.len() as u64,
            })
            .collect())
    }

    async fn pending_summary(&self, stream: &str, group: &str) -> BusResult<PendingSummary> {
        let streams = self.streams.lock();
        let group_state = streams
            .get(stream)
            .and_then(|s| s.groups.get(group))
            .ok_or_else(|| no_group(stream, group))?;

        let mut per_consumer: BTreeMap<&str, u64> = BTreeMap::new();
        for pending in group_state.pending.values() {
            *per_consumer.entry(pending.consumer.as_str()).or_default() += 1;
        }
        Ok(PendingSummary {
            count: group_state.pending.len() as u64,
            min_id: group_state.pending.keys().next().copied(),
            max_id: group_state.pending.keys().next_back().copied(),
            consumers: per_consumer
                .into_iter()
                .map(|(consumer, pending)| ConsumerPending {
                    consumer: consumer.to_string(),
                    pending,
                })
                .collect(),
        })
    }

    async fn pending(
        &self,
        stream: &str,
        group: &str,
        count: usize,
        consumer: Option<&str>,
    ) -> BusResult<Vec<PendingEntry>> {
        let count = check_count(count)?;
        let streams = self.streams.lock();
        let group_state = streams
            .get(stream)
            .and_then(|s| s.groups.get(group))
            .ok_or_else(|| no_group(stream, group))?;

        Ok(group_state
            .pending
            .iter()
            .filter(|(_, p)| consumer.map_or(true, |c| p.consumer == c))
            .take(count)
            .map(|(id, p)| PendingEntry {
                id: *id,
                consumer: p.consumer.clone(),
                idle_ms: p.delivered_at.elapsed().as_millis() as u64,
                deliveries: p.deliveries,
            })
            .collect())
    }

    async fn claim(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        min_idle: Duration,
        ids: &[EntryId],
    ) -> BusResult<Vec<Entry>> {
        let mut streams = self.streams.lock();
        let state = streams
            .get_mut(stream)
            .ok_or_else(|| no_group(stream, group))?;
        let MemStream {
            entries, groups, ..
        } = state;
        let group_state = groups.get_mut(group).ok_or_else(|| no_group(stream, group))?;
        group_state.consumers.insert(consumer.to_string());

        let now = Instant::now();
        let mut claimed = Vec::new();
        for id in ids {
            let Some(pending) = group_state.pending.get_mut(id) else {
                continue;
            };
            if now.duration_since(pending.delivered_at) < min_idle {
                continue;
            }
            pending.consumer = consumer.to_string();
            pending.delivered_at = now;
            pending.deliveries += 1;
            if let Some(fields) = entries.get(id) {
                claimed.push(Entry::new(*id, fields.clone()));
            }
        }
        Ok(claimed)
    }
}
