//! Stream Primitives
//!
//! [`StreamStore`] is the store-facing seam: every call is submitted to the
//! store immediately, with no client-side buffering. [`RedisStreams`] talks to the
//! external store through the connection manager; [`MemoryStreams`] keeps
//! the same semantics in process.

mod memory_streams;
mod redis_streams;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::{BusError, BusResult};
use crate::types::{
    Entry, EntryId, Fields, GroupCreation, GroupInfo, GroupRead, GroupStart, PendingEntry,
    PendingSummary, ReadFrom, ReadResult, StreamInfo,
};

pub use memory_streams::MemoryStreams;
pub use redis_streams::RedisStreams;

/// Upper bound on entries returned by one read
pub const MAX_COUNT: usize = 1000;

#[async_trait]
pub trait StreamStore: Send + Sync {
    /// Append an entry; the store assigns a monotonic ID
    async fn append(&self, stream: &str, fields: &Fields) -> BusResult<EntryId>;

    /// Ranged read. A missing stream yields no entries.
    async fn read(&self, stream: &str, from: ReadFrom, count: usize) -> BusResult<ReadResult>;

    /// Create a consumer group; an existing group is reported with `created: false`
    async fn create_group(
        &self,
        stream: &str,
        group: &str,
        start: GroupStart,
        mkstream: bool,
    ) -> BusResult<GroupCreation>;

    /// Read as `consumer` within `group`. A missing stream or group is an error.
    async fn read_group(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        read: GroupRead,
        count: usize,
    ) -> BusResult<Vec<Entry>>;

    /// Remove entries from the group's pending list; returns how many were pending
    async fn ack(&self, stream: &str, group: &str, ids: &[EntryId]) -> BusResult<u64>;

    /// Groups of a stream. A missing stream has none.
    async fn groups(&self, stream: &str) -> BusResult<Vec<GroupInfo>>;

    /// Streams whose name matches a glob pattern
    async fn streams(&self, pattern: &str) -> BusResult<Vec<StreamInfo>>;

    async fn pending_summary(&self, stream: &str, group: &str) -> BusResult<PendingSummary>;

    /// Oldest pending entries, optionally for one consumer
    async fn pending(
        &self,
        stream: &str,
        group: &str,
        count: usize,
        consumer: Option<&str>,
    ) -> BusResult<Vec<PendingEntry>>;

    /// Reassign pending entries idle for at least `min_idle` to `consumer`
    async fn claim(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        min_idle: Duration,
        ids: &[EntryId],
    ) -> BusResult<Vec<Entry>>;
}

pub(crate) fn check_fields(fields: &Fields) -> BusResult<()> {
    if fields.is_empty() {
        return Err(BusError::store(None, "an entry needs at least one field"));
    }
    Ok(())
}

pub(crate) fn check_count(count: usize) -> BusResult<usize> {
    match count {
        0 => Err(BusError::store(None, "count must be at least 1")),
        n => Ok(n.min(MAX_COUNT)),
    }
}

pub(crate) fn no_group(stream: &str, group: &str) -> BusError {
    BusError::store(
        Some(crate::error::CODE_NOGROUP),
        format!(
            "NOGROUP No such key '{}' or consumer group '{}'",
            stream, group
        ),
    )
}
