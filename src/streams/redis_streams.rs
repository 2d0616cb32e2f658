//! Stream primitives over the external store's stream commands

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::{FromRedisValue, Value};
use tracing::debug;

use super::{check_count, check_fields, StreamStore};
use crate::connection::ConnectionManager;
use crate::error::{BusError, BusResult};
use crate::types::{
    ConsumerPending, Entry, EntryId, Fields, GroupCreation, GroupInfo, GroupRead, GroupStart,
    PendingEntry, PendingSummary, ReadFrom, ReadResult, StreamInfo,
};

/// `[id, [field, value, ...]]`; fields are nil for entries deleted while pending
type RawEntry = (String, Option<Vec<String>>);
/// `[[stream, [entry, ...]], ...]`, or nil when nothing is available
type RawStreams = Option<Vec<(String, Vec<RawEntry>)>>;

/// Keys scanned per SCAN round trip
const SCAN_BATCH: usize = 100;

pub struct RedisStreams {
    conn: Arc<ConnectionManager>,
}

impl RedisStreams {
    pub fn new(conn: Arc<ConnectionManager>) -> Self {
        Self { conn }
    }

    async fn stream_exists(&self, stream: &str) -> BusResult<bool> {
        let kind: String = self.conn.query(redis::cmd("TYPE").arg(stream)).await?;
        match kind.as_str() {
            "none" => Ok(false),
            "stream" => Ok(true),
            other => Err(BusError::store(
                Some("WRONGTYPE"),
                format!("key '{}' holds a {} value, not a stream", stream, other),
            )),
        }
    }

    async fn stream_info(&self, stream: &str) -> BusResult<StreamInfo> {
        let info: HashMap<String, Value> =
            self.conn.query(redis::cmd("XINFO").arg("STREAM").arg(stream)).await?;

        let first: Option<RawEntry> = field(&info, "first-entry")?;
        let last: Option<RawEntry> = field(&info, "last-entry")?;
        let last_generated: String = field(&info, "last-generated-id")?;

        Ok(StreamInfo {
            name: stream.to_string(),
            length: field(&info, "length")?,
            first_id: first.map(|(id, _)| id.parse()).transpose()?,
            last_id: last.map(|(id, _)| id.parse()).transpose()?,
            last_generated_id: last_generated.parse()?,
            groups: field(&info, "groups")?,
        })
    }
}

#[async_trait]
impl StreamStore for RedisStreams {
    async fn append(&self, stream: &str, fields: &Fields) -> BusResult<EntryId> {
        check_fields(fields)?;
        let mut cmd = redis::cmd("XADD");
        cmd.arg(stream).arg("*");
        for (key, value) in fields.iter() {
            cmd.arg(key).arg(value);
        }
        let id: String = self.conn.query(&cmd).await?;
        id.parse()
    }

    async fn read(&self, stream: &str, from: ReadFrom, count: usize) -> BusResult<ReadResult> {
        let count = check_count(count)?;
        match from {
            ReadFrom::Start => {
                let raw: Vec<RawEntry> = self
                    .conn
                    .query(
                        redis::cmd("XRANGE")
                            .arg(stream)
                            .arg("-")
                            .arg("+")
                            .arg("COUNT")
                            .arg(count),
                    )
                    .await?;
                let entries = parse_entries(raw)?;
                let cursor = entries.last().map(|e| e.id);
                Ok(ReadResult { entries, cursor })
            }
            ReadFrom::After(id) => {
                let raw: RawStreams = self
                    .conn
                    .query(
                        redis::cmd("XREAD")
                            .arg("COUNT")
                            .arg(count)
                            .arg("STREAMS")
                            .arg(stream)
                            .arg(id.to_string()),
                    )
                    .await?;
                let entries = parse_stream_reply(raw)?;
                let cursor = entries.last().map(|e| e.id).or(Some(id));
                Ok(ReadResult { entries, cursor })
            }
            ReadFrom::End => {
                let raw: Vec<RawEntry> = self
                    .conn
                    .query(
                        redis::cmd("XREVRANGE")
                            .arg(stream)
                            .arg("+")
                            .arg("-")
                            .arg("COUNT")
                            .arg(1),
                    )
                    .await?;
                Ok(ReadResult {
                    entries: Vec::new(),
                    cursor: Some(tail_cursor(raw)?),
                })
            }
        }
    }

    async fn create_group(
        &self,
        stream: &str,
        group: &str,
        start: GroupStart,
        mkstream: bool,
    ) -> BusResult<GroupCreation> {
        let mut cmd = redis::cmd("XGROUP");
        cmd.arg("CREATE").arg(stream).arg(group).arg(start.as_arg());
        if mkstream {
            cmd.arg("MKSTREAM");
        }

        match self.conn.query::<()>(&cmd).await {
            Ok(()) => Ok(GroupCreation::created(stream, group)),
            Err(BusError::AlreadyExists(_)) => {
                debug!(stream, group, "consumer group already existed");
                Ok(GroupCreation::existing(stream, group))
            }
            Err(err) => Err(err),
        }
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
        let raw: RawStreams = self
            .conn
            .query(
                redis::cmd("XREADGROUP")
                    .arg("GROUP")
                    .arg(group)
                    .arg(consumer)
                    .arg("COUNT")
                    .arg(count)
                    .arg("STREAMS")
                    .arg(stream)
                    .arg(read.as_arg()),
            )
            .await?;
        parse_stream_reply(raw)
    }

    async fn ack(&self, stream: &str, group: &str, ids: &[EntryId]) -> BusResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let mut cmd = redis::cmd("XACK");
        cmd.arg(stream).arg(group);
        for id in ids {
            cmd.arg(id.to_string());
        }
        self.conn.query(&cmd).await
    }

    async fn groups(&self, stream: &str) -> BusResult<Vec<GroupInfo>> {
        if !self.stream_exists(stream).await? {
            return Ok(Vec::new());
        }
        let raw: Vec<HashMap<String, Value>> =
            self.conn.query(redis::cmd("XINFO").arg("GROUPS").arg(stream)).await?;

        raw.iter()
            .map(|info| {
                let last_delivered: String = field(info, "last-delivered-id")?;
                Ok(GroupInfo {
                    name: field(info, "name")?,
                    consumers: field(info, "consumers")?,
                    pending: field(info, "pending")?,
                    last_delivered_id: last_delivered.parse()?,
                    entries_read: field(info, "entries-read")?,
                    lag: field(info, "lag")?,
                })
            })
            .collect()
    }

    async fn streams(&self, pattern: &str) -> BusResult<Vec<StreamInfo>> {
        let mut names = Vec::new();
        let mut cursor: u64 = 0;
        loop {
            let (next, batch): (u64, Vec<String>) = self
                .conn
                .query(
                    redis::cmd("SCAN")
                        .arg(cursor)
                        .arg("MATCH")
                        .arg(pattern)
                        .arg("COUNT")
                        .arg(SCAN_BATCH)
                        .arg("TYPE")
                        .arg("stream"),
                )
                .await?;
            names.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }
        names.sort();
        names.dedup();

        let mut infos = Vec::with_capacity(names.len());
        for name in names {
            match self.stream_info(&name).await {
                Ok(info) => infos.push(info),
                // Deleted between SCAN and XINFO
                Err(err @ BusError::Store { .. }) => {
                    debug!(stream = %name, error = %err, "skipping stream during listing");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(infos)
    }

    async fn pending_summary(&self, stream: &str, group: &str) -> BusResult<PendingSummary> {
        type RawSummary = (u64, Option<String>, Option<String>, Option<Vec<(String, u64)>>);

        let (count, min, max, consumers): RawSummary = self
            .conn
            .query(redis::cmd("XPENDING").arg(stream).arg(group))
            .await?;

        Ok(PendingSummary {
            count,
            min_id: min.map(|id| id.parse()).transpose()?,
            max_id: max.map(|id| id.parse()).transpose()?,
            consumers: consumers
                .unwrap_or_default()
                .into_iter()
                .map(|(consumer, pending)| ConsumerPending { consumer, pending })
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
        let mut cmd = redis::cmd("XPENDING");
        cmd.arg(stream).arg(group).arg("-").arg("+").arg(count);
        if let Some(consumer) = consumer {
            cmd.arg(consumer);
        }
        let raw: Vec<(String, String, u64, u64)> = self.conn.query(&cmd).await?;

        raw.into_iter()
            .map(|(id, consumer, idle_ms, deliveries)| {
                Ok(PendingEntry {
                    id: id.parse()?,
                    consumer,
                    idle_ms,
                    deliveries,
                })
            })
            .collect()
    }

    async fn claim(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        min_idle: Duration,
        ids: &[EntryId],
    ) -> BusResult<Vec<Entry>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut cmd = redis::cmd("XCLAIM");
        cmd.arg(stream)
            .arg(group)
            .arg(consumer)
            .arg(min_idle.as_millis() as u64);
        for id in ids {
            cmd.arg(id.to_string());
        }
        let raw: Vec<RawEntry> = self.conn.query(&cmd).await?;
        parse_entries(raw)
    }
}

/// Decode one field of an `XINFO` reply; absent fields decode from nil
fn field<T: FromRedisValue>(info: &HashMap<String, Value>, key: &str) -> BusResult<T> {
    let value = info.get(key).unwrap_or(&Value::Nil);
    redis::from_redis_value(value).map_err(|err| {
        BusError::store(None, format!("unexpected '{}' in store reply: {}", key, err))
    })
}

fn parse_entries(raw: Vec<RawEntry>) -> BusResult<Vec<Entry>> {
    raw.into_iter()
        .map(|(id, flat)| Ok(Entry::new(id.parse()?, Fields::from_flat(flat.unwrap_or_default()))))
        .collect()
}

fn parse_stream_reply(raw: RawStreams) -> BusResult<Vec<Entry>> {
    let mut entries = Vec::new();
    for (_stream, batch) in raw.unwrap_or_default() {
        entries.extend(parse_entries(batch)?);
    }
    Ok(entries)
}

/// Newest ID from a `XREVRANGE + - COUNT 1` reply.
///
/// A missing or empty stream resumes from `0-0`, so its first append is seen.
fn tail_cursor(raw: Vec<RawEntry>) -> BusResult<EntryId> {
    Ok(parse_entries(raw)?
        .first()
        .map(|e| e.id)
        .unwrap_or(EntryId::ZERO))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(id: &str, flat: &[&str]) -> RawEntry {
        (
            id.to_string(),
            Some(flat.iter().map(|s| s.to_string()).collect()),
        )
    }

    #[test]
    fn test_parse_entries_keeps_order_and_fields() {
        let entries = parse_entries(vec![
            raw("1-0", &["type", "ping"]),
            raw("1-1", &["type", "pong", "from", "w1"]),
        ])
        .unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, EntryId::new(1, 0));
        assert_eq!(entries[1].fields.get("from"), Some("w1"));
        assert!(entries[0].id < entries[1].id);
    }

    #[test]
    fn test_parse_deleted_entry_has_no_fields() {
        let entries = parse_entries(vec![("5-0".to_string(), None)]).unwrap();
        assert!(entries[0].fields.is_empty());
    }

    #[test]
    fn test_parse_bad_id_is_rejected() {
        assert!(parse_entries(vec![raw("nope", &[])]).is_err());
    }

    #[test]
    fn test_tail_cursor_of_empty_stream_is_zero() {
        assert_eq!(tail_cursor(Vec::new()).unwrap(), EntryId::ZERO);
        assert_eq!(
            tail_cursor(vec![raw("9-2", &["k", "v"])]).unwrap(),
            EntryId::new(9, 2)
        );
    }

    #[test]
    fn test_empty_stream_reply() {
        assert!(parse_stream_reply(None).unwrap().is_empty());
    }

    #[test]
    fn test_missing_info_field_decodes_as_none() {
        let info: HashMap<String, Value> = HashMap::new();
        let lag: Option<u64> = field(&info, "lag").unwrap();
        assert_eq!(lag, None);
        assert!(field::<u64>(&info, "length").is_err());
    }
}
