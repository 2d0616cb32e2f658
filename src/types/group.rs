//! Consumer group types

use std::str::FromStr;

use serde::Serialize;

use super::EntryId;
use crate::error::BusError;

/// Note attached to an idempotent group creation that found the group in place
pub const ALREADY_EXISTED: &str = "already existed";

/// Initial delivery position of a newly created group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupStart {
    /// Deliver the whole stream history (`0`)
    Beginning,
    /// Deliver only entries appended after creation (`$`)
    Latest,
    /// Deliver entries after the given ID
    At(EntryId),
}

impl GroupStart {
    /// Store-side spelling of the start position
    pub fn as_arg(&self) -> String {
        match self {
            GroupStart::Beginning => "0".to_string(),
            GroupStart::Latest => "$".to_string(),
            GroupStart::At(id) => id.to_string(),
        }
    }
}

impl FromStr for GroupStart {
    type Err = BusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "0" | "start" | "beginning" => Ok(GroupStart::Beginning),
            "$" | "end" | "latest" => Ok(GroupStart::Latest),
            other => other.parse().map(GroupStart::At),
        }
    }
}

/// Outcome of a group creation request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupCreation {
    pub stream: String,
    pub group: String,
    pub created: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl GroupCreation {
    pub fn created(stream: &str, group: &str) -> Self {
        Self {
            stream: stream.to_string(),
            group: group.to_string(),
            created: true,
            note: None,
        }
    }

    pub fn existing(stream: &str, group: &str) -> Self {
        Self {
            stream: stream.to_string(),
            group: group.to_string(),
            created: false,
            note: Some(ALREADY_EXISTED.to_string()),
        }
    }
}

/// Which entries a group read returns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupRead {
    /// Entries never delivered to any consumer of the group (`>`)
    New,
    /// This consumer's own pending entries after the given ID
    Pending(EntryId),
}

impl GroupRead {
    pub fn as_arg(&self) -> String {
        match self {
            GroupRead::New => ">".to_string(),
            GroupRead::Pending(id) => id.to_string(),
        }
    }
}

/// Introspection snapshot of one consumer group
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupInfo {
    pub name: String,
    pub consumers: u64,
    pub pending: u64,
    pub last_delivered_id: EntryId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entries_read: Option<u64>,
    /// Entries not yet delivered to the group; `None` when the store cannot tell
    pub lag: Option<u64>,
}

/// Pending entries list summary for a group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct PendingSummary {
    pub count: u64,
    pub min_id: Option<EntryId>,
    pub max_id: Option<EntryId>,
    pub consumers: Vec<ConsumerPending>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsumerPending {
    pub consumer: String,
    pub pending: u64,
}

/// One delivered-but-unacknowledged entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingEntry {
    pub id: EntryId,
    pub consumer: String,
    pub idle_ms: u64,
    pub deliveries: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_start_spellings() {
        assert_eq!("0".parse::<GroupStart>().unwrap(), GroupStart::Beginning);
        assert_eq!("$".parse::<GroupStart>().unwrap(), GroupStart::Latest);
        assert_eq!(
            "7-1".parse::<GroupStart>().unwrap(),
            GroupStart::At(EntryId::new(7, 1))
        );
        assert_eq!(GroupStart::Latest.as_arg(), "$");
        assert_eq!(GroupStart::At(EntryId::new(7, 1)).as_arg(), "7-1");
    }

    #[test]
    fn test_existing_group_serializes_note() {
        let json = serde_json::to_value(GroupCreation::existing("health", "watchers")).unwrap();
        assert_eq!(json["created"], false);
        assert_eq!(json["note"], "already existed");

        let json = serde_json::to_value(GroupCreation::created("health", "watchers")).unwrap();
        assert_eq!(json["created"], true);
        assert!(json.get("note").is_none());
    }
}
