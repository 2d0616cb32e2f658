//! Stream introspection types

use serde::Serialize;

use super::EntryId;

/// Introspection snapshot of one stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamInfo {
    pub name: String,
    pub length: u64,
    pub first_id: Option<EntryId>,
    pub last_id: Option<EntryId>,
    pub last_generated_id: EntryId,
    pub groups: u64,
}
