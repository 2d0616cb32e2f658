//! Data types for the Stream Bus server
//!
//! This module contains the store-facing data model: entries, streams and
//! consumer groups.

mod entry;
mod group;
mod stream;

pub use entry::{Entry, EntryId, Fields, ReadFrom, ReadResult};
pub use group::{
    ConsumerPending, GroupCreation, GroupInfo, GroupRead, GroupStart, PendingEntry,
    PendingSummary, ALREADY_EXISTED,
};
pub use stream::StreamInfo;
