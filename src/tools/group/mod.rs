//! Consumer group tools
//!
//! Group reads go through the coordinator, which makes sure the group exists
//! before the first read. Delivery is at-least-once: entries stay pending
//! until acknowledged and can be re-read or claimed after a failure.

mod ack;
mod claim;
mod create;
mod list;
mod pending;
mod read;

pub use ack::GroupAckTool;
pub use claim::GroupClaimTool;
pub use create::GroupCreateTool;
pub use list::GroupListTool;
pub use pending::GroupPendingTool;
pub use read::GroupReadTool;
