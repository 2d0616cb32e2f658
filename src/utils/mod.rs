//! Utility functions and helpers

pub mod time;

pub use time::{entry_time, get_current_time, now_millis};
