//! System tools that do not touch stream data

mod get_current_time;
mod health;

pub use get_current_time::GetCurrentTimeTool;
pub use health::BusHealthTool;
