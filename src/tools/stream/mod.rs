//! Stream tools: plain appends, reads and introspection

mod append;
mod list;
mod read;

pub use append::StreamAppendTool;
pub use list::StreamListTool;
pub use read::StreamReadTool;
