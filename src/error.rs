//! Error types shared by the store-facing layers

use thiserror::Error;

/// Result type for store operations
pub type BusResult<T> = Result<T, BusError>;

/// Store reply code for "consumer group already exists"
pub const CODE_BUSYGROUP: &str = "BUSYGROUP";
/// Store reply code for "no such stream or consumer group"
pub const CODE_NOGROUP: &str = "NOGROUP";

/// Errors raised by the connection manager and stream primitives
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusError {
    /// Transient: refused, dropped or timed-out session. Recovered by the supervisor.
    #[error("connection error: {0}")]
    Connection(String),

    /// The store rejected the command
    #[error("store error: {message}")]
    Store {
        code: Option<String>,
        message: String,
    },

    /// Group creation hit an existing group
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// The connection manager was closed during shutdown
    #[error("store connection is closed")]
    Closed,

    #[error("invalid entry id: {0}")]
    InvalidId(String),
}

impl BusError {
    pub fn store(code: Option<&str>, message: impl Into<String>) -> Self {
        BusError::Store {
            code: code.map(str::to_string),
            message: message.into(),
        }
    }

    /// Store-reported error code, if any
    pub fn code(&self) -> Option<&str> {
        match self {
            BusError::Store { code, .. } => code.as_deref(),
            BusError::AlreadyExists(_) => Some(CODE_BUSYGROUP),
            _ => None,
        }
    }

    /// Infrastructure failure that says nothing about the command itself
    pub fn is_connection(&self) -> bool {
        matches!(self, BusError::Connection(_) | BusError::Closed)
    }

    /// Missing stream or group on a group read
    pub fn is_no_group(&self) -> bool {
        self.code() == Some(CODE_NOGROUP)
    }
}

impl From<redis::RedisError> for BusError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_io_error()
            || err.is_connection_dropped()
            || err.is_connection_refusal()
            || err.is_timeout()
        {
            return BusError::Connection(err.to_string());
        }
        classify_reply(err.code(), err.to_string())
    }
}

/// Map a store reply code onto the error taxonomy
pub(crate) fn classify_reply(code: Option<&str>, message: String) -> BusError {
    match code {
        Some(CODE_BUSYGROUP) => BusError::AlreadyExists(message),
        code => BusError::store(code, message),
    }
}
