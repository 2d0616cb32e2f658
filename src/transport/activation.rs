//! Detection of a listening socket handed over by a process supervisor

use std::os::unix::io::RawFd;

use tracing::{debug, warn};

use super::{TransportError, TransportResult};

pub const ENV_LISTEN_FDS: &str = "LISTEN_FDS";
pub const ENV_LISTEN_PID: &str = "LISTEN_PID";

/// First inherited descriptor
pub const LISTEN_FDS_START: RawFd = 3;

/// The inherited listening descriptor, if one was passed to process `pid`
pub fn listen_fd<F>(lookup: F, pid: u32) -> TransportResult<Option<RawFd>>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw_count) = lookup(ENV_LISTEN_FDS).filter(|v| !v.trim().is_empty()) else {
        return Ok(None);
    };
    let count: u32 = raw_count.trim().parse().map_err(|_| {
        TransportError::Activation(format!("{}={} is not a count", ENV_LISTEN_FDS, raw_count))
    })?;
    if count == 0 {
        return Ok(None);
    }

    if let Some(raw_pid) = lookup(ENV_LISTEN_PID).filter(|v| !v.trim().is_empty()) {
        let target: u32 = raw_pid.trim().parse().map_err(|_| {
            TransportError::Activation(format!("{}={} is not a pid", ENV_LISTEN_PID, raw_pid))
        })?;
        if target != pid {
            debug!(target, pid, "inherited descriptors belong to another process");
            return Ok(None);
        }
    }

    if count > 1 {
        warn!(count, "several descriptors inherited, serving only the first");
    }
    Ok(Some(LISTEN_FDS_START))
}
