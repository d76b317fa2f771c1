use serde::Serialize;

use crate::remote::{RemoteError, RemoteResponse};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// The remote side applied the action.
    Applied,
    /// The remote side will never accept this payload; drop it.
    Permanent,
    /// Network or server trouble; keep the item for the next drain.
    Transient,
}

/// 4xx is permanent. Everything else, including a missing status, is retried.
pub fn classify_status(status: Option<u16>) -> Verdict {
    match status {
        Some(400..=499) => Verdict::Permanent,
        _ => Verdict::Transient,
    }
}

pub fn classify(result: &Result<RemoteResponse, RemoteError>) -> Verdict {
    match result {
        Ok(resp) if resp.success => Verdict::Applied,
        Ok(resp) => classify_status(resp.status),
        Err(e) => classify_status(e.status),
    }
}
