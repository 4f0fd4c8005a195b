//! Recoverability of task failures
//!
//! Decides from the stored failure message whether a failed task may be resumed
//! automatically. Matching is substring based and fails closed: a message that no rule
//! recognizes is not recoverable, so an unknown provider error never triggers a retry
//! storm.

/// Messages that are never worth an automatic retry
///
/// Checked before [`RECOVERABLE`], so a message carrying both a transient symptom and a
/// permanent provider code stays failed.
const PERMANENT: &[(&str, &str)] = &[
    ("error_code: 31066", "file not found"),
    ("error_code: -9", "file not found"),
    ("error_code: 2,", "parameter error"),
    ("error_code: 105", "share link malformed"),
    ("error_code: 115", "share deleted or cancelled"),
    ("error_code: -12", "wrong access password"),
    ("error_code: 117", "share expired"),
];

/// Messages of transient failures
const RECOVERABLE: &[(&str, &str)] = &[
    ("Connection reset", "connection reset"),
    ("ConnectionResetError", "connection reset"),
    ("Connection aborted", "connection aborted"),
    ("Remote end closed connection", "remote end closed connection"),
    ("BaiduPCS._request", "provider request failed"),
    ("Too Many Requests", "rate limited"),
    ("error_code: 31034", "operation too frequent"),
];

/// Why a message was classified the way it was
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    /// Matched a transient rule
    Recoverable(&'static str),
    /// Matched a permanent rule
    Permanent(&'static str),
    /// Matched nothing
    Unknown,
}

impl Verdict {
    /// Whether the verdict allows an automatic retry
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Verdict::Recoverable(_))
    }
}

/// Classify a failure message
pub fn classify(message: &str) -> Verdict {
    if let Some((_, reason)) = PERMANENT.iter().find(|(needle, _)| message.contains(needle)) {
        return Verdict::Permanent(reason);
    }
    if let Some((_, reason)) = RECOVERABLE
        .iter()
        .find(|(needle, _)| message.contains(needle))
    {
        return Verdict::Recoverable(reason);
    }
    Verdict::Unknown
}

/// Whether a failure with this message may be retried automatically
pub fn is_recoverable(message: &str) -> bool {
    classify(message).is_recoverable()
}
