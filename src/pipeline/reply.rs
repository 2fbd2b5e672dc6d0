//! Strict parser for the oracle's `<label>,[v1,...,vN]` reply.
//!
//! Nothing here evaluates the reply as code or guesses at intent. A reply
//! that breaks the grammar is a [`ReplyError`], which the caller answers with
//! another attempt.

use crate::output::Confidence;
use thiserror::Error;

/// Why a single reply was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReplyError {
    #[error("reply is empty")]
    Empty,

    #[error("reply has no comma separating label and scores")]
    MissingSeparator,

    #[error("label is empty")]
    EmptyLabel,

    #[error("scores are not a bracketed list: '{0}'")]
    NotAList(String),

    #[error("score '{0}' is not an integer")]
    NotAnInteger(String),

    #[error("score {0} is outside 0–100")]
    OutOfRange(i64),

    #[error("expected {expected} scores, got {actual}")]
    WrongLength { expected: usize, actual: usize },
}

/// Parse `raw` into a label and a confidence vector of `expected_len` scores.
///
/// The reply is split at its first comma. The label is the trimmed left
/// part; the right part must be `[a, b, ...]` holding exactly
/// `expected_len` integers in 0–100.
pub fn parse_reply(raw: &str, expected_len: usize) -> Result<(String, Confidence), ReplyError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ReplyError::Empty);
    }

    let (label, rest) = raw.split_once(',').ok_or(ReplyError::MissingSeparator)?;
    let label = label.trim();
    if label.is_empty() {
        return Err(ReplyError::EmptyLabel);
    }

    let rest = rest.trim();
    let inner = rest
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .ok_or_else(|| ReplyError::NotAList(rest.to_string()))?;

    let mut values = Vec::with_capacity(expected_len);
    if !inner.trim().is_empty() {
        for item in inner.split(',') {
            let item = item.trim();
            let n: i64 = item
                .parse()
                .map_err(|_| ReplyError::NotAnInteger(item.to_string()))?;
            if !(0..=100).contains(&n) {
                return Err(ReplyError::OutOfRange(n));
            }
            values.push(n as u8);
        }
    }

    if values.len() != expected_len {
        return Err(ReplyError::WrongLength {
            expected: expected_len,
            actual: values.len(),
        });
    }

    Ok((label.to_string(), Confidence(values)))
}
