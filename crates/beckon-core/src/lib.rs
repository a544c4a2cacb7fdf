use serde::{Deserialize, Serialize};
use std::fmt::Display;

pub const DEFAULT_ID_LENGTH: usize = 21;

/// Opaque token identifying one request instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryId(String);

impl QueryId {
    pub fn generate() -> Self {
        Self::with_len(DEFAULT_ID_LENGTH)
    }

    pub fn with_len(len: usize) -> Self {
        let len = len.max(1);
        QueryId(nanoid::nanoid!(len))
    }

    /// A random part of `len` characters followed by `-{seq}`. Ids built from distinct
    /// `seq` values never compare equal, whatever the random part drew.
    pub fn sequenced(seq: u64, len: usize) -> Self {
        let len = len.max(1);
        QueryId(format!("{}-{}", nanoid::nanoid!(len), seq))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for QueryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for QueryId {
    fn from(id: String) -> Self {
        QueryId(id)
    }
}

impl From<&str> for QueryId {
    fn from(id: &str) -> Self {
        QueryId(id.to_string())
    }
}

/// What a broker does when a request arrives while another one is pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// Cancel the pending request and install the new one.
    CancelPreviousQuery,
    /// Leave the pending request alone and fail the new one.
    #[default]
    CancelNewQuery,
}

impl Display for ConflictPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConflictPolicy::CancelPreviousQuery => write!(f, "cancel_previous_query"),
            ConflictPolicy::CancelNewQuery => write!(f, "cancel_new_query"),
        }
    }
}

/// Why a request ended in cancellation. Diagnostic only, never used for control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancellationReason {
    /// The presentation went away without producing an outcome.
    PresentationEnded,
    /// The future awaiting the request was dropped.
    CallerCancelled,
    /// A newer request replaced it under `CancelPreviousQuery`.
    Superseded,
    /// Refused on arrival under `CancelNewQuery`.
    Rejected,
    /// `cancel()` was called on the broker.
    Explicit,
    /// The collaborator cancelled through its resolver.
    ResolverCancelled,
    /// The pending request was discarded without ever being settled.
    Discarded,
}

impl Display for CancellationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CancellationReason::PresentationEnded => "presentation ended",
            CancellationReason::CallerCancelled => "caller cancelled",
            CancellationReason::Superseded => "superseded by a newer query",
            CancellationReason::Rejected => "another query is already pending",
            CancellationReason::Explicit => "cancelled by the owner",
            CancellationReason::ResolverCancelled => "cancelled by the resolver",
            CancellationReason::Discarded => "discarded without an outcome",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("query cancelled: {reason}")]
pub struct QueryCancellationError {
    pub reason: CancellationReason,
}

impl QueryCancellationError {
    pub fn new(reason: CancellationReason) -> Self {
        Self { reason }
    }
}

/// Outcome of a failed request: either cancelled, or rejected by the collaborator with `E`.
#[derive(Debug)]
pub enum QueryError<E> {
    Cancelled(QueryCancellationError),
    Rejected(E),
}

impl<E> QueryError<E> {
    pub fn cancelled(reason: CancellationReason) -> Self {
        QueryError::Cancelled(QueryCancellationError::new(reason))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, QueryError::Cancelled(_))
    }

    pub fn cancellation(&self) -> Option<&QueryCancellationError> {
        match self {
            QueryError::Cancelled(c) => Some(c),
            QueryError::Rejected(_) => None,
        }
    }

    pub fn into_rejected(self) -> Option<E> {
        match self {
            QueryError::Rejected(e) => Some(e),
            QueryError::Cancelled(_) => None,
        }
    }
}

impl<E> From<QueryCancellationError> for QueryError<E> {
    fn from(err: QueryCancellationError) -> Self {
        QueryError::Cancelled(err)
    }
}

impl<E: Display> Display for QueryError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueryError::Cancelled(c) => write!(f, "{}", c),
            QueryError::Rejected(e) => write!(f, "query rejected: {}", e),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for QueryError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            QueryError::Cancelled(c) => Some(c),
            QueryError::Rejected(e) => Some(e),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BrokerConfig {
    pub conflict_policy: Option<ConflictPolicy>, // default "cancel_new_query"
    pub id_length: Option<usize>,                // default 21
}

impl BrokerConfig {
    pub fn conflict_policy(&self) -> ConflictPolicy {
        self.conflict_policy.unwrap_or_default()
    }

    pub fn id_length(&self) -> usize {
        self.id_length.unwrap_or(DEFAULT_ID_LENGTH).max(1)
    }
}
