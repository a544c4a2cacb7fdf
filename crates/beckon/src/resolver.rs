use std::sync::Weak;

use beckon_core::{CancellationReason, QueryError, QueryId};

use crate::slot::Outcome;

/// Settlement entry point the resolver calls back into.
pub(crate) trait Settle<R, E>: Send + Sync {
    fn settle(&self, id: &QueryId, outcome: Outcome<R, E>) -> bool;
}

/// Callbacks handed to the presentation for one request.
///
/// Only effective while its request is the broker's current one; after that, or once
/// the broker is gone, every call is a silent no-op.
pub struct Resolver<R, E = anyhow::Error> {
    id: QueryId,
    target: Weak<dyn Settle<R, E>>,
}

impl<R, E> Resolver<R, E> {
    pub(crate) fn new(id: QueryId, target: Weak<dyn Settle<R, E>>) -> Self {
        Self { id, target }
    }

    pub fn query_id(&self) -> &QueryId {
        &self.id
    }

    pub fn resolve(&self, value: R) {
        self.settle(Ok(value));
    }

    /// `None` cancels the request instead of resolving it.
    pub fn resolve_optional(&self, value: Option<R>) {
        match value {
            Some(value) => self.resolve(value),
            None => self.cancel_query(),
        }
    }

    pub fn reject(&self, error: E) {
        self.settle(Err(QueryError::Rejected(error)));
    }

    pub fn cancel_query(&self) {
        self.settle(Err(QueryError::cancelled(
            CancellationReason::ResolverCancelled,
        )));
    }

    fn settle(&self, outcome: Outcome<R, E>) {
        match self.target.upgrade() {
            Some(target) => {
                target.settle(&self.id, outcome);
            }
            None => log::debug!("query {} settled after its broker was dropped", self.id),
        }
    }
}

impl<R, E> Clone for Resolver<R, E> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            target: self.target.clone(),
        }
    }
}

impl<R, E> std::fmt::Debug for Resolver<R, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver").field("id", &self.id).finish()
    }
}
