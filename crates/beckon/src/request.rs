use std::sync::Arc;

use beckon_core::QueryId;

use crate::resolver::Resolver;

/// The active request as seen by collaborators: its id, its input, and how to settle it.
pub struct PendingRequest<I, R, E = anyhow::Error> {
    id: QueryId,
    input: Arc<I>,
    resolver: Resolver<R, E>,
}

impl<I, R, E> PendingRequest<I, R, E> {
    pub(crate) fn new(id: QueryId, input: I, resolver: Resolver<R, E>) -> Self {
        Self {
            id,
            input: Arc::new(input),
            resolver,
        }
    }

    pub fn id(&self) -> &QueryId {
        &self.id
    }

    pub fn input(&self) -> &I {
        &self.input
    }

    pub fn resolver(&self) -> &Resolver<R, E> {
        &self.resolver
    }
}

impl<I, R, E> Clone for PendingRequest<I, R, E> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            input: Arc::clone(&self.input),
            resolver: self.resolver.clone(),
        }
    }
}

impl<I: std::fmt::Debug, R, E> std::fmt::Debug for PendingRequest<I, R, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingRequest")
            .field("id", &self.id)
            .field("input", &self.input)
            .finish()
    }
}
