use std::sync::{
    Arc, Weak,
    atomic::{AtomicU64, Ordering},
};

use parking_lot::Mutex;
use tokio::sync::watch;

use beckon_core::{
    BrokerConfig, CancellationReason, ConflictPolicy, DEFAULT_ID_LENGTH, QueryError, QueryId,
};

use crate::{
    request::PendingRequest,
    resolver::{Resolver, Settle},
    slot::{ContinuationSlot, Outcome},
};

struct Pending<I, R, E> {
    request: PendingRequest<I, R, E>,
    slot: ContinuationSlot<R, E>,
}

struct Shared<I, R, E> {
    policy: ConflictPolicy,
    id_length: usize,
    next_seq: AtomicU64,
    pending: Mutex<Option<Pending<I, R, E>>>,
    // Published while `pending` is locked, so snapshots follow the state order.
    current: watch::Sender<Option<PendingRequest<I, R, E>>>,
}

/// Coordinates at most one in-flight request whose answer comes from a presentation.
///
/// Cloning the broker clones a handle; all clones share the same pending slot.
///
/// Snapshots from [`Broker::subscribe`] must not be borrowed across calls into the
/// broker: clone what you need out of the `watch::Ref` first.
pub struct Broker<I, R, E = anyhow::Error> {
    shared: Arc<Shared<I, R, E>>,
}

/// A handle that does not keep the broker alive.
pub struct WeakBroker<I, R, E = anyhow::Error> {
    shared: Weak<Shared<I, R, E>>,
}

impl<I, R, E> Broker<I, R, E>
where
    I: Send + Sync + 'static,
    R: Send + 'static,
    E: Send + 'static,
{
    pub fn new(policy: ConflictPolicy) -> Self {
        Self::with_id_length(policy, DEFAULT_ID_LENGTH)
    }

    pub fn from_config(config: &BrokerConfig) -> Self {
        Self::with_id_length(config.conflict_policy(), config.id_length())
    }

    fn with_id_length(policy: ConflictPolicy, id_length: usize) -> Self {
        let (current, _) = watch::channel(None);
        Self {
            shared: Arc::new(Shared {
                policy,
                id_length,
                next_seq: AtomicU64::new(0),
                pending: Mutex::new(None),
                current,
            }),
        }
    }

    pub fn conflict_policy(&self) -> ConflictPolicy {
        self.shared.policy
    }

    /// Asks the presentation for a value and waits until it is resolved, rejected or cancelled.
    ///
    /// Dropping the returned future cancels the request and clears it from the broker.
    pub async fn request(&self, input: I) -> Result<R, QueryError<E>> {
        let weak = Arc::downgrade(&self.shared);
        let target: Weak<dyn Settle<R, E>> = weak;
        let (id, rx) = self.shared.install(input, target)?;

        // Armed before the first suspension point.
        let mut guard = CallerGuard {
            shared: &self.shared,
            id: Some(id),
        };

        let outcome = rx.await;
        guard.disarm();

        match outcome {
            Ok(outcome) => outcome,
            Err(_) => Err(QueryError::cancelled(CancellationReason::Discarded)),
        }
    }

    /// Cancels the pending request, if any. Calling it with nothing pending is a no-op.
    pub fn cancel(&self) {
        if let Some(id) = self.shared.settle_where(
            |_| true,
            Err(QueryError::cancelled(CancellationReason::Explicit)),
        ) {
            log::debug!("query {} cancelled by its owner", id);
        }
    }

    pub fn is_querying(&self) -> bool {
        self.shared.pending.lock().is_some()
    }

    pub fn current_request(&self) -> Option<PendingRequest<I, R, E>> {
        self.shared
            .pending
            .lock()
            .as_ref()
            .map(|p| p.request.clone())
    }

    /// Receiver of the current request; updated on every install and every settlement.
    pub fn subscribe(&self) -> watch::Receiver<Option<PendingRequest<I, R, E>>> {
        self.shared.current.subscribe()
    }

    /// Teardown hook for presentations that disappear without producing an outcome.
    pub fn on_presentation_ended(&self, id: &QueryId) -> bool {
        self.auto_cancel(id, CancellationReason::PresentationEnded)
    }

    /// Cancels `id` if it is still the current request. Returns whether anything was settled.
    pub fn auto_cancel(&self, id: &QueryId, reason: CancellationReason) -> bool {
        self.shared.settle(id, Err(QueryError::cancelled(reason)))
    }

    pub fn downgrade(&self) -> WeakBroker<I, R, E> {
        WeakBroker {
            shared: Arc::downgrade(&self.shared),
        }
    }
}

impl<R, E> Broker<(), R, E>
where
    R: Send + 'static,
    E: Send + 'static,
{
    pub async fn request_empty(&self) -> Result<R, QueryError<E>> {
        self.request(()).await
    }
}

impl<I, R, E> Default for Broker<I, R, E>
where
    I: Send + Sync + 'static,
    R: Send + 'static,
    E: Send + 'static,
{
    fn default() -> Self {
        Self::new(ConflictPolicy::default())
    }
}

impl<I, R, E> Clone for Broker<I, R, E> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<I, R, E> std::fmt::Debug for Broker<I, R, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let pending = self.shared.pending.lock().as_ref().map(|p| p.request.id().clone());
        f.debug_struct("Broker")
            .field("policy", &self.shared.policy)
            .field("pending", &pending)
            .finish()
    }
}

impl<I, R, E> WeakBroker<I, R, E> {
    pub fn upgrade(&self) -> Option<Broker<I, R, E>> {
        self.shared.upgrade().map(|shared| Broker { shared })
    }
}

impl<I, R, E> Clone for WeakBroker<I, R, E> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<I, R, E> Shared<I, R, E> {
    fn install(
        &self,
        input: I,
        target: Weak<dyn Settle<R, E>>,
    ) -> Result<(QueryId, futures::channel::oneshot::Receiver<Outcome<R, E>>), QueryError<E>> {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let id = QueryId::sequenced(seq, self.id_length);
        let mut pending = self.pending.lock();

        if let Some(mut previous) = pending.take() {
            match self.policy {
                ConflictPolicy::CancelNewQuery => {
                    log::debug!(
                        "query {} refused, {} is still pending",
                        id,
                        previous.request.id()
                    );
                    *pending = Some(previous);
                    return Err(QueryError::cancelled(CancellationReason::Rejected));
                }
                ConflictPolicy::CancelPreviousQuery => {
                    log::debug!(
                        "query {} superseded by {}",
                        previous.request.id(),
                        id
                    );
                    previous
                        .slot
                        .resume(Err(QueryError::cancelled(CancellationReason::Superseded)));
                }
            }
        }

        let (slot, rx) = ContinuationSlot::new();
        let request = PendingRequest::new(id.clone(), input, Resolver::new(id.clone(), target));
        self.current.send_replace(Some(request.clone()));
        *pending = Some(Pending { request, slot });
        log::debug!("query {} pending", id);

        Ok((id, rx))
    }

    /// Takes the pending pair if `matches` accepts its id, clears the published
    /// snapshot and resumes the caller.
    fn settle_where(
        &self,
        matches: impl FnOnce(&QueryId) -> bool,
        outcome: Outcome<R, E>,
    ) -> Option<QueryId> {
        let mut pending = self.pending.lock();
        let mut settled = match pending.take() {
            Some(current) if matches(current.request.id()) => current,
            other => {
                *pending = other;
                return None;
            }
        };
        self.current.send_replace(None);
        drop(pending);

        log::debug!(
            "query {} {}",
            settled.request.id(),
            describe(&outcome)
        );
        settled.slot.resume(outcome);
        Some(settled.request.id().clone())
    }
}

impl<I, R, E> Settle<R, E> for Shared<I, R, E>
where
    I: Send + Sync,
    R: Send,
    E: Send,
{
    fn settle(&self, id: &QueryId, outcome: Outcome<R, E>) -> bool {
        let settled = self.settle_where(|current| current == id, outcome).is_some();
        if !settled {
            log::debug!("ignoring stale settlement for query {}", id);
        }
        settled
    }
}

fn describe<R, E>(outcome: &Outcome<R, E>) -> String {
    match outcome {
        Ok(_) => "resolved".to_string(),
        Err(QueryError::Rejected(_)) => "rejected".to_string(),
        Err(QueryError::Cancelled(c)) => format!("cancelled ({})", c.reason),
    }
}

struct CallerGuard<'a, I, R, E> {
    shared: &'a Shared<I, R, E>,
    id: Option<QueryId>,
}

impl<I, R, E> CallerGuard<'_, I, R, E> {
    fn disarm(&mut self) {
        self.id = None;
    }
}

impl<I, R, E> Drop for CallerGuard<'_, I, R, E> {
    fn drop(&mut self) {
        if let Some(id) = self.id.take()
            && self
                .shared
                .settle_where(
                    |current| *current == id,
                    Err(QueryError::cancelled(CancellationReason::CallerCancelled)),
                )
                .is_some()
        {
            log::debug!("query {} abandoned by its caller", id);
        }
    }
}
