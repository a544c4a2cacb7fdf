use std::future::Future;

use beckon::{Broker, PendingRequest, QueryId, WeakBroker};
use futures::{FutureExt, channel::oneshot, pin_mut, select};
use tokio::sync::watch;

mod channel;

pub use channel::{ChannelPresenter, Prompt};

/// What a presentation produced for one request.
#[derive(Debug)]
pub enum Presentation<R, E> {
    Resolved(R),
    Rejected(E),
    /// Went away without an outcome, e.g. swipe-to-dismiss.
    Dismissed,
}

pub trait Presenter<I, R, E>: Send + 'static {
    /// Shows `request` and completes once the user produced an outcome.
    ///
    /// The returned future is dropped if the broker moves on to another request first.
    fn present(
        &mut self,
        request: PendingRequest<I, R, E>,
    ) -> impl Future<Output = Presentation<R, E>> + Send;
}

pub struct HostRef {
    terminate_tx: oneshot::Sender<()>,
}

impl HostRef {
    /// Stops the host. A presentation that is still showing is torn down.
    /// Dropping the `HostRef` has the same effect.
    pub fn terminate(self) {
        let _ = self.terminate_tx.send(());
    }
}

/// Feeds every request of one broker through a [`Presenter`].
pub struct PresentationHost<P, I, R, E> {
    broker: WeakBroker<I, R, E>,
    requests: watch::Receiver<Option<PendingRequest<I, R, E>>>,
    presenter: P,
    terminate_rx: oneshot::Receiver<()>,
}

impl<P, I, R, E> PresentationHost<P, I, R, E>
where
    P: Presenter<I, R, E>,
    I: Send + Sync + 'static,
    R: Send + 'static,
    E: Send + 'static,
{
    pub fn spawn(broker: &Broker<I, R, E>, presenter: P) -> HostRef {
        let (terminate_tx, terminate_rx) = oneshot::channel();
        let host = PresentationHost {
            broker: broker.downgrade(),
            requests: broker.subscribe(),
            presenter,
            terminate_rx,
        };
        tokio::spawn(host.run());
        HostRef { terminate_tx }
    }

    pub async fn run(self) {
        let PresentationHost {
            broker,
            mut requests,
            mut presenter,
            mut terminate_rx,
        } = self;
        let mut last: Option<QueryId> = None;

        log::info!("presentation host started");
        loop {
            let request = select! {
                _ = (&mut terminate_rx).fuse() => break,
                next = next_request(&mut requests, last.as_ref()).fuse() => match next {
                    Some(request) => request,
                    None => break,
                },
            };
            let id = request.id().clone();
            last = Some(id.clone());
            log::debug!("presenting query {}", id);

            let outcome = {
                let presenting = presenter.present(request.clone()).fuse();
                let replaced = wait_replaced(&mut requests, &id).fuse();
                pin_mut!(presenting, replaced);
                select! {
                    _ = (&mut terminate_rx).fuse() => {
                        end_presentation(&broker, &id);
                        break;
                    },
                    outcome = presenting => Some(outcome),
                    _ = replaced => None,
                }
            };

            match outcome {
                Some(Presentation::Resolved(value)) => request.resolver().resolve(value),
                Some(Presentation::Rejected(error)) => request.resolver().reject(error),
                Some(Presentation::Dismissed) | None => end_presentation(&broker, &id),
            }
        }
        log::info!("presentation host stopped");
    }
}

fn end_presentation<I, R, E>(broker: &WeakBroker<I, R, E>, id: &QueryId)
where
    I: Send + Sync + 'static,
    R: Send + 'static,
    E: Send + 'static,
{
    if let Some(broker) = broker.upgrade()
        && !broker.on_presentation_ended(id)
    {
        log::debug!("presentation of query {} ended after it settled", id);
    }
}

/// Waits for a current request other than `last`. `None` once the broker is gone.
async fn next_request<I, R, E>(
    requests: &mut watch::Receiver<Option<PendingRequest<I, R, E>>>,
    last: Option<&QueryId>,
) -> Option<PendingRequest<I, R, E>> {
    loop {
        let current = requests.borrow_and_update().clone();
        if let Some(request) = current
            && Some(request.id()) != last
        {
            return Some(request);
        }
        requests.changed().await.ok()?;
    }
}

/// Completes once `id` is no longer the broker's current request.
async fn wait_replaced<I, R, E>(
    requests: &mut watch::Receiver<Option<PendingRequest<I, R, E>>>,
    id: &QueryId,
) {
    loop {
        if requests.changed().await.is_err() {
            return;
        }
        let still_current = requests
            .borrow()
            .as_ref()
            .is_some_and(|request| request.id() == id);
        if !still_current {
            return;
        }
    }
}
