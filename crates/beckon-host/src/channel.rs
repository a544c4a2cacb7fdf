use beckon::PendingRequest;

use crate::{Presentation, Presenter};

/// A request handed to the other end of a [`ChannelPresenter`].
pub struct Prompt<I, R, E> {
    pub request: PendingRequest<I, R, E>,
    reply: kanal::Sender<Presentation<R, E>>,
}

impl<I, R, E> Prompt<I, R, E> {
    pub fn input(&self) -> &I {
        self.request.input()
    }

    pub fn resolve(self, value: R) {
        self.reply(Presentation::Resolved(value));
    }

    pub fn reject(self, error: E) {
        self.reply(Presentation::Rejected(error));
    }

    pub fn dismiss(self) {
        self.reply(Presentation::Dismissed);
    }

    fn reply(self, outcome: Presentation<R, E>) {
        if self.reply.send(outcome).is_err() {
            log::debug!(
                "presentation of query {} was already torn down",
                self.request.id()
            );
        }
    }
}

/// Forwards each request over a channel, for UIs living on another task or thread.
///
/// Dropping a [`Prompt`] without answering it counts as a dismissal.
pub struct ChannelPresenter<I, R, E> {
    prompts: kanal::Sender<Prompt<I, R, E>>,
}

impl<I, R, E> ChannelPresenter<I, R, E> {
    pub fn new() -> (Self, kanal::Receiver<Prompt<I, R, E>>) {
        let (prompts, rx) = kanal::unbounded();
        (Self { prompts }, rx)
    }
}

impl<I, R, E> Presenter<I, R, E> for ChannelPresenter<I, R, E>
where
    I: Send + Sync + 'static,
    R: Send + 'static,
    E: Send + 'static,
{
    async fn present(&mut self, request: PendingRequest<I, R, E>) -> Presentation<R, E> {
        let (reply, outcome) = kanal::bounded(1);
        let prompt = Prompt { request, reply };

        if let Err(e) = self.prompts.as_async().send(prompt).await {
            log::warn!("no one is listening for prompts: {}", e);
            return Presentation::Dismissed;
        }

        outcome
            .as_async()
            .recv()
            .await
            .unwrap_or(Presentation::Dismissed)
    }
}
