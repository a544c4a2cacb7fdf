use futures::channel::oneshot;

use beckon_core::QueryError;

pub(crate) type Outcome<R, E> = Result<R, QueryError<E>>;

/// One suspend point. The broker owns the sending half, the caller awaits the receiver.
pub(crate) struct ContinuationSlot<R, E> {
    tx: Option<oneshot::Sender<Outcome<R, E>>>,
}

impl<R, E> ContinuationSlot<R, E> {
    pub(crate) fn new() -> (Self, oneshot::Receiver<Outcome<R, E>>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// Resumes the suspended caller. A second resume is a broken invariant and panics.
    ///
    /// If the caller already went away the outcome is dropped; its drop guard has
    /// nothing left to settle.
    pub(crate) fn resume(&mut self, outcome: Outcome<R, E>) {
        let tx = self
            .tx
            .take()
            .expect("continuation slot resumed more than once");
        let _ = tx.send(outcome);
    }

    #[cfg(test)]
    pub(crate) fn is_resumed(&self) -> bool {
        self.tx.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beckon_core::CancellationReason;
    use futures::FutureExt;

    #[test]
    fn resume_delivers_outcome_once() {
        let (mut slot, rx) = ContinuationSlot::<u8, ()>::new();
        assert!(!slot.is_resumed());
        slot.resume(Ok(7));
        assert!(slot.is_resumed());
        assert_eq!(rx.now_or_never().unwrap().unwrap().unwrap(), 7);
    }

    #[test]
    #[should_panic(expected = "continuation slot resumed more than once")]
    fn double_resume_fails_fast() {
        let (mut slot, _rx) = ContinuationSlot::<u8, ()>::new();
        slot.resume(Ok(1));
        slot.resume(Err(QueryError::cancelled(CancellationReason::Explicit)));
    }

    #[test]
    fn resume_after_caller_left_is_harmless() {
        let (mut slot, rx) = ContinuationSlot::<u8, ()>::new();
        drop(rx);
        slot.resume(Ok(1));
        assert!(slot.is_resumed());
    }

    #[test]
    fn dropped_slot_closes_the_receiver() {
        let (slot, rx) = ContinuationSlot::<u8, ()>::new();
        drop(slot);
        assert!(rx.now_or_never().unwrap().is_err());
    }
}
