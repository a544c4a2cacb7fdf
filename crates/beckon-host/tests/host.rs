use beckon::{Broker, CancellationReason, ConflictPolicy, PendingRequest, QueryError};
use beckon_host::{ChannelPresenter, Presentation, PresentationHost, Presenter};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn cancelled_with<T, E>(result: Result<T, QueryError<E>>, reason: CancellationReason) -> bool {
    matches!(result, Err(QueryError::Cancelled(c)) if c.reason == reason)
}

#[tokio::test]
async fn prompt_answer_reaches_caller() {
    init_logger();
    let broker: Broker<String, usize> = Broker::default();
    let (presenter, prompts) = ChannelPresenter::new();
    let host = PresentationHost::spawn(&broker, presenter);

    let caller = {
        let broker = broker.clone();
        tokio::spawn(async move { broker.request("name?".to_string()).await })
    };

    let prompt = prompts.as_async().recv().await.unwrap();
    assert_eq!(prompt.input(), "name?");
    prompt.resolve(42);

    assert_eq!(caller.await.unwrap().unwrap(), 42);
    assert!(!broker.is_querying());
    host.terminate();
}

#[tokio::test]
async fn rejection_reaches_caller() {
    let broker: Broker<(), u8> = Broker::default();
    let (presenter, prompts) = ChannelPresenter::new();
    let _host = PresentationHost::spawn(&broker, presenter);

    let caller = {
        let broker = broker.clone();
        tokio::spawn(async move { broker.request_empty().await })
    };

    prompts
        .as_async()
        .recv()
        .await
        .unwrap()
        .reject(anyhow::anyhow!("invalid"));

    let err = caller.await.unwrap().unwrap_err();
    assert_eq!(err.into_rejected().unwrap().to_string(), "invalid");
}

#[tokio::test]
async fn dismissed_prompt_cancels_request() {
    let broker: Broker<(), u8> = Broker::default();
    let (presenter, prompts) = ChannelPresenter::new();
    let _host = PresentationHost::spawn(&broker, presenter);

    let caller = {
        let broker = broker.clone();
        tokio::spawn(async move { broker.request_empty().await })
    };

    // Dropping the prompt unanswered is a dismissal too.
    drop(prompts.as_async().recv().await.unwrap());

    assert!(cancelled_with(
        caller.await.unwrap(),
        CancellationReason::PresentationEnded
    ));
}

#[tokio::test]
async fn superseded_presentation_is_torn_down() {
    init_logger();
    let broker: Broker<&'static str, i32> = Broker::new(ConflictPolicy::CancelPreviousQuery);
    let (presenter, prompts) = ChannelPresenter::new();
    let _host = PresentationHost::spawn(&broker, presenter);

    let a = {
        let broker = broker.clone();
        tokio::spawn(async move { broker.request("a").await })
    };
    let prompt_a = prompts.as_async().recv().await.unwrap();

    let b = {
        let broker = broker.clone();
        tokio::spawn(async move { broker.request("b").await })
    };
    assert!(cancelled_with(a.await.unwrap(), CancellationReason::Superseded));

    let prompt_b = prompts.as_async().recv().await.unwrap();
    assert_eq!(*prompt_b.input(), "b");

    // Answers for the torn-down presentation go nowhere.
    prompt_a.resolve(1);
    prompt_b.request.resolver().reject(anyhow::anyhow!("unused"));
    assert!(b.await.unwrap().unwrap_err().into_rejected().is_some());
}

#[tokio::test]
async fn terminating_host_ends_presentation() {
    let broker: Broker<(), u8> = Broker::default();
    let (presenter, prompts) = ChannelPresenter::new();
    let host = PresentationHost::spawn(&broker, presenter);

    let caller = {
        let broker = broker.clone();
        tokio::spawn(async move { broker.request_empty().await })
    };
    let _prompt = prompts.as_async().recv().await.unwrap();

    host.terminate();
    assert!(cancelled_with(
        caller.await.unwrap(),
        CancellationReason::PresentationEnded
    ));
}

struct Echo;

impl Presenter<String, usize, anyhow::Error> for Echo {
    async fn present(
        &mut self,
        request: PendingRequest<String, usize, anyhow::Error>,
    ) -> Presentation<usize, anyhow::Error> {
        tokio::task::yield_now().await;
        match request.input().len() {
            0 => Presentation::Dismissed,
            n => Presentation::Resolved(n),
        }
    }
}

#[tokio::test]
async fn presenter_serves_consecutive_requests() {
    let broker: Broker<String, usize> = Broker::default();
    let _host = PresentationHost::spawn(&broker, Echo);

    assert_eq!(broker.request("four".to_string()).await.unwrap(), 4);
    assert_eq!(broker.request("hello".to_string()).await.unwrap(), 5);
    assert!(cancelled_with(
        broker.request(String::new()).await,
        CancellationReason::PresentationEnded
    ));
    assert!(!broker.is_querying());
}

#[tokio::test]
async fn host_picks_up_request_pending_before_spawn() {
    let broker: Broker<String, usize> = Broker::default();
    let caller = {
        let broker = broker.clone();
        tokio::spawn(async move { broker.request("xy".to_string()).await })
    };
    while !broker.is_querying() {
        tokio::task::yield_now().await;
    }

    let _host = PresentationHost::spawn(&broker, Echo);
    assert_eq!(caller.await.unwrap().unwrap(), 2);
}
