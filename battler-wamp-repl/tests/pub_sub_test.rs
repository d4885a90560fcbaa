use std::sync::{
    Arc,
    Mutex,
};

use anyhow::Result;
use battler_wamp_repl::{
    connection::{
        ConnectionConfig,
        ConnectionManager,
    },
    core::{
        arguments::{
            ArgumentTemplate,
            Arguments,
            Slot,
        },
        error::NotReadyError,
        options::{
            MatchStyle,
            PublishOptions,
        },
        state::{
            ActionState,
            ActionStatus,
        },
    },
    pubsub::{
        EventHandler,
        PublisherConfig,
        SubscriptionConfig,
    },
    session::{
        Session,
        SessionConfig,
    },
};
use battler_wamp_values::Value;
use test_utils::router::{
    LocalRouter,
    RouterAction,
};

const ROUTER_URI: &str = "ws://localhost:8080/ws";
const REALM: &str = "realm1";
const TOPIC: &str = "com.example.topic";

async fn start_session(manager: &ConnectionManager) -> Result<Arc<Session>> {
    let connection = manager
        .connect(ConnectionConfig::new(ROUTER_URI, REALM), None)
        .await?;
    connection.session(SessionConfig::anonymous(), None).await
}

fn message(i: u64) -> Arguments {
    Arguments::positional([Value::Integer(i)])
}

#[tokio::test]
async fn records_events_in_order() {
    test_utils::setup::setup_test_environment();

    let router = LocalRouter::new();
    let manager = ConnectionManager::new(router.connector());
    let subscriber = start_session(&manager).await.unwrap();
    let publisher_session = start_session(&manager).await.unwrap();

    let subscription = subscriber
        .subscribe(SubscriptionConfig::new(TOPIC, EventHandler::None), None)
        .await
        .unwrap();
    assert_matches::assert_matches!(subscription.wait().await, ActionState::Succeeded(_));

    let publisher = publisher_session
        .publisher(PublisherConfig::new(TOPIC), None)
        .await
        .unwrap();
    for i in 1..=3 {
        let publication = publisher.publish(message(i), None).await.unwrap();
        assert_matches::assert_matches!(publication.wait().await, ActionState::Succeeded(()));
    }

    let events = subscription.events().await;
    pretty_assertions::assert_eq!(
        events
            .iter()
            .map(|event| event.arguments.clone())
            .collect::<Vec<_>>(),
        vec![message(1), message(2), message(3)]
    );
    assert!(
        events
            .windows(2)
            .all(|pair| pair[0].timestamp <= pair[1].timestamp)
    );
    assert!(events.iter().all(|event| event.topic.is_none()));

    let names = subscription.event_names().await;
    assert_eq!(names.len(), 3);
    for (index, name) in names.iter().enumerate() {
        assert_eq!(
            subscription.recorded_event(name.as_str()).await.unwrap(),
            events[index]
        );
        assert_eq!(
            subscription.recorded_event(index).await.unwrap(),
            events[index]
        );
    }
    assert_matches::assert_matches!(subscription.recorded_event(3usize).await, Err(_));
    assert_eq!(publisher.publications().len().await, 3);
}

#[tokio::test]
async fn excludes_publisher_by_default() {
    test_utils::setup::setup_test_environment();

    let router = LocalRouter::new();
    let manager = ConnectionManager::new(router.connector());
    let session = start_session(&manager).await.unwrap();

    let subscription = session
        .subscribe(SubscriptionConfig::new(TOPIC, EventHandler::None), None)
        .await
        .unwrap();
    subscription.wait().await;

    let excluded = session
        .publisher(PublisherConfig::new(TOPIC), None)
        .await
        .unwrap();
    excluded.publish(message(1), None).await.unwrap().wait().await;
    assert!(subscription.events().await.is_empty());

    let included = session
        .publisher(
            PublisherConfig {
                options: PublishOptions {
                    exclude_me: Some(false),
                    ..Default::default()
                },
                ..PublisherConfig::new(TOPIC)
            },
            None,
        )
        .await
        .unwrap();
    included.publish(message(2), None).await.unwrap().wait().await;
    pretty_assertions::assert_eq!(
        subscription
            .events()
            .await
            .into_iter()
            .map(|event| event.arguments)
            .collect::<Vec<_>>(),
        vec![message(2)]
    );
}

#[tokio::test]
async fn delivers_pattern_topic_and_calls_handler() {
    test_utils::setup::setup_test_environment();

    let router = LocalRouter::new();
    let manager = ConnectionManager::new(router.connector());
    let subscriber = start_session(&manager).await.unwrap();
    let publisher_session = start_session(&manager).await.unwrap();

    let received = Arc::new(Mutex::new(Vec::new()));
    let subscription = subscriber
        .subscribe(
            SubscriptionConfig {
                match_style: Some(MatchStyle::Prefix),
                ..SubscriptionConfig::new(
                    "com.example",
                    EventHandler::sync({
                        let received = received.clone();
                        move |event| received.lock().unwrap().push(event.arguments.clone())
                    }),
                )
            },
            None,
        )
        .await
        .unwrap();
    subscription.wait().await;

    let publisher = publisher_session
        .publisher(PublisherConfig::new(TOPIC), None)
        .await
        .unwrap();
    publisher.publish(message(1), None).await.unwrap().wait().await;

    let events = subscription.events().await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].topic.as_deref(), Some(TOPIC));
    pretty_assertions::assert_eq!(*received.lock().unwrap(), vec![message(1)]);
}

#[tokio::test]
async fn republishes_with_kept_arguments() {
    test_utils::setup::setup_test_environment();

    let router = LocalRouter::new();
    let manager = ConnectionManager::new(router.connector());
    let subscriber = start_session(&manager).await.unwrap();
    let publisher_session = start_session(&manager).await.unwrap();

    let subscription = subscriber
        .subscribe(SubscriptionConfig::new(TOPIC, EventHandler::None), None)
        .await
        .unwrap();
    subscription.wait().await;

    let publisher = publisher_session
        .publisher(PublisherConfig::new(TOPIC), None)
        .await
        .unwrap();
    let original = publisher
        .publish(
            Arguments::positional([Value::Integer(1), Value::Integer(2)]),
            Some("original".to_owned()),
        )
        .await
        .unwrap();
    original.wait().await;

    let copy = original
        .republish(
            &ArgumentTemplate::positional([Slot::Value(Value::Integer(5)), Slot::Keep]),
            None,
        )
        .await
        .unwrap();
    assert_matches::assert_matches!(copy.wait().await, ActionState::Succeeded(()));
    pretty_assertions::assert_eq!(
        copy.arguments(),
        &Arguments::positional([Value::Integer(5), Value::Integer(2)])
    );
    assert_eq!(subscription.events().await.len(), 2);
    assert!(publisher.publications().contains("original").await);
}

#[tokio::test]
async fn stops_recording_after_unsubscribe() {
    test_utils::setup::setup_test_environment();

    let router = LocalRouter::new();
    router.hold_sessions();
    let manager = ConnectionManager::new(router.connector());
    let subscriber = start_session(&manager).await.unwrap();
    let publisher_session = start_session(&manager).await.unwrap();

    let subscription = subscriber
        .subscribe(SubscriptionConfig::new(TOPIC, EventHandler::None), None)
        .await
        .unwrap();
    assert_matches::assert_matches!(subscription.unsubscribe(), Err(err) => {
        assert_matches::assert_matches!(err.downcast_ref::<NotReadyError>(), Some(_));
    });

    router.release_sessions();
    assert_matches::assert_matches!(subscription.wait().await, ActionState::Succeeded(id) => {
        assert_matches::assert_matches!(subscription.unsubscribe(), Ok(()));
        assert_matches::assert_matches!(subscription.wait_unsubscribed().await, ActionState::Succeeded(()));
        assert!(router.actions().await.contains(&RouterAction::Unsubscribe(id)));
    });
    assert_matches::assert_matches!(subscription.unsubscribe(), Err(_));

    let publisher = publisher_session
        .publisher(PublisherConfig::new(TOPIC), None)
        .await
        .unwrap();
    publisher.publish(message(1), None).await.unwrap().wait().await;
    assert!(subscription.events().await.is_empty());
}

#[tokio::test]
async fn resubscribes_with_overridden_topic() {
    test_utils::setup::setup_test_environment();

    let router = LocalRouter::new();
    let manager = ConnectionManager::new(router.connector());
    let subscriber = start_session(&manager).await.unwrap();
    let publisher_session = start_session(&manager).await.unwrap();

    let subscription = subscriber
        .subscribe(SubscriptionConfig::new(TOPIC, EventHandler::None), None)
        .await
        .unwrap();
    subscription.wait().await;
    let copy = subscription
        .resubscribe(
            |config| config.topic = "com.example.other".to_owned(),
            None,
        )
        .await
        .unwrap();
    assert_matches::assert_matches!(copy.wait().await, ActionState::Succeeded(_));

    let publisher = publisher_session
        .publisher(PublisherConfig::new("com.example.other"), None)
        .await
        .unwrap();
    publisher.publish(message(1), None).await.unwrap().wait().await;
    assert_eq!(copy.events().await.len(), 1);
    assert!(subscription.events().await.is_empty());
    assert_eq!(subscriber.subscriptions().len().await, 2);
}

#[tokio::test]
async fn aborts_pub_sub_actions_when_session_fails() {
    test_utils::setup::setup_test_environment();

    let router = LocalRouter::new();
    router.refuse_sessions("connection refused").await;
    let manager = ConnectionManager::new(router.connector());
    let session = start_session(&manager).await.unwrap();

    let subscription = session
        .subscribe(SubscriptionConfig::new(TOPIC, EventHandler::None), None)
        .await
        .unwrap();
    let publisher = session
        .publisher(PublisherConfig::new(TOPIC), None)
        .await
        .unwrap();
    let publication = publisher.publish(message(1), None).await.unwrap();

    assert_matches::assert_matches!(subscription.wait().await, ActionState::Aborted(_));
    assert_matches::assert_matches!(publication.wait().await, ActionState::Aborted(_));
    assert_eq!(publication.status(), ActionStatus::Aborted);
    assert!(
        subscription
            .error()
            .unwrap()
            .same_as(&publication.error().unwrap())
    );
    assert_eq!(router.protocol_actions().await, Vec::new());
}
