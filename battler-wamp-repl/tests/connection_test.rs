use std::sync::Arc;

use battler_wamp_repl::{
    connection::{
        ConnectionConfig,
        ConnectionManager,
    },
    core::{
        error::{
            InvalidConfigError,
            NotReadyError,
            SessionFailedError,
            UnknownNameError,
        },
        options::AuthMethod,
        state::ActionState,
    },
    session::{
        Readiness,
        SessionConfig,
    },
};
use test_utils::router::{
    LocalRouter,
    RouterAction,
};

const ROUTER_URI: &str = "ws://localhost:8080/ws";
const REALM: &str = "realm1";

fn manager(router: &LocalRouter) -> ConnectionManager {
    ConnectionManager::new(router.connector())
}

#[tokio::test]
async fn rejects_invalid_connection_config() {
    test_utils::setup::setup_test_environment();

    let router = LocalRouter::new();
    let manager = manager(&router);

    assert_matches::assert_matches!(
        manager
            .connect(ConnectionConfig::new("http://localhost:8080", REALM), None)
            .await,
        Err(err) => {
            assert_matches::assert_matches!(err.downcast_ref::<InvalidConfigError>(), Some(_));
        }
    );
    assert_matches::assert_matches!(
        manager
            .connect(ConnectionConfig::new(ROUTER_URI, "not a realm"), None)
            .await,
        Err(err) => {
            assert_eq!(err.to_string(), "invalid realm: not a realm");
        }
    );
    assert!(manager.connections().is_empty().await);
    assert_eq!(router.actions().await, Vec::new());
}

#[tokio::test]
async fn regenerates_colliding_names() {
    test_utils::setup::setup_test_environment();

    let router = LocalRouter::new();
    let manager = manager(&router);

    let first = manager
        .connect(
            ConnectionConfig::new(ROUTER_URI, REALM),
            Some("local".to_owned()),
        )
        .await
        .unwrap();
    let second = manager
        .connect(
            ConnectionConfig::new(ROUTER_URI, REALM),
            Some("local".to_owned()),
        )
        .await
        .unwrap();
    assert_eq!(first.name(), "local");
    assert_ne!(second.name(), "local");
    assert_ne!(first.handle(), second.handle());

    assert!(Arc::ptr_eq(
        &manager.connections().get("local").await.unwrap(),
        &first
    ));
    assert!(Arc::ptr_eq(
        &manager.connections().get(second.name()).await.unwrap(),
        &second
    ));
    assert!(Arc::ptr_eq(
        &manager.connections().get(second.handle()).await.unwrap(),
        &second
    ));
    assert!(Arc::ptr_eq(
        &manager
            .connections()
            .get(second.handle().to_string().as_str())
            .await
            .unwrap(),
        &second
    ));
    pretty_assertions::assert_eq!(
        manager.connections().names().await,
        vec!["local".to_owned(), second.name().to_owned()]
    );
}

#[tokio::test]
async fn generates_names_when_none_are_given() {
    test_utils::setup::setup_test_environment();

    let router = LocalRouter::new();
    let manager = manager(&router);
    let connection = manager
        .connect(ConnectionConfig::new(ROUTER_URI, REALM), None)
        .await
        .unwrap();
    let session = connection
        .session(SessionConfig::anonymous(), None)
        .await
        .unwrap();

    let pattern = regex::Regex::new(r"^[a-zA-Z][a-zA-Z0-9]*$").unwrap();
    assert!(pattern.is_match(connection.name()), "{}", connection.name());
    assert!(pattern.is_match(session.name()), "{}", session.name());
}

#[tokio::test]
async fn fails_lookup_of_unknown_name() {
    test_utils::setup::setup_test_environment();

    let router = LocalRouter::new();
    let manager = manager(&router);
    let connection = manager
        .connect(ConnectionConfig::new(ROUTER_URI, REALM), None)
        .await
        .unwrap();

    assert_matches::assert_matches!(connection.sessions().get("missing").await, Err(err) => {
        assert_matches::assert_matches!(err.downcast_ref::<UnknownNameError>(), Some(err) => {
            assert_eq!(err.kind(), "session");
            assert_eq!(err.key(), "missing");
        });
    });
    assert_matches::assert_matches!(
        manager.connections().get("#100").await,
        Err(err) => {
            assert_eq!(err.to_string(), "no connection named #100");
        }
    );
}

#[tokio::test]
async fn rejects_invalid_session_config() {
    test_utils::setup::setup_test_environment();

    let router = LocalRouter::new();
    let manager = manager(&router);
    let connection = manager
        .connect(ConnectionConfig::new(ROUTER_URI, REALM), None)
        .await
        .unwrap();

    assert_matches::assert_matches!(
        connection
            .session(
                SessionConfig {
                    auth_methods: Vec::from_iter([AuthMethod::Ticket]),
                    ..Default::default()
                },
                None
            )
            .await,
        Err(err) => {
            assert_matches::assert_matches!(err.downcast_ref::<InvalidConfigError>(), Some(_));
        }
    );
    assert!(connection.sessions().is_empty().await);
}

#[tokio::test]
async fn establishes_session_in_background() {
    test_utils::setup::setup_test_environment();

    let router = LocalRouter::new();
    router.hold_sessions();
    let manager = manager(&router);
    let connection = manager
        .connect(ConnectionConfig::new(ROUTER_URI, REALM), None)
        .await
        .unwrap();
    let session = connection
        .session(SessionConfig::anonymous(), Some("alice".to_owned()))
        .await
        .unwrap();

    assert_matches::assert_matches!(session.current_readiness(), Readiness::Establishing);
    assert_matches::assert_matches!(session.session_id(), None);

    router.release_sessions();
    assert_matches::assert_matches!(session.wait_until_ready().await, Ok(()));
    assert_matches::assert_matches!(session.current_readiness(), Readiness::Ready(_));
    assert_matches::assert_matches!(session.session_id(), Some(_));
    pretty_assertions::assert_eq!(
        router.actions().await,
        vec![RouterAction::Join(REALM.to_owned())]
    );
    assert_eq!(
        session.description(),
        format!("anonymous session to {REALM}@{ROUTER_URI} with name alice")
    );
}

#[tokio::test]
async fn reports_session_failure() {
    test_utils::setup::setup_test_environment();

    let router = LocalRouter::new();
    router.refuse_sessions("connection refused").await;
    let manager = manager(&router);
    let connection = manager
        .connect(ConnectionConfig::new(ROUTER_URI, REALM), None)
        .await
        .unwrap();
    let session = connection
        .session(SessionConfig::anonymous(), Some("alice".to_owned()))
        .await
        .unwrap();

    assert_matches::assert_matches!(session.wait_until_ready().await, Err(err) => {
        assert!(format!("{err:#}").contains("connection refused"), "{err:#}");
    });
    assert_matches::assert_matches!(session.current_readiness(), Readiness::Failed(err) => {
        assert_matches::assert_matches!(err.downcast_ref::<SessionFailedError>(), Some(_));
    });
    assert_matches::assert_matches!(session.leave(), Err(err) => {
        assert_matches::assert_matches!(err.downcast_ref::<NotReadyError>(), Some(_));
    });
}

#[tokio::test]
async fn leaves_realm_once() {
    test_utils::setup::setup_test_environment();

    let router = LocalRouter::new();
    let manager = manager(&router);
    let connection = manager
        .connect(ConnectionConfig::new(ROUTER_URI, REALM), None)
        .await
        .unwrap();
    let session = connection
        .session(SessionConfig::anonymous(), None)
        .await
        .unwrap();
    session.wait_until_ready().await.unwrap();

    assert_matches::assert_matches!(session.leave(), Ok(()));
    assert_matches::assert_matches!(session.wait_until_left().await, ActionState::Succeeded(()));
    assert_matches::assert_matches!(session.leave(), Err(_));
    assert_eq!(router.protocol_actions().await, vec![RouterAction::Leave]);
}

#[tokio::test]
async fn entities_debug_print_their_identity() {
    test_utils::setup::setup_test_environment();

    let router = LocalRouter::new();
    router.hold_sessions();
    let manager = manager(&router);
    let connection = manager
        .connect(
            ConnectionConfig::new(ROUTER_URI, REALM),
            Some("local".to_owned()),
        )
        .await
        .unwrap();
    let session = connection
        .session(SessionConfig::anonymous(), Some("alice".to_owned()))
        .await
        .unwrap();

    assert_eq!(
        format!("{connection:?}"),
        format!(r#"Connection {{ handle: Handle(1), name: "local", uri: "{ROUTER_URI}", realm: "{REALM}", .. }}"#)
    );
    assert_eq!(
        format!("{session:?}"),
        format!(r#"Session {{ handle: Handle(1), name: "alice", realm: "{REALM}", uri: "{ROUTER_URI}", readiness: Establishing, .. }}"#)
    );
    assert_matches::assert_matches!(manager.connections().get("local").await, Ok(found) => {
        assert!(Arc::ptr_eq(&found, &connection));
    });
    router.release_sessions();
}
