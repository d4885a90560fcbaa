use std::sync::Arc;

use anyhow::Result;
use log::{
    error,
    info,
};

use crate::{
    backend::Connector,
    connection::ConnectionConfig,
    core::{
        error::{
            NotReadyError,
            SessionFailedError,
            SharedError,
        },
        state::{
            ActionState,
            ActionTracker,
        },
    },
    names::registry::Handle,
    pubsub::{
        Publisher,
        PublisherConfig,
        PublisherManager,
        Subscription,
        SubscriptionConfig,
        SubscriptionManager,
    },
    rpc::{
        Call,
        CallConfig,
        CallManager,
        Registration,
        RegistrationConfig,
        RegistrationManager,
    },
    session::{
        Readiness,
        SessionConfig,
        SessionReadiness,
        run_deferred,
    },
};

/// A session on a realm.
///
/// The session starts establishing as soon as it is created. Everything created through its
/// managers waits for the session to be ready before reaching the router.
pub struct Session {
    handle: Handle,
    name: String,
    realm: String,
    uri: String,
    config: SessionConfig,
    readiness: SessionReadiness,
    calls: CallManager,
    registrations: Arc<RegistrationManager>,
    publishers: PublisherManager,
    subscriptions: Arc<SubscriptionManager>,
    leave_state: ActionTracker<()>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("handle", &self.handle)
            .field("name", &self.name)
            .field("realm", &self.realm)
            .field("uri", &self.uri)
            .field("readiness", &self.readiness.current())
            .finish_non_exhaustive()
    }
}

impl Session {
    pub(crate) fn new(
        handle: Handle,
        name: &str,
        connection: &ConnectionConfig,
        config: SessionConfig,
        connector: Arc<dyn Connector>,
    ) -> Self {
        let (resolver, readiness) = SessionReadiness::new();
        let session = Self {
            handle,
            name: name.to_owned(),
            realm: connection.realm.clone(),
            uri: connection.uri.clone(),
            config: config.clone(),
            readiness: readiness.clone(),
            calls: CallManager::new(readiness.clone()),
            registrations: Arc::new(RegistrationManager::new(readiness.clone())),
            publishers: PublisherManager::new(readiness.clone()),
            subscriptions: Arc::new(SubscriptionManager::new(readiness)),
            leave_state: ActionTracker::new(),
        };

        let description = session.description();
        let name = session.name.clone();
        let connection = connection.clone();
        tokio::spawn(async move {
            let result = connector
                .establish(&connection, &config)
                .await
                .map_err(|err| SharedError::from(err.context(SessionFailedError::new(name))));
            match &result {
                Ok(_) => info!("{description} established"),
                Err(err) => error!("{description} failed: {err}"),
            }
            resolver.resolve(result);
        });

        session
    }

    /// The handle of the session within its connection.
    pub fn handle(&self) -> Handle {
        self.handle
    }

    /// The name of the session within its connection.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The realm the session joins.
    pub fn realm(&self) -> &str {
        &self.realm
    }

    /// The router URI the session connects to.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// A human-readable description of the session, used in logs.
    pub fn description(&self) -> String {
        format!(
            "{} session to {}@{} with name {}",
            self.config.describe_auth_methods(),
            self.realm,
            self.uri,
            self.name
        )
    }

    /// The readiness signal of the session.
    pub fn readiness(&self) -> &SessionReadiness {
        &self.readiness
    }

    /// The current readiness of the session.
    pub fn current_readiness(&self) -> Readiness {
        self.readiness.current()
    }

    /// Waits for the session to be established.
    pub async fn wait_until_ready(&self) -> Result<()> {
        self.readiness.wait().await?;
        Ok(())
    }

    /// The session ID assigned by the router, if the session is established.
    pub fn session_id(&self) -> Option<u64> {
        self.readiness
            .session()
            .and_then(|session| session.session_id())
    }

    /// Calls made on this session.
    pub fn calls(&self) -> &CallManager {
        &self.calls
    }

    /// Procedures registered by this session.
    pub fn registrations(&self) -> &Arc<RegistrationManager> {
        &self.registrations
    }

    /// Publishers on this session.
    pub fn publishers(&self) -> &PublisherManager {
        &self.publishers
    }

    /// Topics subscribed to by this session.
    pub fn subscriptions(&self) -> &Arc<SubscriptionManager> {
        &self.subscriptions
    }

    /// Creates a call to a procedure.
    pub async fn call(&self, config: CallConfig, name: Option<String>) -> Result<Arc<Call>> {
        self.calls.create(config, name).await
    }

    /// Registers a procedure.
    pub async fn register(
        &self,
        config: RegistrationConfig,
        name: Option<String>,
    ) -> Result<Arc<Registration>> {
        self.registrations.create(config, name).await
    }

    /// Creates a publisher for a topic.
    pub async fn publisher(
        &self,
        config: PublisherConfig,
        name: Option<String>,
    ) -> Result<Arc<Publisher>> {
        self.publishers.create(config, name).await
    }

    /// Subscribes to a topic.
    pub async fn subscribe(
        &self,
        config: SubscriptionConfig,
        name: Option<String>,
    ) -> Result<Arc<Subscription>> {
        self.subscriptions.create(config, name).await
    }

    /// The state of leaving the realm.
    pub fn leave_state(&self) -> ActionState<()> {
        self.leave_state.state()
    }

    /// Leaves the realm.
    ///
    /// Fails if the session was never established or already left.
    pub fn leave(self: &Arc<Self>) -> Result<()> {
        if self.readiness.session().is_none() {
            return Err(
                NotReadyError::new(format!("session {} is not established", self.name)).into(),
            );
        }
        if !self.leave_state.start() {
            return Err(NotReadyError::new(format!("session {} already left", self.name)).into());
        }
        let session = self.clone();
        tokio::spawn(async move {
            let description = format!("Leaving of {}", session.description());
            run_deferred(
                &session.readiness,
                &session.leave_state,
                &description,
                |session| async move { session.leave().await },
            )
            .await;
        });
        Ok(())
    }

    /// Waits for the session to leave the realm.
    pub async fn wait_until_left(&self) -> ActionState<()> {
        self.leave_state.wait().await
    }
}
