use std::{
    sync::Arc,
    time::Duration,
};

use anyhow::Result;
use async_trait::async_trait;

use crate::{
    connection::ConnectionConfig,
    core::{
        arguments::Arguments,
        options::{
            MatchStyle,
            PublishOptions,
        },
    },
    session::SessionConfig,
};

/// The ID of a live registration, scoped to its application session.
pub type RegistrationId = u64;

/// The ID of a live subscription, scoped to its application session.
pub type SubscriptionId = u64;

/// Handles invocations of a registered procedure.
#[async_trait]
pub trait InvocationHandler: Send + Sync {
    /// Handles one invocation, returning the values to yield back to the caller.
    async fn invoke(&self, arguments: Arguments) -> Result<Arguments>;
}

/// Receives progressive results of a call.
#[async_trait]
pub trait ProgressHandler: Send + Sync {
    async fn progress(&self, arguments: Arguments);
}

/// An event delivered to a subscription.
#[derive(Debug, Default, Clone)]
pub struct ReceivedEvent {
    /// The topic the event was published to, if it differs from the subscribed topic.
    pub topic: Option<String>,
    pub arguments: Arguments,
}

/// Receives events for a subscription.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn event(&self, event: ReceivedEvent);
}

/// A call to make on an application session.
#[derive(Default, Clone)]
pub struct CallRequest {
    pub arguments: Arguments,
    pub timeout: Option<Duration>,
    /// Receives progressive results, if the caller wants them.
    pub progress: Option<Arc<dyn ProgressHandler>>,
}

/// Options for registering a procedure.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RegisterOptions {
    pub match_style: Option<MatchStyle>,
    pub disclose_caller: bool,
}

/// Options for subscribing to a topic.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SubscribeOptions {
    pub match_style: Option<MatchStyle>,
}

/// An established session on a realm, used to perform protocol actions.
#[async_trait]
pub trait ApplicationSession: Send + Sync {
    /// The session ID assigned by the router, if known.
    fn session_id(&self) -> Option<u64>;

    /// Calls a procedure, returning its final result.
    async fn call(&self, procedure: &str, request: CallRequest) -> Result<Arguments>;

    /// Registers a procedure, routing invocations to the handler.
    async fn register(
        &self,
        procedure: &str,
        options: &RegisterOptions,
        handler: Arc<dyn InvocationHandler>,
    ) -> Result<RegistrationId>;

    /// Unregisters a procedure.
    async fn unregister(&self, registration: RegistrationId) -> Result<()>;

    /// Publishes an event to a topic.
    async fn publish(
        &self,
        topic: &str,
        arguments: Arguments,
        options: &PublishOptions,
    ) -> Result<()>;

    /// Subscribes to a topic, routing events to the sink.
    async fn subscribe(
        &self,
        topic: &str,
        options: &SubscribeOptions,
        sink: Arc<dyn EventSink>,
    ) -> Result<SubscriptionId>;

    /// Unsubscribes from a topic.
    async fn unsubscribe(&self, subscription: SubscriptionId) -> Result<()>;

    /// Leaves the realm and closes the underlying connection.
    async fn leave(&self) -> Result<()>;
}

/// Establishes application sessions.
///
/// Selected once at startup and shared by every connection.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Connects to a router and joins a realm.
    async fn establish(
        &self,
        connection: &ConnectionConfig,
        session: &SessionConfig,
    ) -> Result<Arc<dyn ApplicationSession>>;
}
