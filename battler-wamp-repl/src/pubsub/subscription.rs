use std::{
    ops::Deref,
    sync::{
        Arc,
        Weak,
    },
    time::SystemTime,
};

use anyhow::Result;
use async_trait::async_trait;
use battler_wamp_uri::{
    Uri,
    WildcardUri,
};
use futures_util::lock::Mutex;
use log::info;

use crate::{
    backend::{
        EventSink,
        ReceivedEvent,
        SubscribeOptions,
        SubscriptionId,
    },
    core::{
        arguments::Arguments,
        error::{
            InvalidConfigError,
            NotReadyError,
            SharedError,
        },
        options::MatchStyle,
        state::{
            ActionState,
            ActionStatus,
            ActionTracker,
        },
    },
    names::{
        directory::Directory,
        log::{
            LogKey,
            NamedLog,
        },
        registry::Handle,
    },
    session::{
        SessionReadiness,
        run_deferred,
    },
};

/// A synchronous event handler.
pub type SyncEventHandler = dyn Fn(&ReceivedEvent) + Send + Sync;

/// The handler behind a subscription.
#[derive(Clone, Default)]
pub enum EventHandler {
    /// Events are only recorded.
    #[default]
    None,
    Sync(Arc<SyncEventHandler>),
    Async(Arc<dyn EventSink>),
}

impl EventHandler {
    /// Creates a synchronous handler.
    pub fn sync<F>(f: F) -> Self
    where
        F: Fn(&ReceivedEvent) + Send + Sync + 'static,
    {
        Self::Sync(Arc::new(f))
    }

    /// Creates an asynchronous handler.
    pub fn from_sink<S>(sink: S) -> Self
    where
        S: EventSink + 'static,
    {
        Self::Async(Arc::new(sink))
    }

    async fn handle(&self, event: ReceivedEvent) {
        match self {
            Self::None => (),
            Self::Sync(handler) => handler(&event),
            Self::Async(sink) => sink.event(event).await,
        }
    }
}

impl std::fmt::Debug for EventHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "EventHandler(none)"),
            Self::Sync(_) => write!(f, "EventHandler(sync)"),
            Self::Async(_) => write!(f, "EventHandler(async)"),
        }
    }
}

/// Configuration for a subscription.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionConfig {
    pub topic: String,
    pub match_style: Option<MatchStyle>,
    pub handler: EventHandler,
}

impl SubscriptionConfig {
    /// Creates a new configuration for subscribing to the topic.
    pub fn new<S>(topic: S, handler: EventHandler) -> Self
    where
        S: Into<String>,
    {
        Self {
            topic: topic.into(),
            handler,
            ..Default::default()
        }
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), InvalidConfigError> {
        let valid = match self.match_style {
            Some(MatchStyle::Wildcard) => WildcardUri::try_from(self.topic.as_str()).is_ok(),
            _ => Uri::try_from(self.topic.as_str()).is_ok(),
        };
        if !valid {
            return Err(InvalidConfigError::new(format!(
                "invalid topic: {}",
                self.topic
            )));
        }
        Ok(())
    }
}

/// An event received by a subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub timestamp: SystemTime,
    /// The concrete topic, for pattern-based subscriptions.
    pub topic: Option<String>,
    pub arguments: Arguments,
}

/// Creates and owns the subscriptions of a session.
pub struct SubscriptionManager {
    readiness: SessionReadiness,
    subscriptions: Directory<Subscription>,
}

impl SubscriptionManager {
    pub(crate) fn new(readiness: SessionReadiness) -> Self {
        Self {
            readiness,
            subscriptions: Directory::new("subscription"),
        }
    }

    /// Subscribes to a topic once the session is ready.
    pub async fn create(
        self: &Arc<Self>,
        config: SubscriptionConfig,
        name: Option<String>,
    ) -> Result<Arc<Subscription>> {
        config.validate()?;
        let subscription = self
            .subscriptions
            .insert_with(name, |handle, name| Subscription {
                handle,
                name: name.to_owned(),
                config,
                readiness: self.readiness.clone(),
                manager: Arc::downgrade(self),
                events: Mutex::new(NamedLog::new("event")),
                state: ActionTracker::new(),
                unsubscribe_state: ActionTracker::new(),
            })
            .await?;
        info!(
            "Generating subscription to {} with name {}",
            subscription.topic(),
            subscription.name()
        );
        subscription.start();
        Ok(subscription)
    }
}

impl Deref for SubscriptionManager {
    type Target = Directory<Subscription>;

    fn deref(&self) -> &Self::Target {
        &self.subscriptions
    }
}

/// A subscription to a topic.
///
/// Every event from the router is recorded as an [`Event`] before it reaches the handler.
pub struct Subscription {
    handle: Handle,
    name: String,
    config: SubscriptionConfig,
    readiness: SessionReadiness,
    manager: Weak<SubscriptionManager>,
    events: Mutex<NamedLog<Event>>,
    state: ActionTracker<SubscriptionId>,
    unsubscribe_state: ActionTracker<()>,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("handle", &self.handle)
            .field("name", &self.name)
            .field("topic", &self.config.topic)
            .field("status", &self.state.status())
            .finish_non_exhaustive()
    }
}

impl Subscription {
    fn start(self: &Arc<Self>) {
        let subscription = self.clone();
        tokio::spawn(async move {
            let topic = subscription.config.topic.clone();
            let options = SubscribeOptions {
                match_style: subscription.config.match_style,
            };
            let sink = subscription.clone() as Arc<dyn EventSink>;
            run_deferred(
                &subscription.readiness,
                &subscription.state,
                &subscription.description("Subscription"),
                |session| async move { session.subscribe(&topic, &options, sink).await },
            )
            .await;
        });
    }

    pub fn handle(&self) -> Handle {
        self.handle
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &SubscriptionConfig {
        &self.config
    }

    /// The subscribed topic.
    pub fn topic(&self) -> &str {
        &self.config.topic
    }

    fn description(&self, action: &str) -> String {
        format!("{action} to {} with name {}", self.config.topic, self.name)
    }

    /// The state of subscribing to the topic.
    pub fn state(&self) -> ActionState<SubscriptionId> {
        self.state.state()
    }

    pub fn status(&self) -> ActionStatus {
        self.state.status()
    }

    /// The error, if subscribing failed or never started.
    pub fn error(&self) -> Option<SharedError> {
        self.state.state().error().cloned()
    }

    /// Waits for subscribing to finish.
    pub async fn wait(&self) -> ActionState<SubscriptionId> {
        self.state.wait().await
    }

    /// The state of unsubscribing from the topic.
    pub fn unsubscribe_state(&self) -> ActionState<()> {
        self.unsubscribe_state.state()
    }

    /// Waits for unsubscribing to finish.
    pub async fn wait_unsubscribed(&self) -> ActionState<()> {
        self.unsubscribe_state.wait().await
    }

    /// All events so far, in arrival order.
    pub async fn events(&self) -> Vec<Event> {
        self.events.lock().await.entries().to_vec()
    }

    /// Looks up an event by name or index.
    pub async fn recorded_event<K>(&self, key: K) -> Result<Event>
    where
        K: Into<LogKey>,
    {
        let key = key.into();
        Ok(self.events.lock().await.get(key)?.clone())
    }

    /// Names of all events.
    pub async fn event_names(&self) -> Vec<String> {
        self.events
            .lock()
            .await
            .names()
            .map(|name| name.to_owned())
            .collect()
    }

    /// Unsubscribes from the topic.
    ///
    /// Fails immediately if the subscription is not established yet or was already
    /// unsubscribed.
    pub fn unsubscribe(self: &Arc<Self>) -> Result<()> {
        let id = match self.state.state() {
            ActionState::Succeeded(id) => id,
            state => {
                return Err(NotReadyError::new(format!(
                    "subscription {} is {}, not subscribed",
                    self.name,
                    state.status()
                ))
                .into());
            }
        };
        if !self.unsubscribe_state.start() {
            return Err(NotReadyError::new(format!(
                "subscription {} was already unsubscribed",
                self.name
            ))
            .into());
        }
        let subscription = self.clone();
        tokio::spawn(async move {
            run_deferred(
                &subscription.readiness,
                &subscription.unsubscribe_state,
                &subscription.description("Unsubscription"),
                |session| async move { session.unsubscribe(id).await },
            )
            .await;
        });
        Ok(())
    }

    /// Subscribes again with this subscription's configuration, modified by `modify`.
    pub async fn resubscribe<F>(&self, modify: F, name: Option<String>) -> Result<Arc<Subscription>>
    where
        F: FnOnce(&mut SubscriptionConfig),
    {
        let manager = self.manager.upgrade().ok_or_else(|| {
            NotReadyError::new(format!(
                "session for subscription {} no longer exists",
                self.name
            ))
        })?;
        let mut config = self.config.clone();
        modify(&mut config);
        manager.create(config, name).await
    }
}

#[async_trait]
impl EventSink for Subscription {
    async fn event(&self, event: ReceivedEvent) {
        let timestamp = SystemTime::now();
        let (index, name) = self.events.lock().await.push(Event {
            timestamp,
            topic: event.topic.clone(),
            arguments: event.arguments.clone(),
        });
        info!(
            "{} with name {} received event at {timestamp:?} with index {index} and event name {name}",
            self.config.topic, self.name
        );
        self.config.handler.handle(event).await;
    }
}
