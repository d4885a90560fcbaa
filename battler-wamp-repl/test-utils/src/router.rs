use std::sync::Arc;

use ahash::HashMap;
use anyhow::{
    Error,
    Result,
};
use async_trait::async_trait;
use battler_wamp_repl::{
    backend::{
        ApplicationSession,
        CallRequest,
        Connector,
        EventSink,
        InvocationHandler,
        ReceivedEvent,
        RegisterOptions,
        RegistrationId,
        SubscribeOptions,
        SubscriptionId,
    },
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
use futures_util::lock::Mutex;
use tokio::sync::watch;

/// A protocol action that reached a [`LocalRouter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouterAction {
    Join(String),
    Call(String),
    Register(String),
    Unregister(u64),
    Publish(String),
    Subscribe(String),
    Unsubscribe(u64),
    Leave,
}

#[derive(Clone)]
enum LocalProcedure {
    Handler(Arc<dyn InvocationHandler>),
    Progressive {
        progress: Vec<Arguments>,
        result: Arguments,
    },
}

struct Registered {
    session: u64,
    procedure: String,
    match_style: Option<MatchStyle>,
    procedure_impl: LocalProcedure,
}

struct Subscribed {
    session: u64,
    topic: String,
    match_style: Option<MatchStyle>,
    sink: Arc<dyn EventSink>,
}

fn uri_matches(pattern: &str, match_style: Option<MatchStyle>, uri: &str) -> bool {
    match match_style {
        None => pattern == uri,
        Some(MatchStyle::Prefix) => uri.starts_with(pattern),
        Some(MatchStyle::Wildcard) => {
            let pattern = pattern.split('.').collect::<Vec<_>>();
            let uri = uri.split('.').collect::<Vec<_>>();
            pattern.len() == uri.len()
                && pattern
                    .iter()
                    .zip(uri.iter())
                    .all(|(pattern, part)| pattern.is_empty() || pattern == part)
        }
    }
}

struct RouterState {
    next_id: u64,
    refusal: Option<String>,
    actions: Vec<RouterAction>,
    registrations: HashMap<u64, Registered>,
    subscriptions: HashMap<u64, Subscribed>,
    active_sessions: Vec<u64>,
}

impl RouterState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn check_session(&self, session: u64) -> Result<()> {
        if !self.active_sessions.contains(&session) {
            return Err(Error::msg("wamp.error.session_closed"));
        }
        Ok(())
    }

    fn find_procedure(&self, procedure: &str) -> Option<LocalProcedure> {
        self.registrations
            .values()
            .filter(|registered| {
                uri_matches(&registered.procedure, registered.match_style, procedure)
            })
            .min_by_key(|registered| match registered.match_style {
                None => 0,
                Some(MatchStyle::Prefix) => 1,
                Some(MatchStyle::Wildcard) => 2,
            })
            .map(|registered| registered.procedure_impl.clone())
    }
}

/// An in-process router for testing.
///
/// Routes calls to registered procedures, fans out publications to subscribers, and records every
/// protocol action it receives. Session establishment can be held back or refused.
#[derive(Clone)]
pub struct LocalRouter {
    state: Arc<Mutex<RouterState>>,
    gate_tx: Arc<watch::Sender<bool>>,
}

impl LocalRouter {
    /// Creates a new router that accepts sessions immediately.
    pub fn new() -> Self {
        let (gate_tx, _) = watch::channel(true);
        Self {
            state: Arc::new(Mutex::new(RouterState {
                next_id: 0,
                refusal: None,
                actions: Vec::new(),
                registrations: HashMap::default(),
                subscriptions: HashMap::default(),
                active_sessions: Vec::new(),
            })),
            gate_tx: Arc::new(gate_tx),
        }
    }

    /// A connector that establishes sessions on this router.
    pub fn connector(&self) -> Box<dyn Connector> {
        Box::new(LocalConnector {
            router: self.clone(),
        })
    }

    /// Refuses all future sessions with the given error message.
    pub async fn refuse_sessions<S>(&self, message: S)
    where
        S: Into<String>,
    {
        self.state.lock().await.refusal = Some(message.into());
    }

    /// Holds all session establishment until [`Self::release_sessions`] is called.
    pub fn hold_sessions(&self) {
        self.gate_tx.send_replace(false);
    }

    /// Releases held session establishment.
    pub fn release_sessions(&self) {
        self.gate_tx.send_replace(true);
    }

    /// Registers a procedure owned by the router itself.
    pub async fn add_procedure<F>(&self, procedure: &str, f: F)
    where
        F: Fn(Arguments) -> Result<Arguments> + Send + Sync + 'static,
    {
        self.add_local_procedure(
            procedure,
            LocalProcedure::Handler(Arc::new(FunctionHandler(Box::new(f)))),
        )
        .await;
    }

    /// Registers a procedure owned by the router itself that sends progressive results before its
    /// final result.
    pub async fn add_progressive_procedure(
        &self,
        procedure: &str,
        progress: Vec<Arguments>,
        result: Arguments,
    ) {
        self.add_local_procedure(procedure, LocalProcedure::Progressive { progress, result })
            .await;
    }

    async fn add_local_procedure(&self, procedure: &str, procedure_impl: LocalProcedure) {
        let mut state = self.state.lock().await;
        let id = state.next_id();
        state.registrations.insert(
            id,
            Registered {
                session: 0,
                procedure: procedure.to_owned(),
                match_style: None,
                procedure_impl,
            },
        );
    }

    /// All protocol actions received so far, in order.
    pub async fn actions(&self) -> Vec<RouterAction> {
        self.state.lock().await.actions.clone()
    }

    /// Protocol actions received so far, excluding sessions joining.
    pub async fn protocol_actions(&self) -> Vec<RouterAction> {
        self.actions()
            .await
            .into_iter()
            .filter(|action| !matches!(action, RouterAction::Join(_)))
            .collect()
    }
}

impl Default for LocalRouter {
    fn default() -> Self {
        Self::new()
    }
}

struct FunctionHandler(Box<dyn Fn(Arguments) -> Result<Arguments> + Send + Sync>);

#[async_trait]
impl InvocationHandler for FunctionHandler {
    async fn invoke(&self, arguments: Arguments) -> Result<Arguments> {
        (self.0)(arguments)
    }
}

struct LocalConnector {
    router: LocalRouter,
}

#[async_trait]
impl Connector for LocalConnector {
    async fn establish(
        &self,
        connection: &ConnectionConfig,
        _: &SessionConfig,
    ) -> Result<Arc<dyn ApplicationSession>> {
        let mut gate_rx = self.router.gate_tx.subscribe();
        gate_rx
            .wait_for(|open| *open)
            .await
            .map(|_| ())
            .map_err(|_| Error::msg("router shut down"))?;

        let mut state = self.router.state.lock().await;
        if let Some(refusal) = &state.refusal {
            return Err(Error::msg(refusal.clone()));
        }
        let id = state.next_id();
        state.active_sessions.push(id);
        state
            .actions
            .push(RouterAction::Join(connection.realm.clone()));
        Ok(Arc::new(LocalSession {
            id,
            state: self.router.state.clone(),
        }))
    }
}

struct LocalSession {
    id: u64,
    state: Arc<Mutex<RouterState>>,
}

#[async_trait]
impl ApplicationSession for LocalSession {
    fn session_id(&self) -> Option<u64> {
        Some(self.id)
    }

    async fn call(&self, procedure: &str, request: CallRequest) -> Result<Arguments> {
        let procedure_impl = {
            let mut state = self.state.lock().await;
            state.check_session(self.id)?;
            state.actions.push(RouterAction::Call(procedure.to_owned()));
            state
                .find_procedure(procedure)
                .ok_or_else(|| Error::msg("wamp.error.no_such_procedure"))?
        };
        let CallRequest {
            arguments,
            timeout,
            progress: progress_handler,
        } = request;
        let result = async move {
            match procedure_impl {
                LocalProcedure::Handler(handler) => handler.invoke(arguments).await,
                LocalProcedure::Progressive { progress, result } => {
                    if let Some(progress_handler) = progress_handler {
                        for progress in progress {
                            progress_handler.progress(progress).await;
                        }
                    }
                    Ok(result)
                }
            }
        };
        match timeout {
            Some(timeout) => tokio::time::timeout(timeout, result)
                .await
                .map_err(|_| Error::msg("wamp.error.timeout"))?,
            None => result.await,
        }
    }

    async fn register(
        &self,
        procedure: &str,
        options: &RegisterOptions,
        handler: Arc<dyn InvocationHandler>,
    ) -> Result<RegistrationId> {
        let mut state = self.state.lock().await;
        state.check_session(self.id)?;
        state
            .actions
            .push(RouterAction::Register(procedure.to_owned()));
        if state.registrations.values().any(|registered| {
            registered.procedure == procedure && registered.match_style == options.match_style
        }) {
            return Err(Error::msg("wamp.error.procedure_already_exists"));
        }
        let id = state.next_id();
        state.registrations.insert(
            id,
            Registered {
                session: self.id,
                procedure: procedure.to_owned(),
                match_style: options.match_style,
                procedure_impl: LocalProcedure::Handler(handler),
            },
        );
        Ok(id)
    }

    async fn unregister(&self, registration: RegistrationId) -> Result<()> {
        let mut state = self.state.lock().await;
        state.check_session(self.id)?;
        state.actions.push(RouterAction::Unregister(registration));
        let owned = state
            .registrations
            .get(&registration)
            .is_some_and(|entry| entry.session == self.id);
        if !owned {
            return Err(Error::msg("wamp.error.no_such_registration"));
        }
        state.registrations.remove(&registration);
        Ok(())
    }

    async fn publish(
        &self,
        topic: &str,
        arguments: Arguments,
        options: &PublishOptions,
    ) -> Result<()> {
        let receivers = {
            let mut state = self.state.lock().await;
            state.check_session(self.id)?;
            state.actions.push(RouterAction::Publish(topic.to_owned()));
            let exclude_me = options.exclude_me.unwrap_or(true);
            state
                .subscriptions
                .values()
                .filter(|subscribed| uri_matches(&subscribed.topic, subscribed.match_style, topic))
                .filter(|subscribed| !(exclude_me && subscribed.session == self.id))
                .filter(|subscribed| !options.exclude.contains(&subscribed.session))
                .filter(|subscribed| {
                    options.eligible.is_empty() || options.eligible.contains(&subscribed.session)
                })
                .map(|subscribed| (subscribed.match_style.is_some(), subscribed.sink.clone()))
                .collect::<Vec<_>>()
        };
        for (pattern_based, sink) in receivers {
            sink.event(ReceivedEvent {
                topic: pattern_based.then(|| topic.to_owned()),
                arguments: arguments.clone(),
            })
            .await;
        }
        Ok(())
    }

    async fn subscribe(
        &self,
        topic: &str,
        options: &SubscribeOptions,
        sink: Arc<dyn EventSink>,
    ) -> Result<SubscriptionId> {
        let mut state = self.state.lock().await;
        state.check_session(self.id)?;
        state
            .actions
            .push(RouterAction::Subscribe(topic.to_owned()));
        let id = state.next_id();
        state.subscriptions.insert(
            id,
            Subscribed {
                session: self.id,
                topic: topic.to_owned(),
                match_style: options.match_style,
                sink,
            },
        );
        Ok(id)
    }

    async fn unsubscribe(&self, subscription: SubscriptionId) -> Result<()> {
        let mut state = self.state.lock().await;
        state.check_session(self.id)?;
        state.actions.push(RouterAction::Unsubscribe(subscription));
        let owned = state
            .subscriptions
            .get(&subscription)
            .is_some_and(|entry| entry.session == self.id);
        if !owned {
            return Err(Error::msg("wamp.error.no_such_subscription"));
        }
        state.subscriptions.remove(&subscription);
        Ok(())
    }

    async fn leave(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        state.check_session(self.id)?;
        state.actions.push(RouterAction::Leave);
        state.active_sessions.retain(|session| *session != self.id);
        let id = self.id;
        state
            .registrations
            .retain(|_, registered| registered.session != id);
        state
            .subscriptions
            .retain(|_, subscribed| subscribed.session != id);
        Ok(())
    }
}
