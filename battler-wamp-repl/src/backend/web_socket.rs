use std::sync::Arc;

use ahash::HashMap;
use anyhow::{
    Error,
    Result,
};
use async_trait::async_trait;
use battler_wamp::{
    core::{
        id::Id,
        match_style::MatchStyle as WampMatchStyle,
        publish_options::PublishOptions as WampPublishOptions,
    },
    peer::{
        PeerConfig,
        ProcedureMessage,
        ProcedureOptions,
        PublishedEvent,
        RpcCall,
        RpcYield,
        SubscriptionOptions,
        SupportedAuthMethod,
        WebSocketConfig,
        WebSocketPeer,
        new_web_socket_peer,
    },
    serializer::serializer::SerializerType,
};
use battler_wamp_uri::{
    Uri,
    WildcardUri,
};
use futures_util::lock::Mutex;
use log::{
    error,
    warn,
};
use tokio::{
    sync::broadcast::error::RecvError,
    task::JoinHandle,
};

use crate::{
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
            AuthMethod,
            MatchStyle,
            PublishOptions,
            Serializer,
        },
    },
    session::SessionConfig,
};

fn wamp_match_style(match_style: Option<MatchStyle>) -> Option<WampMatchStyle> {
    match_style.map(|match_style| match match_style {
        MatchStyle::Prefix => WampMatchStyle::Prefix,
        MatchStyle::Wildcard => WampMatchStyle::Wildcard,
    })
}

fn wamp_ids(ids: &[u64]) -> Result<Option<battler_wamp::core::hash::HashSet<Id>>> {
    if ids.is_empty() {
        return Ok(None);
    }
    ids.iter()
        .map(|id| Id::try_from(*id).map_err(Error::new))
        .collect::<Result<_>>()
        .map(Some)
}

fn wamp_strings(values: &[String]) -> Option<battler_wamp::core::hash::HashSet<String>> {
    (!values.is_empty()).then(|| values.iter().cloned().collect())
}

fn wamp_publish_options(options: &PublishOptions) -> Result<WampPublishOptions> {
    Ok(WampPublishOptions {
        // Publications wait for the router unless acknowledgement is explicitly turned off.
        acknowledge: Some(options.acknowledge.unwrap_or(true)),
        exclude_me: options.exclude_me,
        exclude: wamp_ids(&options.exclude)?,
        exclude_authid: wamp_strings(&options.exclude_authid),
        exclude_authrole: wamp_strings(&options.exclude_authrole),
        eligible: wamp_ids(&options.eligible)?,
        eligible_authid: wamp_strings(&options.eligible_authid),
        eligible_authrole: wamp_strings(&options.eligible_authrole),
        ..Default::default()
    })
}

/// Settings of a session that WebSocket sessions accept but cannot act on.
fn ignored_session_settings(
    connection: &ConnectionConfig,
    session: &SessionConfig,
) -> Vec<&'static str> {
    let mut ignored = Vec::new();
    if !connection.extra.is_empty() {
        ignored.push("connection extra");
    }
    if !session.auth_extra.is_empty() {
        ignored.push("authextra");
    }
    if session.resumable == Some(true) || session.resume_session.is_some() {
        ignored.push("session resumption");
    } else if session.resume_token.is_some() {
        ignored.push("resume token");
    }
    ignored
}

/// Options of a publication that WebSocket sessions accept but cannot act on.
fn ignored_publish_options(options: &PublishOptions) -> Vec<&'static str> {
    let mut ignored = Vec::new();
    if options.retain.is_some() {
        ignored.push("retain");
    }
    ignored
}

fn supported_auth_methods(config: &SessionConfig) -> Result<Vec<SupportedAuthMethod>> {
    let mut supported = Vec::new();
    let mut anonymous = false;
    for method in &config.auth_methods {
        match method {
            AuthMethod::Anonymous => anonymous = true,
            AuthMethod::WampScram => supported.push(SupportedAuthMethod::WampScram {
                id: config.auth_id.clone().unwrap_or_default(),
                password: config.secret.clone().unwrap_or_default(),
            }),
            AuthMethod::Undisputed => supported.push(SupportedAuthMethod::Undisputed {
                id: config.auth_id.clone().unwrap_or_default(),
                role: config.auth_role.clone().unwrap_or_default(),
            }),
            unsupported => warn!("Authentication method {unsupported} is not supported, skipping"),
        }
    }
    if supported.is_empty() && !anonymous {
        return Err(Error::msg(format!(
            "none of the offered authentication methods ({}) are supported",
            config.describe_auth_methods()
        )));
    }
    Ok(supported)
}

/// A [`Connector`] that establishes sessions over WebSockets, using `battler-wamp`.
///
/// Every session gets its own peer and its own WebSocket connection.
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    agent: String,
}

impl WebSocketConnector {
    /// Creates a new connector, identifying peers with the given agent name.
    pub fn new<S>(agent: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            agent: agent.into(),
        }
    }
}

impl Default for WebSocketConnector {
    fn default() -> Self {
        Self::new(concat!(env!("CARGO_PKG_NAME"), "-", env!("CARGO_PKG_VERSION")))
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn establish(
        &self,
        connection: &ConnectionConfig,
        session: &SessionConfig,
    ) -> Result<Arc<dyn ApplicationSession>> {
        if connection.proxy.is_some() {
            return Err(Error::msg("proxies are not supported by WebSocket sessions"));
        }
        for setting in ignored_session_settings(connection, session) {
            warn!("Ignoring {setting} for session on {}: not supported", connection.realm);
        }
        let auth_methods = supported_auth_methods(session)?;

        let config = PeerConfig {
            name: format!("{}@{}", connection.realm, connection.uri),
            agent: self.agent.clone(),
            serializers: connection
                .serializers
                .iter()
                .map(|serializer| match serializer {
                    Serializer::Json => SerializerType::Json,
                    Serializer::MessagePack => SerializerType::MessagePack,
                })
                .collect(),
            web_socket: Some(WebSocketConfig {
                headers: connection
                    .headers
                    .iter()
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect(),
            }),
            ..Default::default()
        };

        let peer = new_web_socket_peer(config)?;
        peer.connect(&connection.uri).await?;
        if auth_methods.is_empty() {
            peer.join_realm(&connection.realm).await?;
        } else {
            peer.join_realm_with_authentication(&connection.realm, &auth_methods)
                .await?;
        }
        let session_id = peer
            .current_session_id()
            .await
            .and_then(|id| id.to_string().parse().ok());

        Ok(Arc::new(WebSocketApplicationSession {
            peer,
            session_id,
            state: Mutex::new(SessionState::default()),
        }))
    }
}

#[derive(Default)]
struct SessionState {
    next_id: u64,
    registrations: HashMap<RegistrationId, (Id, JoinHandle<()>)>,
    subscriptions: HashMap<SubscriptionId, (Id, JoinHandle<()>)>,
}

impl SessionState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

struct WebSocketApplicationSession {
    peer: WebSocketPeer,
    session_id: Option<u64>,
    state: Mutex<SessionState>,
}

#[async_trait]
impl ApplicationSession for WebSocketApplicationSession {
    fn session_id(&self) -> Option<u64> {
        self.session_id
    }

    async fn call(&self, procedure: &str, request: CallRequest) -> Result<Arguments> {
        let procedure = Uri::try_from(procedure)?;
        let rpc_call = RpcCall {
            arguments: request.arguments.arguments,
            arguments_keyword: request.arguments.arguments_keyword,
            timeout: request.timeout,
            ..Default::default()
        };
        let result = match request.progress {
            None => self.peer.call_and_wait(procedure, rpc_call).await?,
            Some(progress) => {
                let mut rpc = self.peer.call_with_progress(procedure, rpc_call).await?;
                let mut last = None;
                while let Some(result) = rpc.next_result().await? {
                    if result.progress {
                        progress
                            .progress(Arguments::new(result.arguments, result.arguments_keyword))
                            .await;
                    } else {
                        last = Some(result);
                    }
                }
                last.ok_or_else(|| Error::msg("call finished without a final result"))?
            }
        };
        Ok(Arguments::new(result.arguments, result.arguments_keyword))
    }

    async fn register(
        &self,
        procedure: &str,
        options: &RegisterOptions,
        handler: Arc<dyn InvocationHandler>,
    ) -> Result<RegistrationId> {
        let mut procedure = self
            .peer
            .register_with_options(
                WildcardUri::try_from(procedure)?,
                ProcedureOptions {
                    match_style: wamp_match_style(options.match_style),
                    disclose_caller: options.disclose_caller,
                    ..Default::default()
                },
            )
            .await?;
        let procedure_id = procedure.id;
        let handle = tokio::spawn(async move {
            loop {
                let mut invocation = match procedure.procedure_message_rx.recv().await {
                    Ok(ProcedureMessage::Invocation(invocation)) => invocation,
                    Ok(_) => continue,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Procedure fell behind, skipping {skipped} messages");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };
                let arguments = Arguments::new(
                    std::mem::take(&mut invocation.arguments),
                    std::mem::take(&mut invocation.arguments_keyword),
                );
                let result = handler.invoke(arguments).await.map(|result| RpcYield {
                    arguments: result.arguments,
                    arguments_keyword: result.arguments_keyword,
                    ..Default::default()
                });
                if let Err(err) = invocation.respond(result).await {
                    error!("Failed to respond to invocation: {err:#}");
                }
            }
        });
        let mut state = self.state.lock().await;
        let id = state.next_id();
        state.registrations.insert(id, (procedure_id, handle));
        Ok(id)
    }

    async fn unregister(&self, registration: RegistrationId) -> Result<()> {
        let (id, handle) = self
            .state
            .lock()
            .await
            .registrations
            .remove(&registration)
            .ok_or_else(|| Error::msg(format!("registration {registration} does not exist")))?;
        handle.abort();
        self.peer.unregister(id).await
    }

    async fn publish(
        &self,
        topic: &str,
        arguments: Arguments,
        options: &PublishOptions,
    ) -> Result<()> {
        for option in ignored_publish_options(options) {
            warn!("Ignoring {option} for publication to {topic}: not supported");
        }
        self.peer
            .publish(
                Uri::try_from(topic)?,
                PublishedEvent {
                    arguments: arguments.arguments,
                    arguments_keyword: arguments.arguments_keyword,
                    options: wamp_publish_options(options)?,
                    ..Default::default()
                },
            )
            .await
    }

    async fn subscribe(
        &self,
        topic: &str,
        options: &SubscribeOptions,
        sink: Arc<dyn EventSink>,
    ) -> Result<SubscriptionId> {
        let mut subscription = self
            .peer
            .subscribe_with_options(
                WildcardUri::try_from(topic)?,
                SubscriptionOptions {
                    match_style: wamp_match_style(options.match_style),
                    ..Default::default()
                },
            )
            .await?;
        let subscription_id = subscription.id;
        let handle = tokio::spawn(async move {
            loop {
                let event = match subscription.event_rx.recv().await {
                    Ok(event) => event,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Subscription fell behind, skipping {skipped} events");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };
                sink.event(ReceivedEvent {
                    topic: event.topic.map(|topic| topic.to_string()),
                    arguments: Arguments::new(event.arguments, event.arguments_keyword),
                })
                .await;
            }
        });
        let mut state = self.state.lock().await;
        let id = state.next_id();
        state.subscriptions.insert(id, (subscription_id, handle));
        Ok(id)
    }

    async fn unsubscribe(&self, subscription: SubscriptionId) -> Result<()> {
        let (id, handle) = self
            .state
            .lock()
            .await
            .subscriptions
            .remove(&subscription)
            .ok_or_else(|| Error::msg(format!("subscription {subscription} does not exist")))?;
        handle.abort();
        self.peer.unsubscribe(id).await
    }

    async fn leave(&self) -> Result<()> {
        {
            let mut state = self.state.lock().await;
            for (_, (_, handle)) in state.registrations.drain() {
                handle.abort();
            }
            for (_, (_, handle)) in state.subscriptions.drain() {
                handle.abort();
            }
        }
        self.peer.leave_realm().await?;
        self.peer.disconnect().await
    }
}

#[cfg(test)]
mod web_socket_test {
    use battler_wamp_values::{
        Dictionary,
        Value,
    };

    use crate::{
        backend::web_socket::{
            ignored_publish_options,
            ignored_session_settings,
            wamp_publish_options,
        },
        connection::ConnectionConfig,
        core::options::PublishOptions,
        session::SessionConfig,
    };

    fn extra() -> Dictionary {
        Dictionary::from_iter([("key".to_owned(), Value::String("value".to_owned()))])
    }

    #[test]
    fn reports_ignored_session_settings() {
        let connection = ConnectionConfig::default();
        let session = SessionConfig::anonymous();
        assert!(ignored_session_settings(&connection, &session).is_empty());

        let connection = ConnectionConfig {
            extra: extra(),
            ..Default::default()
        };
        let session = SessionConfig {
            auth_extra: extra(),
            resumable: Some(true),
            ..SessionConfig::anonymous()
        };
        pretty_assertions::assert_eq!(
            ignored_session_settings(&connection, &session),
            vec!["connection extra", "authextra", "session resumption"]
        );
    }

    #[test]
    fn acknowledges_publications_unless_turned_off() {
        let options = wamp_publish_options(&PublishOptions::default()).unwrap();
        assert_eq!(options.acknowledge, Some(true));
        assert_eq!(options.exclude_me, None);
        assert_eq!(options.exclude, None);

        let options = wamp_publish_options(&PublishOptions {
            acknowledge: Some(false),
            exclude_me: Some(false),
            exclude: vec![5],
            eligible_authrole: vec!["admin".to_owned()],
            ..Default::default()
        })
        .unwrap();
        assert_eq!(options.acknowledge, Some(false));
        assert_eq!(options.exclude_me, Some(false));
        assert_eq!(options.exclude.map(|ids| ids.len()), Some(1));
        assert_eq!(
            options
                .eligible_authrole
                .map(|roles| roles.into_iter().collect::<Vec<_>>()),
            Some(vec!["admin".to_owned()])
        );
    }

    #[test]
    fn reports_ignored_publish_options() {
        assert!(ignored_publish_options(&PublishOptions::default()).is_empty());
        pretty_assertions::assert_eq!(
            ignored_publish_options(&PublishOptions {
                retain: Some(true),
                acknowledge: Some(true),
                ..Default::default()
            }),
            vec!["retain"]
        );
    }
}
