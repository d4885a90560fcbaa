use std::time::Duration;

use anyhow::{
    Error,
    Result,
};
use battler_wamp_repl::{
    backend::ReceivedEvent,
    connection::ConnectionManager,
    core::state::ActionStatus,
    names::registry::Handle,
    pubsub::{
        EventHandler,
        SubscriptionConfig,
    },
};
use clap::{
    Parser,
    error::ErrorKind,
};

use crate::{
    command::{
        Command,
        CommandLine,
        SubscribeArgs,
    },
    format::{
        self,
        Details,
    },
    path::{
        EntityKind,
        Resolver,
        join,
        parent,
    },
    tokenizer::tokenize,
};

/// The result of running one line.
#[derive(Debug, PartialEq, Eq)]
pub enum Outcome {
    Output(String),
    Exit,
}

fn created(kind: EntityKind, path: &str, handle: Handle) -> String {
    format!("Created {kind} {path} ({handle})")
}

fn event_line(topic: &str, event: &ReceivedEvent) -> String {
    format!(
        "[{}] {}",
        event.topic.as_deref().unwrap_or(topic),
        format::arguments(&event.arguments)
    )
}

fn subscription_config(args: &SubscribeArgs) -> SubscriptionConfig {
    let handler = if args.print {
        let topic = args.topic.clone();
        EventHandler::sync(move |event| println!("{}", event_line(&topic, event)))
    } else {
        EventHandler::None
    };
    SubscriptionConfig {
        match_style: args.match_style,
        ..SubscriptionConfig::new(&args.topic, handler)
    }
}

/// Runs shell lines against a tree of connections.
pub struct Shell {
    manager: ConnectionManager,
}

impl Shell {
    pub fn new(manager: ConnectionManager) -> Self {
        Self { manager }
    }

    fn resolver(&self) -> Resolver<'_> {
        Resolver::new(&self.manager)
    }

    /// Every path that can currently be resolved, for completion.
    pub async fn paths(&self) -> Vec<String> {
        self.resolver().all_paths().await
    }

    /// Parses and runs a single line.
    ///
    /// Blank lines and lines starting with `#` do nothing.
    pub async fn execute_line(&self, line: &str) -> Result<Outcome> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(Outcome::Output(String::new()));
        }
        let command = match CommandLine::try_parse_from(tokenize(line)?) {
            Ok(command_line) => command_line.command,
            Err(err) => match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                    return Ok(Outcome::Output(err.render().to_string().trim_end().to_owned()));
                }
                _ => {
                    let message = err.render().to_string();
                    return Err(Error::msg(
                        message
                            .trim_start_matches("error: ")
                            .trim_end()
                            .to_owned(),
                    ));
                }
            },
        };
        self.execute(command).await
    }

    /// Runs a single command.
    pub async fn execute(&self, command: Command) -> Result<Outcome> {
        let resolver = self.resolver();
        let output = match command {
            Command::Connect(args) => {
                let connection = self
                    .manager
                    .connect(args.config(), args.name.clone())
                    .await?;
                created(
                    EntityKind::Connection,
                    connection.name(),
                    connection.handle(),
                )
            }
            Command::Session(args) => {
                let connection = resolver.connection(&args.connection).await?;
                let session = connection
                    .session(args.config(), args.name.clone())
                    .await?;
                created(
                    EntityKind::Session,
                    &join(&args.connection, session.name()),
                    session.handle(),
                )
            }
            Command::Call(args) => {
                let session = resolver.session(&args.session).await?;
                let call = session.call(args.config(), args.name.clone()).await?;
                created(
                    EntityKind::Call,
                    &join(&args.session, call.name()),
                    call.handle(),
                )
            }
            Command::Invoke(args) => {
                let call = resolver.call(&args.target).await?;
                let invocation = call.invoke(args.arguments()?, args.name.clone()).await?;
                created(
                    EntityKind::Invocation,
                    &join(&args.target, invocation.name()),
                    invocation.handle(),
                )
            }
            Command::Reinvoke(args) => {
                let invocation = resolver.invocation(&args.target).await?;
                let invocation = invocation
                    .reinvoke(&args.template(), args.name.clone())
                    .await?;
                created(
                    EntityKind::Invocation,
                    &join(parent(&args.target), invocation.name()),
                    invocation.handle(),
                )
            }
            Command::Register(args) => {
                let session = resolver.session(&args.session).await?;
                let registration = session
                    .register(args.config()?, args.name.clone())
                    .await?;
                created(
                    EntityKind::Registration,
                    &join(&args.session, registration.name()),
                    registration.handle(),
                )
            }
            Command::Unregister(args) => {
                resolver.registration(&args.target).await?.unregister()?;
                format!("Unregistering {}", args.target)
            }
            Command::Reregister(args) => {
                let registration = resolver.registration(&args.target).await?;
                let registration = registration
                    .reregister(args.overrides()?, args.name.clone())
                    .await?;
                created(
                    EntityKind::Registration,
                    &join(parent(&args.target), registration.name()),
                    registration.handle(),
                )
            }
            Command::Publisher(args) => {
                let session = resolver.session(&args.session).await?;
                let publisher = session
                    .publisher(args.config(), args.name.clone())
                    .await?;
                created(
                    EntityKind::Publisher,
                    &join(&args.session, publisher.name()),
                    publisher.handle(),
                )
            }
            Command::Publish(args) => {
                let publisher = resolver.publisher(&args.target).await?;
                let publication = publisher
                    .publish(args.arguments()?, args.name.clone())
                    .await?;
                created(
                    EntityKind::Publication,
                    &join(&args.target, publication.name()),
                    publication.handle(),
                )
            }
            Command::Republish(args) => {
                let publication = resolver.publication(&args.target).await?;
                let publication = publication
                    .republish(&args.template(), args.name.clone())
                    .await?;
                created(
                    EntityKind::Publication,
                    &join(parent(&args.target), publication.name()),
                    publication.handle(),
                )
            }
            Command::Subscribe(args) => {
                let session = resolver.session(&args.session).await?;
                let subscription = session
                    .subscribe(subscription_config(&args), args.name.clone())
                    .await?;
                created(
                    EntityKind::Subscription,
                    &join(&args.session, subscription.name()),
                    subscription.handle(),
                )
            }
            Command::Unsubscribe(args) => {
                resolver.subscription(&args.target).await?.unsubscribe()?;
                format!("Unsubscribing {}", args.target)
            }
            Command::Resubscribe(args) => {
                let subscription = resolver.subscription(&args.target).await?;
                let subscription = subscription
                    .resubscribe(|config| args.apply(config), args.name.clone())
                    .await?;
                created(
                    EntityKind::Subscription,
                    &join(parent(&args.target), subscription.name()),
                    subscription.handle(),
                )
            }
            Command::Leave(args) => {
                resolver.session(&args.target).await?.leave()?;
                format!("Leaving {}", args.target)
            }
            Command::Show(args) => self.show(args.kind, &args.path).await?,
            Command::List(args) => {
                let parent = match (args.kind.parent(), args.parent.as_deref()) {
                    (Some(parent), None) => {
                        return Err(Error::msg(format!(
                            "listing {} entities requires the path of a {parent}",
                            args.kind
                        )));
                    }
                    (_, parent) => parent.unwrap_or_default(),
                };
                let names = resolver.children(args.kind, parent).await?;
                if names.is_empty() {
                    format!("No {} entities", args.kind)
                } else {
                    names.join("\n")
                }
            }
            Command::Wait(args) => {
                let wait = self.wait(args.kind, &args.path);
                match args.timeout_ms {
                    Some(timeout) => tokio::time::timeout(Duration::from_millis(timeout), wait)
                        .await
                        .map_err(|_| {
                            Error::msg(format!(
                                "timed out waiting for {} {}",
                                args.kind, args.path
                            ))
                        })??,
                    None => wait.await?,
                }
            }
            Command::Exit => return Ok(Outcome::Exit),
        };
        Ok(Outcome::Output(output))
    }

    async fn wait(&self, kind: EntityKind, path: &str) -> Result<String> {
        let resolver = self.resolver();
        match kind {
            EntityKind::Session => {
                let session = resolver.session(path).await?;
                // Failure is shown in the details.
                let _ = session.wait_until_ready().await;
            }
            EntityKind::Invocation => {
                resolver.invocation(path).await?.wait().await;
            }
            EntityKind::Registration => {
                resolver.registration(path).await?.wait().await;
            }
            EntityKind::Publication => {
                resolver.publication(path).await?.wait().await;
            }
            EntityKind::Subscription => {
                resolver.subscription(path).await?.wait().await;
            }
            _ => return Err(Error::msg(format!("there is nothing to wait for on a {kind}"))),
        }
        self.show(kind, path).await
    }

    async fn show(&self, kind: EntityKind, path: &str) -> Result<String> {
        let resolver = self.resolver();
        let title = format!("{kind} {path}");
        let details = match kind {
            EntityKind::Connection => {
                let connection = resolver.connection(path).await?;
                let config = connection.config();
                Details::new(title)
                    .field("handle", connection.handle())
                    .field("uri", &config.uri)
                    .field("realm", &config.realm)
                    .field(
                        "serializers",
                        config
                            .serializers
                            .iter()
                            .map(|serializer| serializer.as_str())
                            .collect::<Vec<_>>()
                            .join(", "),
                    )
                    .field("sessions", connection.sessions().len().await)
            }
            EntityKind::Session => {
                let session = resolver.session(path).await?;
                let leave_state = session.leave_state();
                Details::new(title)
                    .field("handle", session.handle())
                    .field("uri", session.uri())
                    .field("realm", session.realm())
                    .field("authmethods", session.config().describe_auth_methods())
                    .optional_field("authid", session.config().auth_id.as_ref())
                    .optional_field("authrole", session.config().auth_role.as_ref())
                    .field("state", format::readiness(&session.current_readiness()))
                    .optional_field("session id", session.session_id())
                    .field("calls", session.calls().len().await)
                    .field("registrations", session.registrations().len().await)
                    .field("publishers", session.publishers().len().await)
                    .field("subscriptions", session.subscriptions().len().await)
                    .optional_field(
                        "leave",
                        (leave_state.status() != ActionStatus::Created)
                            .then(|| format::action_state(&leave_state, |_| None)),
                    )
            }
            EntityKind::Call => {
                let call = resolver.call(path).await?;
                Details::new(title)
                    .field("handle", call.handle())
                    .field("procedure", call.procedure())
                    .optional_field(
                        "timeout",
                        call.config()
                            .timeout
                            .map(|timeout| format!("{} ms", timeout.as_millis())),
                    )
                    .field("progress", call.config().wants_progress())
                    .field("invocations", call.invocations().len().await)
            }
            EntityKind::Invocation => {
                let invocation = resolver.invocation(path).await?;
                let progress = invocation
                    .progress_results()
                    .await
                    .iter()
                    .map(format::arguments)
                    .collect::<Vec<_>>();
                Details::new(title)
                    .field("handle", invocation.handle())
                    .field("procedure", invocation.procedure())
                    .field("arguments", format::arguments(invocation.arguments()))
                    .field(
                        "state",
                        format::action_state(&invocation.state(), |result| {
                            Some(format::arguments(result))
                        }),
                    )
                    .optional_field(
                        "progress",
                        (!progress.is_empty()).then(|| progress.join(", ")),
                    )
            }
            EntityKind::Registration => {
                let registration = resolver.registration(path).await?;
                let unregister_state = registration.unregister_state();
                Details::new(title)
                    .field("handle", registration.handle())
                    .field("procedure", registration.procedure())
                    .optional_field("match", registration.config().match_style)
                    .field("endpoint", registration.config().endpoint.kind())
                    .field(
                        "state",
                        format::action_state(&registration.state(), |id| {
                            Some(format!("registration {id}"))
                        }),
                    )
                    .field("hits", registration.hits().await.len())
                    .optional_field(
                        "unregister",
                        (unregister_state.status() != ActionStatus::Created)
                            .then(|| format::action_state(&unregister_state, |_| None)),
                    )
            }
            EntityKind::Hit => {
                let hit = resolver.hit(path).await?;
                Details::new(title)
                    .field("timestamp", format::timestamp(hit.timestamp))
                    .field("arguments", format::arguments(&hit.arguments))
            }
            EntityKind::Publisher => {
                let publisher = resolver.publisher(path).await?;
                let options = &publisher.config().options;
                Details::new(title)
                    .field("handle", publisher.handle())
                    .field("topic", publisher.topic())
                    .optional_field("acknowledge", options.acknowledge)
                    .optional_field("exclude me", options.exclude_me)
                    .optional_field("retain", options.retain)
                    .field("publications", publisher.publications().len().await)
            }
            EntityKind::Publication => {
                let publication = resolver.publication(path).await?;
                Details::new(title)
                    .field("handle", publication.handle())
                    .field("topic", publication.topic())
                    .field("arguments", format::arguments(publication.arguments()))
                    .field(
                        "state",
                        format::action_state(&publication.state(), |_| None),
                    )
            }
            EntityKind::Subscription => {
                let subscription = resolver.subscription(path).await?;
                let unsubscribe_state = subscription.unsubscribe_state();
                Details::new(title)
                    .field("handle", subscription.handle())
                    .field("topic", subscription.topic())
                    .optional_field("match", subscription.config().match_style)
                    .field(
                        "state",
                        format::action_state(&subscription.state(), |id| {
                            Some(format!("subscription {id}"))
                        }),
                    )
                    .field("events", subscription.events().await.len())
                    .optional_field(
                        "unsubscribe",
                        (unsubscribe_state.status() != ActionStatus::Created)
                            .then(|| format::action_state(&unsubscribe_state, |_| None)),
                    )
            }
            EntityKind::Event => {
                let event = resolver.event(path).await?;
                Details::new(title)
                    .field("timestamp", format::timestamp(event.timestamp))
                    .optional_field("topic", event.topic.as_ref())
                    .field("arguments", format::arguments(&event.arguments))
            }
        };
        Ok(details.to_string())
    }
}
