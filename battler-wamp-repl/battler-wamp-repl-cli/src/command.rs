use std::{
    sync::LazyLock,
    time::Duration,
};

use anyhow::{
    Error,
    Result,
};
use battler_wamp_repl::{
    connection::{
        ConnectionConfig,
        ProxyConfig,
    },
    core::{
        arguments::{
            ArgumentTemplate,
            Arguments,
            Slot,
        },
        options::{
            AuthMethod,
            MatchStyle,
            PublishOptions,
            Serializer,
        },
    },
    pubsub::{
        PublisherConfig,
        SubscriptionConfig,
    },
    rpc::{
        CallConfig,
        Endpoint,
        RegistrationConfig,
    },
    session::SessionConfig,
};
use battler_wamp_values::Value;
use clap::{
    Args,
    Parser,
    Subcommand,
    ValueEnum,
};
use regex::Regex;

use crate::path::EntityKind;

static KEYWORD_ARGUMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*)=(.*)$").unwrap());

/// Parses a value typed into the shell.
///
/// Anything JSON accepts is parsed as JSON. Anything else is taken as a bare string.
pub fn parse_value(s: &str) -> Result<Value> {
    match serde_json::from_str::<serde_json::Value>(s) {
        Ok(json) => json_to_value(json),
        Err(_) => Ok(Value::String(s.to_owned())),
    }
}

fn json_to_value(json: serde_json::Value) -> Result<Value> {
    match json {
        serde_json::Value::Null => Ok(Value::Null),
        serde_json::Value::Bool(value) => Ok(Value::Bool(value)),
        serde_json::Value::Number(number) => number.as_u64().map(Value::Integer).ok_or_else(|| {
            Error::msg(format!(
                "{number} is not a valid WAMP value, only non-negative integers are supported"
            ))
        }),
        serde_json::Value::String(value) => Ok(Value::String(value)),
        serde_json::Value::Array(values) => values
            .into_iter()
            .map(json_to_value)
            .collect::<Result<_>>()
            .map(Value::List),
        serde_json::Value::Object(values) => values
            .into_iter()
            .map(|(key, value)| Ok((key, json_to_value(value)?)))
            .collect::<Result<_>>()
            .map(Value::Dictionary),
    }
}

/// A single argument typed into the shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgumentToken {
    Positional(Slot),
    Keyword(String, Value),
}

/// Parses an argument: `_` keeps the original value, `key=value` is a keyword argument, and
/// anything else is a positional value.
pub fn parse_argument(s: &str) -> Result<ArgumentToken> {
    if s == "_" {
        return Ok(ArgumentToken::Positional(Slot::Keep));
    }
    match parse_keyword(s) {
        Ok((key, value)) => Ok(ArgumentToken::Keyword(key, value)),
        Err(_) => Ok(ArgumentToken::Positional(Slot::Value(parse_value(s)?))),
    }
}

fn parse_keyword(s: &str) -> Result<(String, Value)> {
    let captures = KEYWORD_ARGUMENT
        .captures(s)
        .ok_or_else(|| Error::msg(format!("expected key=value, found {s}")))?;
    Ok((captures[1].to_owned(), parse_value(&captures[2])?))
}

fn parse_header(s: &str) -> Result<(String, String)> {
    s.split_once('=')
        .map(|(key, value)| (key.to_owned(), value.to_owned()))
        .ok_or_else(|| Error::msg(format!("expected name=value, found {s}")))
}

fn parse_proxy(s: &str) -> Result<ProxyConfig> {
    let (host, port) = s
        .rsplit_once(':')
        .ok_or_else(|| Error::msg(format!("expected host:port, found {s}")))?;
    Ok(ProxyConfig {
        host: host.to_owned(),
        port: port.parse()?,
    })
}

fn parse_serializer(s: &str) -> Result<Serializer> {
    Ok(Serializer::try_from(s)?)
}

fn parse_auth_method(s: &str) -> Result<AuthMethod> {
    Ok(AuthMethod::try_from(s)?)
}

fn parse_match_style(s: &str) -> Result<MatchStyle> {
    Ok(MatchStyle::try_from(s)?)
}

/// A line typed into the shell.
#[derive(Debug, Parser)]
#[command(no_binary_name = true, disable_version_flag = true)]
pub struct CommandLine {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Opens a connection to a router.
    Connect(ConnectArgs),
    /// Creates a session on a connection.
    Session(SessionArgs),
    /// Creates a reusable call to a procedure.
    Call(CallArgs),
    /// Invokes a call with arguments.
    Invoke(InvokeArgs),
    /// Invokes the call of an invocation again, with `_` keeping original arguments.
    Reinvoke(InvokeArgs),
    /// Registers a procedure.
    Register(RegisterArgs),
    /// Unregisters a procedure.
    Unregister(TargetArgs),
    /// Registers a copy of a registration with overridden fields.
    Reregister(ReregisterArgs),
    /// Creates a reusable publisher for a topic.
    Publisher(PublisherArgs),
    /// Publishes through a publisher with arguments.
    Publish(InvokeArgs),
    /// Publishes a publication again, with `_` keeping original arguments.
    Republish(InvokeArgs),
    /// Subscribes to a topic.
    Subscribe(SubscribeArgs),
    /// Unsubscribes from a topic.
    Unsubscribe(TargetArgs),
    /// Subscribes a copy of a subscription with overridden fields.
    Resubscribe(ResubscribeArgs),
    /// Leaves the realm of a session.
    Leave(TargetArgs),
    /// Shows an entity.
    Show(ShowArgs),
    /// Lists the entities of a kind under a path.
    List(ListArgs),
    /// Waits for the action of an entity to finish, then shows it.
    Wait(WaitArgs),
    /// Exits the shell.
    Exit,
}

#[derive(Debug, Args)]
pub struct ConnectArgs {
    /// WebSocket URI of the router.
    pub uri: String,
    pub realm: String,
    #[arg(long)]
    pub name: Option<String>,
    /// Serializers offered to the router, in order of preference.
    #[arg(long = "serializer", value_parser = parse_serializer)]
    pub serializers: Vec<Serializer>,
    /// Header added to the WebSocket handshake, as name=value.
    #[arg(long = "header", value_parser = parse_header)]
    pub headers: Vec<(String, String)>,
    /// HTTP proxy, as host:port.
    #[arg(long, value_parser = parse_proxy)]
    pub proxy: Option<ProxyConfig>,
    /// Extra data for authenticators, as key=value.
    #[arg(long = "extra", value_parser = parse_keyword)]
    pub extra: Vec<(String, Value)>,
}

impl ConnectArgs {
    pub fn config(&self) -> ConnectionConfig {
        let mut config = ConnectionConfig::new(&self.uri, &self.realm);
        if !self.serializers.is_empty() {
            config.serializers = self.serializers.clone();
        }
        config.headers = self.headers.iter().cloned().collect();
        config.proxy = self.proxy.clone();
        config.extra = self.extra.iter().cloned().collect();
        config
    }
}

#[derive(Debug, Args)]
pub struct SessionArgs {
    /// Path of the connection.
    pub connection: String,
    #[arg(long)]
    pub name: Option<String>,
    /// Authentication methods offered to the router, in order of preference.
    #[arg(long = "authmethod", value_parser = parse_auth_method)]
    pub auth_methods: Vec<AuthMethod>,
    #[arg(long = "authid")]
    pub auth_id: Option<String>,
    #[arg(long = "authrole")]
    pub auth_role: Option<String>,
    /// Extra authentication data, as key=value.
    #[arg(long = "authextra", value_parser = parse_keyword)]
    pub auth_extra: Vec<(String, Value)>,
    #[arg(long)]
    pub secret: Option<String>,
    #[arg(long)]
    pub resumable: bool,
    #[arg(long)]
    pub resume_session: Option<u64>,
    #[arg(long)]
    pub resume_token: Option<String>,
}

impl SessionArgs {
    pub fn config(&self) -> SessionConfig {
        let mut config = SessionConfig {
            auth_id: self.auth_id.clone(),
            auth_role: self.auth_role.clone(),
            auth_extra: self.auth_extra.iter().cloned().collect(),
            secret: self.secret.clone(),
            resumable: self.resumable.then_some(true),
            resume_session: self.resume_session,
            resume_token: self.resume_token.clone(),
            ..Default::default()
        };
        if !self.auth_methods.is_empty() {
            config.auth_methods = self.auth_methods.clone();
        }
        config
    }
}

#[derive(Debug, Args)]
pub struct CallArgs {
    /// Path of the session.
    pub session: String,
    pub procedure: String,
    #[arg(long)]
    pub name: Option<String>,
    /// Time the router waits for the callee, in milliseconds.
    #[arg(long)]
    pub timeout_ms: Option<u64>,
    /// Ask the callee for progressive results.
    #[arg(long)]
    pub receive_progress: bool,
}

impl CallArgs {
    pub fn config(&self) -> CallConfig {
        CallConfig {
            timeout: self.timeout_ms.map(Duration::from_millis),
            receive_progress: self.receive_progress,
            ..CallConfig::new(&self.procedure)
        }
    }
}

#[derive(Debug, Args)]
pub struct InvokeArgs {
    /// Path of the entity to invoke.
    pub target: String,
    #[arg(long)]
    pub name: Option<String>,
    /// Arguments as JSON values, with keyword arguments as key=value.
    #[arg(value_parser = parse_argument, trailing_var_arg = true, allow_hyphen_values = true)]
    pub arguments: Vec<ArgumentToken>,
}

impl InvokeArgs {
    fn positional(&self) -> impl Iterator<Item = &Slot> {
        self.arguments.iter().filter_map(|token| match token {
            ArgumentToken::Positional(slot) => Some(slot),
            ArgumentToken::Keyword(..) => None,
        })
    }

    fn keywords(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.arguments.iter().filter_map(|token| match token {
            ArgumentToken::Keyword(key, value) => Some((key, value)),
            ArgumentToken::Positional(_) => None,
        })
    }

    /// The arguments for a new action.
    pub fn arguments(&self) -> Result<Arguments> {
        let positional = self
            .positional()
            .map(|slot| match slot {
                Slot::Keep => Err(Error::msg(
                    "_ keeps an original argument, so it can only be used when repeating an action",
                )),
                Slot::Value(value) => Ok(value.clone()),
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(self.keywords().fold(
            Arguments::positional(positional),
            |arguments, (key, value)| arguments.with_keyword(key, value.clone()),
        ))
    }

    /// The arguments for repeating an action, laid over the original arguments.
    pub fn template(&self) -> ArgumentTemplate {
        self.keywords().fold(
            ArgumentTemplate::positional(self.positional().cloned()),
            |template, (key, value)| template.with_keyword(key, value.clone()),
        )
    }
}

/// A built-in endpoint for registered procedures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EndpointKind {
    /// Returns its arguments.
    Echo,
    /// Returns nothing.
    #[value(name = "none")]
    Empty,
    /// Returns the value given by --value.
    Constant,
    /// Fails with the message given by --message.
    Fail,
}

fn endpoint(kind: EndpointKind, value: Option<&Value>, message: &str) -> Result<Endpoint> {
    match kind {
        EndpointKind::Echo => Ok(Endpoint::echo()),
        EndpointKind::Empty => Ok(Endpoint::None),
        EndpointKind::Constant => {
            let value = value.ok_or_else(|| Error::msg("a constant endpoint requires --value"))?;
            Ok(Endpoint::constant(Arguments::positional([value.clone()])))
        }
        EndpointKind::Fail => Ok(Endpoint::failing(message)),
    }
}

#[derive(Debug, Args)]
pub struct RegisterArgs {
    /// Path of the session.
    pub session: String,
    pub procedure: String,
    #[arg(long)]
    pub name: Option<String>,
    /// Match style of the procedure: prefix or wildcard.
    #[arg(long = "match", value_parser = parse_match_style)]
    pub match_style: Option<MatchStyle>,
    /// Ask the router to disclose the caller's identity.
    #[arg(long)]
    pub disclose_caller: bool,
    #[arg(long, value_enum, default_value_t = EndpointKind::Echo)]
    pub endpoint: EndpointKind,
    /// Result of a constant endpoint.
    #[arg(long, value_parser = parse_value)]
    pub value: Option<Value>,
    /// Error of a failing endpoint.
    #[arg(long, default_value = "wamp.error.runtime_error")]
    pub message: String,
}

impl RegisterArgs {
    pub fn config(&self) -> Result<RegistrationConfig> {
        Ok(RegistrationConfig {
            match_style: self.match_style,
            disclose_caller: self.disclose_caller,
            ..RegistrationConfig::new(
                &self.procedure,
                endpoint(self.endpoint, self.value.as_ref(), &self.message)?,
            )
        })
    }
}

#[derive(Debug, Args)]
pub struct ReregisterArgs {
    /// Path of the registration.
    pub target: String,
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub procedure: Option<String>,
    #[arg(long = "match", value_parser = parse_match_style)]
    pub match_style: Option<MatchStyle>,
    #[arg(long, value_enum)]
    pub endpoint: Option<EndpointKind>,
    #[arg(long, value_parser = parse_value)]
    pub value: Option<Value>,
    #[arg(long, default_value = "wamp.error.runtime_error")]
    pub message: String,
}

impl ReregisterArgs {
    /// A function applying the overridden fields to a registration's configuration.
    pub fn overrides(&self) -> Result<impl FnOnce(&mut RegistrationConfig) + use<>> {
        let procedure = self.procedure.clone();
        let match_style = self.match_style;
        let endpoint = self
            .endpoint
            .map(|kind| endpoint(kind, self.value.as_ref(), &self.message))
            .transpose()?;
        Ok(move |config: &mut RegistrationConfig| {
            if let Some(procedure) = procedure {
                config.procedure = procedure;
            }
            if match_style.is_some() {
                config.match_style = match_style;
            }
            if let Some(endpoint) = endpoint {
                config.endpoint = endpoint;
            }
        })
    }
}

#[derive(Debug, Args)]
pub struct PublisherArgs {
    /// Path of the session.
    pub session: String,
    pub topic: String,
    #[arg(long)]
    pub name: Option<String>,
    /// Wait for the router to acknowledge each publication.
    #[arg(long)]
    pub acknowledge: bool,
    /// Whether the publishing session is excluded from receiving its own events.
    #[arg(long)]
    pub exclude_me: Option<bool>,
    /// Session ID that must not receive events.
    #[arg(long)]
    pub exclude: Vec<u64>,
    #[arg(long)]
    pub exclude_authid: Vec<String>,
    #[arg(long)]
    pub exclude_authrole: Vec<String>,
    /// Session ID that may receive events.
    #[arg(long)]
    pub eligible: Vec<u64>,
    #[arg(long)]
    pub eligible_authid: Vec<String>,
    #[arg(long)]
    pub eligible_authrole: Vec<String>,
    /// Ask the router to retain the last event for late subscribers.
    #[arg(long)]
    pub retain: bool,
}

impl PublisherArgs {
    pub fn config(&self) -> PublisherConfig {
        PublisherConfig {
            options: PublishOptions {
                acknowledge: self.acknowledge.then_some(true),
                exclude_me: self.exclude_me,
                exclude: self.exclude.clone(),
                exclude_authid: self.exclude_authid.clone(),
                exclude_authrole: self.exclude_authrole.clone(),
                eligible: self.eligible.clone(),
                eligible_authid: self.eligible_authid.clone(),
                eligible_authrole: self.eligible_authrole.clone(),
                retain: self.retain.then_some(true),
            },
            ..PublisherConfig::new(&self.topic)
        }
    }
}

#[derive(Debug, Args)]
pub struct SubscribeArgs {
    /// Path of the session.
    pub session: String,
    pub topic: String,
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long = "match", value_parser = parse_match_style)]
    pub match_style: Option<MatchStyle>,
    /// Print each event as it arrives.
    #[arg(long)]
    pub print: bool,
}

#[derive(Debug, Args)]
pub struct ResubscribeArgs {
    /// Path of the subscription.
    pub target: String,
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub topic: Option<String>,
    #[arg(long = "match", value_parser = parse_match_style)]
    pub match_style: Option<MatchStyle>,
}

impl ResubscribeArgs {
    pub fn apply(&self, config: &mut SubscriptionConfig) {
        if let Some(topic) = &self.topic {
            config.topic = topic.clone();
        }
        if self.match_style.is_some() {
            config.match_style = self.match_style;
        }
    }
}

#[derive(Debug, Args)]
pub struct TargetArgs {
    /// Path of the entity.
    pub target: String,
}

#[derive(Debug, Args)]
pub struct ShowArgs {
    pub kind: EntityKind,
    /// Path of the entity.
    pub path: String,
}

#[derive(Debug, Args)]
pub struct ListArgs {
    pub kind: EntityKind,
    /// Path of the parent entity.
    pub parent: Option<String>,
}

#[derive(Debug, Args)]
pub struct WaitArgs {
    pub kind: EntityKind,
    /// Path of the entity.
    pub path: String,
    /// Give up after this many milliseconds.
    #[arg(long)]
    pub timeout_ms: Option<u64>,
}

#[cfg(test)]
mod command_test {
    use std::time::Duration;

    use battler_wamp_repl::core::{
        arguments::{
            Arguments,
            Slot,
        },
        options::{
            AuthMethod,
            MatchStyle,
        },
    };
    use battler_wamp_values::Value;
    use clap::Parser;

    use crate::{
        command::{
            ArgumentToken,
            Command,
            CommandLine,
            EndpointKind,
            parse_argument,
            parse_value,
        },
        path::EntityKind,
    };

    fn parse(line: &[&str]) -> Command {
        CommandLine::try_parse_from(line).unwrap().command
    }

    #[test]
    fn parses_json_and_bare_values() {
        assert_eq!(parse_value("5").unwrap(), Value::Integer(5));
        assert_eq!(parse_value("true").unwrap(), Value::Bool(true));
        assert_eq!(
            parse_value("hello").unwrap(),
            Value::String("hello".to_owned())
        );
        assert_eq!(
            parse_value(r#""5""#).unwrap(),
            Value::String("5".to_owned())
        );
        assert_eq!(
            parse_value(r#"[1, "a", {"b": false}]"#).unwrap(),
            Value::List(Vec::from_iter([
                Value::Integer(1),
                Value::String("a".to_owned()),
                Value::Dictionary(
                    [("b".to_owned(), Value::Bool(false))]
                        .into_iter()
                        .collect()
                ),
            ]))
        );
    }

    #[test]
    fn parses_null_inside_and_outside_containers() {
        assert_eq!(parse_value("null").unwrap(), Value::Null);
        assert_eq!(
            parse_value(r#"[null, {"a": null}]"#).unwrap(),
            Value::List(Vec::from_iter([
                Value::Null,
                Value::Dictionary([("a".to_owned(), Value::Null)].into_iter().collect()),
            ]))
        );
    }

    #[test]
    fn rejects_unsupported_json_values() {
        assert_matches::assert_matches!(parse_value("-1"), Err(err) => {
            assert!(err.to_string().contains("non-negative integers"), "{err}");
        });
        assert_matches::assert_matches!(parse_value("[1, 2.5]"), Err(_));
    }

    #[test]
    fn parses_keep_and_keyword_arguments() {
        assert_eq!(
            parse_argument("_").unwrap(),
            ArgumentToken::Positional(Slot::Keep)
        );
        assert_eq!(
            parse_argument("count=3").unwrap(),
            ArgumentToken::Keyword("count".to_owned(), Value::Integer(3))
        );
        assert_eq!(
            parse_argument(r#""a=b""#).unwrap(),
            ArgumentToken::Positional(Slot::Value(Value::String("a=b".to_owned())))
        );
    }

    #[test]
    fn parses_invocation_arguments() {
        assert_matches::assert_matches!(
            parse(&["invoke", "local.alice.add", "--name", "first", "2", "3", "verbose=true"]),
            Command::Invoke(args) => {
                assert_eq!(args.target, "local.alice.add");
                assert_eq!(args.name.as_deref(), Some("first"));
                pretty_assertions::assert_eq!(
                    args.arguments().unwrap(),
                    Arguments::positional([Value::Integer(2), Value::Integer(3)])
                        .with_keyword("verbose", Value::Bool(true))
                );
            }
        );
    }

    #[test]
    fn allows_keep_only_when_repeating() {
        assert_matches::assert_matches!(
            parse(&["reinvoke", "local.alice.add.first", "_", "4"]),
            Command::Reinvoke(args) => {
                assert_matches::assert_matches!(args.arguments(), Err(_));
                pretty_assertions::assert_eq!(
                    args.template().apply(
                        &Arguments::positional([Value::Integer(2), Value::Integer(3)])
                    ),
                    Arguments::positional([Value::Integer(2), Value::Integer(4)])
                );
            }
        );
    }

    #[test]
    fn parses_session_options() {
        assert_matches::assert_matches!(
            parse(&[
                "session",
                "local",
                "--authmethod",
                "wamp-scram",
                "--authid",
                "alice",
                "--secret",
                "hunter2",
                "--authextra",
                "device=1",
            ]),
            Command::Session(args) => {
                let config = args.config();
                assert_eq!(config.auth_methods, vec![AuthMethod::WampScram]);
                assert_eq!(config.auth_id.as_deref(), Some("alice"));
                assert_eq!(config.auth_extra.get("device"), Some(&Value::Integer(1)));
                assert_matches::assert_matches!(config.validate(), Ok(()));
            }
        );
        assert_matches::assert_matches!(
            parse(&["session", "local"]),
            Command::Session(args) => {
                assert_eq!(args.config().auth_methods, vec![AuthMethod::Anonymous]);
            }
        );
    }

    #[test]
    fn parses_registration_options() {
        assert_matches::assert_matches!(
            parse(&[
                "register",
                "local.alice",
                "com.example",
                "--match",
                "prefix",
                "--endpoint",
                "constant",
                "--value",
                "[1, 2]",
            ]),
            Command::Register(args) => {
                assert_eq!(args.endpoint, EndpointKind::Constant);
                let config = args.config().unwrap();
                assert_eq!(config.match_style, Some(MatchStyle::Prefix));
                assert_eq!(config.endpoint.kind(), "sync");
            }
        );
        assert_matches::assert_matches!(
            parse(&["register", "local.alice", "com.example.x", "--endpoint", "constant"]),
            Command::Register(args) => {
                assert_matches::assert_matches!(args.config(), Err(_));
            }
        );
    }

    #[test]
    fn parses_call_and_inspection_commands() {
        assert_matches::assert_matches!(
            parse(&["call", "local.alice", "com.example.add", "--timeout-ms", "250"]),
            Command::Call(args) => {
                assert_eq!(args.config().timeout, Some(Duration::from_millis(250)));
            }
        );
        assert_matches::assert_matches!(
            parse(&["wait", "invocation", "local.alice.add.first"]),
            Command::Wait(args) => {
                assert_eq!(args.kind, EntityKind::Invocation);
            }
        );
        assert_matches::assert_matches!(parse(&["list", "connection"]), Command::List(args) => {
            assert_eq!(args.parent, None);
        });
        assert_matches::assert_matches!(parse(&["exit"]), Command::Exit);
        assert_matches::assert_matches!(
            CommandLine::try_parse_from(["frobnicate"]),
            Err(_)
        );
    }
}
