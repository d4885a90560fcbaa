use std::fmt::Display;

use crate::core::error::InvalidConfigError;

/// How a registered procedure or subscribed topic is matched against incoming URIs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStyle {
    Prefix,
    Wildcard,
}

impl MatchStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Prefix => "prefix",
            Self::Wildcard => "wildcard",
        }
    }
}

impl Display for MatchStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for MatchStyle {
    type Error = InvalidConfigError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "prefix" => Ok(Self::Prefix),
            "wildcard" => Ok(Self::Wildcard),
            _ => Err(InvalidConfigError::new(format!(
                "invalid match style: {value}"
            ))),
        }
    }
}

/// An authentication method offered when joining a realm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthMethod {
    Anonymous,
    Ticket,
    WampCra,
    WampScram,
    Cryptosign,
    Undisputed,
}

impl AuthMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Anonymous => "anonymous",
            Self::Ticket => "ticket",
            Self::WampCra => "wampcra",
            Self::WampScram => "wamp-scram",
            Self::Cryptosign => "cryptosign",
            Self::Undisputed => "undisputed",
        }
    }
}

impl Display for AuthMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for AuthMethod {
    type Error = InvalidConfigError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "anonymous" => Ok(Self::Anonymous),
            "ticket" => Ok(Self::Ticket),
            "wampcra" => Ok(Self::WampCra),
            "wamp-scram" => Ok(Self::WampScram),
            "cryptosign" => Ok(Self::Cryptosign),
            "undisputed" => Ok(Self::Undisputed),
            _ => Err(InvalidConfigError::new(format!(
                "invalid authentication method: {value}"
            ))),
        }
    }
}

/// A message serializer offered to the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Serializer {
    Json,
    MessagePack,
}

impl Serializer {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::MessagePack => "msgpack",
        }
    }
}

impl Display for Serializer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for Serializer {
    type Error = InvalidConfigError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "json" => Ok(Self::Json),
            "msgpack" => Ok(Self::MessagePack),
            _ => Err(InvalidConfigError::new(format!(
                "invalid serializer: {value}"
            ))),
        }
    }
}

/// Options for publishing an event.
///
/// Fields left unset use the router's default.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PublishOptions {
    /// Wait for the router to acknowledge the publication.
    pub acknowledge: Option<bool>,
    /// Exclude the publishing session from receiving the event.
    pub exclude_me: Option<bool>,
    /// Session IDs that must not receive the event.
    pub exclude: Vec<u64>,
    pub exclude_authid: Vec<String>,
    pub exclude_authrole: Vec<String>,
    /// Session IDs that may receive the event. Empty means everyone.
    pub eligible: Vec<u64>,
    pub eligible_authid: Vec<String>,
    pub eligible_authrole: Vec<String>,
    /// Ask the router to retain the event for late subscribers.
    pub retain: Option<bool>,
}
