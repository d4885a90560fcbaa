use std::{
    fmt::Display,
    sync::Arc,
};

use anyhow::Result;
use battler_wamp_repl::{
    connection::{
        Connection,
        ConnectionManager,
    },
    pubsub::{
        Event,
        Publication,
        Publisher,
        Subscription,
    },
    rpc::{
        Call,
        Hit,
        Invocation,
        Registration,
    },
    session::Session,
};
use clap::ValueEnum;
use thiserror::Error;

/// A kind of entity addressable from the shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EntityKind {
    Connection,
    Session,
    Call,
    Invocation,
    Registration,
    Hit,
    Publisher,
    Publication,
    Subscription,
    Event,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connection => "connection",
            Self::Session => "session",
            Self::Call => "call",
            Self::Invocation => "invocation",
            Self::Registration => "registration",
            Self::Hit => "hit",
            Self::Publisher => "publisher",
            Self::Publication => "publication",
            Self::Subscription => "subscription",
            Self::Event => "event",
        }
    }

    /// The kind of the parent entity, if any.
    pub fn parent(&self) -> Option<Self> {
        match self {
            Self::Connection => None,
            Self::Session => Some(Self::Connection),
            Self::Call | Self::Registration | Self::Publisher | Self::Subscription => {
                Some(Self::Session)
            }
            Self::Invocation => Some(Self::Call),
            Self::Hit => Some(Self::Registration),
            Self::Publication => Some(Self::Publisher),
            Self::Event => Some(Self::Subscription),
        }
    }

    /// The number of segments in a path to this kind of entity.
    pub fn depth(&self) -> usize {
        match self.parent() {
            Some(parent) => parent.depth() + 1,
            None => 1,
        }
    }

    /// The shape of a path to this kind of entity.
    pub fn form(&self) -> String {
        match self.parent() {
            Some(parent) => format!("{}.{}", parent.form(), self.as_str()),
            None => self.as_str().to_owned(),
        }
    }
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error for a path that does not have the shape of the requested kind.
#[derive(Debug, Error)]
#[error("{path} is not a {kind} path (expected {form})")]
pub struct PathError {
    path: String,
    kind: EntityKind,
    form: String,
}

impl PathError {
    fn new(path: &str, kind: EntityKind) -> Self {
        Self {
            path: path.to_owned(),
            kind,
            form: kind.form(),
        }
    }
}

/// Splits a path into its segments, checking its shape against the kind.
pub fn split(path: &str, kind: EntityKind) -> Result<Vec<&str>, PathError> {
    let segments = path.split('.').collect::<Vec<_>>();
    if segments.len() != kind.depth() || segments.iter().any(|segment| segment.is_empty()) {
        return Err(PathError::new(path, kind));
    }
    Ok(segments)
}

/// The path of the parent entity.
pub fn parent(path: &str) -> &str {
    path.rsplit_once('.').map(|(parent, _)| parent).unwrap_or("")
}

/// Joins a child name onto a path.
pub fn join(path: &str, name: &str) -> String {
    if path.is_empty() {
        name.to_owned()
    } else {
        format!("{path}.{name}")
    }
}

/// Resolves dotted paths of names or handles (e.g., `local.alice.#2`) to entities.
pub struct Resolver<'a> {
    manager: &'a ConnectionManager,
}

impl<'a> Resolver<'a> {
    pub fn new(manager: &'a ConnectionManager) -> Self {
        Self { manager }
    }

    async fn connection_at(&self, segments: &[&str]) -> Result<Arc<Connection>> {
        self.manager.connections().get(segments[0]).await
    }

    async fn session_at(&self, segments: &[&str]) -> Result<Arc<Session>> {
        self.connection_at(segments)
            .await?
            .sessions()
            .get(segments[1])
            .await
    }

    async fn call_at(&self, segments: &[&str]) -> Result<Arc<Call>> {
        self.session_at(segments).await?.calls().get(segments[2]).await
    }

    async fn registration_at(&self, segments: &[&str]) -> Result<Arc<Registration>> {
        self.session_at(segments)
            .await?
            .registrations()
            .get(segments[2])
            .await
    }

    async fn publisher_at(&self, segments: &[&str]) -> Result<Arc<Publisher>> {
        self.session_at(segments)
            .await?
            .publishers()
            .get(segments[2])
            .await
    }

    async fn subscription_at(&self, segments: &[&str]) -> Result<Arc<Subscription>> {
        self.session_at(segments)
            .await?
            .subscriptions()
            .get(segments[2])
            .await
    }

    pub async fn connection(&self, path: &str) -> Result<Arc<Connection>> {
        self.connection_at(&split(path, EntityKind::Connection)?)
            .await
    }

    pub async fn session(&self, path: &str) -> Result<Arc<Session>> {
        self.session_at(&split(path, EntityKind::Session)?).await
    }

    pub async fn call(&self, path: &str) -> Result<Arc<Call>> {
        self.call_at(&split(path, EntityKind::Call)?).await
    }

    pub async fn invocation(&self, path: &str) -> Result<Arc<Invocation>> {
        let segments = split(path, EntityKind::Invocation)?;
        self.call_at(&segments)
            .await?
            .invocations()
            .get(segments[3])
            .await
    }

    pub async fn registration(&self, path: &str) -> Result<Arc<Registration>> {
        self.registration_at(&split(path, EntityKind::Registration)?)
            .await
    }

    pub async fn hit(&self, path: &str) -> Result<Hit> {
        let segments = split(path, EntityKind::Hit)?;
        self.registration_at(&segments)
            .await?
            .hit(segments[3])
            .await
    }

    pub async fn publisher(&self, path: &str) -> Result<Arc<Publisher>> {
        self.publisher_at(&split(path, EntityKind::Publisher)?)
            .await
    }

    pub async fn publication(&self, path: &str) -> Result<Arc<Publication>> {
        let segments = split(path, EntityKind::Publication)?;
        self.publisher_at(&segments)
            .await?
            .publications()
            .get(segments[3])
            .await
    }

    pub async fn subscription(&self, path: &str) -> Result<Arc<Subscription>> {
        self.subscription_at(&split(path, EntityKind::Subscription)?)
            .await
    }

    pub async fn event(&self, path: &str) -> Result<Event> {
        let segments = split(path, EntityKind::Event)?;
        self.subscription_at(&segments)
            .await?
            .recorded_event(segments[3])
            .await
    }

    /// Names of the children of the given kind under the parent path.
    pub async fn children(&self, kind: EntityKind, parent: &str) -> Result<Vec<String>> {
        let names = match kind {
            EntityKind::Connection => self.manager.connections().names().await,
            EntityKind::Session => self.connection(parent).await?.sessions().names().await,
            EntityKind::Call => self.session(parent).await?.calls().names().await,
            EntityKind::Registration => self.session(parent).await?.registrations().names().await,
            EntityKind::Publisher => self.session(parent).await?.publishers().names().await,
            EntityKind::Subscription => self.session(parent).await?.subscriptions().names().await,
            EntityKind::Invocation => self.call(parent).await?.invocations().names().await,
            EntityKind::Publication => self.publisher(parent).await?.publications().names().await,
            EntityKind::Hit => self.registration(parent).await?.hit_names().await,
            EntityKind::Event => self.subscription(parent).await?.event_names().await,
        };
        Ok(names)
    }

    /// Every path in the tree, used for completion.
    pub async fn all_paths(&self) -> Vec<String> {
        let mut paths = Vec::new();
        for (_, connection_name, connection) in self.manager.connections().entries().await {
            for (_, session_name, session) in connection.sessions().entries().await {
                let session_path = format!("{connection_name}.{session_name}");
                for (_, name, call) in session.calls().entries().await {
                    let path = join(&session_path, &name);
                    paths.extend(
                        call.invocations()
                            .names()
                            .await
                            .into_iter()
                            .map(|name| join(&path, &name)),
                    );
                    paths.push(path);
                }
                for name in session.registrations().names().await {
                    paths.push(join(&session_path, &name));
                }
                for (_, name, publisher) in session.publishers().entries().await {
                    let path = join(&session_path, &name);
                    paths.extend(
                        publisher
                            .publications()
                            .names()
                            .await
                            .into_iter()
                            .map(|name| join(&path, &name)),
                    );
                    paths.push(path);
                }
                for name in session.subscriptions().names().await {
                    paths.push(join(&session_path, &name));
                }
                paths.push(session_path);
            }
            paths.push(connection_name);
        }
        paths.sort();
        paths
    }
}
