use std::{
    fmt::Display,
    sync::Arc,
};

use anyhow::Error;
use thiserror::Error;

/// An error for a name or handle that does not exist in a registry.
#[derive(Debug, Error)]
#[error("no {kind} named {key}")]
pub struct UnknownNameError {
    kind: &'static str,
    key: String,
}

impl UnknownNameError {
    pub fn new<S>(kind: &'static str, key: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            kind,
            key: key.into(),
        }
    }

    /// The kind of entity that was looked up.
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// The key that was not found.
    pub fn key(&self) -> &str {
        &self.key
    }
}

/// An error for invalid configuration, detected before any asynchronous work is scheduled.
#[derive(Debug, Error)]
#[error("{msg}")]
pub struct InvalidConfigError {
    msg: String,
}

impl InvalidConfigError {
    pub fn new<S>(msg: S) -> Self
    where
        S: Into<String>,
    {
        Self { msg: msg.into() }
    }
}

/// An error for an operation on an entity that is not in the right state for it.
#[derive(Debug, Error)]
#[error("{msg}")]
pub struct NotReadyError {
    msg: String,
}

impl NotReadyError {
    pub fn new<S>(msg: S) -> Self
    where
        S: Into<String>,
    {
        Self { msg: msg.into() }
    }
}

/// An error for a session that could not be established.
#[derive(Debug, Error)]
#[error("session {session} failed to establish")]
pub struct SessionFailedError {
    session: String,
}

impl SessionFailedError {
    pub fn new<S>(session: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            session: session.into(),
        }
    }
}

/// An error that can be cloned and shared among many observers.
///
/// A session failure is recorded on every action that was waiting on the session, so all of them
/// hold the same underlying error.
#[derive(Debug, Clone)]
pub struct SharedError(Arc<Error>);

impl SharedError {
    /// The underlying error.
    pub fn error(&self) -> &Error {
        &self.0
    }

    /// Checks if two shared errors are the same error.
    pub fn same_as(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Attempts to downcast the underlying error.
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: Display + std::fmt::Debug + Send + Sync + 'static,
    {
        self.0.downcast_ref::<E>()
    }
}

impl Display for SharedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#}", self.0)
    }
}

impl std::error::Error for SharedError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

impl From<Error> for SharedError {
    fn from(value: Error) -> Self {
        Self(Arc::new(value))
    }
}
