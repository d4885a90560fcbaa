use std::sync::Arc;

use anyhow::{
    Error,
    Result,
};
use tokio::sync::watch;

use crate::{
    backend::ApplicationSession,
    core::error::SharedError,
};

/// The readiness of a session.
#[derive(Clone)]
pub enum Readiness {
    /// The session is still being established.
    Establishing,
    Ready(Arc<dyn ApplicationSession>),
    Failed(SharedError),
}

impl Readiness {
    /// Checks if the session was resolved, one way or the other.
    pub fn is_resolved(&self) -> bool {
        !matches!(self, Self::Establishing)
    }
}

impl std::fmt::Debug for Readiness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Establishing => write!(f, "Establishing"),
            Self::Ready(_) => write!(f, "Ready"),
            Self::Failed(error) => f.debug_tuple("Failed").field(error).finish(),
        }
    }
}

/// A signal that resolves once, when a session is established or fails to establish.
///
/// Every action against the session waits on this signal before reaching the application
/// session.
#[derive(Debug, Clone)]
pub struct SessionReadiness {
    readiness_rx: watch::Receiver<Readiness>,
}

impl SessionReadiness {
    /// Creates a new unresolved signal, along with the resolver that resolves it.
    pub(crate) fn new() -> (ReadinessResolver, Self) {
        let (readiness_tx, readiness_rx) = watch::channel(Readiness::Establishing);
        (
            ReadinessResolver { readiness_tx },
            Self { readiness_rx },
        )
    }

    /// The current readiness.
    pub fn current(&self) -> Readiness {
        self.readiness_rx.borrow().clone()
    }

    /// Waits for the signal to resolve.
    ///
    /// Returns the application session if it was established, or the shared establishment error
    /// if not.
    pub async fn wait(&self) -> Result<Arc<dyn ApplicationSession>, SharedError> {
        let mut readiness_rx = self.readiness_rx.clone();
        let readiness = readiness_rx
            .wait_for(|readiness| readiness.is_resolved())
            .await
            .map(|readiness| readiness.clone())
            .unwrap_or_else(|_| {
                Readiness::Failed(SharedError::from(Error::msg(
                    "session establishment was abandoned",
                )))
            });
        match readiness {
            Readiness::Ready(session) => Ok(session),
            Readiness::Failed(error) => Err(error),
            Readiness::Establishing => Err(SharedError::from(Error::msg(
                "session is still establishing",
            ))),
        }
    }

    /// The application session, if the session is already established.
    pub fn session(&self) -> Option<Arc<dyn ApplicationSession>> {
        match &*self.readiness_rx.borrow() {
            Readiness::Ready(session) => Some(session.clone()),
            _ => None,
        }
    }
}

/// Resolves a [`SessionReadiness`].
///
/// Resolving consumes the resolver, so the signal can only resolve once.
pub(crate) struct ReadinessResolver {
    readiness_tx: watch::Sender<Readiness>,
}

impl ReadinessResolver {
    pub fn resolve(self, result: Result<Arc<dyn ApplicationSession>, SharedError>) {
        let readiness = match result {
            Ok(session) => Readiness::Ready(session),
            Err(error) => Readiness::Failed(error),
        };
        self.readiness_tx.send_replace(readiness);
    }
}
