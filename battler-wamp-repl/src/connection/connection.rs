use std::sync::Arc;

use anyhow::Result;
use log::info;

use crate::{
    backend::Connector,
    connection::ConnectionConfig,
    names::{
        directory::Directory,
        registry::Handle,
    },
    session::{
        Session,
        SessionConfig,
    },
};

/// A connection to a router, from which sessions are created.
///
/// The connection itself holds no network resources. Each session establishes its own transport.
pub struct Connection {
    handle: Handle,
    name: String,
    config: ConnectionConfig,
    connector: Arc<dyn Connector>,
    sessions: Directory<Session>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("handle", &self.handle)
            .field("name", &self.name)
            .field("uri", &self.config.uri)
            .field("realm", &self.config.realm)
            .finish_non_exhaustive()
    }
}

impl Connection {
    pub(crate) fn new(
        handle: Handle,
        name: &str,
        config: ConnectionConfig,
        connector: Arc<dyn Connector>,
    ) -> Self {
        Self {
            handle,
            name: name.to_owned(),
            config,
            connector,
            sessions: Directory::new("session"),
        }
    }

    /// The handle of the connection.
    pub fn handle(&self) -> Handle {
        self.handle
    }

    /// The name of the connection.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Sessions created on this connection.
    pub fn sessions(&self) -> &Directory<Session> {
        &self.sessions
    }

    /// Creates a new session, which immediately starts establishing.
    ///
    /// Invalid configuration fails before anything is scheduled.
    pub async fn session(&self, config: SessionConfig, name: Option<String>) -> Result<Arc<Session>> {
        config.validate()?;
        let session = self
            .sessions
            .insert_with(name, |handle, name| {
                Session::new(handle, name, &self.config, config, self.connector.clone())
            })
            .await?;
        info!("Generating {}", session.description());
        Ok(session)
    }
}
