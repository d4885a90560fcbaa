use std::sync::Arc;

use anyhow::Result;
use log::info;

use crate::{
    backend::Connector,
    connection::{
        Connection,
        ConnectionConfig,
    },
    names::directory::Directory,
};

/// The root of all entities, owning every connection.
pub struct ConnectionManager {
    connector: Arc<dyn Connector>,
    connections: Directory<Connection>,
}

impl ConnectionManager {
    /// Creates a new connection manager.
    ///
    /// The connector establishes every session created below this manager.
    pub fn new(connector: Box<dyn Connector>) -> Self {
        Self {
            connector: Arc::from(connector),
            connections: Directory::new("connection"),
        }
    }

    /// Connections owned by the manager.
    pub fn connections(&self) -> &Directory<Connection> {
        &self.connections
    }

    /// Creates a new connection.
    ///
    /// Invalid configuration fails before anything is scheduled.
    pub async fn connect(
        &self,
        config: ConnectionConfig,
        name: Option<String>,
    ) -> Result<Arc<Connection>> {
        config.validate()?;
        let connection = self
            .connections
            .insert_with(name, |handle, name| {
                Connection::new(handle, name, config, self.connector.clone())
            })
            .await?;
        info!(
            "Generating connection to {} on realm {} with name {}",
            connection.config().uri,
            connection.config().realm,
            connection.name()
        );
        Ok(connection)
    }
}
