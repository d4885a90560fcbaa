use std::{
    ops::Deref,
    sync::Arc,
};

use anyhow::Result;
use battler_wamp_uri::Uri;
use log::info;

use crate::{
    core::{
        arguments::Arguments,
        error::InvalidConfigError,
        options::PublishOptions,
    },
    names::{
        directory::Directory,
        registry::Handle,
    },
    pubsub::Publication,
    session::SessionReadiness,
};

/// Configuration for publishing to a topic.
#[derive(Debug, Clone, Default)]
pub struct PublisherConfig {
    pub topic: String,
    pub options: PublishOptions,
}

impl PublisherConfig {
    /// Creates a new configuration for publishing to the topic.
    pub fn new<S>(topic: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            topic: topic.into(),
            ..Default::default()
        }
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), InvalidConfigError> {
        if Uri::try_from(self.topic.as_str()).is_err() {
            return Err(InvalidConfigError::new(format!(
                "invalid topic: {}",
                self.topic
            )));
        }
        Ok(())
    }
}

/// Creates and owns the publishers of a session.
pub struct PublisherManager {
    readiness: SessionReadiness,
    publishers: Directory<Publisher>,
}

impl PublisherManager {
    pub(crate) fn new(readiness: SessionReadiness) -> Self {
        Self {
            readiness,
            publishers: Directory::new("publisher"),
        }
    }

    /// Creates a new publisher.
    ///
    /// Nothing is sent to the router until something is published.
    pub async fn create(
        &self,
        config: PublisherConfig,
        name: Option<String>,
    ) -> Result<Arc<Publisher>> {
        config.validate()?;
        let publisher = self
            .publishers
            .insert_with(name, |handle, name| Publisher {
                handle,
                name: name.to_owned(),
                config,
                readiness: self.readiness.clone(),
                publications: Directory::new("publication"),
            })
            .await?;
        info!(
            "Generating publisher to {} with name {}",
            publisher.topic(),
            publisher.name()
        );
        Ok(publisher)
    }
}

impl Deref for PublisherManager {
    type Target = Directory<Publisher>;

    fn deref(&self) -> &Self::Target {
        &self.publishers
    }
}

/// A reusable publisher to a topic.
///
/// Every publication is kept as its own [`Publication`].
pub struct Publisher {
    handle: Handle,
    name: String,
    config: PublisherConfig,
    readiness: SessionReadiness,
    publications: Directory<Publication>,
}

impl std::fmt::Debug for Publisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Publisher")
            .field("handle", &self.handle)
            .field("name", &self.name)
            .field("topic", &self.config.topic)
            .finish_non_exhaustive()
    }
}

impl Publisher {
    pub fn handle(&self) -> Handle {
        self.handle
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &PublisherConfig {
        &self.config
    }

    /// The topic published to.
    pub fn topic(&self) -> &str {
        &self.config.topic
    }

    /// Publications made by this publisher.
    pub fn publications(&self) -> &Directory<Publication> {
        &self.publications
    }

    pub(crate) fn readiness(&self) -> &SessionReadiness {
        &self.readiness
    }

    /// Publishes an event with the given arguments.
    ///
    /// The event is sent once the session is ready. Its outcome is recorded on the returned
    /// [`Publication`].
    pub async fn publish(
        self: &Arc<Self>,
        arguments: Arguments,
        name: Option<String>,
    ) -> Result<Arc<Publication>> {
        let publication = self
            .publications
            .insert_with(name, |handle, name| {
                Publication::new(handle, name, self, arguments)
            })
            .await?;
        info!(
            "Publishing to {} with name {}",
            self.topic(),
            publication.name()
        );
        publication.start();
        Ok(publication)
    }
}
