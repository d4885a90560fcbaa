use std::sync::{
    Arc,
    Weak,
};

use anyhow::Result;

use crate::{
    core::{
        arguments::{
            ArgumentTemplate,
            Arguments,
        },
        error::{
            NotReadyError,
            SharedError,
        },
        options::PublishOptions,
        state::{
            ActionState,
            ActionStatus,
            ActionTracker,
        },
    },
    names::registry::Handle,
    pubsub::Publisher,
    session::{
        SessionReadiness,
        run_deferred,
    },
};

/// One publication made by a [`Publisher`].
pub struct Publication {
    handle: Handle,
    name: String,
    topic: String,
    options: PublishOptions,
    arguments: Arguments,
    publisher: Weak<Publisher>,
    readiness: SessionReadiness,
    state: ActionTracker<()>,
}

impl std::fmt::Debug for Publication {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Publication")
            .field("handle", &self.handle)
            .field("name", &self.name)
            .field("topic", &self.topic)
            .field("status", &self.state.status())
            .finish_non_exhaustive()
    }
}

impl Publication {
    pub(crate) fn new(
        handle: Handle,
        name: &str,
        publisher: &Arc<Publisher>,
        arguments: Arguments,
    ) -> Self {
        Self {
            handle,
            name: name.to_owned(),
            topic: publisher.topic().to_owned(),
            options: publisher.config().options.clone(),
            arguments,
            publisher: Arc::downgrade(publisher),
            readiness: publisher.readiness().clone(),
            state: ActionTracker::new(),
        }
    }

    pub(crate) fn start(self: &Arc<Self>) {
        let publication = self.clone();
        tokio::spawn(async move {
            let topic = publication.topic.clone();
            let arguments = publication.arguments.clone();
            let options = publication.options.clone();
            run_deferred(
                &publication.readiness,
                &publication.state,
                &format!(
                    "Publication to {} with name {}",
                    publication.topic, publication.name
                ),
                |session| async move { session.publish(&topic, arguments, &options).await },
            )
            .await;
        });
    }

    pub fn handle(&self) -> Handle {
        self.handle
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The topic published to.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// The published arguments.
    pub fn arguments(&self) -> &Arguments {
        &self.arguments
    }

    pub fn state(&self) -> ActionState<()> {
        self.state.state()
    }

    pub fn status(&self) -> ActionStatus {
        self.state.status()
    }

    /// The error, if publishing failed or never started.
    pub fn error(&self) -> Option<SharedError> {
        self.state.state().error().cloned()
    }

    /// Waits for the publication to be acknowledged or fail.
    pub async fn wait(&self) -> ActionState<()> {
        self.state.wait().await
    }

    /// Publishes again through the same publisher, with new arguments laid over this
    /// publication's arguments.
    pub async fn republish(
        &self,
        template: &ArgumentTemplate,
        name: Option<String>,
    ) -> Result<Arc<Publication>> {
        let publisher = self.publisher.upgrade().ok_or_else(|| {
            NotReadyError::new(format!(
                "publisher for publication {} no longer exists",
                self.name
            ))
        })?;
        publisher
            .publish(template.apply(&self.arguments), name)
            .await
    }
}
