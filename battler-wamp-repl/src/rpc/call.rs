use std::{
    ops::Deref,
    sync::Arc,
    time::Duration,
};

use anyhow::Result;
use battler_wamp_uri::Uri;
use log::info;

use crate::{
    backend::ProgressHandler,
    core::{
        arguments::Arguments,
        error::InvalidConfigError,
    },
    names::{
        directory::Directory,
        registry::Handle,
    },
    rpc::Invocation,
    session::SessionReadiness,
};

/// Configuration for calls to a procedure.
#[derive(Clone, Default)]
pub struct CallConfig {
    pub procedure: String,
    /// Time the router waits for the callee before cancelling the call.
    pub timeout: Option<Duration>,
    /// Ask the callee for progressive results.
    pub receive_progress: bool,
    /// Receives each progressive result, in arrival order.
    ///
    /// Setting a callback implies `receive_progress`.
    pub on_progress: Option<Arc<dyn ProgressHandler>>,
}

impl CallConfig {
    /// Creates a new configuration for calling the procedure.
    pub fn new<S>(procedure: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            procedure: procedure.into(),
            ..Default::default()
        }
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), InvalidConfigError> {
        if Uri::try_from(self.procedure.as_str()).is_err() {
            return Err(InvalidConfigError::new(format!(
                "invalid procedure: {}",
                self.procedure
            )));
        }
        if self.timeout.is_some_and(|timeout| timeout.is_zero()) {
            return Err(InvalidConfigError::new("call timeout cannot be zero"));
        }
        Ok(())
    }

    /// Checks if progressive results are requested.
    pub fn wants_progress(&self) -> bool {
        self.receive_progress || self.on_progress.is_some()
    }
}

impl std::fmt::Debug for CallConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallConfig")
            .field("procedure", &self.procedure)
            .field("timeout", &self.timeout)
            .field("receive_progress", &self.receive_progress)
            .field("on_progress", &self.on_progress.is_some())
            .finish()
    }
}

/// Creates and owns the calls of a session.
pub struct CallManager {
    readiness: SessionReadiness,
    calls: Directory<Call>,
}

impl CallManager {
    pub(crate) fn new(readiness: SessionReadiness) -> Self {
        Self {
            readiness,
            calls: Directory::new("call"),
        }
    }

    /// Creates a new call.
    ///
    /// Nothing is sent to the router until the call is invoked.
    pub async fn create(&self, config: CallConfig, name: Option<String>) -> Result<Arc<Call>> {
        config.validate()?;
        let call = self
            .calls
            .insert_with(name, |handle, name| Call {
                handle,
                name: name.to_owned(),
                config,
                readiness: self.readiness.clone(),
                invocations: Directory::new("invocation"),
            })
            .await?;
        info!(
            "Generating call to {} with name {}",
            call.procedure(),
            call.name()
        );
        Ok(call)
    }
}

impl Deref for CallManager {
    type Target = Directory<Call>;

    fn deref(&self) -> &Self::Target {
        &self.calls
    }
}

/// A reusable call to a procedure.
///
/// Every invocation of the call is kept as its own [`Invocation`].
pub struct Call {
    handle: Handle,
    name: String,
    config: CallConfig,
    readiness: SessionReadiness,
    invocations: Directory<Invocation>,
}

impl std::fmt::Debug for Call {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Call")
            .field("handle", &self.handle)
            .field("name", &self.name)
            .field("procedure", &self.config.procedure)
            .finish_non_exhaustive()
    }
}

impl Call {
    pub fn handle(&self) -> Handle {
        self.handle
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CallConfig {
        &self.config
    }

    /// The procedure being called.
    pub fn procedure(&self) -> &str {
        &self.config.procedure
    }

    /// Invocations of this call.
    pub fn invocations(&self) -> &Directory<Invocation> {
        &self.invocations
    }

    pub(crate) fn readiness(&self) -> &SessionReadiness {
        &self.readiness
    }

    /// Invokes the call with the given arguments.
    ///
    /// The invocation is sent once the session is ready. Its outcome is recorded on the returned
    /// [`Invocation`].
    pub async fn invoke(
        self: &Arc<Self>,
        arguments: Arguments,
        name: Option<String>,
    ) -> Result<Arc<Invocation>> {
        let invocation = self
            .invocations
            .insert_with(name, |handle, name| {
                Invocation::new(handle, name, self, arguments)
            })
            .await?;
        info!(
            "Invoking {} with name {}",
            self.procedure(),
            invocation.name()
        );
        invocation.start();
        Ok(invocation)
    }
}
