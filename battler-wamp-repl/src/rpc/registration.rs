use std::{
    ops::Deref,
    sync::{
        Arc,
        Weak,
    },
    time::SystemTime,
};

use anyhow::Result;
use async_trait::async_trait;
use battler_wamp_uri::{
    Uri,
    WildcardUri,
};
use futures_util::lock::Mutex;
use log::info;

use crate::{
    backend::{
        InvocationHandler,
        RegisterOptions,
        RegistrationId,
    },
    core::{
        arguments::Arguments,
        error::{
            InvalidConfigError,
            NotReadyError,
            SharedError,
        },
        options::MatchStyle,
        state::{
            ActionState,
            ActionStatus,
            ActionTracker,
        },
    },
    names::{
        directory::Directory,
        log::{
            LogKey,
            NamedLog,
        },
        registry::Handle,
    },
    rpc::Endpoint,
    session::{
        SessionReadiness,
        run_deferred,
    },
};

/// Configuration for a registered procedure.
#[derive(Debug, Clone, Default)]
pub struct RegistrationConfig {
    pub procedure: String,
    pub match_style: Option<MatchStyle>,
    /// Ask the router to disclose the caller's identity.
    pub disclose_caller: bool,
    pub endpoint: Endpoint,
}

impl RegistrationConfig {
    /// Creates a new configuration for registering the procedure.
    pub fn new<S>(procedure: S, endpoint: Endpoint) -> Self
    where
        S: Into<String>,
    {
        Self {
            procedure: procedure.into(),
            endpoint,
            ..Default::default()
        }
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), InvalidConfigError> {
        let valid = match self.match_style {
            Some(MatchStyle::Wildcard) => WildcardUri::try_from(self.procedure.as_str()).is_ok(),
            _ => Uri::try_from(self.procedure.as_str()).is_ok(),
        };
        if !valid {
            return Err(InvalidConfigError::new(format!(
                "invalid procedure: {}",
                self.procedure
            )));
        }
        Ok(())
    }

    fn options(&self) -> RegisterOptions {
        RegisterOptions {
            match_style: self.match_style,
            disclose_caller: self.disclose_caller,
        }
    }
}

/// One invocation of a registered procedure, as received by the endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hit {
    pub timestamp: SystemTime,
    pub arguments: Arguments,
}

/// Creates and owns the registrations of a session.
pub struct RegistrationManager {
    readiness: SessionReadiness,
    registrations: Directory<Registration>,
}

impl RegistrationManager {
    pub(crate) fn new(readiness: SessionReadiness) -> Self {
        Self {
            readiness,
            registrations: Directory::new("registration"),
        }
    }

    /// Registers a procedure once the session is ready.
    pub async fn create(
        self: &Arc<Self>,
        config: RegistrationConfig,
        name: Option<String>,
    ) -> Result<Arc<Registration>> {
        config.validate()?;
        let registration = self
            .registrations
            .insert_with(name, |handle, name| Registration {
                handle,
                name: name.to_owned(),
                config,
                readiness: self.readiness.clone(),
                manager: Arc::downgrade(self),
                hits: Mutex::new(NamedLog::new("hit")),
                state: ActionTracker::new(),
                unregister_state: ActionTracker::new(),
            })
            .await?;
        info!(
            "Generating registration for {} with name {}",
            registration.procedure(),
            registration.name()
        );
        registration.start();
        Ok(registration)
    }
}

impl Deref for RegistrationManager {
    type Target = Directory<Registration>;

    fn deref(&self) -> &Self::Target {
        &self.registrations
    }
}

/// A procedure registered on a session.
///
/// Every invocation from the router is recorded as a [`Hit`] before it reaches the endpoint.
pub struct Registration {
    handle: Handle,
    name: String,
    config: RegistrationConfig,
    readiness: SessionReadiness,
    manager: Weak<RegistrationManager>,
    hits: Mutex<NamedLog<Hit>>,
    state: ActionTracker<RegistrationId>,
    unregister_state: ActionTracker<()>,
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("handle", &self.handle)
            .field("name", &self.name)
            .field("procedure", &self.config.procedure)
            .field("status", &self.state.status())
            .finish_non_exhaustive()
    }
}

impl Registration {
    fn start(self: &Arc<Self>) {
        let registration = self.clone();
        tokio::spawn(async move {
            let procedure = registration.config.procedure.clone();
            let options = registration.config.options();
            let handler = registration.clone() as Arc<dyn InvocationHandler>;
            run_deferred(
                &registration.readiness,
                &registration.state,
                &registration.description("Registration"),
                |session| async move { session.register(&procedure, &options, handler).await },
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

    pub fn config(&self) -> &RegistrationConfig {
        &self.config
    }

    /// The registered procedure.
    pub fn procedure(&self) -> &str {
        &self.config.procedure
    }

    fn description(&self, action: &str) -> String {
        format!(
            "{action} of {} with name {}",
            self.config.procedure, self.name
        )
    }

    /// The state of registering the procedure.
    pub fn state(&self) -> ActionState<RegistrationId> {
        self.state.state()
    }

    pub fn status(&self) -> ActionStatus {
        self.state.status()
    }

    /// The error, if registration failed or never started.
    pub fn error(&self) -> Option<SharedError> {
        self.state.state().error().cloned()
    }

    /// Waits for registration to finish.
    pub async fn wait(&self) -> ActionState<RegistrationId> {
        self.state.wait().await
    }

    /// The state of unregistering the procedure.
    pub fn unregister_state(&self) -> ActionState<()> {
        self.unregister_state.state()
    }

    /// Waits for unregistration to finish.
    pub async fn wait_unregistered(&self) -> ActionState<()> {
        self.unregister_state.wait().await
    }

    /// All hits so far, in arrival order.
    pub async fn hits(&self) -> Vec<Hit> {
        self.hits.lock().await.entries().to_vec()
    }

    /// Looks up a hit by name or index.
    pub async fn hit<K>(&self, key: K) -> Result<Hit>
    where
        K: Into<LogKey>,
    {
        let key = key.into();
        Ok(self.hits.lock().await.get(key)?.clone())
    }

    /// Names of all hits.
    pub async fn hit_names(&self) -> Vec<String> {
        self.hits
            .lock()
            .await
            .names()
            .map(|name| name.to_owned())
            .collect()
    }

    /// Unregisters the procedure.
    ///
    /// Fails immediately if the procedure is not registered yet or was already unregistered.
    pub fn unregister(self: &Arc<Self>) -> Result<()> {
        let id = match self.state.state() {
            ActionState::Succeeded(id) => id,
            state => {
                return Err(NotReadyError::new(format!(
                    "registration {} is {}, not registered",
                    self.name,
                    state.status()
                ))
                .into());
            }
        };
        if !self.unregister_state.start() {
            return Err(NotReadyError::new(format!(
                "registration {} was already unregistered",
                self.name
            ))
            .into());
        }
        let registration = self.clone();
        tokio::spawn(async move {
            run_deferred(
                &registration.readiness,
                &registration.unregister_state,
                &registration.description("Deregistration"),
                |session| async move { session.unregister(id).await },
            )
            .await;
        });
        Ok(())
    }

    /// Registers a new procedure with this registration's configuration, modified by `modify`.
    pub async fn reregister<F>(&self, modify: F, name: Option<String>) -> Result<Arc<Registration>>
    where
        F: FnOnce(&mut RegistrationConfig),
    {
        let manager = self.manager.upgrade().ok_or_else(|| {
            NotReadyError::new(format!(
                "session for registration {} no longer exists",
                self.name
            ))
        })?;
        let mut config = self.config.clone();
        modify(&mut config);
        manager.create(config, name).await
    }
}

#[async_trait]
impl InvocationHandler for Registration {
    async fn invoke(&self, arguments: Arguments) -> Result<Arguments> {
        let timestamp = SystemTime::now();
        let (index, hit) = self.hits.lock().await.push(Hit {
            timestamp,
            arguments: arguments.clone(),
        });
        info!(
            "{} with name {} hit at {timestamp:?} with index {index} and hit name {hit}",
            self.config.procedure, self.name
        );
        self.config.endpoint.invoke(arguments).await
    }
}
