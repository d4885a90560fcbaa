use std::{
    sync::{
        Arc,
        Weak,
    },
    time::Duration,
};

use anyhow::Result;
use async_trait::async_trait;
use futures_util::lock::Mutex;
use log::info;

use crate::{
    backend::{
        CallRequest,
        ProgressHandler,
    },
    core::{
        arguments::{
            ArgumentTemplate,
            Arguments,
        },
        error::{
            NotReadyError,
            SharedError,
        },
        state::{
            ActionState,
            ActionStatus,
            ActionTracker,
        },
    },
    names::registry::Handle,
    rpc::Call,
    session::{
        SessionReadiness,
        run_deferred,
    },
};

/// One invocation of a [`Call`].
pub struct Invocation {
    handle: Handle,
    name: String,
    procedure: String,
    arguments: Arguments,
    timeout: Option<Duration>,
    wants_progress: bool,
    on_progress: Option<Arc<dyn ProgressHandler>>,
    call: Weak<Call>,
    readiness: SessionReadiness,
    state: ActionTracker<Arguments>,
    progress: Mutex<Vec<Arguments>>,
}

impl std::fmt::Debug for Invocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Invocation")
            .field("handle", &self.handle)
            .field("name", &self.name)
            .field("procedure", &self.procedure)
            .field("status", &self.state.status())
            .finish_non_exhaustive()
    }
}

impl Invocation {
    pub(crate) fn new(handle: Handle, name: &str, call: &Arc<Call>, arguments: Arguments) -> Self {
        Self {
            handle,
            name: name.to_owned(),
            procedure: call.procedure().to_owned(),
            arguments,
            timeout: call.config().timeout,
            wants_progress: call.config().wants_progress(),
            on_progress: call.config().on_progress.clone(),
            call: Arc::downgrade(call),
            readiness: call.readiness().clone(),
            state: ActionTracker::new(),
            progress: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn start(self: &Arc<Self>) {
        let invocation = self.clone();
        tokio::spawn(async move {
            let request = CallRequest {
                arguments: invocation.arguments.clone(),
                timeout: invocation.timeout,
                progress: invocation
                    .wants_progress
                    .then(|| invocation.clone() as Arc<dyn ProgressHandler>),
            };
            let procedure = invocation.procedure.clone();
            run_deferred(
                &invocation.readiness,
                &invocation.state,
                &invocation.description(),
                |session| async move { session.call(&procedure, request).await },
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

    /// The procedure that was called.
    pub fn procedure(&self) -> &str {
        &self.procedure
    }

    /// The arguments the procedure was called with.
    pub fn arguments(&self) -> &Arguments {
        &self.arguments
    }

    fn description(&self) -> String {
        format!(
            "Invocation of {} with name {}",
            self.procedure, self.name
        )
    }

    pub fn state(&self) -> ActionState<Arguments> {
        self.state.state()
    }

    pub fn status(&self) -> ActionStatus {
        self.state.status()
    }

    /// The final result, if the call succeeded.
    pub fn result(&self) -> Option<Arguments> {
        self.state.state().result().cloned()
    }

    /// The error, if the call failed or never started.
    pub fn error(&self) -> Option<SharedError> {
        self.state.state().error().cloned()
    }

    /// Progressive results received so far, in arrival order.
    pub async fn progress_results(&self) -> Vec<Arguments> {
        self.progress.lock().await.clone()
    }

    /// Waits for the invocation to finish.
    pub async fn wait(&self) -> ActionState<Arguments> {
        self.state.wait().await
    }

    /// Invokes the same call again, with new arguments laid over this invocation's arguments.
    pub async fn reinvoke(
        &self,
        template: &ArgumentTemplate,
        name: Option<String>,
    ) -> Result<Arc<Invocation>> {
        let call = self.call.upgrade().ok_or_else(|| {
            NotReadyError::new(format!("call for invocation {} no longer exists", self.name))
        })?;
        call.invoke(template.apply(&self.arguments), name).await
    }
}

#[async_trait]
impl ProgressHandler for Invocation {
    async fn progress(&self, arguments: Arguments) {
        let index = {
            let mut progress = self.progress.lock().await;
            progress.push(arguments.clone());
            progress.len() - 1
        };
        info!("{} received progress {index}", self.description());
        if let Some(on_progress) = &self.on_progress {
            on_progress.progress(arguments).await;
        }
    }
}
