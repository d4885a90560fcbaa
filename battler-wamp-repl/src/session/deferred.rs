use std::sync::Arc;

use anyhow::Result;
use log::{
    error,
    info,
};

use crate::{
    backend::ApplicationSession,
    core::state::{
        ActionState,
        ActionTracker,
    },
    session::SessionReadiness,
};

/// Runs an action against a session once it is ready, recording the outcome on the tracker.
///
/// If the session fails, the action never runs and the session's error is recorded as the cause.
pub(crate) async fn run_deferred<T, F, Fut>(
    readiness: &SessionReadiness,
    state: &ActionTracker<T>,
    description: &str,
    action: F,
) where
    T: Clone,
    F: FnOnce(Arc<dyn ApplicationSession>) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let session = match readiness.wait().await {
        Ok(session) => session,
        Err(err) => {
            error!("{description} aborted: {err}");
            state.set(ActionState::Aborted(err));
            return;
        }
    };
    state.set(ActionState::Pending);
    info!("{description} starting");
    match action(session).await {
        Ok(value) => {
            info!("{description} succeeded");
            state.set(ActionState::Succeeded(value));
        }
        Err(err) => {
            error!("{description} failed: {err:#}");
            state.set(ActionState::Failed(err.into()));
        }
    }
}
