use std::fmt::Display;

use tokio::sync::watch;

use crate::core::error::SharedError;

/// The status of a deferred action, without its outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionStatus {
    Created,
    Pending,
    Succeeded,
    Failed,
    Aborted,
}

impl Display for ActionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Pending => write!(f, "pending"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
            Self::Aborted => write!(f, "aborted"),
        }
    }
}

/// The state of an action performed against a session once it is ready.
#[derive(Debug, Clone)]
pub enum ActionState<T> {
    /// Waiting for the session.
    Created,
    /// The session is ready and the protocol action is in flight.
    Pending,
    Succeeded(T),
    /// The protocol action failed.
    Failed(SharedError),
    /// The session failed, so the protocol action never started.
    Aborted(SharedError),
}

impl<T> ActionState<T> {
    /// The status of the action.
    pub fn status(&self) -> ActionStatus {
        match self {
            Self::Created => ActionStatus::Created,
            Self::Pending => ActionStatus::Pending,
            Self::Succeeded(_) => ActionStatus::Succeeded,
            Self::Failed(_) => ActionStatus::Failed,
            Self::Aborted(_) => ActionStatus::Aborted,
        }
    }

    /// Checks if the action reached a terminal state.
    pub fn is_finished(&self) -> bool {
        matches!(
            self,
            Self::Succeeded(_) | Self::Failed(_) | Self::Aborted(_)
        )
    }

    /// The result of the action, if it succeeded.
    pub fn result(&self) -> Option<&T> {
        match self {
            Self::Succeeded(value) => Some(value),
            _ => None,
        }
    }

    /// The error of the action, if it failed or was aborted.
    pub fn error(&self) -> Option<&SharedError> {
        match self {
            Self::Failed(error) | Self::Aborted(error) => Some(error),
            _ => None,
        }
    }
}

/// Observable state of a deferred action.
#[derive(Debug)]
pub struct ActionTracker<T> {
    state_tx: watch::Sender<ActionState<T>>,
}

impl<T> ActionTracker<T>
where
    T: Clone,
{
    pub fn new() -> Self {
        let (state_tx, _) = watch::channel(ActionState::Created);
        Self { state_tx }
    }

    /// The current state.
    pub fn state(&self) -> ActionState<T> {
        self.state_tx.borrow().clone()
    }

    /// The current status.
    pub fn status(&self) -> ActionStatus {
        self.state_tx.borrow().status()
    }

    pub(crate) fn set(&self, state: ActionState<T>) {
        self.state_tx.send_replace(state);
    }

    /// Moves the action from created to pending, returning false if it already left the created
    /// state.
    pub(crate) fn start(&self) -> bool {
        self.state_tx.send_if_modified(|state| match state {
            ActionState::Created => {
                *state = ActionState::Pending;
                true
            }
            _ => false,
        })
    }

    /// Waits for the action to finish, returning its terminal state.
    pub async fn wait(&self) -> ActionState<T> {
        let mut state_rx = self.state_tx.subscribe();
        match state_rx
            .wait_for(|state| state.is_finished())
            .await
            .map(|state| state.clone())
        {
            Ok(state) => state,
            Err(_) => self.state(),
        }
    }
}

impl<T> Default for ActionTracker<T>
where
    T: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}
