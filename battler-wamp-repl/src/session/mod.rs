mod config;
mod deferred;
mod readiness;
mod session;

pub use config::SessionConfig;
pub(crate) use deferred::run_deferred;
pub use readiness::{
    Readiness,
    SessionReadiness,
};
pub use session::Session;
