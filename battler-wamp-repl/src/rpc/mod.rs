mod call;
mod endpoint;
mod invocation;
mod registration;

pub use call::{
    Call,
    CallConfig,
    CallManager,
};
pub use endpoint::{
    Endpoint,
    SyncEndpoint,
};
pub use invocation::Invocation;
pub use registration::{
    Hit,
    Registration,
    RegistrationConfig,
    RegistrationManager,
};
