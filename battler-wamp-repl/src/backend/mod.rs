mod backend;
mod web_socket;

pub use backend::{
    ApplicationSession,
    CallRequest,
    Connector,
    EventSink,
    InvocationHandler,
    ProgressHandler,
    ReceivedEvent,
    RegisterOptions,
    RegistrationId,
    SubscribeOptions,
    SubscriptionId,
};
pub use web_socket::WebSocketConnector;
