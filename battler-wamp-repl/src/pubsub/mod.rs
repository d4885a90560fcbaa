mod publication;
mod publisher;
mod subscription;

pub use publication::Publication;
pub use publisher::{
    Publisher,
    PublisherConfig,
    PublisherManager,
};
pub use subscription::{
    Event,
    EventHandler,
    Subscription,
    SubscriptionConfig,
    SubscriptionManager,
    SyncEventHandler,
};
