mod config;
mod connection;
mod connection_manager;

pub use config::{
    ConnectionConfig,
    ProxyConfig,
};
pub use connection::Connection;
pub use connection_manager::ConnectionManager;
