//! # battler-wamp-repl
//!
//! **battler-wamp-repl** is the library behind an interactive shell for WAMP routers. It wraps
//! the asynchronous session lifecycle of a WAMP peer in objects that can be created and
//! inspected from a line-oriented shell.
//!
//! Every object (connections, sessions, calls, invocations, registrations, publishers,
//! publications, and subscriptions) is registered under a short name, either given by the
//! operator or generated, and can be looked up by that name or by its handle.
//!
//! Sessions start establishing as soon as they are created. Anything created on a session before
//! it is ready waits for it, then runs exactly once. If the session fails, everything waiting on
//! it is aborted with the same error, and nothing reaches the router.
//!
//! ```no_run
//! use battler_wamp_repl::{
//!     backend::WebSocketConnector,
//!     connection::{
//!         ConnectionConfig,
//!         ConnectionManager,
//!     },
//!     core::arguments::Arguments,
//!     rpc::CallConfig,
//!     session::SessionConfig,
//! };
//! use battler_wamp_values::Value;
//!
//! async fn add() -> anyhow::Result<()> {
//!     let manager = ConnectionManager::new(Box::new(WebSocketConnector::default()));
//!     let connection = manager
//!         .connect(ConnectionConfig::new("ws://localhost:8080/ws", "realm1"), None)
//!         .await?;
//!     let session = connection.session(SessionConfig::anonymous(), None).await?;
//!     let call = session.call(CallConfig::new("com.example.add"), None).await?;
//!     let invocation = call
//!         .invoke(Arguments::positional([Value::Integer(2), Value::Integer(3)]), None)
//!         .await?;
//!     invocation.wait().await;
//!     println!("{:?}", invocation.result());
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod connection;
pub mod core;
pub mod names;
pub mod pubsub;
pub mod rpc;
pub mod session;
