//! Connection acceptor.
//!
//! A [`Server`] owns the listening socket and hands every accepted stream to
//! a [`Connection`](crate::http::connection::Connection) task. Its lifecycle
//! is driven through a [`ServerHandle`].

pub mod lifecycle;
pub mod listener;

pub use lifecycle::{ServerHandle, ServerState};
pub use listener::Server;
