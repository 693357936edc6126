//! Gantry - a small HTTP/1.1 server engine
//!
//! Parses requests straight off the socket, routes them to async handlers
//! and writes back one response per connection.

pub mod config;
pub mod http;
pub mod routing;
pub mod server;

pub use config::Config;
pub use http::context::Context;
pub use routing::{Router, RouterBuilder};
pub use server::{Server, ServerHandle};
