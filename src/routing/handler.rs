use std::future::Future;
use std::pin::Pin;

use crate::http::context::Context;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// What a handler returns. Any error becomes a 500 response carrying its
/// message, except multipart decode errors, which become a 400.
pub type HandlerResult = anyhow::Result<()>;

/// Per-route request handler.
///
/// Implemented for every function or closure of the shape
/// `Fn(&mut Context) -> BoxFuture<'_, HandlerResult>`:
///
/// ```
/// use gantry::http::context::Context;
/// use gantry::http::response::StatusCode;
/// use gantry::routing::{BoxFuture, HandlerResult};
///
/// fn hello(ctx: &mut Context) -> BoxFuture<'_, HandlerResult> {
///     Box::pin(async move {
///         ctx.text(StatusCode::Ok, "hello");
///         Ok(())
///     })
/// }
/// ```
pub trait Handler: Send + Sync + 'static {
    fn handle<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, HandlerResult>;
}

impl<F> Handler for F
where
    F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
{
    fn handle<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, HandlerResult> {
        self(ctx)
    }
}
