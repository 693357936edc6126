use std::path::PathBuf;
use std::sync::Arc;

use tokio::io::{AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::OwnedWriteHalf;
use uuid::Uuid;

use crate::http::context::{BoxedReader, Context};
use crate::http::multipart::MultipartError;
use crate::http::parser::ParseError;
use crate::http::response::Response;
use crate::http::writer::{ResponseFraming, ResponseWriter};
use crate::routing::{RouteMatch, Router};

/// Per-server settings every connection reads.
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    pub cache_dir: PathBuf,
    pub framing: ResponseFraming,
}

/// One accepted connection, serving exactly one request.
pub struct Connection<W> {
    id: Uuid,
    reader: Option<BoxedReader>,
    writer: W,
    router: Arc<Router>,
    settings: Arc<ConnectionSettings>,
    state: ConnectionState,
}

pub enum ConnectionState {
    Reading,
    Processing(Context),
    Writing(Response),
    Closed,
}

impl Connection<OwnedWriteHalf> {
    pub fn new(stream: TcpStream, router: Arc<Router>, settings: Arc<ConnectionSettings>) -> Self {
        let (read_half, write_half) = stream.into_split();
        Self::from_parts(Box::new(BufReader::new(read_half)), write_half, router, settings)
    }
}

impl<W: AsyncWrite + Unpin> Connection<W> {
    pub fn from_parts(
        reader: BoxedReader,
        writer: W,
        router: Arc<Router>,
        settings: Arc<ConnectionSettings>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            reader: Some(reader),
            writer,
            router,
            settings,
            state: ConnectionState::Reading,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Drives parse → dispatch → write → close.
    ///
    /// The response is written even when the handler fails, and the write
    /// side is shut down whatever happened before.
    pub async fn run(&mut self) -> anyhow::Result<()> {
        loop {
            match std::mem::replace(&mut self.state, ConnectionState::Closed) {
                ConnectionState::Reading => {
                    self.state = self.read_request().await;
                }

                ConnectionState::Processing(ctx) => {
                    let response = dispatch(&self.router, ctx).await;
                    self.state = ConnectionState::Writing(response);
                }

                ConnectionState::Writing(response) => {
                    let status = response.status.as_u16();
                    let writer = ResponseWriter::new(response, self.settings.framing);
                    match writer.write_to_stream(&mut self.writer).await {
                        Ok(body_len) => {
                            tracing::trace!(conn = %self.id, status, body_len, "Response written");
                        }
                        Err(e) => {
                            tracing::warn!(conn = %self.id, status, error = %e, "Failed to write response");
                        }
                    }
                    self.state = ConnectionState::Closed;
                }

                ConnectionState::Closed => {
                    if let Err(e) = self.writer.shutdown().await {
                        tracing::debug!(conn = %self.id, error = %e, "Error while closing connection");
                    }
                    break;
                }
            }
        }

        Ok(())
    }

    async fn read_request(&mut self) -> ConnectionState {
        let Some(reader) = self.reader.take() else {
            return ConnectionState::Closed;
        };

        match Context::read(reader, self.settings.cache_dir.clone(), self.id).await {
            Ok(Some(ctx)) => ConnectionState::Processing(ctx),
            Ok(None) => {
                tracing::debug!(conn = %self.id, "Peer closed before sending a request");
                ConnectionState::Closed
            }
            Err(ParseError::Io(e)) => {
                tracing::debug!(conn = %self.id, error = %e, "Read failed before request was complete");
                ConnectionState::Closed
            }
            Err(e) => {
                // Malformed request → protocol error
                tracing::warn!(conn = %self.id, error = %e, "Rejecting malformed request");
                let mut response = Response::new();
                response.bad_request(&e.to_string());
                ConnectionState::Writing(response)
            }
        }
    }
}

/// Runs the matched handler and turns its outcome into a response.
///
/// The handler runs in its own task so that a panic still produces a 500
/// rather than a dropped connection.
async fn dispatch(router: &Router, mut ctx: Context) -> Response {
    let method = ctx.method();
    let path = ctx.path().to_string();
    let conn = ctx.id();

    let response = match router.lookup(method, &path) {
        RouteMatch::Found(handler) => {
            let handler = Arc::clone(handler);
            let task = tokio::spawn(async move {
                let result = handler.handle(&mut ctx).await;
                (ctx, result)
            });

            match task.await {
                Ok((ctx, Ok(()))) => ctx.into_response(),
                Ok((ctx, Err(err))) => {
                    let mut response = ctx.into_response();
                    response.reset();
                    match err.downcast_ref::<MultipartError>() {
                        Some(e) if e.is_client_error() => {
                            tracing::warn!(conn = %conn, method = %method, path = %path, error = %e, "Rejecting multipart body");
                            response.bad_request(&e.to_string());
                        }
                        _ => {
                            tracing::error!(conn = %conn, method = %method, path = %path, error = %err, "Handler failed");
                            response.internal_error(&err.to_string());
                        }
                    }
                    response
                }
                Err(join_err) => {
                    tracing::error!(conn = %conn, method = %method, path = %path, error = %join_err, "Handler panicked");
                    let mut response = Response::new();
                    response.internal_error("handler panicked");
                    response
                }
            }
        }
        RouteMatch::MethodNotAllowed => {
            let mut response = ctx.into_response();
            response.method_not_allowed();
            response
        }
        RouteMatch::NotFound => {
            let mut response = ctx.into_response();
            response.not_found();
            response
        }
    };

    tracing::info!(
        conn = %conn,
        method = %method,
        path = %path,
        status = response.status.as_u16(),
        "Request handled"
    );

    response
}
