use gantry::http::connection::{Connection, ConnectionSettings};
use gantry::http::context::Context;
use gantry::http::response::StatusCode;
use gantry::http::writer::ResponseFraming;
use gantry::routing::{BoxFuture, HandlerResult, Router};
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;

fn hello(ctx: &mut Context) -> BoxFuture<'_, HandlerResult> {
    Box::pin(async move {
        ctx.text(StatusCode::Ok, "hello");
        Ok(())
    })
}

fn greet(ctx: &mut Context) -> BoxFuture<'_, HandlerResult> {
    Box::pin(async move {
        let name = ctx.query_param("name").unwrap_or("stranger").to_string();
        ctx.text(StatusCode::Ok, &format!("hello {name}"));
        Ok(())
    })
}

fn echo(ctx: &mut Context) -> BoxFuture<'_, HandlerResult> {
    Box::pin(async move {
        let body = ctx.body_as_text().await?;
        ctx.text(StatusCode::Ok, &body);
        Ok(())
    })
}

fn save(ctx: &mut Context) -> BoxFuture<'_, HandlerResult> {
    Box::pin(async move {
        let dst = ctx.cache_dir().join("saved.txt");
        let written = ctx.body_copy_to_file(&dst).await?;
        ctx.text(StatusCode::Created, &written.to_string());
        Ok(())
    })
}

fn upload(ctx: &mut Context) -> BoxFuture<'_, HandlerResult> {
    Box::pin(async move {
        let fields = ctx.multipart().await?;
        ctx.text(StatusCode::Ok, &fields.len().to_string());
        Ok(())
    })
}

fn serve_dir(ctx: &mut Context) -> BoxFuture<'_, HandlerResult> {
    Box::pin(async move {
        ctx.serve_file(std::env::temp_dir()).await?;
        Ok(())
    })
}

fn failing(ctx: &mut Context) -> BoxFuture<'_, HandlerResult> {
    Box::pin(async move {
        ctx.text(StatusCode::Ok, "partial output");
        anyhow::bail!("boom")
    })
}

fn panicking(_ctx: &mut Context) -> BoxFuture<'_, HandlerResult> {
    Box::pin(async move { panic!("handler blew up") })
}

fn router() -> Arc<Router> {
    Arc::new(
        Router::builder()
            .get("/hello", hello)
            .get("/greet", greet)
            .post("/echo", echo)
            .post("/save", save)
            .post("/upload", upload)
            .get("/dir", serve_dir)
            .get("/fail", failing)
            .get("/panic", panicking)
            .build(),
    )
}

fn settings(cache_dir: PathBuf, framing: ResponseFraming) -> Arc<ConnectionSettings> {
    Arc::new(ConnectionSettings { cache_dir, framing })
}

async fn serve_with(raw: &[u8], settings: Arc<ConnectionSettings>) -> String {
    let mut out = Vec::new();
    let mut conn = Connection::from_parts(
        Box::new(Cursor::new(raw.to_vec())),
        &mut out,
        router(),
        settings,
    );
    conn.run().await.unwrap();
    drop(conn);
    String::from_utf8(out).unwrap()
}

async fn serve(raw: &[u8]) -> String {
    serve_with(raw, settings(std::env::temp_dir(), ResponseFraming::Standard)).await
}

fn body(raw: &str) -> &str {
    raw.split_once("\r\n\r\n").map(|(_, b)| b).unwrap_or("")
}

#[tokio::test]
async fn test_get_registered_route() {
    let raw = serve(b"GET /hello HTTP/1.1\r\nHost: localhost\r\n\r\n").await;

    assert!(raw.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(raw.contains("Content-Length: 5\r\n"));
    assert!(raw.contains("Content-Type: text/plain\r\n"));
    assert_eq!(body(&raw), "hello");
}

#[tokio::test]
async fn test_query_parameters_reach_handler() {
    let raw = serve(b"GET /greet?name=Ada+L HTTP/1.1\r\n\r\n").await;
    assert_eq!(body(&raw), "hello Ada L");
}

#[tokio::test]
async fn test_unknown_path_is_404() {
    let raw = serve(b"GET /missing HTTP/1.1\r\n\r\n").await;

    assert!(raw.starts_with("HTTP/1.1 404 Not Found\r\n"));
    assert!(body(&raw).contains("404"));
}

#[tokio::test]
async fn test_wrong_method_is_405() {
    let raw = serve(b"POST /hello HTTP/1.1\r\nContent-Length: 0\r\n\r\n").await;

    assert!(raw.starts_with("HTTP/1.1 405 Method Not Allowed\r\n"));
    assert_eq!(body(&raw), "Method Not Allowed");
}

#[tokio::test]
async fn test_invalid_method_is_400() {
    let raw = serve(b"BREW /pot HTTP/1.1\r\n\r\n").await;

    assert!(raw.starts_with("HTTP/1.1 400 Bad Request\r\n"));
    assert!(body(&raw).starts_with("400 Bad Request: "));
}

#[tokio::test]
async fn test_request_line_with_leading_space_is_400() {
    let raw = serve(b" / HTTP/1.1\r\nHost: x\r\n\r\n").await;

    assert!(raw.starts_with("HTTP/1.1 400 Bad Request\r\n"));
    assert!(body(&raw).contains("invalid http method"));
}

#[tokio::test]
async fn test_handler_error_is_500_with_clean_body() {
    let raw = serve(b"GET /fail HTTP/1.1\r\n\r\n").await;

    assert!(raw.starts_with("HTTP/1.1 500 Internal Server Error\r\n"));
    assert_eq!(body(&raw), "500 Internal Server Error: boom");
}

#[tokio::test]
async fn test_serving_a_directory_is_404() {
    let raw = serve(b"GET /dir HTTP/1.1\r\n\r\n").await;

    assert!(raw.starts_with("HTTP/1.1 404 Not Found\r\n"));
    assert_eq!(body(&raw), "404 not found");
}

#[tokio::test]
async fn test_handler_panic_is_500() {
    let raw = serve(b"GET /panic HTTP/1.1\r\n\r\n").await;
    assert!(raw.starts_with("HTTP/1.1 500 Internal Server Error\r\n"));
}

#[tokio::test]
async fn test_body_read_respects_content_length() {
    let raw = serve(b"POST /echo HTTP/1.1\r\nContent-Length: 5\r\n\r\nhelloEXTRA").await;
    assert_eq!(body(&raw), "hello");
}

#[tokio::test]
async fn test_body_without_length_stops_at_blank_line() {
    let raw = serve(b"POST /echo HTTP/1.1\r\n\r\nfirst\r\n\r\nsecond").await;
    assert_eq!(body(&raw), "first");
}

#[tokio::test]
async fn test_body_copy_to_file() {
    let dir = std::env::temp_dir().join(format!("gantry-conn-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();

    let raw = serve_with(
        b"POST /save HTTP/1.1\r\nContent-Length: 13\r\n\r\nsaved\r\n\r\nbody",
        settings(dir.clone(), ResponseFraming::Standard),
    )
    .await;

    assert!(raw.starts_with("HTTP/1.1 201 Created\r\n"));
    assert_eq!(body(&raw), "13");
    assert_eq!(std::fs::read_to_string(dir.join("saved.txt")).unwrap(), "saved\r\n\r\nbody");

    std::fs::remove_dir_all(&dir).unwrap();
}

#[tokio::test]
async fn test_bad_multipart_is_400() {
    let raw = serve(
        b"POST /upload HTTP/1.1\r\nContent-Type: multipart/form-data\r\nContent-Length: 4\r\n\r\nnope",
    )
    .await;

    assert!(raw.starts_with("HTTP/1.1 400 Bad Request\r\n"));
    assert!(body(&raw).contains("boundary"));
}

#[tokio::test]
async fn test_legacy_framing_appends_trailer() {
    let raw = serve_with(
        b"GET /hello HTTP/1.1\r\n\r\n",
        settings(std::env::temp_dir(), ResponseFraming::Legacy),
    )
    .await;

    assert!(raw.contains("Content-Length: 5\r\n"));
    assert!(raw.ends_with("\r\n\r\nhello\r\n\r\n"));
}

#[tokio::test]
async fn test_empty_connection_writes_nothing() {
    let raw = serve(b"").await;
    assert!(raw.is_empty());
}
