use gantry::config::Config;
use gantry::http::context::Context;
use gantry::http::multipart::FieldValue;
use gantry::http::response::StatusCode;
use gantry::routing::{BoxFuture, HandlerResult, Router};
use gantry::server::Server;
use tracing_subscriber::EnvFilter;

const INDEX: &str = r#"<h1>gantry</h1>
<form action="/upload" method="post" enctype="multipart/form-data">
  <input type="text" name="username">
  <input type="file" name="file">
  <button type="submit">Upload</button>
</form>"#;

fn index(ctx: &mut Context) -> BoxFuture<'_, HandlerResult> {
    Box::pin(async move {
        ctx.html_body(StatusCode::Ok, INDEX);
        Ok(())
    })
}

fn upload(ctx: &mut Context) -> BoxFuture<'_, HandlerResult> {
    Box::pin(async move {
        let fields = ctx.multipart().await?;

        let mut summary = String::new();
        for field in &fields {
            match &field.value {
                FieldValue::Text(value) => {
                    summary.push_str(&format!("{} = {}\n", field.name, value));
                }
                FieldValue::File(path) => {
                    summary.push_str(&format!(
                        "{}: {} ({} bytes)\n",
                        field.name,
                        field.filename.as_deref().unwrap_or(""),
                        field.len
                    ));
                    if let Err(e) = tokio::fs::remove_file(path).await {
                        tracing::warn!(path = %path.display(), error = %e, "Failed to remove upload");
                    }
                }
            }
        }

        ctx.text(StatusCode::Ok, &summary);
        Ok(())
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cfg = Config::load()?;

    let router = Router::builder()
        .get("/", index)
        .post("/upload", upload)
        .build();

    let server = Server::bind(&cfg, router).await?;
    let handle = server.handle();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown signal received");
            handle.stop();
        }
    });

    server.run().await
}
