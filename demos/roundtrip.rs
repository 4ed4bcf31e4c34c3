//! Writes an object, checks it exists, reads it back and lists its prefix.
//!
//! Runs against the backend described by `UNISTORE_*` environment variables
//! (see `Settings::from_env`), or the in-memory backend when none is set:
//!
//! ```sh
//! UNISTORE_BACKEND=gcp UNISTORE_BUCKET=my-bucket \
//!   UNISTORE_SECRET_PATH=/etc/sa.json RUST_LOG=unistore=debug \
//!   cargo run --example roundtrip
//! ```

use std::time::Duration;

use chrono::Utc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use unistore::options::operation_ctx;
use unistore::{Backend, ListQuery, OperationContext, Settings, SignedUrlOptions};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // JSON output for structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let registry = prometheus::Registry::new();
    unistore::metrics::register(&registry)?;

    let mut settings = Settings::from_env()?;
    if settings.backend.is_none() {
        settings.backend = Some(Backend::Memory);
    }
    info!(?settings, "settings loaded");

    let storage = settings.connect(&[]).await?;

    let ctx = || operation_ctx(OperationContext::with_timeout(Duration::from_secs(3)));

    let mut writer = storage.write("demo/hello.txt", &[ctx()]).await?;
    writer.write_all(b"hello from unistore").await?;
    writer.shutdown().await?;

    let exists = storage.is_exists("demo/hello.txt", &[ctx()]).await?;
    info!(exists, "existence checked");

    let mut body = String::new();
    storage
        .read("demo/hello.txt", &[ctx()])
        .await?
        .read_to_string(&mut body)
        .await?;
    info!(%body, "object read back");

    let names = storage.list_object(&ListQuery::new("demo/", "/"), &[ctx()]).await?;
    info!(?names, "listing");

    let request = SignedUrlOptions::new(http::Method::GET, Utc::now() + chrono::Duration::minutes(10));
    match storage.get_signed_url("demo/hello.txt", Some(&request)).await {
        Ok(url) => info!(%url, "signed url"),
        Err(e) => warn!(error = %e, "signed url unavailable"),
    }

    storage.close().await?;

    let families = registry.gather();
    info!(families = families.len(), "metrics gathered");
    Ok(())
}
