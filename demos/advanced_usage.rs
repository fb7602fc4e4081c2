// demos/advanced_usage.rs
// Run with: cargo run --example advanced_usage -- config.json

use remote_file_client::{
    ConnectionConfig, MemoryConnector, RemoteFileClient, RemoteFileError, TransportErrorKind,
    UploadSource,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Example 1: Batch upload with per-item results
    example_batch_upload().await?;

    // Example 2: Caller-side retry around a single operation
    if let Some(path) = std::env::args().nth(1) {
        example_with_retry(ConnectionConfig::from_json_file(path)?).await?;
    }

    Ok(())
}

/// Example 1: Upload several sources, one connection each, and print the
/// structured outcome as JSON
async fn example_batch_upload() -> anyhow::Result<()> {
    println!("\n=== Example 1: Batch Upload ===");

    // In-memory server so the example runs anywhere
    let connector = MemoryConnector::new();
    connector.deny("/outbox/blocked.txt");
    let config = ConnectionConfig::new("memory", 22, "demo", "demo");
    let client = RemoteFileClient::with_connector(config, connector);

    let results = client
        .upload_many(vec![
            (UploadSource::from(b"first".to_vec()), "/outbox/first.txt".to_string()),
            (UploadSource::from(b"second".to_vec()), "/outbox/blocked.txt".to_string()),
            (
                UploadSource::from(PathBuf::from("/does/not/exist.csv")),
                "/outbox/missing.csv".to_string(),
            ),
        ])
        .await;

    println!("{}", serde_json::to_string_pretty(&results)?);
    Ok(())
}

/// Example 2: The client never retries; callers that want resilience wrap
/// calls themselves and only retry failures that look transient
async fn example_with_retry(config: ConnectionConfig) -> anyhow::Result<()> {
    println!("\n=== Example 2: Retry ===");

    let client = RemoteFileClient::new(config);
    let max_retries = 3;
    let mut delay = Duration::from_millis(500);

    for attempt in 1..=max_retries {
        match client.list_files("/incoming").await {
            Ok(files) => {
                println!("Found {} files", files.len());
                return Ok(());
            }
            Err(e) if attempt < max_retries && is_transient(&e) => {
                warn!("Attempt {} failed: {}. Retrying in {:?}", attempt, e, delay);
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

fn is_transient(err: &RemoteFileError) -> bool {
    matches!(
        err.transport_kind(),
        Some(TransportErrorKind::Timeout | TransportErrorKind::Connection)
    )
}
