// demos/basic_usage.rs
// Run with: SFTP_CLIENT_HOST=... SFTP_CLIENT_USERNAME=... SFTP_CLIENT_PASSWORD=... \
//           cargo run --example basic_usage

use remote_file_client::{ConnectionConfig, RemoteFileClient, has_prefix};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // 1. Load connection settings from SFTP_CLIENT_* variables
    let config = ConnectionConfig::from_env()?;
    let client = RemoteFileClient::new(config);

    // 2. Upload a local file; missing remote directories are created
    let uploaded = client
        .upload(PathBuf::from("/tmp/report.csv"), "/incoming/2024/report.csv")
        .await?;
    println!("Uploaded {} bytes to {}", uploaded.bytes, uploaded.path);

    // 3. Upload in-memory content
    client
        .upload(b"hello".to_vec(), r"\incoming\2024\hello.txt")
        .await?;

    // 4. List matching files
    let batches = client.list("/incoming/2024", has_prefix("report")).await?;
    for name in &batches {
        println!("  - {name}");
    }

    // 5. Download into a local directory
    let downloaded = client
        .download("/incoming/2024/report.csv", "/tmp/downloads")
        .await?;
    println!("Downloaded to {}", downloaded.path);

    // 6. Move and delete
    client
        .rename("/incoming/2024/hello.txt", "/archive/2024/hello.txt")
        .await?;
    client.delete("/archive/2024/hello.txt").await?;
    println!(
        "hello.txt still present: {}",
        client.exists("/archive/2024/hello.txt").await?
    );

    Ok(())
}
