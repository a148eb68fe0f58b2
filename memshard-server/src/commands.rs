use anyhow::Context;
use clap::Subcommand;
use memshard_core::ApiClient;
use std::path::PathBuf;

pub const DEFAULT_API_URL: &str = "http://localhost:8080";

/// Commands that talk to a running API server.
#[derive(Subcommand)]
pub enum ClientCommand {
    /// Upload a file
    Upload {
        /// File to upload
        path: PathBuf,
    },
    /// Download a file
    Download {
        file_id: String,
        /// Where to write the file
        output: PathBuf,
    },
    /// Show a file's metadata
    Info { file_id: String },
    /// Delete a file
    Delete { file_id: String },
    /// List stored file ids
    List,
    /// Show cluster health
    Health,
}

pub async fn run(command: ClientCommand, api_url: &str) -> anyhow::Result<()> {
    let client = ApiClient::new(api_url)
        .with_context(|| format!("failed to create client for {}", api_url))?;

    match command {
        ClientCommand::Upload { path } => {
            let metadata = client
                .upload_file(&path)
                .await
                .with_context(|| format!("failed to upload {}", path.display()))?;
            println!("File uploaded successfully");
            println!("File ID: {}", metadata.id);
            println!("Size: {} bytes", metadata.size);
            println!("Chunks: {}", metadata.chunk_count);
            println!("Checksum: {}", metadata.checksum);
        }
        ClientCommand::Download { file_id, output } => {
            let written = client
                .download_file(&file_id, &output)
                .await
                .with_context(|| format!("failed to download {}", file_id))?;
            println!(
                "File downloaded to {} ({} bytes)",
                output.display(),
                written
            );
        }
        ClientCommand::Info { file_id } => {
            let metadata = client
                .file_info(&file_id)
                .await
                .with_context(|| format!("failed to fetch info for {}", file_id))?;
            println!("{}", serde_json::to_string_pretty(&metadata)?);
        }
        ClientCommand::Delete { file_id } => {
            client
                .delete_file(&file_id)
                .await
                .with_context(|| format!("failed to delete {}", file_id))?;
            println!("File {} deleted", file_id);
        }
        ClientCommand::List => {
            let files = client.list_files().await.context("failed to list files")?;
            if files.is_empty() {
                println!("No files stored");
            }
            for file_id in files {
                println!("{}", file_id);
            }
        }
        ClientCommand::Health => {
            let report = client.health().await.context("failed to check health")?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}
