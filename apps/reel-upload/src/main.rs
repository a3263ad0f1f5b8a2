//! Command-line reel uploader.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use reelup_transfer::{FileResumeStore, default_store_path};
use reelup_uploader::{
    SessionClient, TusTransport, UploadEvent, UploadOrchestrator, UploadOutcome, UploadRequest,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Uploads a video through a resumable upload session.
///
/// Interrupted uploads of the same file continue where they stopped.
#[derive(Parser, Debug)]
#[command(name = "reel-upload", version)]
struct Cli {
    /// Video file to upload.
    file: PathBuf,

    /// URL of the session issuer.
    #[arg(long, env = "REELUP_ISSUER_URL")]
    issuer_url: String,

    /// Access token of the signed-in user.
    #[arg(long, env = "REELUP_ACCESS_TOKEN", hide_env_values = true)]
    token: String,

    /// File that remembers interrupted uploads.
    #[arg(long)]
    state_file: Option<PathBuf>,

    /// Chunk size in bytes, instead of the one the issuer hands out.
    #[arg(long)]
    chunk_size: Option<u64>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run(cli))
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let file_name = cli.file.file_name().and_then(|n| n.to_str());

    let sessions = SessionClient::new(&cli.issuer_url)?;
    let session = sessions
        .request_session(&cli.token, file_name)
        .await
        .context("requesting upload session")?;
    info!(
        object = %session.object_name,
        endpoint = %session.upload_endpoint,
        "upload session issued"
    );

    let mut request = UploadRequest::from_session(cli.file.clone(), &session, &cli.token);
    if let Some(chunk_size) = cli.chunk_size {
        request.chunk_size = chunk_size;
    }

    let state_path = cli
        .state_file
        .or_else(default_store_path)
        .context("no config directory for resume state, pass --state-file")?;
    let store = FileResumeStore::open(state_path).context("opening resume state")?;

    let orchestrator = UploadOrchestrator::new(Arc::new(TusTransport::new()?), Arc::new(store));
    let mut handle = orchestrator.start(request).await?;

    let cancel = handle.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling upload");
            cancel.cancel();
        }
    });

    let reporter = handle.take_events().map(|mut events| {
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                match event {
                    UploadEvent::Progress(p) => info!(
                        uploaded = p.bytes_uploaded,
                        total = p.bytes_total,
                        percent = %format!("{:.1}", p.percentage()),
                        "progress"
                    ),
                    UploadEvent::Completed {
                        upload_url,
                        metadata,
                    } => info!(
                        url = %upload_url,
                        object = metadata.get("objectName").map(String::as_str).unwrap_or_default(),
                        "upload complete"
                    ),
                    UploadEvent::Failed(e) => error!(error = %e, "upload failed"),
                }
            }
        })
    });

    let outcome = handle.wait().await;
    if let Some(reporter) = reporter {
        let _ = reporter.await;
    }

    match outcome {
        UploadOutcome::Completed { .. } => {
            let object = outcome
                .object_name()
                .unwrap_or(session.object_name.as_str());
            if object != session.object_name {
                warn!(
                    issued = %session.object_name,
                    "resumed an earlier upload, stored under its original key"
                );
            }
            info!(object, "upload stored");
            Ok(())
        }
        UploadOutcome::Failed(e) => Err(anyhow::anyhow!("upload failed: {e}")),
        UploadOutcome::Cancelled => anyhow::bail!("upload cancelled, run again to resume"),
    }
}
