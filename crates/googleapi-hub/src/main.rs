mod handlers;
mod protocol;
mod release;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use googleapi::HubConfig;
use handlers::Hub;
use protocol::{JsonRpcRequest, JsonRpcResponse};
use release::TagOutcome;

#[derive(Parser, Debug)]
#[command(name = "googleapi-hub", version, about)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve JSON-RPC requests on stdin/stdout, one per line
    Serve {
        /// Config file (defaults to $GOOGLEAPI_CONFIG or ~/.googleapi/config.json)
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Tag HEAD with v<version> from the manifest unless the tag exists
    ReleaseTag {
        #[arg(long, default_value = "Cargo.toml")]
        manifest: PathBuf,
        /// Push the new tag to origin
        #[arg(long)]
        push: bool,
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout is reserved for JSON-RPC frames
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match args.command {
        Commands::Serve { config } => {
            let config = HubConfig::load(config.as_deref()).await?;
            config.validate()?;
            serve(Hub::new(config)).await
        }
        Commands::ReleaseTag {
            manifest,
            push,
            dry_run,
        } => {
            match release::publish_tag(&manifest, push, dry_run)? {
                TagOutcome::Created(tag) => println!("created {}", tag),
                TagOutcome::AlreadyExists(tag) => println!("exists {}", tag),
                TagOutcome::DryRun(tag) => println!("would create {}", tag),
            }
            Ok(())
        }
    }
}

async fn serve(hub: Hub) -> anyhow::Result<()> {
    info!("Serving JSON-RPC on stdio for domain {}", hub.config().domain);

    let mut reader = BufReader::new(tokio::io::stdin());
    let mut stdout = tokio::io::stdout();
    let mut line = String::new();

    loop {
        line.clear();
        let n = reader.read_line(&mut line).await?;
        if n == 0 {
            break;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let request = match serde_json::from_str::<JsonRpcRequest>(trimmed) {
            Ok(req) => req,
            Err(e) => {
                error!("Unparseable request: {}", e);
                write_response(&mut stdout, &JsonRpcResponse::parse_error(format!("parse error: {}", e)))
                    .await?;
                continue;
            }
        };

        let response = hub.handle(&request).await;
        if request.is_notification() {
            continue;
        }
        write_response(&mut stdout, &response).await?;
    }

    info!("stdin closed, shutting down");
    Ok(())
}

async fn write_response<W: AsyncWrite + Unpin>(
    out: &mut W,
    response: &JsonRpcResponse,
) -> anyhow::Result<()> {
    out.write_all(serde_json::to_string(response)?.as_bytes()).await?;
    out.write_all(b"\n").await?;
    out.flush().await?;
    Ok(())
}
