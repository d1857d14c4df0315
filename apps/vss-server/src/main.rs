//! vss-server – line-oriented JSON command server.
//!
//! Reads one JSON request object per stdin line, authorizes it against an
//! optional capability token, runs it through [`vss_kernel::CommandProcessor`],
//! and writes the response envelope to stdout. `subscribe` additionally
//! spawns a thread that prints each notification as it arrives, so a client
//! piping stdin/stdout sees live updates interleaved with command replies.
//!
//! Usage:
//!   $ vss-server --tree vss.json --overlays overlays/ --rs256-public-key pub.pem
//!   $ vss-server --tree vss.json --hs256-secret supersecret

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde_json::{json, Value as Json};
use tracing::Level;
use uuid::Uuid;

use vss_auth::{hs256::JwtHs256Validator, rs256::JwtRs256Validator, TokenValidator};
use vss_bus::SubscriptionRegistry;
use vss_kernel::{CommandOutcome, CommandProcessor};
use vss_store::RecordingTree;
use vss_store_core::TreeBackend;
use vss_types::Channel;

#[derive(Parser)]
#[command(
    name = "vss-server",
    version = env!("CARGO_PKG_VERSION"),
    about = "Capability-gated Vehicle Signal Specification signal server",
    propagate_version = true
)]
struct Cli {
    /// Base VSS tree document (JSON).
    #[arg(long)]
    tree: PathBuf,

    /// Directory of overlay JSON documents, applied in filename order after
    /// the base tree is loaded.
    #[arg(long)]
    overlays: Option<PathBuf>,

    /// PEM-encoded RSA public key for RS256 token verification (default
    /// algorithm). Mutually exclusive with `--hs256-secret`.
    #[arg(long)]
    rs256_public_key: Option<PathBuf>,

    /// Shared HS256 secret for token verification, used instead of RS256
    /// when no RSA key pair is available.
    #[arg(long)]
    hs256_secret: Option<String>,

    /// Append every successful `set` to this CSV file (timestamp,path,attribute,value).
    #[arg(long)]
    record_csv: Option<PathBuf>,
}

fn load_validator(cli: &Cli) -> Result<Option<Arc<dyn TokenValidator>>> {
    match (&cli.rs256_public_key, &cli.hs256_secret) {
        (Some(_), Some(_)) => bail!("pass only one of --rs256-public-key or --hs256-secret"),
        (Some(path), None) => {
            let pem = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
            let validator = JwtRs256Validator::from_pem(&pem).map_err(|e| anyhow::anyhow!(e.to_string()))?;
            Ok(Some(Arc::new(validator)))
        }
        (None, Some(secret)) => Ok(Some(Arc::new(JwtHs256Validator::new(secret.clone().into_bytes())))),
        (None, None) => Ok(None),
    }
}

fn gather_overlay_files(dir: &PathBuf) -> Result<Vec<PathBuf>> {
    let mut paths: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("reading overlay directory {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("json"))
        .collect();
    paths.sort();
    Ok(paths)
}

/// Build the channel a request line authorizes under. No token yields an
/// anonymous (authorized = false, no grants) channel, so every command short
/// of a schema error is rejected with `NoPermission` — the same shape the
/// original unauthenticated-websocket state takes.
async fn channel_for_token(validator: Option<&Arc<dyn TokenValidator>>, token: Option<&str>) -> Channel {
    let mut channel = Channel::anonymous();
    let (Some(validator), Some(token)) = (validator, token) else {
        return channel;
    };
    match validator.validate(token).await {
        Ok(claims) => {
            channel.authorized = true;
            channel.token_expiry_ms = Some(claims.expires_at * 1000);
            channel.permissions = claims.permissions;
        }
        Err(e) => {
            tracing::warn!(error = %e, "rejecting request with invalid capability token");
        }
    }
    channel
}

fn main() -> Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_target(false)
        .try_init();

    let cli = Cli::parse();
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("building the token-validation runtime")?;

    let validator = load_validator(&cli)?;

    let tree_json: Json = serde_json::from_str(
        &fs::read_to_string(&cli.tree).with_context(|| format!("reading {}", cli.tree.display()))?,
    )
    .context("parsing base tree document")?;

    let store = vss_store::TreeStore::new();
    store.init(tree_json).context("loading base tree")?;

    let backend: Arc<dyn TreeBackend> = match &cli.record_csv {
        Some(csv_path) => Arc::new(RecordingTree::new(store, csv_path).context("opening CSV recorder")?),
        None => Arc::new(store),
    };

    let internal = Channel::internal_privilege();
    let subscriptions = Arc::new(SubscriptionRegistry::new());
    let processor = CommandProcessor::new(backend, subscriptions);

    if let Some(dir) = &cli.overlays {
        for path in gather_overlay_files(dir)? {
            let data: Json = serde_json::from_str(
                &fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?,
            )
            .with_context(|| format!("parsing overlay {}", path.display()))?;
            let request = json!({
                "action": "updateVSSTree",
                "requestId": Uuid::new_v4().to_string(),
                "path": "*",
                "data": data,
            });
            let outcome = processor.process(&internal, &request);
            if let Some(error) = outcome.response().get("error") {
                bail!("applying overlay {}: {error}", path.display());
            }
            tracing::info!(overlay = %path.display(), "overlay applied");
        }
    }

    tracing::info!("vss-server ready");
    run_command_loop(&processor, validator.as_ref(), &rt)
}

fn run_command_loop(
    processor: &CommandProcessor,
    validator: Option<&Arc<dyn TokenValidator>>,
    rt: &tokio::runtime::Runtime,
) -> Result<()> {
    let stdin = io::stdin();
    let stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let request: Json = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                writeln!(
                    &stdout,
                    "{}",
                    json!({ "error": { "number": "400", "reason": "Bad Request", "message": e.to_string() } })
                )?;
                continue;
            }
        };

        let token = request.get("token").and_then(Json::as_str);
        let channel = rt.block_on(channel_for_token(validator, token));

        match processor.process(&channel, &request) {
            CommandOutcome::Response(response) => {
                writeln!(&stdout, "{response}")?;
            }
            CommandOutcome::Subscribed { response, notifications } => {
                writeln!(&stdout, "{response}")?;
                std::thread::spawn(move || {
                    while let Ok(notification) = notifications.recv() {
                        println!(
                            "{}",
                            json!({
                                "subscriptionId": notification.subscription_id.to_string(),
                                "path": notification.path,
                                "attribute": notification.attribute.as_str(),
                                "value": notification.value.data,
                                "timestamp": notification.value.timestamp_ms,
                            })
                        );
                    }
                });
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn overlay_files_are_sorted_by_name() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("20-cabin.json"), "{}").unwrap();
        fs::write(dir.path().join("10-base.json"), "{}").unwrap();
        fs::write(dir.path().join("readme.txt"), "ignored").unwrap();

        let files = gather_overlay_files(&dir.path().to_path_buf()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_owned())
            .collect();
        assert_eq!(names, vec!["10-base.json", "20-cabin.json"]);
    }

    #[tokio::test]
    async fn missing_token_yields_unauthorized_channel() {
        let channel = channel_for_token(None, None).await;
        assert!(!channel.authorized);
        assert!(channel.permissions.is_empty());
    }
}
