//! Command-line client for the stash file store.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use serde::de::IgnoredAny;
use stash_client::{StashClient, TokenAdmin};
use stash_core::ClientConfig;
use std::path::{Path, PathBuf};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "stashctl")]
#[command(about = "Upload, fetch and manage files in a stash file store")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct ClientConfigArgs {
    /// Client config file path
    #[arg(long, env = "STASH_CLIENT_CONFIG")]
    client_config: Option<String>,
}

#[derive(Args, Clone)]
struct ServerArgs {
    /// Store base URL (overrides client config)
    #[arg(long)]
    server: Option<String>,

    /// Skip TLS certificate verification
    #[arg(long, default_value_t = false)]
    insecure: bool,

    #[command(flatten)]
    client: ClientConfigArgs,
}

#[derive(Args, Clone)]
struct ApiArgs {
    /// User token (overrides client config)
    #[arg(long)]
    token: Option<String>,

    #[command(flatten)]
    server: ServerArgs,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a local file
    Upload {
        /// File to upload
        path: PathBuf,
        /// Name to store the file under (defaults to the file name)
        #[arg(long)]
        name: Option<String>,
        /// JSON metadata stored next to the file
        #[arg(long)]
        metadata: Option<String>,
        /// Block size in bytes (overrides client config)
        #[arg(long)]
        block_size: Option<u64>,
        #[command(flatten)]
        api: ApiArgs,
    },
    /// Print the metadata the store holds for a file
    Info {
        /// File identifier
        id: String,
        #[command(flatten)]
        api: ApiArgs,
    },
    /// Download a file
    Download {
        /// File identifier
        id: String,
        /// Directory to write into
        #[arg(long, default_value = ".")]
        dir: PathBuf,
        /// Local file name (defaults to the stored name)
        #[arg(long)]
        name: Option<String>,
        #[command(flatten)]
        api: ApiArgs,
    },
    /// Delete a file
    Delete {
        /// File identifier
        id: String,
        #[command(flatten)]
        api: ApiArgs,
    },
    /// Token administration (requires the service key)
    Token {
        #[command(subcommand)]
        command: TokenCommands,
        #[command(flatten)]
        server: ServerArgs,
    },
}

#[derive(Subcommand)]
enum TokenCommands {
    /// Grant a token to a user
    Grant {
        /// Service key authorizing token administration
        #[arg(long, env = "STASH_SERVICE_KEY", hide_env_values = true)]
        service_key: String,
        /// Token to grant
        #[arg(long)]
        token: String,
        /// User the token belongs to
        #[arg(long)]
        user_id: String,
    },
    /// Revoke a token
    Revoke {
        /// Service key authorizing token administration
        #[arg(long, env = "STASH_SERVICE_KEY", hide_env_values = true)]
        service_key: String,
        /// Token to revoke
        #[arg(long)]
        token: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let Cli { command } = Cli::parse();

    match command {
        Commands::Upload {
            path,
            name,
            metadata,
            block_size,
            api,
        } => handle_upload_command(&path, name, metadata, block_size, &api).await,
        Commands::Info { id, api } => handle_info_command(&id, &api).await,
        Commands::Download { id, dir, name, api } => {
            handle_download_command(&id, &dir, name, &api).await
        }
        Commands::Delete { id, api } => handle_delete_command(&id, &api).await,
        Commands::Token { command, server } => handle_token_command(command, &server).await,
    }
}

async fn handle_upload_command(
    path: &Path,
    name: Option<String>,
    metadata: Option<String>,
    block_size: Option<u64>,
    api: &ApiArgs,
) -> Result<()> {
    check_metadata(metadata.as_deref())?;
    let mut config = resolve_client_config(api).await?;
    if let Some(block_size) = block_size {
        config.block_size = block_size;
    }
    let client = StashClient::new(&config)?;

    let summary = client
        .upload_file(path, name.as_deref(), metadata.as_deref())
        .await
        .with_context(|| format!("failed to upload {}", path.display()))?;

    eprintln!(
        "Uploaded {} blocks ({} new, {} already stored), {} bytes sent",
        summary.manifest.block_count(),
        summary.stats.blocks_uploaded,
        summary.stats.blocks_deduplicated,
        summary.stats.bytes_uploaded,
    );
    println!("{}", summary.file_id);
    Ok(())
}

async fn handle_info_command(id: &str, api: &ApiArgs) -> Result<()> {
    let client = get_client(api).await?;
    match client.file_info(id).await? {
        Some(info) => {
            println!("{}", info.body);
            Ok(())
        }
        None => anyhow::bail!("file '{}' not found", id),
    }
}

async fn handle_download_command(
    id: &str,
    dir: &Path,
    name: Option<String>,
    api: &ApiArgs,
) -> Result<()> {
    let client = get_client(api).await?;
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("failed to create {}", dir.display()))?;
    let path = client
        .download(id, dir, name.as_deref())
        .await
        .with_context(|| format!("failed to download '{id}'"))?;
    println!("{}", path.display());
    Ok(())
}

async fn handle_delete_command(id: &str, api: &ApiArgs) -> Result<()> {
    let client = get_client(api).await?;
    client.delete(id).await?;
    println!("Deleted {id}");
    Ok(())
}

async fn handle_token_command(command: TokenCommands, server: &ServerArgs) -> Result<()> {
    let config = resolve_server_config(server).await?;
    match command {
        TokenCommands::Grant {
            service_key,
            token,
            user_id,
        } => {
            TokenAdmin::new(&config, &service_key)?
                .grant(&token, &user_id)
                .await
                .context("failed to grant token")?;
            println!("Granted token to {user_id}");
        }
        TokenCommands::Revoke { service_key, token } => {
            TokenAdmin::new(&config, &service_key)?
                .revoke(&token)
                .await
                .context("failed to revoke token")?;
            println!("Revoked token");
        }
    }
    Ok(())
}

async fn get_client(api: &ApiArgs) -> Result<StashClient> {
    let config = resolve_client_config(api).await?;
    Ok(StashClient::new(&config)?)
}

/// Config file and environment, then command-line overrides, then checks.
async fn resolve_client_config(api: &ApiArgs) -> Result<ClientConfig> {
    let mut config = resolve_server_config(&api.server).await?;
    if let Some(token) = &api.token {
        config.token = token.clone();
    }
    if config.token.is_empty() {
        anyhow::bail!("token required: use --token, STASH_TOKEN or the client config");
    }
    Ok(config)
}

async fn resolve_server_config(server: &ServerArgs) -> Result<ClientConfig> {
    let config_path = client_config_path(server.client.client_config.as_deref())?;
    let mut config = load_client_config(&config_path).await?;

    if let Some(url) = &server.server {
        config.server_url = url.clone();
    }
    if server.insecure {
        config.accept_invalid_certs = true;
    }
    if config.server_url.is_empty() {
        anyhow::bail!("server URL required: use --server, STASH_SERVER_URL or the client config");
    }
    if !config.server_url.starts_with("http://") && !config.server_url.starts_with("https://") {
        anyhow::bail!("server URL must start with http:// or https://");
    }
    tracing::debug!(
        path = %config_path.display(),
        server = %config.server_url,
        block_size = config.block_size,
        "client configuration resolved"
    );
    Ok(config)
}

fn client_config_path(explicit: Option<&str>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(PathBuf::from(path));
    }

    if let Some(path) = std::env::var_os("STASH_CLIENT_CONFIG") {
        return Ok(PathBuf::from(path));
    }

    let base = match std::env::var_os("XDG_CONFIG_HOME") {
        Some(path) => PathBuf::from(path),
        None => {
            let home = std::env::var_os("HOME")
                .ok_or_else(|| anyhow::anyhow!("HOME not set; set STASH_CLIENT_CONFIG"))?;
            PathBuf::from(home).join(".config")
        }
    };

    Ok(base.join("stash").join("client.toml"))
}

async fn load_client_config(path: &Path) -> Result<ClientConfig> {
    let mut figment = Figment::new();

    if tokio::fs::try_exists(path).await.unwrap_or(false) {
        figment = figment.merge(Toml::file(path));
    }

    figment = figment.merge(Env::prefixed("STASH_").split("__"));

    figment
        .extract()
        .map_err(|err| anyhow::anyhow!(err).context("failed to load client configuration"))
}

/// Reject malformed `--metadata` before any block is sent. The text itself
/// is uploaded unchanged.
fn check_metadata(raw: Option<&str>) -> Result<()> {
    if let Some(text) = raw {
        serde_json::from_str::<IgnoredAny>(text).context("--metadata must be valid JSON")?;
    }
    Ok(())
}
