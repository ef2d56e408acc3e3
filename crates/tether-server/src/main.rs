//! tether-server binary.
//!
//! Reads `tether.toml` (or the path given with `--config`) plus `TETHER_*`
//! environment variables, opens the SQLite store, seeds profiles for the
//! configured users and serves the JSON API.
//!
//! # Token hash generation
//!
//! Tokens are `<user_id>.<secret>`. To produce the `token_hash` for a
//! user's secret:
//!
//! ```text
//! tether-server --hash-token
//! ```

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use clap::Parser;
use tether_core::share::InMemoryShareRegistry;
use tether_server::{
  Argon2TokenVerifier, ServerConfig, ShareBackend, app, seed_profiles,
  settings::{Environment, expand_tilde},
  verifier::hash_secret,
};
use tether_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Tether live location server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "tether.toml")]
  config: PathBuf,

  /// Print the argon2 hash for a token secret entered on stdin and exit.
  #[arg(long)]
  hash_token: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  if cli.hash_token {
    let secret = read_secret()?;
    println!("{}", hash_secret(&secret)?);
    return Ok(());
  }

  let cfg = ServerConfig::load(&cli.config)
    .with_context(|| format!("failed to load config from {:?}", cli.config))?;
  if !cfg.require_auth {
    warn!(
      header = tether_api::auth::DEV_USER_HEADER,
      "dev auth bypass enabled; do not expose this server"
    );
  }
  if cfg.environment == Environment::Production
    && cfg.share_backend == ShareBackend::Memory
  {
    warn!("in-memory share registry is only correct for a single instance");
  }

  let store_path = expand_tilde(&cfg.store_path);
  if let Some(parent) = store_path.parent()
    && !parent.as_os_str().is_empty()
  {
    std::fs::create_dir_all(parent)
      .with_context(|| format!("failed to create {parent:?}"))?;
  }
  let store = Arc::new(
    SqliteStore::open(&store_path)
      .await
      .with_context(|| format!("failed to open store at {store_path:?}"))?,
  );

  seed_profiles(store.as_ref(), &cfg)
    .await
    .context("failed to seed profiles")?;
  let verifier = Arc::new(
    Argon2TokenVerifier::new(&cfg.users).context("invalid users configuration")?,
  );

  let router = match cfg.share_backend {
    ShareBackend::Memory => {
      app(store, Arc::new(InMemoryShareRegistry::new()), verifier, &cfg)
    }
    ShareBackend::Sqlite => app(store.clone(), store, verifier, &cfg),
  };

  let address = cfg.address();
  info!(share_backend = ?cfg.share_backend, "listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, router).await.context("server error")?;

  Ok(())
}

/// Read one line from stdin.
fn read_secret() -> anyhow::Result<String> {
  use std::io::{self, BufRead, Write};
  print!("Token secret: ");
  io::stdout().flush().ok();
  let mut line = String::new();
  io::stdin().lock().read_line(&mut line)?;
  let secret = line.trim_end_matches(['\n', '\r']).to_owned();
  anyhow::ensure!(!secret.is_empty(), "empty secret");
  Ok(secret)
}
