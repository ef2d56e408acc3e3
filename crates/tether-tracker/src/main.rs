//! `tether-tracker`: report this device's location to a Tether server.
//!
//! # Usage
//!
//! ```text
//! tether-tracker --server http://localhost:3000 --token <user_id>.<secret> --lat 51.5 --lng -0.12
//! tether-tracker --share-token abc123 --fix-file /run/gps/fix.json --emergency
//! ```
//!
//! Runs until Ctrl-C, then stops tracking and ends any guest share it
//! started.

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result, bail};
use clap::Parser;
use tether_core::{clock::SystemClock, model::LocationFix};
use tether_tracker::{
  ApiClient, ApiConfig, Credentials, FileLocation, LocationSource, Mode,
  StaticLocation, Tracker, settings::TrackerFile, tracker::DEFAULT_FREQUENCY_SECS,
};
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::EnvFilter;

// ─── CLI args ────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "tether-tracker", about = "Share this device's live location")]
struct Args {
  /// Path to a TOML config file.
  #[arg(short, long, value_name = "FILE")]
  config: Option<PathBuf>,

  /// Base URL of the Tether server (default: http://localhost:3000).
  #[arg(long, env = "TETHER_SERVER")]
  server: Option<String>,

  /// User token, `<user_id>.<secret>`.
  #[arg(long, env = "TETHER_TOKEN", conflicts_with = "share_token")]
  token: Option<String>,

  /// Ping as a guest under this share token instead of a user token.
  #[arg(long, env = "TETHER_SHARE_TOKEN")]
  share_token: Option<String>,

  /// Reason recorded when the guest share is registered.
  #[arg(long)]
  share_reason: Option<String>,

  /// Active ping interval in seconds (30-300, rounded to 5).
  #[arg(long)]
  frequency: Option<u64>,

  /// Start in emergency mode (30 s cadence).
  #[arg(long)]
  emergency: bool,

  /// Read each fix from this JSON file.
  #[arg(long, value_name = "FILE", conflicts_with_all = ["lat", "lng"])]
  fix_file: Option<PathBuf>,

  #[arg(long, allow_hyphen_values = true, requires = "lng")]
  lat: Option<f64>,

  #[arg(long, allow_hyphen_values = true, requires = "lat")]
  lng: Option<f64>,

  #[arg(long)]
  accuracy: Option<f64>,
}

// ─── Entry point ─────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let args = Args::parse();
  let file = match &args.config {
    Some(path) => TrackerFile::read(path)?,
    None => TrackerFile::default(),
  };

  // CLI flags override config file, which overrides defaults.
  let base_url = args
    .server
    .or(file.server)
    .unwrap_or_else(|| "http://localhost:3000".to_owned());
  let credentials = match (args.token.or(file.token), args.share_token.or(file.share_token)) {
    (Some(token), _) => Credentials::Bearer(token),
    (None, Some(share_token)) => Credentials::Guest { share_token },
    (None, None) => bail!("either --token or --share-token is required"),
  };
  let client = ApiClient::new(ApiConfig { base_url, credentials })
    .context("failed to build HTTP client")?;

  let share_reason = args.share_reason.or(file.share_reason);
  let frequency = args
    .frequency
    .or(file.frequency_secs)
    .unwrap_or(DEFAULT_FREQUENCY_SECS);

  match args.fix_file.or(file.fix_file) {
    Some(path) => {
      run(FileLocation::new(path), client, share_reason, frequency, args.emergency).await
    }
    None => {
      let (Some(lat), Some(lng)) = (args.lat.or(file.lat), args.lng.or(file.lng)) else {
        bail!("a location is required: --fix-file, or --lat and --lng");
      };
      let fix = LocationFix::new(lat, lng, args.accuracy.or(file.accuracy_m));
      fix.validate().context("invalid --lat/--lng")?;
      run(StaticLocation(fix), client, share_reason, frequency, args.emergency).await
    }
  }
}

async fn run<L: LocationSource>(
  source: L,
  client: ApiClient,
  share_reason: Option<String>,
  frequency: u64,
  emergency: bool,
) -> Result<()> {
  client
    .start_share(share_reason.as_deref())
    .await
    .context("failed to register guest share")?;

  let tracker = Tracker::new(source, client.clone(), Arc::new(SystemClock));
  let applied = tracker.set_frequency(frequency);
  info!(frequency_secs = applied, "tracker configured");

  let started = if emergency {
    tracker.start_emergency().await
  } else {
    tracker.start_active().await
  };

  if let Err(e) = started {
    end_share(&client).await;
    return Err(e).context("failed to start tracking");
  }

  let mut modes = tracker.subscribe();
  tokio::select! {
    signal = tokio::signal::ctrl_c() => {
      signal.context("failed to listen for Ctrl-C")?;
    }
    _ = modes.wait_for(|mode| *mode == Mode::Idle) => {
      warn!(error = ?tracker.state().last_error, "tracking stopped by the server");
    }
  }

  tracker.stop_all();
  end_share(&client).await;
  let state = tracker.state();
  info!(last_ping_at = ?state.last_ping_at, "stopped");
  Ok(())
}

async fn end_share(client: &ApiClient) {
  if let Err(e) = client.end_share().await {
    warn!(error = %e, "failed to end guest share");
  }
}
