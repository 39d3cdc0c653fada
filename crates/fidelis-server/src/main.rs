//! fidelis-server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`) layered with
//! `FIDELIS_*` environment variables, opens the SQLite store, and serves the
//! JSON API over HTTP.
//!
//! # Provisioning
//!
//! ```
//! cargo run -p fidelis-server -- --create-user admin@parapharm.tn --role ADMIN
//! ```
//!
//! # Offline reconciliation
//!
//! ```
//! cargo run -p fidelis-server -- --reconcile --repair
//! ```

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use clap::Parser;
use fidelis_core::{
  Ledger,
  user::{NewUser, Role},
};
use fidelis_server::{ServerConfig, app, hash_password, provision_user, reconcile_job};
use fidelis_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Fidelis points ledger server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Print the argon2 hash for a password entered on stdin and exit.
  #[arg(long)]
  hash_password: bool,

  /// Create an account with this email (password read from stdin) and exit.
  #[arg(long, value_name = "EMAIL")]
  create_user: Option<String>,

  /// Role of the account created with `--create-user`.
  #[arg(long, default_value = "CLIENT", requires = "create_user")]
  role: Role,

  #[arg(long, requires = "create_user")]
  first_name: Option<String>,

  #[arg(long, requires = "create_user")]
  last_name: Option<String>,

  /// Report users whose cached balance disagrees with their ledger and exit.
  #[arg(long)]
  reconcile: bool,

  /// With `--reconcile`, reset drifted balances to the ledger sum.
  #[arg(long, requires = "reconcile")]
  repair: bool,
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

  if cli.hash_password {
    let password = read_password()?;
    println!("{}", hash_password(&password)?);
    return Ok(());
  }

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config.clone()).required(false))
    .add_source(config::Environment::with_prefix("FIDELIS"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  let store_path = expand_tilde(&server_cfg.store_path);
  if let Some(parent) = store_path.parent()
    && !parent.as_os_str().is_empty()
  {
    std::fs::create_dir_all(parent)
      .with_context(|| format!("failed to create {parent:?}"))?;
  }

  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  if let Some(email) = cli.create_user {
    let password = read_password()?;
    let user = NewUser {
      first_name: cli.first_name,
      last_name: cli.last_name,
      ..NewUser::new(email, cli.role)
    };
    let user = provision_user(&store, user, &password).await?;
    println!("{} {} {}", user.id, user.email, user.role);
    return Ok(());
  }

  if cli.reconcile {
    let drifted = reconcile_job(&store, cli.repair).await?;
    for r in &drifted {
      println!(
        "{}\tcached={}\tledger={}\tdrift={}",
        r.user_id,
        r.cached_balance,
        r.ledger_sum,
        r.drift()
      );
    }
    if !drifted.is_empty() && !cli.repair {
      std::process::exit(1);
    }
    return Ok(());
  }

  let ledger = Ledger::new(Arc::new(store));
  let app = app(ledger, &server_cfg);
  let address = server_cfg.address();

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

/// Read a password line from stdin.
fn read_password() -> anyhow::Result<String> {
  use std::io::{self, BufRead, Write};
  print!("Password: ");
  io::stdout().flush().ok();
  let mut line = String::new();
  io::stdin().lock().read_line(&mut line)?;
  Ok(line.trim_end_matches(['\n', '\r']).to_string())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
