//! `fidelis` — command-line client for the Fidelis points ledger.
//!
//! # Usage
//!
//! ```
//! fidelis --url http://localhost:8080 --email staff@parapharm.tn --password secret members
//! fidelis --config ~/.config/fidelis/config.toml history <USER_ID> --page 2
//! ```

mod client;
mod render;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use client::{ApiClient, ApiConfig, Paging};
use fidelis_core::order::{OrderStatus, OrderUpdate, PaymentStatus};
use serde::Deserialize;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "fidelis", about = "Command-line client for the Fidelis points ledger")]
struct Args {
  /// Path to a TOML config file (url, email, password).
  #[arg(short, long, value_name = "FILE")]
  config: Option<std::path::PathBuf>,

  /// Base URL of the Fidelis server (default: http://localhost:8080).
  #[arg(long, env = "FIDELIS_URL")]
  url: Option<String>,

  /// Account email.
  #[arg(long, env = "FIDELIS_EMAIL")]
  email: Option<String>,

  /// Account password (plaintext).
  #[arg(long, env = "FIDELIS_PASSWORD")]
  password: Option<String>,

  #[command(subcommand)]
  command: Command,
}

#[derive(clap::Args, Debug)]
struct PageArgs {
  #[arg(long)]
  page:     Option<u32>,
  #[arg(long)]
  limit:    Option<u32>,
  /// Pin later pages to the snapshot printed with the first one.
  #[arg(long)]
  snapshot: Option<i64>,
}

impl From<PageArgs> for Paging {
  fn from(a: PageArgs) -> Self {
    Self { page: a.page, limit: a.limit, snapshot: a.snapshot }
  }
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Show the signed-in account and its balance.
  Me,
  /// List loyalty members by balance (staff).
  Members {
    #[arg(long)]
    search: Option<String>,
    #[command(flatten)]
    paging: PageArgs,
  },
  /// Show a member's points history (your own when no id is given).
  History {
    user_id: Option<Uuid>,
    #[command(flatten)]
    paging:  PageArgs,
  },
  /// Add or deduct points manually (staff).
  Adjust {
    user_id:     Uuid,
    #[arg(allow_negative_numbers = true)]
    points:      i64,
    description: String,
    #[arg(long)]
    reference:   Option<String>,
  },
  /// Spend points.
  Redeem {
    user_id:   Uuid,
    points:    i64,
    #[arg(long)]
    reference: Option<String>,
  },
  /// Compare a member's cached balance with their ledger (staff).
  Reconcile { user_id: Uuid },
  /// Reset a member's cached balance to their ledger sum (admin).
  Repair { user_id: Uuid },
  /// List every member whose cached balance has drifted (staff).
  Drift,
  /// Change an order's status; credits or reverses points as needed (staff).
  OrderStatus {
    order_id:       Uuid,
    #[arg(long)]
    status:         Option<OrderStatus>,
    #[arg(long)]
    payment_status: Option<PaymentStatus>,
  },
  /// Credit the points of a delivered, paid order (staff).
  Accrue { order_id: Uuid },
}

// ─── Config file ──────────────────────────────────────────────────────────────

/// Shape of the optional TOML config file.
#[derive(Deserialize, Default)]
struct ConfigFile {
  #[serde(default)]
  url:      String,
  #[serde(default)]
  email:    String,
  #[serde(default)]
  password: String,
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_writer(std::io::stderr)
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy(),
    )
    .init();

  let args = Args::parse();

  let file_cfg: ConfigFile = if let Some(path) = &args.config {
    let raw = std::fs::read_to_string(path)
      .with_context(|| format!("reading config file {}", path.display()))?;
    toml::from_str(&raw).context("parsing config file")?
  } else {
    ConfigFile::default()
  };

  // CLI flags override config file, which overrides defaults.
  let api_config = ApiConfig {
    base_url: args
      .url
      .or_else(|| (!file_cfg.url.is_empty()).then(|| file_cfg.url.clone()))
      .unwrap_or_else(|| "http://localhost:8080".to_string()),
    email:    args
      .email
      .or_else(|| (!file_cfg.email.is_empty()).then(|| file_cfg.email.clone()))
      .unwrap_or_default(),
    password: args
      .password
      .or_else(|| (!file_cfg.password.is_empty()).then(|| file_cfg.password.clone()))
      .unwrap_or_default(),
  };

  let client = ApiClient::new(api_config)?;
  run(&client, args.command).await
}

async fn run(client: &ApiClient, command: Command) -> Result<()> {
  match command {
    Command::Me => {
      let me = client.me().await?;
      println!("{}", render::user(&me));
    }
    Command::Members { search, paging } => {
      let page = client.members(search.as_deref(), &paging.into()).await?;
      for m in &page.members {
        println!("{}", render::user(m));
      }
      println!("{}", render::pagination(&page.pagination));
    }
    Command::History { user_id, paging } => {
      let user_id = match user_id {
        Some(id) => id,
        None => client.me().await?.id,
      };
      let page = client.history(user_id, &paging.into()).await?;
      println!("{}", render::user(&page.user));
      for e in &page.history {
        println!("{}", render::entry(e));
      }
      println!("{}", render::pagination(&page.pagination));
    }
    Command::Adjust { user_id, points, description, reference } => {
      let created = client
        .adjust(user_id, points, &description, reference.as_deref())
        .await?;
      println!("{}", render::entry(&created.entry));
      println!("balance: {}", created.balance);
    }
    Command::Redeem { user_id, points, reference } => {
      let created = client.redeem(user_id, points, reference.as_deref()).await?;
      println!("{}", render::entry(&created.entry));
      println!("balance: {}", created.balance);
    }
    Command::Reconcile { user_id } => {
      println!("{}", render::reconciliation(&client.reconcile(user_id).await?));
    }
    Command::Repair { user_id } => {
      let before = client.repair(user_id).await?;
      println!("before: {}", render::reconciliation(&before));
      println!("balance: {}", before.ledger_sum);
    }
    Command::Drift => {
      let drifted = client.drift().await?;
      if drifted.is_empty() {
        println!("all balances match their ledgers");
      }
      for r in &drifted {
        println!("{}", render::reconciliation(r));
      }
    }
    Command::OrderStatus { order_id, status, payment_status } => {
      let t = client
        .update_order(order_id, OrderUpdate { status, payment_status })
        .await?;
      println!(
        "{} {} / {}",
        t.order.order_number, t.order.status, t.order.payment_status
      );
      if let Some(p) = t.points_awarded {
        println!("points credited: {}", render::points(p));
      }
      if let Some(p) = t.points_refunded {
        println!("points reversed: {}", render::points(-p));
      }
      if let Some(reason) = t.refund_skipped {
        println!("reversal skipped: {reason}");
      }
    }
    Command::Accrue { order_id } => {
      let entry = client.accrue(order_id).await?;
      println!("{}", render::entry(&entry));
    }
  }
  Ok(())
}
