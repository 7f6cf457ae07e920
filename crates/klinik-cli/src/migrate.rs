//! # Migrate Subcommand
//!
//! Applies the embedded `klinik-api` migrations. The server does this on
//! startup too; this is for deploys that migrate ahead of rollout.

use anyhow::Context;
use clap::Args;

/// Arguments for the migrate subcommand.
#[derive(Args, Debug)]
pub struct MigrateArgs {
    /// Postgres connection string.
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,
}

pub async fn run(args: &MigrateArgs) -> anyhow::Result<()> {
    let pool = klinik_api::db::connect(&args.database_url, 1)
        .await
        .context("connecting to the database")?;
    klinik_api::db::run_migrations(&pool)
        .await
        .context("applying migrations")?;
    tracing::info!("migrations applied");
    Ok(())
}
