//! # Create-User Subcommand
//!
//! Provisions an account directly in Postgres through the same
//! [`Clinic::provision`] path the web registration uses.

use anyhow::Context;
use clap::Args;

use klinik_api::lifecycle::Clinic;
use klinik_api::store::ClinicStore;
use klinik_core::{validate_name, validate_password, Nik, Role};
use klinik_state::User;

/// Arguments for the create-user subcommand.
#[derive(Args, Debug)]
pub struct CreateUserArgs {
    /// 16-digit national identity number, used as the login.
    #[arg(long)]
    pub nik: String,

    /// Display name.
    #[arg(long)]
    pub name: String,

    /// `patient`, `doctor` or `admin`.
    #[arg(long)]
    pub role: Role,

    /// Initial password.
    #[arg(long)]
    pub password: String,

    /// bcrypt work factor.
    #[arg(long, default_value_t = bcrypt::DEFAULT_COST)]
    pub cost: u32,

    /// Postgres connection string.
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,
}

/// Validated account fields, checked before any connection is opened.
#[derive(Debug)]
pub struct Account {
    pub nik: Nik,
    pub name: String,
    pub role: Role,
}

impl CreateUserArgs {
    pub fn account(&self) -> anyhow::Result<Account> {
        let nik = Nik::parse(&self.nik).context("invalid --nik")?;
        let name = validate_name(&self.name).context("invalid --name")?;
        validate_password(&self.password, &self.password).context("invalid --password")?;
        Ok(Account {
            nik,
            name,
            role: self.role,
        })
    }
}

pub async fn run(args: &CreateUserArgs) -> anyhow::Result<User> {
    let account = args.account()?;
    let pool = klinik_api::db::connect(&args.database_url, 1)
        .await
        .context("connecting to the database")?;
    let clinic = Clinic::new(ClinicStore::Postgres(pool), args.cost);

    let user = clinic
        .provision(account.nik, account.name, &args.password, account.role)
        .await
        .context("creating the account")?;
    tracing::info!(user_id = %user.id, role = %user.role, "account provisioned");
    Ok(user)
}
