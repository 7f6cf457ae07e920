//! # Hash-Password Subcommand
//!
//! Produces a bcrypt hash for manual account repair. With `--nik` it also
//! prints the `UPDATE` statement that installs the hash.

use anyhow::Context;
use clap::Args;

use klinik_core::{Nik, MIN_PASSWORD_LEN};

/// Arguments for the hash-password subcommand.
#[derive(Args, Debug)]
pub struct HashPasswordArgs {
    /// Plain-text password to hash.
    pub password: String,

    /// bcrypt work factor.
    #[arg(long, default_value_t = bcrypt::DEFAULT_COST)]
    pub cost: u32,

    /// Also print an UPDATE statement for the account with this NIK.
    #[arg(long)]
    pub nik: Option<String>,
}

/// Hash the password. Returns the lines to print.
pub fn run(args: &HashPasswordArgs) -> anyhow::Result<Vec<String>> {
    if args.password.chars().count() < MIN_PASSWORD_LEN {
        anyhow::bail!("password must be at least {MIN_PASSWORD_LEN} characters");
    }
    let nik = args
        .nik
        .as_deref()
        .map(Nik::parse)
        .transpose()
        .context("invalid --nik")?;

    let hash = bcrypt::hash(&args.password, args.cost).context("bcrypt hashing failed")?;
    tracing::debug!(cost = args.cost, "password hashed");

    let mut lines = vec![hash.clone()];
    if let Some(nik) = nik {
        lines.push(update_statement(&nik, &hash));
    }
    Ok(lines)
}

fn update_statement(nik: &Nik, hash: &str) -> String {
    format!("UPDATE users SET password_hash = '{hash}' WHERE nik = '{nik}';")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(password: &str, nik: Option<&str>) -> HashPasswordArgs {
        HashPasswordArgs {
            password: password.into(),
            cost: 4,
            nik: nik.map(String::from),
        }
    }

    #[test]
    fn hash_verifies() {
        let lines = run(&args("rahasia123", None)).unwrap();
        assert_eq!(lines.len(), 1);
        assert!(bcrypt::verify("rahasia123", &lines[0]).unwrap());
    }

    #[test]
    fn nik_adds_update_statement() {
        let lines = run(&args("rahasia123", Some("3171000000000001"))).unwrap();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].starts_with("UPDATE users SET password_hash = '$2"));
        assert!(lines[1].ends_with("WHERE nik = '3171000000000001';"));
    }

    #[test]
    fn short_password_rejected() {
        assert!(run(&args("abc", None)).is_err());
    }

    #[test]
    fn malformed_nik_rejected() {
        assert!(run(&args("rahasia123", Some("12ab"))).is_err());
    }
}
