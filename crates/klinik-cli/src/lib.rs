//! # klinik-cli: Clinic Operator Command-Line Interface
//!
//! Operator tasks that have no web surface. Self-registration only ever
//! creates patients, so doctor and admin accounts come from here.
//!
//! ## Subcommands
//!
//! - `hash-password`: Print a bcrypt hash, optionally as an `UPDATE` statement
//! - `create-user`: Provision an account of any role in Postgres
//! - `migrate`: Apply pending schema migrations
//!
//! Argument parsing lives in each module's `*Args`; the work is delegated to
//! `klinik-api` so the CLI and the web service share one code path.

pub mod migrate;
pub mod password;
pub mod users;
