//! # klinik CLI Entry Point
//!
//! Assembles subcommands and dispatches to handler modules.

use clap::Parser;

/// Klinik operator CLI.
///
/// Hashes passwords, provisions staff accounts and migrates the database.
#[derive(Parser, Debug)]
#[command(name = "klinik", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Hash a password with bcrypt.
    HashPassword(klinik_cli::password::HashPasswordArgs),
    /// Create a patient, doctor or admin account.
    CreateUser(klinik_cli::users::CreateUserArgs),
    /// Apply database migrations.
    Migrate(klinik_cli::migrate::MigrateArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout stays pipeable.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::HashPassword(args) => {
            for line in klinik_cli::password::run(&args)? {
                println!("{line}");
            }
        }
        Commands::CreateUser(args) => {
            let user = klinik_cli::users::run(&args).await?;
            println!("created {} {} (id {})", user.role, user.nik, user.id);
        }
        Commands::Migrate(args) => {
            klinik_cli::migrate::run(&args).await?;
            println!("migrations applied");
        }
    }

    Ok(())
}
