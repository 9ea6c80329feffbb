//! Uplift command line application
//!
//! Uploads exported workout files to Strava.

mod commands;

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "uplift", about = "Upload workout files to Strava", version)]
struct Cli {
    /// Path to the database file
    #[arg(long, env = "UPLIFT_DB")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Store the API application credentials and the workouts directory
    Configure {
        /// Client id from the Strava API settings page
        #[arg(long)]
        client_id: Option<String>,
        /// Client secret from the Strava API settings page
        #[arg(long)]
        client_secret: Option<String>,
        /// Directory with the extracted workouts
        #[arg(long)]
        workouts_dir: Option<PathBuf>,
    },
    /// Show the profile of the authorized athlete
    Profile,
    /// Upload every workout that has not been uploaded yet
    Upload {
        /// Check the files and the sport mapping without uploading
        #[arg(long)]
        dry_run: bool,
        /// Workouts directory (overrides the configured one)
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// List recent uploads
    History {
        /// Number of rows to show
        #[arg(long, default_value = "20")]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
                .add_directive("uplift=debug".parse()?)
                .add_directive("uplift_core=debug".parse()?),
        )
        .init();

    tracing::info!("Starting Uplift v{}", uplift_core::VERSION);

    let cli = Cli::parse();
    let db = commands::open_database(cli.db)?;

    match cli.command {
        Commands::Configure {
            client_id,
            client_secret,
            workouts_dir,
        } => {
            commands::configure::run(&db, client_id, client_secret, workouts_dir)?;
        }
        Commands::Profile => {
            commands::profile::run(&db).await?;
        }
        Commands::Upload { dry_run, dir } => {
            commands::upload::run(&db, dry_run, dir).await?;
        }
        Commands::History { limit } => {
            commands::history::run(&db, limit)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn cli_parse_configure() {
        let cli = Cli::parse_from([
            "uplift",
            "configure",
            "--client-id",
            "12345",
            "--client-secret",
            "s3cret",
            "--workouts-dir",
            "/data/workouts",
        ]);
        match cli.command {
            Commands::Configure {
                client_id,
                client_secret,
                workouts_dir,
            } => {
                assert_eq!(client_id.as_deref(), Some("12345"));
                assert_eq!(client_secret.as_deref(), Some("s3cret"));
                assert_eq!(workouts_dir, Some(PathBuf::from("/data/workouts")));
            }
            _ => panic!("expected Configure command"),
        }
    }

    #[test]
    fn cli_parse_upload_defaults() {
        let cli = Cli::parse_from(["uplift", "upload"]);
        match cli.command {
            Commands::Upload { dry_run, dir } => {
                assert!(!dry_run);
                assert!(dir.is_none());
            }
            _ => panic!("expected Upload command"),
        }
    }

    #[test]
    fn cli_parse_upload_dry_run_with_dir() {
        let cli = Cli::parse_from(["uplift", "upload", "--dry-run", "--dir", "/tmp/w"]);
        match cli.command {
            Commands::Upload { dry_run, dir } => {
                assert!(dry_run);
                assert_eq!(dir, Some(PathBuf::from("/tmp/w")));
            }
            _ => panic!("expected Upload command"),
        }
    }

    #[test]
    fn cli_parse_history_limit() {
        let cli = Cli::parse_from(["uplift", "--db", "/tmp/u.db", "history", "--limit", "5"]);
        assert_eq!(cli.db, Some(PathBuf::from("/tmp/u.db")));
        match cli.command {
            Commands::History { limit } => assert_eq!(limit, 5),
            _ => panic!("expected History command"),
        }
    }

    #[test]
    fn cli_parse_profile() {
        let cli = Cli::parse_from(["uplift", "profile"]);
        assert!(matches!(cli.command, Commands::Profile));
    }

    #[test]
    fn cli_rejects_unknown_command() {
        assert!(Cli::try_parse_from(["uplift", "sync"]).is_err());
    }
}
