use anyhow::{Context, Result};
use clap::Parser;
use rusqlite::Connection;

use salahscore::cli::args::{Cli, Commands};
use salahscore::cli::handlers::{self, SetupArgs};
use salahscore::config::AppConfig;
use salahscore::db::run_migrations;

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let mut config = AppConfig::load().context("Loading config")?;

    // Ensure data directory exists and open DB
    AppConfig::ensure_data_dir()?;
    let db_path = AppConfig::db_path()?;
    let conn = Connection::open(&db_path)
        .with_context(|| format!("Opening database at {:?}", db_path))?;

    // Enable WAL mode for better concurrent access
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;

    // Run migrations on every startup
    run_migrations(&conn)?;
    log::debug!("Database ready at {:?}, user '{}'", db_path, config.user.id);

    match cli.command.unwrap_or(Commands::Times) {
        Commands::Setup {
            user,
            name,
            location,
            lat,
            lng,
            method,
            madhab,
            tz,
        } => {
            let args = SetupArgs {
                user,
                name,
                location,
                lat,
                lng,
                method,
                madhab,
                tz,
            };
            handlers::handle_setup(&conn, &mut config, args)?;
        }
        Commands::Times => handlers::handle_times(&conn, &config)?,
        Commands::Register { prayer, mosque, at } => {
            handlers::handle_register(&conn, &config, &prayer, mosque, at.as_deref())?;
        }
        Commands::Stats { week } => handlers::handle_stats(&conn, &config, week)?,
        Commands::Missed { action } => handlers::handle_missed(&conn, &config, &action)?,
        Commands::Privacy { action } => handlers::handle_privacy(&conn, &config, &action)?,
        Commands::Friend { action } => handlers::handle_friend(&conn, &config, &action)?,
        Commands::Remind {
            user,
            prayer,
            message,
        } => {
            handlers::handle_remind(&conn, &config, &user, &prayer, message.as_deref())?;
        }
        Commands::Pending { prayer } => handlers::handle_pending(&conn, &config, &prayer)?,
        Commands::Inbox { limit } => handlers::handle_inbox(&conn, &config, limit)?,
        Commands::Read { id } => handlers::handle_read(&conn, &config, id)?,
    }

    Ok(())
}
