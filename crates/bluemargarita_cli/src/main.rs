//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `bluemargarita_core` linkage, configuration and schema bootstrap.
//! - Keep output deterministic for quick local sanity checks.

use bluemargarita_core::db::migrations::current_version;
use bluemargarita_core::{core_version, init_logging_from_config, open_db, ping, CoreConfig};
use log::info;
use std::process::ExitCode;

fn main() -> ExitCode {
    let config = CoreConfig::from_env();
    println!("bluemargarita_core ping={}", ping());
    println!("bluemargarita_core version={}", core_version());

    match init_logging_from_config(&config) {
        Ok(enabled) => println!("logging enabled={enabled}"),
        Err(err) => {
            eprintln!("logging init failed: {err}");
            return ExitCode::FAILURE;
        }
    }

    let conn = match open_db(&config.db_path) {
        Ok(conn) => conn,
        Err(err) => {
            eprintln!("database open failed: {err}");
            return ExitCode::FAILURE;
        }
    };
    match current_version(&conn) {
        Ok(version) => {
            info!(
                "event=cli_probe module=cli status=ok schema_version={version} allow_negative_stock={}",
                config.allow_negative_stock
            );
            println!("db path={} schema_version={version}", config.db_path.display());
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("schema version read failed: {err}");
            ExitCode::FAILURE
        }
    }
}
