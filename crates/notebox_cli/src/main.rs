//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `notebox_core` linkage with a deterministic ping/version probe.
//! - Given a database path (first argument or `NOTEBOX_DB_PATH`), list
//!   groups with their message counts.

use notebox_core::{init_logging, NoteStore, SqliteKvStore, StoreConfig, DB_PATH_ENV};
use std::path::PathBuf;
use std::process::ExitCode;

fn main() -> ExitCode {
    println!("notebox_core ping={}", notebox_core::ping());
    println!("notebox_core version={}", notebox_core::core_version());

    let config = match StoreConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("notebox config error: {err}");
            return ExitCode::FAILURE;
        }
    };
    let db_path = match std::env::args().nth(1) {
        Some(path) => PathBuf::from(path),
        None if std::env::var_os(DB_PATH_ENV).is_some() => config.db_path.clone(),
        None => return ExitCode::SUCCESS,
    };

    let config = StoreConfig { db_path, ..config };
    if let Some(log_dir) = &config.log_dir {
        if let Err(err) = init_logging(config.log_level.as_str(), &log_dir.to_string_lossy()) {
            eprintln!("notebox logging disabled: {err}");
        }
    }
    let mut store = match config.open_store() {
        Ok(store) => store,
        Err(err) => {
            eprintln!("notebox open error: {err}");
            return ExitCode::FAILURE;
        }
    };
    match print_groups(&mut store) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("notebox load error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn print_groups(store: &mut NoteStore<SqliteKvStore>) -> notebox_core::StoreResult<()> {
    store.load_groups()?;
    println!("groups={}", store.groups().len());
    for group in store.groups() {
        println!(
            "group id={} name={} messages={}",
            group.id,
            group.name,
            store.message_count(&group.id)
        );
    }
    Ok(())
}
