//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `comicdesk_core` linkage.
//! - Open the catalog (in-memory, or the file named by `COMICDESK_DB_PATH`)
//!   and print reference list sizes.
//! - Write core logs to `COMICDESK_LOG_DIR` when it is set.
//! - Keep output deterministic for quick local sanity checks.

use comicdesk_core::db::{open_db, open_db_in_memory};
use comicdesk_core::{
    default_log_level, init_logging, CatalogQueryProvider, CatalogService,
    SqliteCatalogRepository,
};
use std::process::ExitCode;

fn main() -> ExitCode {
    println!("comicdesk_core ping={}", comicdesk_core::ping());
    println!("comicdesk_core version={}", comicdesk_core::core_version());

    if let Ok(log_dir) = std::env::var("COMICDESK_LOG_DIR") {
        match init_logging(default_log_level(), &log_dir) {
            Ok(()) => println!("comicdesk_core logging level={}", default_log_level()),
            Err(err) => {
                eprintln!("comicdesk_core logging error={err}");
                return ExitCode::FAILURE;
            }
        }
    }

    match print_catalog_summary() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("comicdesk_core catalog error={err}");
            ExitCode::FAILURE
        }
    }
}

fn print_catalog_summary() -> Result<(), Box<dyn std::error::Error>> {
    let (source, conn) = match std::env::var("COMICDESK_DB_PATH") {
        Ok(path) if !path.trim().is_empty() => ("file", open_db(path.trim())?),
        _ => ("memory", open_db_in_memory()?),
    };
    let service = CatalogService::new(SqliteCatalogRepository::try_new(&conn)?);
    let lists = service.reference_lists()?;

    println!(
        "comicdesk_core catalog source={source} authors={} categories={} types={} comics={}",
        lists.authors.len(),
        lists.categories.len(),
        lists.types.len(),
        service.list_comics()?.len()
    );
    Ok(())
}
