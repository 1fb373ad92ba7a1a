//! `flightkeep` - CLI for the flight list durability layer
//!
//! This binary opens the local SQLite store and exposes diagnostics, recovery,
//! guarded saves, export/import and a foreground auto-save loop.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::warn;

use flightkeep::cli::{
    Cli, Command, ConfigCommand, ExportCommand, ImportCommand, SaveCommand, WatchCommand,
};
use flightkeep::snapshot::{export_file_name, export_snapshot, import_file, merge_imported};
use flightkeep::{init_logging, AutoSaver, Config, DurabilityManager, KeyValueStore, SqliteStore};

type CliResult = Result<(), Box<dyn std::error::Error>>;

fn main() -> CliResult {
    let cli = Cli::parse();

    init_logging(cli.verbosity());

    let config = Config::load_from(cli.config.clone())?;

    match cli.command {
        Command::Diagnose(cmd) => handle_diagnose(&config, cmd.json),
        Command::Recover(cmd) => handle_recover(&config, cmd.json),
        Command::Save(cmd) => handle_save(&config, &cmd),
        Command::Export(cmd) => handle_export(&config, cmd),
        Command::Import(cmd) => handle_import(&config, &cmd),
        Command::Watch(cmd) => handle_watch(&config, cmd),
        Command::Config(cmd) => handle_config(&config, cmd),
    }
}

fn open_store(config: &Config) -> Result<Arc<SqliteStore>, Box<dyn std::error::Error>> {
    Ok(Arc::new(SqliteStore::open(config.database_path())?))
}

fn open_manager(config: &Config) -> Result<DurabilityManager, Box<dyn std::error::Error>> {
    let store: Arc<dyn KeyValueStore> = open_store(config)?;
    Ok(DurabilityManager::new(store, config))
}

fn handle_diagnose(config: &Config, json: bool) -> CliResult {
    let store = open_store(config)?;
    let manager = DurabilityManager::new(Arc::clone(&store) as Arc<dyn KeyValueStore>, config);
    let report = manager.diagnose();
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        let stats = store.stats()?;
        println!("flightkeep diagnostics");
        println!("======================");
        println!("Database: {}", store.path().display());
        println!(
            "Entries:  {} ({} bytes of values, {} bytes on disk)",
            stats.entries, stats.value_bytes, stats.db_size_bytes
        );
        println!();
        println!("{report}");
    }
    Ok(())
}

fn handle_recover(config: &Config, json: bool) -> CliResult {
    let recovery = open_manager(config)?.recover();
    if json {
        println!("{}", serde_json::to_string_pretty(&recovery.flights)?);
    } else {
        println!(
            "Recovered {} flight(s) from {}",
            recovery.flights.len(),
            recovery.source
        );
        if recovery.repaired {
            println!("Slots were rewritten from the recovered data.");
        }
    }
    Ok(())
}

fn handle_save(config: &Config, cmd: &SaveCommand) -> CliResult {
    let flights = import_file(&cmd.file)?;
    let outcome = open_manager(config)?.persist(&flights, cmd.force);
    println!("{outcome}");
    if outcome.is_saved() {
        Ok(())
    } else {
        Err(format!("save did not complete: {outcome}").into())
    }
}

fn handle_export(config: &Config, cmd: ExportCommand) -> CliResult {
    let recovery = open_manager(config)?.recover();
    let export = export_snapshot(&recovery.flights);
    let path = cmd
        .output
        .unwrap_or_else(|| PathBuf::from(export_file_name(export.exported_at)));
    export.write_to(&path)?;
    println!("Exported {} flight(s) to {}", export.count, path.display());
    Ok(())
}

fn handle_import(config: &Config, cmd: &ImportCommand) -> CliResult {
    let imported = import_file(&cmd.file)?;
    let manager = open_manager(config)?;
    let existing = manager.recover().flights;
    let before = existing.len();
    let merged = merge_imported(existing, imported);
    let added = merged.len() - before;

    let outcome = manager.persist(&merged, false);
    if !outcome.is_saved() {
        return Err(format!("import did not complete: {outcome}").into());
    }
    println!("Imported {added} new flight(s), {} total", merged.len());
    Ok(())
}

fn handle_watch(config: &Config, cmd: WatchCommand) -> CliResult {
    let interval = cmd
        .interval_ms
        .map_or_else(|| config.autosave_interval(), Duration::from_millis);
    let manager = Arc::new(open_manager(config)?);
    let source = cmd.file;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async move {
        let mut saver = AutoSaver::new(manager, interval);
        saver.start(move || read_live_file(&source))?;
        println!(
            "Auto-saving every {}ms. Press Ctrl-C to stop.",
            interval.as_millis()
        );

        tokio::signal::ctrl_c().await?;

        println!("{}", saver.status());
        if let Some(outcome) = saver.shutdown(false) {
            println!("Final flush: {outcome}");
        }
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}

/// Current contents of a watched file. Unreadable contents yield an empty
/// list, which the write guard refuses to store over existing flights.
fn read_live_file(path: &Path) -> Vec<flightkeep::FlightRecord> {
    import_file(path).unwrap_or_else(|e| {
        warn!(path = %path.display(), error = %e, "Could not read watched file");
        Vec::new()
    })
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> CliResult {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Storage]");
                println!("  Database path:      {}", config.database_path().display());
                println!();
                println!("[Keys]");
                println!("  Primary:            {}", config.keys.primary);
                println!("  Backup:             {}", config.keys.backup);
                println!("  Emergency:          {}", config.keys.emergency);
                println!("  Last save:          {}", config.keys.last_save);
                println!("  Legacy:             {}", config.keys.legacy.join(", "));
                println!(
                    "  Safety prefixes:    {}",
                    config.keys.safety_prefixes.join(", ")
                );
                println!();
                println!("[Durability]");
                println!(
                    "  Shrink threshold:   {}",
                    config.durability.shrink_threshold
                );
                println!(
                    "  Max safety scan:    {}",
                    config.durability.max_safety_scan
                );
                println!();
                println!("[Auto-save]");
                println!("  Interval (ms):      {}", config.autosave.interval_ms);
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => println!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}
