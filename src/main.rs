use anyhow::{bail, Context, Result};
use chrono::Local;
use medicaid_billing::{
    clear_billing_entries, db, export, generate_lines, init_tracing, insert_recipient,
    list_billing_entries, list_recipients, open_database, record_export, write_to_dir, AppConfig,
};
use rusqlite::Connection;
use std::env;
use std::path::{Path, PathBuf};

/// Actor recorded in the audit trail for CLI writes
const CLI_ACTOR: &str = "cli";

const USAGE: &str = "\
Usage: billing <command>

Commands:
  init                        Create the database
  import-recipients <file>    Add recipients from a CSV file
  preview                     Print the records the next export would contain
  export [dir] [--clear]      Write the intake file into dir (default: .)
  clear                       Remove all billing entries

Configuration comes from config/default.toml and BILLING__* variables,
e.g. BILLING__DATABASE__PATH=billing.db";

fn main() -> Result<()> {
    init_tracing("medicaid_billing=warn");

    let args: Vec<String> = env::args().skip(1).collect();
    let Some(command) = args.first() else {
        println!("{}", USAGE);
        return Ok(());
    };

    let config = AppConfig::load().context("Failed to load configuration")?;

    match command.as_str() {
        "init" => run_init(&config),
        "import-recipients" => {
            let Some(path) = args.get(1) else {
                bail!("import-recipients needs a CSV file\n\n{}", USAGE);
            };
            run_import(&config, Path::new(path))
        }
        "preview" => run_preview(&config),
        "export" => {
            let clear = args.iter().any(|a| a == "--clear");
            let dir = args
                .iter()
                .skip(1)
                .find(|a| !a.starts_with("--"))
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("."));
            run_export(&config, &dir, clear)
        }
        "clear" => run_clear(&config),
        "help" | "--help" | "-h" => {
            println!("{}", USAGE);
            Ok(())
        }
        other => bail!("Unknown command '{}'\n\n{}", other, USAGE),
    }
}

fn open(config: &AppConfig) -> Result<Connection> {
    open_database(&config.database.path)
        .with_context(|| format!("Failed to open database {:?}", config.database.path))
}

fn run_init(config: &AppConfig) -> Result<()> {
    open(config)?;
    println!("✓ Database ready at {}", config.database.path.display());
    Ok(())
}

fn run_import(config: &AppConfig, csv_path: &Path) -> Result<()> {
    let conn = open(config)?;
    let rows = db::load_recipients_csv(csv_path)
        .with_context(|| format!("Failed to read {}", csv_path.display()))?;

    let mut added = 0;
    let mut rejected = 0;
    for (index, row) in rows.into_iter().enumerate() {
        match insert_recipient(&conn, row, CLI_ACTOR) {
            Ok(_) => added += 1,
            Err(e) if e.is_validation() => {
                // +2: 1-indexed plus header row
                eprintln!("✗ Row {}: {}", index + 2, e);
                rejected += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }

    println!("✓ Imported {} recipients", added);
    if rejected > 0 {
        println!("✗ Rejected {} rows", rejected);
    }
    Ok(())
}

fn run_preview(config: &AppConfig) -> Result<()> {
    let conn = open(config)?;
    let entries = list_billing_entries(&conn)?;
    let recipients = list_recipients(&conn)?;

    let report = generate_lines(&entries, &recipients, Local::now().date_naive(), &config.contract);
    for line in &report.lines {
        println!("{}", line);
    }
    for skipped in &report.skipped {
        eprintln!("skipped entry {} ({}): {}", skipped.entry_id, skipped.date, skipped.reason);
    }
    Ok(())
}

fn run_export(config: &AppConfig, dir: &Path, clear: bool) -> Result<()> {
    let conn = open(config)?;
    let entries = list_billing_entries(&conn)?;
    let recipients = list_recipients(&conn)?;

    let file = export(&entries, &recipients, Local::now().date_naive(), &config.contract);
    let path = write_to_dir(&file, dir)
        .with_context(|| format!("Failed to write export into {}", dir.display()))?;
    record_export(&conn, &file, CLI_ACTOR)?;

    println!("✓ Wrote {} records to {}", file.line_count, path.display());
    if !file.skipped.is_empty() {
        println!("✗ Skipped {} entries (run `billing preview` for details)", file.skipped.len());
    }

    if clear {
        let removed = clear_billing_entries(&conn, CLI_ACTOR)?;
        println!("✓ Cleared {} billing entries", removed);
    }
    Ok(())
}

fn run_clear(config: &AppConfig) -> Result<()> {
    let conn = open(config)?;
    let removed = clear_billing_entries(&conn, CLI_ACTOR)?;
    println!("✓ Cleared {} billing entries", removed);
    Ok(())
}
