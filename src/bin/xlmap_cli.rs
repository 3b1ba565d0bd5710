//! CLI tool for xlmap - replays a mapping session and outputs the export JSON
//!
//! Build with `cargo build --features cli`.
//!
//! Usage:
//!   xlmap_cli <session.json>                       # One record, JSON to stdout
//!   xlmap_cli <session.json> --confirm 20          # Confirm 20 records
//!   xlmap_cli <session.json> --config cfg.json -o out.json
//!
//! A session file holds `{ "workbook": ..., "schema": ..., "mapping": ... }`.
//! Without `mapping` the auto-detect rules seed one.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde::Deserialize;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use xlmap::{AppState, Mapper, MapperConfig, Mapping, Store, WorkbookState};

#[derive(Debug, Parser)]
#[command(
    name = "xlmap_cli",
    version,
    about = "Replay a spreadsheet-to-schema mapping session and export JSON"
)]
struct Cli {
    /// Session file: `{workbook, schema, mapping?}`.
    session: PathBuf,

    /// Number of "Confirm & Next" steps to run.
    #[arg(long, default_value_t = 1)]
    confirm: usize,

    /// Engine configuration (JSON).
    #[arg(long, env = "XLMAP_CONFIG")]
    config: Option<PathBuf>,

    /// Write the export here instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print required fields that are still unmapped and exit non-zero.
    #[arg(long)]
    check_required: bool,
}

#[derive(Debug, Deserialize)]
struct Session {
    workbook: WorkbookState,
    schema: Value,
    #[serde(default)]
    mapping: Option<Mapping>,
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let text =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => read_json::<MapperConfig>(path)?,
        None => MapperConfig::default(),
    };
    let session: Session = read_json(&cli.session)?;
    session.workbook.validate()?;

    let store = Rc::new(Store::with_state(AppState {
        workbook: Some(Rc::new(session.workbook)),
        schema: Some(Rc::new(session.schema)),
        mapping: Rc::new(session.mapping.unwrap_or_default()),
        confirm_next_mode: config.confirm_next_mode,
        ..AppState::default()
    }));
    let mapper = Mapper::with_config(Rc::clone(&store), config);
    if mapper.auto_detect() {
        tracing::info!("mapping seeded by auto-detect");
    }

    if cli.check_required {
        let missing = mapper.missing_required_fields()?;
        if !missing.is_empty() {
            bail!("required fields not mapped: {}", missing.join(", "));
        }
    }

    for step in 0..cli.confirm {
        if !mapper.confirm_next()? {
            tracing::warn!(step, "nothing left to confirm");
            break;
        }
    }

    let json = serde_json::to_string_pretty(&mapper.build_json()?)?;
    match &cli.output {
        Some(path) => {
            fs::write(path, &json).with_context(|| format!("writing {}", path.display()))?;
            eprintln!("Written: {}", path.display());
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(json.as_bytes())?;
            writeln!(stdout)?;
        }
    }
    Ok(())
}
