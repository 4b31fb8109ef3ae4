//! PrismDB Pivot - command line entry point
//!
//! Reads a PIVOT / UNPIVOT reference as JSON and either prints the SELECT it
//! is rewritten into, its logical plan, or runs it over CSV-backed tables.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, Level};

use prism_pivot::{CatalogDefinition, Database, PivotRef, SelectStatement};

#[derive(Parser)]
#[command(name = "prism-pivot")]
#[command(about = "PrismDB Pivot - PIVOT / UNPIVOT query rewriting")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Enable verbose output (repeat for more detail)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the SELECT a PIVOT / UNPIVOT reference is rewritten into
    Rewrite(Input),
    /// Print the logical plan of `SELECT * FROM <reference>`
    Explain(Input),
    /// Execute `SELECT * FROM <reference>` over CSV files
    Run {
        #[command(flatten)]
        input: Input,

        /// Load a table from CSV, as `name=path` (repeatable)
        #[arg(short, long = "table", value_name = "NAME=PATH")]
        tables: Vec<String>,

        /// Print the result as CSV instead of a table
        #[arg(long)]
        csv: bool,

        /// Number of scan threads
        #[arg(long)]
        threads: Option<usize>,
    },
}

#[derive(Args)]
struct Input {
    /// JSON file holding the PIVOT / UNPIVOT reference
    reference: PathBuf,

    /// JSON catalog definition (schemas, enums, tables)
    #[arg(short, long)]
    catalog: Option<PathBuf>,

    /// Maximum number of pivot value combinations
    #[arg(long)]
    pivot_limit: Option<usize>,
}

impl Input {
    fn load(&self) -> Result<(Database, PivotRef)> {
        let definition = match &self.catalog {
            Some(path) => read_json::<CatalogDefinition>(path)?,
            None => CatalogDefinition::default(),
        };
        let database = Database::from_definition(&definition)?;
        if let Some(limit) = self.pivot_limit {
            database.set("pivot_limit", limit.to_string())?;
        }
        let reference = read_json::<PivotRef>(&self.reference)?;
        Ok((database, reference))
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

fn parse_table_arg(arg: &str) -> Result<(&str, &str)> {
    match arg.split_once('=') {
        Some((name, path)) if !name.is_empty() && !path.is_empty() => Ok((name, path)),
        _ => bail!("expected --table NAME=PATH, got '{}'", arg),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Rewrite(input) => {
            let (database, reference) = input.load()?;
            println!("{}", database.rewrite(&reference)?);
        }
        Command::Explain(input) => {
            let (database, reference) = input.load()?;
            let select = SelectStatement::star_from(reference.into_table_ref());
            print!("{}", database.explain(&select)?);
        }
        Command::Run {
            input,
            tables,
            csv,
            threads,
        } => {
            let (database, reference) = input.load()?;
            if let Some(threads) = threads {
                database.set("threads", threads.to_string())?;
            }
            for arg in &tables {
                let (name, path) = parse_table_arg(arg)?;
                let rows = database
                    .load_csv(name, path)
                    .with_context(|| format!("loading table {} from {}", name, path))?;
                info!(table = name, rows, "table ready");
            }

            let select = SelectStatement::star_from(reference.into_table_ref());
            let result = database.execute(&select)?;
            if csv {
                result.write_csv(std::io::stdout().lock())?;
            } else {
                println!("{}", result);
            }
        }
    }
    Ok(())
}
