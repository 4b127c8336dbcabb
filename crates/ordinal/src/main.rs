use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use ordinal::core::ensure_ordered;
use ordinal::storage::SqliteStore;
use ordinal::telemetry::init_tracing;
use ordinal::{OrdinalConfig, ReorderService};
use ordinal_api::{ReorderRequest, Scope};

enum Command {
    List,
    Backfill,
    Add { ids: Vec<String> },
    Seed { ids: Vec<String> },
    Move { id: String, after: Option<String> },
}

struct Args {
    db_path: Option<PathBuf>,
    scope: Scope,
    command: Command,
}

fn print_usage() {
    eprintln!("Usage: ordinal [--db PATH] <SCOPE> <COMMAND>");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  list                      Backfill missing keys and print the scope in order");
    eprintln!("  backfill                  Only assign missing keys and report how many");
    eprintln!("  add ID...                 Append records at the end");
    eprintln!("  seed ID...                Fill an empty scope in the given order");
    eprintln!("  move ID [--after ANCHOR]  Move a record after ANCHOR (front if omitted)");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db PATH    SQLite database (default: $ORDINAL_DB_PATH, else a temp file)");
    eprintln!("  --help, -h   Show this help message");
}

fn parse_args() -> Result<Args> {
    let mut db_path = None;
    let mut after = None;
    let mut positional = Vec::new();

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--db" => {
                let path = args
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--db requires a path argument"))?;
                db_path = Some(PathBuf::from(path));
            }
            "--after" => {
                after = Some(
                    args.next()
                        .ok_or_else(|| anyhow::anyhow!("--after requires a record id"))?,
                );
            }
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            _ if arg.starts_with("--") => anyhow::bail!("Unknown option '{}'", arg),
            _ => positional.push(arg),
        }
    }

    let mut positional = positional.into_iter();
    let scope = positional
        .next()
        .map(Scope::new)
        .ok_or_else(|| anyhow::anyhow!("missing scope (try --help)"))?;
    let command = match positional.next().as_deref() {
        Some("list") => Command::List,
        Some("backfill") => Command::Backfill,
        Some("add") => Command::Add {
            ids: positional.collect(),
        },
        Some("seed") => Command::Seed {
            ids: positional.collect(),
        },
        Some("move") => Command::Move {
            id: positional
                .next()
                .ok_or_else(|| anyhow::anyhow!("move requires a record id"))?,
            after,
        },
        Some(other) => anyhow::bail!("Unknown command '{}'", other),
        None => anyhow::bail!("missing command (try --help)"),
    };

    Ok(Args {
        db_path,
        scope,
        command,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing()?;
    let args = parse_args()?;

    let mut config = OrdinalConfig::from_env()?;
    if let Some(path) = args.db_path {
        config = config.with_db_path(path);
    }
    let db_path = config.resolved_db_path();
    tracing::info!("[ordinal] using database {}", db_path.display());

    let store = SqliteStore::open(&db_path, config.layout.clone())
        .with_context(|| format!("Failed to open database at {}", db_path.display()))?;
    store.set_busy_timeout(config.busy_timeout)?;
    store.ensure_schema()?;

    let service = ReorderService::new(Arc::new(store), config.engine.clone());
    let scope = &args.scope;

    let output = match args.command {
        Command::List => serde_json::to_value(service.list_for_sorting(scope).await?)?,
        Command::Backfill => {
            let report =
                ensure_ordered(service.store().as_ref(), scope, &config.engine.alphabet).await?;
            serde_json::to_value(report)?
        }
        Command::Add { ids } => {
            let mut created = Vec::with_capacity(ids.len());
            for id in &ids {
                created.push(service.create_at_tail(scope, id).await?);
            }
            serde_json::to_value(created)?
        }
        Command::Seed { ids } => serde_json::to_value(service.seed(scope, &ids).await?)?,
        Command::Move { id, after } => {
            let request = match after {
                Some(anchor) => ReorderRequest::after(id, anchor),
                None => ReorderRequest::to_front(id),
            };
            match service.handle(scope, request).await {
                Ok(response) => serde_json::to_value(response)?,
                Err(payload) => {
                    println!("{}", serde_json::to_string_pretty(&payload)?);
                    std::process::exit(1);
                }
            }
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
