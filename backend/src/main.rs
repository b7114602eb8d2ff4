//! Restmigrator CLI - Migrate records into list-model stores
//!
//! # Main Commands
//!
//! ```bash
//! restmigrator migrate input.csv --mapping mapping.json   # Run a migration
//! restmigrator migrate input.csv -m mapping.json --dry-run
//! restmigrator serve                                      # Start HTTP server (port 3000)
//! ```
//!
//! # Debug Commands
//!
//! ```bash
//! restmigrator parse input.csv     # Just parse CSV to JSON
//! restmigrator operations          # Show available rule operations
//! ```

use clap::{Parser, Subcommand};
use restmigrator::{
    from_csv_path, from_store, operations_description, parse_file_auto, ConsoleEvents,
    EventBus, Fanout, FileFactory, MappingFile, MemoryFactory, MigrateOptions, RestFactory,
    RestMigrator, Settings, SourceFactory, StoreFactory, StoreRef, Tally,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "restmigrator")]
#[command(about = "Migrate records into list-model stores", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Migrate source records into the mapping's target store
    Migrate {
        /// Input CSV file
        #[arg(required_unless_present = "from_store")]
        input: Option<PathBuf>,

        /// Read records from this store instead of a CSV file
        #[arg(long, conflicts_with = "input")]
        from_store: Option<String>,

        /// Mapping file (JSON)
        #[arg(short, long)]
        mapping: PathBuf,

        /// Resolve everything but write nothing
        #[arg(long)]
        dry_run: bool,

        /// Records processed together (default: RESTMIGRATOR_CONCURRENCY or 1)
        #[arg(short, long)]
        concurrency: Option<usize>,

        /// REST backend holding the stores
        #[arg(long, conflicts_with = "store_dir")]
        rest_url: Option<String>,

        /// Directory of flat-file stores
        #[arg(long)]
        store_dir: Option<PathBuf>,

        /// Output file for saved records (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Parse a CSV file and output JSON
    Parse {
        /// Input CSV file
        input: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show available rule operations
    Operations,

    /// Start HTTP server
    Serve {
        /// Port to listen on (default: RESTMIGRATOR_PORT or 3000)
        #[arg(short, long)]
        port: Option<u16>,

        /// Serve flat-file stores from this directory instead of memory
        #[arg(long)]
        store_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("❌ Error: {}", e);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Migrate {
            input,
            from_store,
            mapping,
            dry_run,
            concurrency,
            rest_url,
            store_dir,
            output,
        } => {
            let stores: Arc<dyn StoreFactory> = match rest_url.or_else(|| settings.rest_url.clone()) {
                Some(url) => Arc::new(RestFactory::new(&url)),
                None => Arc::new(FileFactory::new(store_dir.unwrap_or_else(|| settings.store_dir.clone()))),
            };
            let options = MigrateOptions {
                dry_run,
                concurrency: concurrency.unwrap_or(settings.concurrency),
            };
            cmd_migrate(
                input.as_deref(),
                from_store.as_deref(),
                &mapping,
                stores,
                options,
                settings.page_size,
                output.as_deref(),
            )
            .await
        }

        Commands::Parse { input, output } => cmd_parse(&input, output.as_deref()),

        Commands::Operations => cmd_operations(),

        Commands::Serve { port, store_dir } => {
            cmd_serve(port.unwrap_or(settings.port), store_dir).await
        }
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

async fn cmd_migrate(
    input: Option<&Path>,
    from: Option<&str>,
    mapping_path: &Path,
    stores: Arc<dyn StoreFactory>,
    options: MigrateOptions,
    page_size: usize,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mapping = MappingFile::load(mapping_path)?;
    let target = mapping.target.clone();
    let spec = mapping.to_spec()?;

    let source: SourceFactory = match (from, input) {
        (Some(name), _) => {
            eprintln!("📦 Source store: {}", name);
            from_store(stores.open(&StoreRef::new(name))?, page_size)
        }
        (None, Some(path)) => {
            eprintln!("📄 Source file: {}", path.display());
            from_csv_path(path)
        }
        (None, None) => return Err("no input given".into()),
    };

    eprintln!("   Mapping: {} ({} fields)", mapping_path.display(), spec.len());
    eprintln!("   Target: {}", target);
    if options.dry_run {
        eprintln!("   Dry run: nothing will be written");
    }

    let tally = Arc::new(Tally::new());
    let events: Arc<dyn EventBus> = Arc::new(
        Fanout::new()
            .with(Arc::new(ConsoleEvents::new()))
            .with(tally.clone()),
    );
    let migrator = RestMigrator::new(source, spec, target, stores).with_events(events);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\n⚠️  Interrupted, finishing current records...");
            on_interrupt.cancel();
        }
    });

    let mut migration = migrator.boot(options, cancel)?;
    let mut saved = Vec::new();
    let mut failure = None;
    while let Some(item) = migration.next().await {
        match item {
            Ok(record) => saved.push(record),
            Err(e) => {
                failure = Some(e);
                break;
            }
        }
    }

    let counts = tally.counts();
    eprintln!("\n{}", "=".repeat(70));
    eprintln!("📊 SUMMARY (run {})", migration.run_id());
    eprintln!("{}", "=".repeat(70));
    eprintln!("   Drawn:            {}", migration.drawn());
    eprintln!("   Saved:            {}", counts.saved);
    eprintln!("   Skipped:          {}", counts.skipped);
    eprintln!("   Errors:           {}", counts.errors);
    eprintln!("   Relations saved:  {}", counts.relations_saved);
    eprintln!("   Relation errors:  {}", counts.relation_errors);
    eprintln!("{}\n", "=".repeat(70));

    let json = serde_json::to_string_pretty(&saved)?;
    write_output(&json, output)?;

    match failure {
        Some(e) => Err(e.into()),
        None => {
            eprintln!("✨ Done!");
            Ok(())
        }
    }
}

fn cmd_parse(input: &Path, output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Parsing CSV: {}", input.display());

    let result = parse_file_auto(input)?;

    eprintln!("   Encoding: {}", result.encoding);
    eprintln!("   Delimiter: '{}' (auto-detected)", format_delimiter(result.delimiter));
    eprintln!("   Columns: {}", result.headers.join(", "));
    eprintln!("✅ Parsed {} records", result.records.len());

    let json = serde_json::to_string_pretty(&result.records)?;
    write_output(&json, output)?;

    Ok(())
}

fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "\\t".to_string(),
        c => c.to_string(),
    }
}

fn cmd_operations() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", operations_description());
    Ok(())
}

async fn cmd_serve(port: u16, store_dir: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    match store_dir {
        Some(dir) => {
            eprintln!("💾 Serving stores from {}", dir.display());
            restmigrator::server::start_server(port, FileFactory::new(dir)).await?
        }
        None => restmigrator::server::start_server(port, MemoryFactory::new()).await?,
    }
    Ok(())
}

fn write_output(content: &str, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("💾 Saved to: {}", p.display());
        }
        None => println!("{}", content),
    }
    Ok(())
}
