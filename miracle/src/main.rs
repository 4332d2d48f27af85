//! Miracle CLI - extract typed records from JSON, XML and CSV documents
//!
//! # Commands
//!
//! ```bash
//! miracle extract --schema schemas/rss.json feed.xml   # Apply a schema file to a document
//! miracle fetch --schema schemas/rss.json https://...  # Download, then extract
//! miracle check schemas/rss.json                       # Load and validate a schema file
//! miracle operations                                   # Show available converters
//! ```
//!
//! Logging is controlled with `RUST_LOG` (default `miracle=info`).

use clap::{Parser, Subcommand};
use miracle::{Extractor, Fetcher, Format, Record, ResolveOptions, SchemaFile};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "miracle")]
#[command(about = "Extract typed records from JSON, XML and CSV documents", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply a schema file to a local document
    Extract {
        /// Input document
        input: PathBuf,

        /// Schema file (JSON)
        #[arg(short, long)]
        schema: PathBuf,

        /// Document format: json, xml or csv (auto-detect if not specified)
        #[arg(short, long)]
        format: Option<Format>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Download a document over HTTP and apply a schema file to it
    Fetch {
        /// Document URL
        url: String,

        /// Schema file (JSON)
        #[arg(short, long)]
        schema: PathBuf,

        /// Document format: json, xml or csv (auto-detect if not specified)
        #[arg(short, long)]
        format: Option<Format>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Load a schema file and report its records
    Check {
        /// Schema file (JSON)
        schema: PathBuf,
    },

    /// Show available conversion operations
    Operations,
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("miracle=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Extract {
            input,
            schema,
            format,
            output,
        } => cmd_extract(&input, &schema, format, output.as_deref()),

        Commands::Fetch {
            url,
            schema,
            format,
            output,
        } => cmd_fetch(&url, &schema, format, output.as_deref()).await,

        Commands::Check { schema } => cmd_check(&schema),

        Commands::Operations => cmd_operations(),
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

fn cmd_extract(
    input: &Path,
    schema_path: &Path,
    format: Option<Format>,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Extracting: {}", input.display());

    let (schema, root) = SchemaFile::load(schema_path)?;
    let extractor = Extractor::new(&schema, root).with_options(ResolveOptions::from_env());
    let record = extractor.extract_file(input, format)?;

    write_record(&record, output)
}

async fn cmd_fetch(
    url: &str,
    schema_path: &Path,
    format: Option<Format>,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let (schema, root) = SchemaFile::load(schema_path)?;

    eprintln!("🌐 Fetching: {}", url);
    let fetched = Fetcher::from_env()?.fetch(url).await?;
    let format = format.or_else(|| fetched.format());
    eprintln!(
        "   {} bytes, format: {}",
        fetched.bytes.len(),
        format.map_or_else(|| "unknown".to_string(), |f| f.to_string())
    );

    let extractor = Extractor::new(&schema, root).with_options(ResolveOptions::from_env());
    let record = extractor.extract_bytes(format, &fetched.bytes)?;

    write_record(&record, output)
}

fn cmd_check(schema_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("✔️  Checking: {}", schema_path.display());

    let file = SchemaFile::from_path(schema_path)?;
    let (schema, root) = file.build()?;

    if !file.description.is_empty() {
        println!("{}", file.description);
    }
    for (id, definition) in schema.definitions() {
        let marker = if id == root { " (root)" } else { "" };
        println!("  📄 {}{}", definition.name(), marker);
        for binding in definition.fields() {
            let converted = if binding.converter().is_some() { " + convert" } else { "" };
            println!("     {}: {}{}", binding.name(), binding.action(), converted);
        }
    }

    eprintln!("✅ {} records, root '{}'", schema.len(), file.root);
    Ok(())
}

fn cmd_operations() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", miracle::operations_description());
    Ok(())
}

fn write_record(record: &Record, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let json = serde_json::to_string_pretty(record)?;
    match path {
        Some(p) => {
            fs::write(p, json)?;
            eprintln!("💾 Output written to: {}", p.display());
        }
        None => {
            println!("{}", json);
        }
    }
    Ok(())
}
