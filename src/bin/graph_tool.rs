use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use livegraph::storage::DOCUMENT_FORMAT_VERSION;
use livegraph::{FileSink, GraphDocument, SnapshotFormat};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "graph-tool")]
#[command(about = "Developer tooling for livegraph snapshot documents")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print counts and per-type totals of a document
    Inspect { path: PathBuf },
    /// Re-encode a document
    Convert {
        from: PathBuf,
        to: PathBuf,
        #[arg(long, value_parser = parse_format, default_value = "json")]
        format: SnapshotFormat,
    },
    /// Print the supported document version, or the version of `path`
    FormatVersion { path: Option<PathBuf> },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Inspect { path } => inspect(&path),
        Command::Convert { from, to, format } => convert(&from, &to, format),
        Command::FormatVersion { path } => match path {
            Some(path) => {
                let (format, document) = read_document(&path)?;
                println!("{} ({})", document.version, format_name(format));
                Ok(())
            }
            None => {
                println!("Document format version: {}", DOCUMENT_FORMAT_VERSION);
                Ok(())
            }
        },
    }
}

fn parse_format(name: &str) -> std::result::Result<SnapshotFormat, String> {
    SnapshotFormat::parse(name).ok_or_else(|| format!("unknown format '{}' (json|msgpack)", name))
}

fn format_name(format: SnapshotFormat) -> &'static str {
    match format {
        SnapshotFormat::Json => "json",
        SnapshotFormat::MessagePack => "msgpack",
    }
}

fn read_document(path: &Path) -> Result<(SnapshotFormat, GraphDocument)> {
    let bytes =
        fs::read(path).with_context(|| format!("Failed to read document '{}'", path.display()))?;
    if bytes.is_empty() {
        return Err(anyhow!("Document '{}' is empty", path.display()));
    }
    let format = SnapshotFormat::detect(&bytes);
    let document = format
        .decode(&bytes)
        .with_context(|| format!("Failed to decode document '{}'", path.display()))?;
    Ok((format, document))
}

fn inspect(path: &Path) -> Result<()> {
    let (format, document) = read_document(path)?;

    let mut vertex_types: BTreeMap<&str, usize> = BTreeMap::new();
    for vertex in &document.vertices {
        *vertex_types.entry(vertex.vertex_type.as_str()).or_default() += 1;
    }
    let mut edge_types: BTreeMap<&str, usize> = BTreeMap::new();
    for edge in &document.edges {
        *edge_types.entry(edge.edge_type.as_str()).or_default() += 1;
    }

    println!("Document: {}", path.display());
    println!("Encoding: {}", format_name(format));
    println!("Version: {}", document.version);
    println!("Created at: {}", document.metadata.created_at);
    println!("Vertices: {}", document.vertices.len());
    for (vertex_type, count) in &vertex_types {
        println!("  {}: {}", vertex_type, count);
    }
    println!("Edges: {}", document.edges.len());
    for (edge_type, count) in &edge_types {
        println!("  {}: {}", edge_type, count);
    }
    Ok(())
}

fn convert(from: &Path, to: &Path, format: SnapshotFormat) -> Result<()> {
    let (_, document) = read_document(from)?;
    FileSink::new(to)
        .save(&document, format)
        .with_context(|| format!("Failed to write '{}'", to.display()))?;

    println!(
        "Converted {} -> {} ({})",
        from.display(),
        to.display(),
        format_name(format)
    );
    Ok(())
}
