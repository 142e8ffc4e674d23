//! CLI tool for extracting translatable text from Office documents and
//! injecting translations back.

mod commands;
mod document;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use document::Document;
use std::fs::{self, File};
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use xlate_core::dedup::REVERSE_MAP_FILE;
use xlate_core::transport::{merge_sources, write_bundle, DEFAULT_CHUNK_SIZE};
use xlate_core::{ChunkFile, ChunkOptions, MergedTranslations};

/// Extract text from .xlsx, .pptx and .docx files for translation, and
/// write translations back without losing formatting.
#[derive(Parser, Debug)]
#[command(name = "xlate")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract translatable text into JSON chunk files
    Extract(ExtractArgs),
    /// Write translated chunks back into a document
    Inject(InjectArgs),
    /// Merge translated chunks and bundles into one JSON map
    Merge(MergeArgs),
}

#[derive(Args, Debug)]
struct ExtractArgs {
    /// Input document (.xlsx, .pptx or .docx)
    input: PathBuf,

    /// Output directory (default: same as input file)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Maximum number of entries per chunk file
    #[arg(short, long, default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    /// Merge identical texts into one translation unit
    #[arg(short, long)]
    dedup: bool,

    /// Where to keep the dedup mapping (default: output directory)
    #[arg(short, long)]
    work_dir: Option<PathBuf>,

    /// Write all chunks into one ZIP bundle
    #[arg(short, long)]
    bundle: bool,

    /// Print the map to stdout instead of writing files
    #[arg(short, long)]
    print: bool,
}

#[derive(Args, Debug)]
struct InjectArgs {
    /// Original document the chunks were extracted from
    input: PathBuf,

    /// Translated chunk files (.json) or bundles (.zip)
    #[arg(required = true)]
    translations: Vec<PathBuf>,

    /// Output document
    #[arg(short, long)]
    output: PathBuf,

    /// Directory holding the dedup mapping (default: directory of the
    /// first translation file)
    #[arg(short, long)]
    work_dir: Option<PathBuf>,

    /// Abort on the first chunk that cannot be read
    #[arg(long)]
    fail_fast: bool,
}

#[derive(Args, Debug)]
struct MergeArgs {
    /// Translated chunk files (.json) or bundles (.zip)
    #[arg(required = true)]
    translations: Vec<PathBuf>,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Abort on the first chunk that cannot be read
    #[arg(long)]
    fail_fast: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    if cli.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    }

    match cli.command {
        Command::Extract(args) => run_extract(&args),
        Command::Inject(args) => run_inject(&args),
        Command::Merge(args) => run_merge(&args),
    }
}

/// Open a document from disk.
fn open_document(path: &Path) -> Result<Document> {
    let bytes = fs::read(path).with_context(|| format!("Failed to open {}", path.display()))?;
    Document::from_bytes(path, bytes).with_context(|| format!("Failed to parse {}", path.display()))
}

fn run_extract(args: &ExtractArgs) -> Result<()> {
    let document = open_document(&args.input)?;
    let options = ChunkOptions::new().with_chunk_size(args.chunk_size);
    let extraction = commands::extract(&document, &options, args.dedup)
        .with_context(|| format!("Failed to extract {}", args.input.display()))?;

    log::debug!(
        "Found {} entries in {} ({})",
        extraction.entries,
        args.input.display(),
        document.kind()
    );

    if args.print {
        let json = serde_json::to_string_pretty(&extraction.units)?;
        println!("{}", json);
    } else {
        let output_dir = get_output_dir(&args.input, args.output.as_ref())?;
        if args.bundle {
            let path = output_dir.join(format!("{}.zip", options.stem()));
            write_bundle_file(&path, options.stem(), &extraction.files)?;
            println!("Wrote {} chunks to {}", extraction.files.len(), path.display());
        } else {
            for file in &extraction.files {
                write_output(&output_dir.join(&file.name), file.contents.as_bytes())?;
            }
            println!(
                "Wrote {} chunks to {}",
                extraction.files.len(),
                output_dir.display()
            );
        }
    }

    match &extraction.dedup {
        Some((reverse_map, stats)) => {
            let work_dir = match &args.work_dir {
                Some(dir) => dir.clone(),
                None => get_output_dir(&args.input, args.output.as_ref())?,
            };
            fs::create_dir_all(&work_dir)
                .with_context(|| format!("Failed to create work directory: {}", work_dir.display()))?;
            write_output(&work_dir.join(REVERSE_MAP_FILE), reverse_map.to_json()?.as_bytes())?;

            log::info!("Dedup mapping written to {}", work_dir.display());
            eprintln!(
                "Extracted {} entries, {} unique ({} saved, {}%)",
                stats.total, stats.unique, stats.saved, stats.percent_saved
            );
        }
        None => eprintln!("Extracted {} entries", extraction.entries),
    }

    Ok(())
}

fn run_inject(args: &InjectArgs) -> Result<()> {
    let mut document = open_document(&args.input)?;
    let merged = read_translations(&args.translations, args.fail_fast)?;

    let work_dir = match &args.work_dir {
        Some(dir) => dir.clone(),
        None => args
            .translations
            .first()
            .and_then(|p| p.parent())
            .map(Path::to_path_buf)
            .unwrap_or_default(),
    };
    let mapping_path = work_dir.join(REVERSE_MAP_FILE);
    let translated = commands::expand_translations(merged.map, || match fs::read(&mapping_path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    })
    .with_context(|| format!("Failed to load {}", mapping_path.display()))?;

    let (report, bytes) = commands::inject(&mut document, &translated)
        .with_context(|| format!("Failed to inject into {}", args.input.display()))?;
    write_atomically(&args.output, &bytes)?;

    println!(
        "Applied {} of {} translations to {}",
        report.applied,
        translated.len(),
        args.output.display()
    );
    if !report.skipped.is_empty() {
        eprintln!("Skipped {} keys (run with --verbose to list them)", report.skipped.len());
    }
    Ok(())
}

fn run_merge(args: &MergeArgs) -> Result<()> {
    let merged = read_translations(&args.translations, args.fail_fast)?;
    let json = serde_json::to_string_pretty(&merged.map)?;

    match &args.output {
        Some(path) => {
            write_output(path, json.as_bytes())?;
            eprintln!(
                "Merged {} entries from {} chunks into {}",
                merged.map.len(),
                merged.chunks_read,
                path.display()
            );
        }
        None => println!("{}", json),
    }
    Ok(())
}

/// Read and merge translation inputs, reporting chunks that failed.
fn read_translations(paths: &[PathBuf], fail_fast: bool) -> Result<MergedTranslations> {
    let mut sources = Vec::with_capacity(paths.len());
    for path in paths {
        let bytes = fs::read(path).with_context(|| format!("Failed to open {}", path.display()))?;
        sources.push((path.display().to_string(), bytes));
    }

    let merged = merge_sources(sources, fail_fast).context("Failed to read translations")?;
    for failure in &merged.failures {
        eprintln!("Error: {}", failure);
    }
    if merged.chunks_read == 0 {
        anyhow::bail!("No readable translation chunks");
    }
    Ok(merged)
}

/// Determine the output directory for extracted chunks.
fn get_output_dir(input_path: &Path, output_dir: Option<&PathBuf>) -> Result<PathBuf> {
    let dir = match output_dir {
        Some(dir) => dir.clone(),
        None => input_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default(),
    };
    if !dir.as_os_str().is_empty() {
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;
    }
    Ok(dir)
}

/// Write chunk files into a ZIP bundle on disk.
fn write_bundle_file(path: &Path, folder: &str, files: &[ChunkFile]) -> Result<()> {
    let buffer = write_bundle(Cursor::new(Vec::new()), folder, files)
        .with_context(|| format!("Failed to build bundle {}", path.display()))?;
    write_output(path, &buffer.into_inner())
}

/// Write a file next to the target and move it into place, so a failed
/// write never leaves a truncated document behind.
fn write_atomically(path: &Path, content: &[u8]) -> Result<()> {
    let mut staging = path.as_os_str().to_owned();
    staging.push(".partial");
    let staging = PathBuf::from(staging);

    write_output(&staging, content)?;
    fs::rename(&staging, path).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Write output to a file.
fn write_output(path: &Path, content: &[u8]) -> Result<()> {
    let mut file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;

    file.write_all(content)
        .with_context(|| format!("Failed to write to {}", path.display()))?;

    Ok(())
}
