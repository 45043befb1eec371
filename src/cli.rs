//! Command-line interface for treesight.

use clap::{Args, Parser, Subcommand};
use rayon::prelude::*;
use serde::Serialize;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

use crate::analysis::{AnalysisEngine, AnalysisRequest, AnalysisResult, EngineRegistry};
use crate::error::AnalysisError;

/// Exit codes.
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILED: i32 = 1;
pub const EXIT_ERROR: i32 = 2;

/// Directories never descended into when analyzing a tree.
const SKIPPED_DIRS: &[&str] = &["node_modules", "target", "vendor", "__pycache__", "dist", "build"];

/// Multi-language source analysis with tree-sitter.
///
/// Extracts code elements (functions, classes, imports, variables), runs
/// named or ad-hoc tree-sitter queries and filters the results.
#[derive(Parser)]
#[command(name = "treesight")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Project root; paths must stay inside it (default: current directory)
    #[arg(short, long, global = true)]
    pub root: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Analyze a file or every supported file under a directory
    Analyze(AnalyzeArgs),
    /// Run a named or ad-hoc query against a file
    Query(QueryArgs),
    /// List supported languages
    Languages,
    /// List the named queries available for a language
    Queries(QueriesArgs),
}

/// Arguments for the analyze command.
#[derive(Args)]
pub struct AnalyzeArgs {
    /// File or directory to analyze
    pub path: PathBuf,

    /// Language override (detected from the extension by default)
    #[arg(short, long)]
    pub language: Option<String>,

    /// Comma-separated query names (default: the language's defaults)
    #[arg(short, long, value_delimiter = ',')]
    pub queries: Option<Vec<String>>,

    /// Keep only elements matching this filter, e.g. "name=~get*,params=1"
    #[arg(short, long)]
    pub filter: Option<String>,

    /// Skip element extraction
    #[arg(long)]
    pub no_elements: bool,

    /// Skip query execution
    #[arg(long)]
    pub no_queries: bool,

    /// Skip complexity computation
    #[arg(long)]
    pub no_complexity: bool,

    /// Include the raw source text of each element
    #[arg(long)]
    pub details: bool,

    /// Print compact JSON instead of pretty-printed
    #[arg(long)]
    pub compact: bool,
}

/// Arguments for the query command.
#[derive(Args)]
pub struct QueryArgs {
    /// File to query
    pub path: PathBuf,

    /// Named query from the catalog
    #[arg(short, long, conflicts_with = "raw", required_unless_present = "raw")]
    pub name: Option<String>,

    /// Ad-hoc tree-sitter query
    #[arg(long)]
    pub raw: Option<String>,

    /// Language override
    #[arg(short, long)]
    pub language: Option<String>,

    /// Keep only captures matching this filter
    #[arg(short, long)]
    pub filter: Option<String>,

    /// Print compact JSON instead of pretty-printed
    #[arg(long)]
    pub compact: bool,
}

/// Arguments for the queries command.
#[derive(Args)]
pub struct QueriesArgs {
    /// Language to list queries for
    pub language: String,
}

#[derive(Serialize)]
struct QueryListing {
    name: String,
    description: Option<String>,
}

/// Install the stderr tracing subscriber. `RUST_LOG` wins over `-v`.
pub fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(io::stderr)
        .try_init();
}

/// Dispatch a parsed command line. Returns the process exit code.
pub fn run(cli: &Cli) -> anyhow::Result<i32> {
    let root = match &cli.root {
        Some(root) => root.clone(),
        None => std::env::current_dir()?,
    };
    let root = root.canonicalize().unwrap_or(root);
    let registry = EngineRegistry::new();
    let engine = match registry.get_or_create(Some(root.as_path())) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("Error: {}", e);
            return Ok(EXIT_ERROR);
        }
    };

    let code = match &cli.command {
        Commands::Analyze(args) => run_analyze(&engine, &root, args),
        Commands::Query(args) => run_query(&engine, args),
        Commands::Languages => run_languages(&engine),
        Commands::Queries(args) => run_queries(&engine, args),
    };
    registry.reset();
    code
}

/// Run the analyze command.
pub fn run_analyze(engine: &AnalysisEngine, root: &Path, args: &AnalyzeArgs) -> anyhow::Result<i32> {
    let target = if args.path.is_absolute() {
        args.path.clone()
    } else {
        root.join(&args.path)
    };

    if !target.is_dir() {
        let result = match engine.analyze_sync(&build_request(&args.path, args)) {
            Ok(result) => apply_element_filter(engine, result, args)?,
            Err(e) => {
                eprintln!("Error: {}", e);
                return Ok(EXIT_ERROR);
            }
        };
        let success = result.success;
        write_json(&result, args.compact)?;
        return Ok(if success { EXIT_SUCCESS } else { EXIT_FAILED });
    }

    let files = collect_files(engine, &target)?;
    if files.is_empty() {
        eprintln!("Warning: no supported files under {}", target.display());
        return Ok(EXIT_SUCCESS);
    }
    tracing::info!(count = files.len(), "analyzing directory");

    let outcomes: Vec<Result<AnalysisResult, AnalysisError>> = files
        .par_iter()
        .map(|file| engine.analyze_sync(&build_request(file, args)))
        .collect();

    let mut results = Vec::with_capacity(outcomes.len());
    let mut failed = false;
    for (file, outcome) in files.iter().zip(outcomes) {
        match outcome {
            Ok(result) => {
                failed |= !result.success;
                results.push(apply_element_filter(engine, result, args)?);
            }
            Err(e) => {
                failed = true;
                tracing::warn!(path = %file.display(), error = %e, "skipping file");
            }
        }
    }

    write_json(&results, args.compact)?;
    Ok(if failed { EXIT_FAILED } else { EXIT_SUCCESS })
}

/// Run the query command.
pub fn run_query(engine: &AnalysisEngine, args: &QueryArgs) -> anyhow::Result<i32> {
    let mut request = AnalysisRequest::new(args.path.to_string_lossy());
    if let Some(language) = &args.language {
        request = request.with_language(language);
    }

    let outcome = match (&args.name, &args.raw) {
        (_, Some(raw)) => engine.execute_query_string(&request, raw),
        (Some(name), None) => engine.execute_query(&request, name),
        (None, None) => {
            eprintln!("Error: either --name or --raw is required");
            return Ok(EXIT_ERROR);
        }
    };
    let mut result = match outcome {
        Ok(result) => result,
        Err(e) => {
            eprintln!("Error: {}", e);
            return Ok(EXIT_ERROR);
        }
    };

    if let Some(expr) = &args.filter {
        let language = match request.explicit_language() {
            Some(language) => language,
            None => engine.detect_language(&args.path).unwrap_or_default(),
        };
        let kept: Vec<_> = engine
            .filter_captures(&result, &language, expr)?
            .into_iter()
            .cloned()
            .collect();
        result.captures = kept;
    }

    let success = result.success;
    write_json(&result, args.compact)?;
    Ok(if success { EXIT_SUCCESS } else { EXIT_FAILED })
}

/// Run the languages command.
pub fn run_languages(engine: &AnalysisEngine) -> anyhow::Result<i32> {
    for language in engine.get_supported_languages() {
        println!("{}", language);
    }
    Ok(EXIT_SUCCESS)
}

/// Run the queries command.
pub fn run_queries(engine: &AnalysisEngine, args: &QueriesArgs) -> anyhow::Result<i32> {
    let language = args.language.trim().to_lowercase();
    let names = engine.get_supported_queries(&language);
    if names.is_empty() {
        eprintln!("Error: no queries for language {:?}", language);
        eprintln!("Run 'treesight languages' to see supported languages");
        return Ok(EXIT_ERROR);
    }

    let listing: Vec<QueryListing> = names
        .into_iter()
        .map(|name| QueryListing {
            description: engine.describe_query(&language, &name),
            name,
        })
        .collect();
    write_json(&listing, false)?;
    Ok(EXIT_SUCCESS)
}

fn build_request(path: &Path, args: &AnalyzeArgs) -> AnalysisRequest {
    let mut request = AnalysisRequest::new(path.to_string_lossy())
        .include_elements(!args.no_elements)
        .include_queries(!args.no_queries)
        .include_complexity(!args.no_complexity)
        // Modifier and parameter clauses scan element text.
        .include_details(args.details || args.filter.is_some());
    if let Some(language) = &args.language {
        request = request.with_language(language);
    }
    if let Some(queries) = &args.queries {
        request = request.with_queries(queries.clone());
    }
    request
}

fn apply_element_filter(
    engine: &AnalysisEngine,
    mut result: AnalysisResult,
    args: &AnalyzeArgs,
) -> anyhow::Result<AnalysisResult> {
    let Some(expr) = &args.filter else {
        return Ok(result);
    };
    let mut kept: Vec<_> = engine
        .filter_elements(&result, expr)?
        .into_iter()
        .cloned()
        .collect();
    if !args.details {
        for element in &mut kept {
            element.raw_text.clear();
        }
    }
    result.elements = kept;
    Ok(result)
}

/// Files under `dir` whose language the engine can detect.
fn collect_files(engine: &AnalysisEngine, dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(dir).sort_by_file_name().into_iter().filter_entry(|e| {
        let name = e.file_name().to_string_lossy();
        if e.depth() > 0 && e.file_type().is_dir() {
            return !name.starts_with('.') && !SKIPPED_DIRS.contains(&name.as_ref());
        }
        true
    }) {
        let entry = entry?;
        if entry.file_type().is_file() && engine.detect_language(entry.path()).is_some() {
            files.push(entry.path().to_path_buf());
        }
    }

    Ok(files)
}

fn write_json<T: Serialize + ?Sized>(value: &T, compact: bool) -> anyhow::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    if compact {
        serde_json::to_writer(&mut out, value)?;
    } else {
        serde_json::to_writer_pretty(&mut out, value)?;
    }
    writeln!(out)?;
    Ok(())
}
