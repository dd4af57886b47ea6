use chunkdb_core::config::{self, CandidateSource, IndexKind, StoreConfig};
use chunkdb_core::{HnswConfig, IvfConfig, SearchOptions, Store};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "chunkdb_core=info,chunkdb=info";

#[derive(Parser)]
#[command(name = "chunkdb", about = "Inspect and query a chunkdb snapshot directory")]
struct Args {
    /// Directory holding the JSON snapshot
    #[arg(short, long, env = "CHUNKDB_DATA_DIR", default_value = config::DEFAULT_DATA_DIR)]
    data_dir: PathBuf,

    /// Vector index strategy built for every library
    #[arg(long, env = "CHUNKDB_INDEX", value_enum, default_value_t = IndexArg::Hnsw)]
    index: IndexArg,

    /// HNSW beam width at query time
    #[arg(long, default_value_t = config::HNSW_DEFAULT_EF_SEARCH)]
    ef_search: usize,

    /// IVF clusters requested at training time
    #[arg(long, default_value_t = config::IVF_DEFAULT_CLUSTERS)]
    clusters: usize,

    /// Grid cell width used for search candidates
    #[arg(long, default_value_t = config::GRID_DEFAULT_BIN_SIZE)]
    grid_bin_size: f32,

    /// Emit logs as JSON lines
    #[arg(long, default_value_t = false)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum IndexArg {
    BruteForce,
    Ivf,
    Hnsw,
}

#[derive(Clone, Copy, ValueEnum)]
enum SourceArg {
    Grid,
    Index,
}

#[derive(Subcommand)]
enum Command {
    /// Record and index counts
    Stats,
    /// List libraries
    Libraries,
    /// Top-k chunks of a library for a query vector
    Search {
        #[arg(short, long)]
        library: String,
        /// Comma-separated query vector, e.g. "0.1,0.2,0.3"
        #[arg(short, long)]
        vector: String,
        #[arg(short, long, default_value_t = config::DEFAULT_K)]
        k: usize,
        /// Only chunks containing every keyword
        #[arg(long)]
        keywords: Option<String>,
        /// Override where first-round candidates come from
        #[arg(long, value_enum)]
        candidates: Option<SourceArg>,
    },
    /// Time a full index rebuild over the snapshot records. Indexes live in
    /// memory only, so nothing is written back.
    Rebuild,
}

impl Args {
    fn store_config(&self) -> StoreConfig {
        let index = match self.index {
            IndexArg::BruteForce => IndexKind::BruteForce,
            IndexArg::Ivf => IndexKind::Ivf(IvfConfig {
                n_clusters: self.clusters,
                ..IvfConfig::default()
            }),
            IndexArg::Hnsw => IndexKind::Hnsw(HnswConfig {
                ef_search: self.ef_search,
                ..HnswConfig::default()
            }),
        };
        StoreConfig {
            grid_bin_size: self.grid_bin_size,
            ..StoreConfig::persistent(&self.data_dir, index)
        }
    }
}

fn init_logging(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn parse_vector(raw: &str) -> Result<Vec<f32>, String> {
    raw.split(',')
        .map(|s| {
            s.trim()
                .parse::<f32>()
                .map_err(|e| format!("invalid vector component '{}': {}", s.trim(), e))
        })
        .collect()
}

fn print_json(value: &impl serde::Serialize) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    if args.data_dir.exists() && !args.data_dir.is_dir() {
        return Err(format!("data_dir {:?} exists but is not a directory", args.data_dir).into());
    }
    let started = Instant::now();
    let store = Store::open(args.store_config())?;
    tracing::info!("Store ready in {:?}", started.elapsed());

    match args.command {
        Command::Stats => print_json(&store.stats())?,
        Command::Libraries => print_json(&store.list_libraries())?,
        Command::Search {
            library,
            vector,
            k,
            keywords,
            candidates,
        } => {
            let query = parse_vector(&vector)?;
            let mut options = SearchOptions::with_k(k);
            options.keywords = keywords;
            options.candidates = candidates.map(|c| match c {
                SourceArg::Grid => CandidateSource::Grid,
                SourceArg::Index => CandidateSource::Index,
            });
            let started = Instant::now();
            let hits = store.search_with(&library, &query, &options)?;
            tracing::info!(
                "Search in {} returned {} hits in {:?}",
                library,
                hits.len(),
                started.elapsed()
            );
            print_json(&hits)?;
        }
        Command::Rebuild => {
            let started = Instant::now();
            let chunks = store.rebuild_indices()?;
            let elapsed = started.elapsed();
            let stats = store.stats();
            print_json(&serde_json::json!({
                "index": stats.index,
                "chunks": chunks,
                "indexed_vectors": stats.indexed_vectors,
                "elapsed_ms": elapsed.as_millis() as u64,
            }))?;
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.log_json);

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
