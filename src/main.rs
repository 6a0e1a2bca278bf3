use clap::{Parser, Subcommand};
use localdocs_retrieval::commands::{RouteRequest, SearchOverrides, route, search, validate_corpus};
use localdocs_retrieval::config::{run_interactive_config, show_config};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "localdocs-retrieval")]
#[command(about = "Rank document chunks against a query embedding and merge same-page citations")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure default retrieval settings
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Search a corpus of document packages with a query embedding
    Search {
        /// Package file or directory of package files
        #[arg(long)]
        corpus: PathBuf,
        /// JSON file holding the query embedding
        #[arg(long)]
        query: PathBuf,
        /// Maximum number of results
        #[arg(long)]
        top_k: Option<usize>,
        /// Discard results scoring below this similarity
        #[arg(long, allow_negative_numbers = true)]
        min_similarity: Option<f32>,
        /// Keep same-page results as separate citations
        #[arg(long)]
        no_dedup: bool,
        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },
    /// Rank the documents or page sections of a corpus by their centroids
    Route {
        /// Package file or directory of package files
        #[arg(long)]
        corpus: PathBuf,
        /// JSON file holding the query embedding
        #[arg(long)]
        query: PathBuf,
        /// Number of documents or sections to return
        #[arg(long, default_value_t = 3)]
        top_n: usize,
        /// Rank page sections instead of whole documents
        #[arg(long)]
        sections: bool,
        /// Pages per section (overrides the configured value)
        #[arg(long)]
        section_pages: Option<u32>,
        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },
    /// Check a corpus for invalid or inconsistent embeddings
    Validate {
        /// Package file or directory of package files
        #[arg(long)]
        corpus: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config()?;
            } else {
                run_interactive_config()?;
            }
        }
        Commands::Search {
            corpus,
            query,
            top_k,
            min_similarity,
            no_dedup,
            json,
        } => {
            let overrides = SearchOverrides {
                top_k,
                min_similarity,
                no_dedup,
            };
            search(&corpus, &query, &overrides, json).await?;
        }
        Commands::Route {
            corpus,
            query,
            top_n,
            sections,
            section_pages,
            json,
        } => {
            let request = RouteRequest {
                top_n,
                sections,
                section_pages,
                json,
            };
            route(&corpus, &query, &request)?;
        }
        Commands::Validate { corpus } => {
            validate_corpus(&corpus)?;
        }
    }

    Ok(())
}
