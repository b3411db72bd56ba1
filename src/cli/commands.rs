use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "writer-vss", about = "Semantic search over a catalogue of writers")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load a JSON dataset, embed every description and store it
    Seed {
        /// JSON array of {full_name, notable_works, description}
        #[arg(long, default_value = "data/writers.json")]
        file: String,
    },
    /// Recompute stored vectors page by page
    Reembed {
        /// Writers per page (defaults to WRITERS_BATCH_SIZE)
        #[arg(long)]
        batch_size: Option<usize>,
    },
    /// Nearest writers to a free-text query
    Search {
        query: String,
        #[arg(long, default_value = "3")]
        k: usize,
        /// cosine or l2
        #[arg(long, default_value = "cosine")]
        metric: String,
        /// Only writers with a notable work containing this title
        #[arg(long)]
        work: Option<String>,
    },
    /// Interactive question loop, Ctrl-C to quit
    Ask {
        #[arg(long, default_value = "3")]
        k: usize,
        #[arg(long, default_value = "cosine")]
        metric: String,
    },
    /// Show one writer by id
    Get { id: i64 },
    /// List writers ordered by id
    Scan {
        #[arg(long, default_value = "0")]
        offset: usize,
        #[arg(long, default_value = "20")]
        limit: usize,
    },
    /// Keyword filter on notable works and description
    Find {
        #[arg(long)]
        work: Option<String>,
        #[arg(long)]
        text: Option<String>,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Replace a writer with a JSON record and re-embed it
    Update {
        id: i64,
        /// JSON with full_name, notable_works, description
        json: String,
    },
    /// Report names that appear more than once in a dataset
    Duplicates {
        #[arg(long, default_value = "data/writers.json")]
        file: String,
    },
    /// Show store statistics
    Stats,
    /// Create the search index if the backend needs one
    CreateIndex,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_search_with_options() {
        let cli = Cli::try_parse_from([
            "writer-vss", "search", "dystopia", "--k", "5", "--metric", "l2", "--work", "1984",
        ])
        .unwrap();
        match cli.command {
            Commands::Search { query, k, metric, work } => {
                assert_eq!(query, "dystopia");
                assert_eq!(k, 5);
                assert_eq!(metric, "l2");
                assert_eq!(work.as_deref(), Some("1984"));
            }
            _ => panic!("expected search"),
        }
    }

    #[test]
    fn test_parses_create_index_and_defaults() {
        let cli = Cli::try_parse_from(["writer-vss", "create-index"]).unwrap();
        assert!(matches!(cli.command, Commands::CreateIndex));

        let cli = Cli::try_parse_from(["writer-vss", "scan"]).unwrap();
        assert!(matches!(cli.command, Commands::Scan { offset: 0, limit: 20 }));
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
