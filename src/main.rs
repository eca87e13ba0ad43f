use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use folktale_search::commands::{
    WeightOverrides, evaluate, index, load_config, manage_config, search_mlt, search_vector,
};

#[derive(Parser)]
#[command(name = "folktale-search")]
#[command(about = "Weighted vector search over Japanese folktales, with a lexical baseline")]
#[command(version)]
struct Cli {
    /// Directory holding config.toml
    #[arg(long, global = true, value_name = "DIR")]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Drop, recreate and populate the index from the dataset
    Index {
        /// JSON dataset to index instead of the configured one
        #[arg(long, value_name = "PATH")]
        dataset: Option<PathBuf>,
    },
    /// Rank folktales by weighted cosine similarity to the query
    #[command(name = "search_vector", alias = "search-vector")]
    SearchVector {
        query: String,
        /// Number of results
        #[arg(long)]
        top_k: Option<usize>,
        #[arg(long)]
        name_weight: Option<f32>,
        #[arg(long)]
        story_weight: Option<f32>,
        #[arg(long)]
        attributes_weight: Option<f32>,
    },
    /// Rank folktales by term overlap with the query
    #[command(name = "search_mlt", alias = "search-mlt")]
    SearchMlt {
        query: String,
        /// Number of results
        #[arg(long)]
        top_k: Option<usize>,
    },
    /// Run the benchmark queries through both rankers and write a CSV report
    Evaluate {
        /// JSON benchmark file; the built-in seven queries are used otherwise
        #[arg(long, value_name = "PATH")]
        benchmark: Option<PathBuf>,
        #[arg(long)]
        top_k: Option<usize>,
        /// Report path, overriding evaluation.report_path
        #[arg(long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Show or initialize the configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
        /// Write a config.toml with default settings
        #[arg(long)]
        init: bool,
    },
}

fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config_dir.as_deref())?;

    match cli.command {
        Commands::Index { dataset } => index(&config, dataset.as_deref()),
        Commands::SearchVector {
            query,
            top_k,
            name_weight,
            story_weight,
            attributes_weight,
        } => {
            let overrides = WeightOverrides {
                name: name_weight,
                story: story_weight,
                attributes: attributes_weight,
            };
            search_vector(&config, &query, top_k, overrides)
        }
        Commands::SearchMlt { query, top_k } => search_mlt(&config, &query, top_k),
        Commands::Evaluate {
            benchmark,
            top_k,
            output,
        } => evaluate(&config, benchmark.as_deref(), top_k, output),
        Commands::Config { show, init } => manage_config(&config, show, init),
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn index_command() {
        let cli = Cli::try_parse_from(["folktale-search", "index"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            assert!(matches!(parsed.command, Commands::Index { dataset: None }));
            assert_eq!(parsed.config_dir, None);
        }
    }

    #[test]
    fn index_command_with_dataset() {
        let cli = Cli::try_parse_from([
            "folktale-search",
            "--config-dir",
            "/tmp/folktales",
            "index",
            "--dataset",
            "tales.json",
        ]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            assert_eq!(parsed.config_dir, Some(PathBuf::from("/tmp/folktales")));
            if let Commands::Index { dataset } = parsed.command {
                assert_eq!(dataset, Some(PathBuf::from("tales.json")));
            }
        }
    }

    #[test]
    fn search_vector_with_weights() {
        let cli = Cli::try_parse_from([
            "folktale-search",
            "search_vector",
            "桃が流れてくる話",
            "--top-k",
            "3",
            "--name-weight",
            "0.3",
            "--story-weight",
            "0.7",
        ]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::SearchVector {
                query,
                top_k,
                name_weight,
                story_weight,
                attributes_weight,
            } = parsed.command
            {
                assert_eq!(query, "桃が流れてくる話");
                assert_eq!(top_k, Some(3));
                assert_eq!(name_weight, Some(0.3));
                assert_eq!(story_weight, Some(0.7));
                assert_eq!(attributes_weight, None);
            } else {
                panic!("expected search_vector");
            }
        }
    }

    #[test]
    fn kebab_case_aliases() {
        let vector = Cli::try_parse_from(["folktale-search", "search-vector", "q"]);
        assert!(matches!(
            vector.map(|c| c.command),
            Ok(Commands::SearchVector { .. })
        ));

        let mlt = Cli::try_parse_from(["folktale-search", "search-mlt", "q"]);
        assert!(matches!(
            mlt.map(|c| c.command),
            Ok(Commands::SearchMlt { .. })
        ));
    }

    #[test]
    fn search_mlt_command() {
        let cli = Cli::try_parse_from(["folktale-search", "search_mlt", "カチカチ山"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::SearchMlt { query, top_k } = parsed.command {
                assert_eq!(query, "カチカチ山");
                assert_eq!(top_k, None);
            }
        }
    }

    #[test]
    fn search_requires_query() {
        let cli = Cli::try_parse_from(["folktale-search", "search_vector"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
        }
    }

    #[test]
    fn invalid_weight_is_rejected() {
        let cli = Cli::try_parse_from([
            "folktale-search",
            "search_vector",
            "q",
            "--name-weight",
            "heavy",
        ]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::ValueValidation);
        }
    }

    #[test]
    fn evaluate_command() {
        let cli = Cli::try_parse_from([
            "folktale-search",
            "evaluate",
            "--benchmark",
            "bench.json",
            "--output",
            "out.csv",
        ]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Evaluate {
                benchmark,
                top_k,
                output,
            } = parsed.command
            {
                assert_eq!(benchmark, Some(PathBuf::from("bench.json")));
                assert_eq!(top_k, None);
                assert_eq!(output, Some(PathBuf::from("out.csv")));
            }
        }
    }

    #[test]
    fn config_show_flag() {
        let cli = Cli::try_parse_from(["folktale-search", "config", "--show"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Config { show, init } = parsed.command {
                assert!(show);
                assert!(!init);
            }
        }
    }

    #[test]
    fn invalid_command() {
        let cli = Cli::try_parse_from(["folktale-search", "invalid"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::InvalidSubcommand);
        }
    }

    #[test]
    fn help_message() {
        let cli = Cli::try_parse_from(["folktale-search", "--help"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::DisplayHelp);
        }
    }
}
