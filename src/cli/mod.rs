//! CLI command definitions and parsing
use crate::client::{Index, Slop};
use crate::error::Result;
use crate::retrieval::{Feature, RetrieverConfig};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "chatnoir-retrieve",
    version,
    author = "neur0map",
    about = "Batch retrieval over the ChatNoir web search API",
    long_about = "chatnoir-retrieve runs query batches against the ChatNoir search API, \
                  flattens the selected result attributes into rows, and ranks the results \
                  per query so they can be written as TREC runs."
)]
pub struct Cli {
    /// Global config file path (defaults to ~/.config/chatnoir-retrieve/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging and per-query progress
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by commands that search
#[derive(clap::Args, Debug, Clone, Default)]
pub struct SearchOptions {
    /// Maximum number of results per query
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,

    /// Return all results instead of capping them
    #[arg(long, conflicts_with = "limit")]
    pub unlimited: bool,

    /// Use phrase search
    #[arg(long)]
    pub phrases: bool,

    /// Phrase search proximity tolerance (0-2)
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=2))]
    pub slop: Option<u8>,

    /// Index to search (repeatable, e.g. --index cw12 --index cw22)
    #[arg(short, long = "index", value_name = "INDEX")]
    pub indices: Vec<String>,

    /// Result attribute to include (repeatable, e.g. --feature title_text)
    #[arg(short, long = "feature", value_name = "FEATURE")]
    pub features: Vec<String>,

    /// Drop results without a document id
    #[arg(long)]
    pub filter_unknown: bool,

    /// Results per request
    #[arg(long)]
    pub page_size: Option<usize>,
}

impl SearchOptions {
    /// Override configured retriever settings with the given flags
    pub fn apply(&self, config: &mut RetrieverConfig) -> Result<()> {
        if let Some(limit) = self.limit {
            config.num_results = Some(limit);
        }
        if self.unlimited {
            config.num_results = None;
        }
        if self.phrases {
            config.phrases = true;
        }
        if let Some(slop) = self.slop {
            config.slop = Slop::try_from(slop)?;
        }
        if !self.indices.is_empty() {
            config.index = self
                .indices
                .iter()
                .map(|s| s.parse::<Index>())
                .collect::<Result<_>>()?;
        }
        if !self.features.is_empty() {
            config.features = self
                .features
                .iter()
                .map(|s| s.parse::<Feature>())
                .collect::<Result<_>>()?;
        }
        if self.filter_unknown {
            config.filter_unknown = true;
        }
        if let Some(page_size) = self.page_size {
            config.page_size = page_size;
        }
        Ok(())
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunFormat {
    /// qid Q0 docno rank score tag
    Trec,
    /// One JSON object per result
    Jsonl,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Search for a single query and print the ranked results
    Search {
        /// Search query text
        query: String,

        #[command(flatten)]
        options: SearchOptions,

        /// Show results in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Run a topics file and write a run
    Run {
        /// Topics file (qid<TAB>query lines, or .jsonl objects)
        topics: PathBuf,

        /// Output path (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Run format (defaults to the configured one)
        #[arg(long, value_enum)]
        format: Option<RunFormat>,

        /// Run tag (defaults to the configured one)
        #[arg(short, long)]
        tag: Option<String>,

        #[command(flatten)]
        options: SearchOptions,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Validate configuration file
    Validate {
        /// Path to config file (defaults to standard location)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Initialize default configuration
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}

impl Cli {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run() {
        let cli = Cli::try_parse_from([
            "chatnoir-retrieve",
            "run",
            "topics.tsv",
            "--format",
            "jsonl",
            "--index",
            "cw12",
            "--index",
            "cw22",
            "-f",
            "title",
            "-n",
            "3",
        ])
        .unwrap();

        match cli.command {
            Commands::Run {
                format, options, ..
            } => {
                assert_eq!(format, Some(RunFormat::Jsonl));
                assert_eq!(options.indices, vec!["cw12", "cw22"]);
                assert_eq!(options.features, vec!["title"]);
                assert_eq!(options.limit, Some(3));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_options_override_config() {
        let options = SearchOptions {
            unlimited: true,
            slop: Some(2),
            indices: vec!["cw09".to_string()],
            features: vec!["target".to_string(), "uuid".to_string()],
            ..SearchOptions::default()
        };
        let mut config = RetrieverConfig::new("key");
        options.apply(&mut config).unwrap();

        assert_eq!(config.num_results, None);
        assert_eq!(config.slop, Slop::Two);
        assert_eq!(config.index, BTreeSet::from([Index::ClueWeb09]));
        assert_eq!(
            config.features.columns(),
            vec!["uuid", "target_hostname", "target_uri"]
        );
        assert_eq!(config.page_size, 100);
    }

    #[test]
    fn test_unknown_feature_is_rejected() {
        let options = SearchOptions {
            features: vec!["bogus".to_string()],
            ..SearchOptions::default()
        };
        assert!(options.apply(&mut RetrieverConfig::new("key")).is_err());
    }

    #[test]
    fn test_slop_out_of_range() {
        let result = Cli::try_parse_from(["chatnoir-retrieve", "search", "q", "--slop", "3"]);
        assert!(result.is_err());
    }
}
