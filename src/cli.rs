//! Command-line interface definitions.
//!
//! Two subcommands mirror the two pipelines:
//!
//! ```sh
//! # Crawl sources and build the clean-text dataset
//! corpus_mill clean-text --config config.yaml --sources sources.yaml --since 7d
//!
//! # Build the language-identification dataset from clean text
//! corpus_mill language-id --config config.yaml --input-path output/clean_text/train.jsonl
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Build clean, deduplicated, balanced text corpora.
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Crawl configured sources into a clean, deduplicated, split dataset.
    CleanText(CleanTextArgs),
    /// Extract and balance language-identification samples from clean text.
    LanguageId(LanguageIdArgs),
}

#[derive(Args, Debug)]
pub struct CleanTextArgs {
    /// Path to the pipeline config.
    #[arg(short, long, default_value = "config.yaml")]
    pub config: PathBuf,

    /// Path to the source list.
    #[arg(short, long, default_value = "sources.yaml")]
    pub sources: PathBuf,

    /// Discover URLs only; fetch nothing.
    #[arg(long)]
    pub dry_run: bool,

    /// Limit URLs (or dump pages) per source.
    #[arg(long)]
    pub limit: Option<usize>,

    /// Only keep content newer than this: ISO date or relative (7d, 2w).
    #[arg(long)]
    pub since: Option<String>,

    /// Restrict the run to named sources (repeatable).
    #[arg(long = "source")]
    pub source_names: Vec<String>,

    /// Export cleaned documents without dedup/split.
    #[arg(long)]
    pub no_split: bool,

    /// File stem for --no-split raw output.
    #[arg(long, default_value = "raw")]
    pub output_suffix: String,

    /// Merge existing JSONL files instead of crawling (repeatable).
    #[arg(long = "merge-input")]
    pub merge_inputs: Vec<PathBuf>,
}

#[derive(Args, Debug)]
pub struct LanguageIdArgs {
    /// Path to the pipeline config.
    #[arg(short, long, default_value = "config.yaml")]
    pub config: PathBuf,

    /// Override the configured input dataset path.
    #[arg(long)]
    pub input_path: Option<PathBuf>,

    /// Cap the number of samples after balancing.
    #[arg(long)]
    pub limit: Option<usize>,
}

impl Cli {
    /// Config path of whichever subcommand was invoked.
    pub fn config_path(&self) -> &PathBuf {
        match &self.command {
            Command::CleanText(args) => &args.config,
            Command::LanguageId(args) => &args.config,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_text_parsing() {
        let cli = Cli::parse_from([
            "corpus_mill",
            "clean-text",
            "--config",
            "conf/config.yaml",
            "--sources",
            "conf/sources.yaml",
            "--since",
            "7d",
            "--source",
            "politika",
            "--source",
            "srwiki",
            "--limit",
            "50",
        ]);
        let Command::CleanText(args) = cli.command else {
            panic!("expected clean-text");
        };
        assert_eq!(args.config, PathBuf::from("conf/config.yaml"));
        assert_eq!(args.since.as_deref(), Some("7d"));
        assert_eq!(args.source_names, vec!["politika", "srwiki"]);
        assert_eq!(args.limit, Some(50));
        assert!(!args.dry_run);
    }

    #[test]
    fn test_language_id_parsing() {
        let cli = Cli::parse_from([
            "corpus_mill",
            "language-id",
            "--input-path",
            "output/clean_text/train.jsonl",
        ]);
        let Command::LanguageId(args) = cli.command else {
            panic!("expected language-id");
        };
        assert_eq!(
            args.input_path,
            Some(PathBuf::from("output/clean_text/train.jsonl"))
        );
        assert_eq!(args.config, PathBuf::from("config.yaml"));
    }

    #[test]
    fn test_merge_inputs_repeatable() {
        let cli = Cli::parse_from([
            "corpus_mill",
            "clean-text",
            "--merge-input",
            "a.jsonl",
            "--merge-input",
            "b.jsonl.gz",
        ]);
        let Command::CleanText(args) = cli.command else {
            panic!("expected clean-text");
        };
        assert_eq!(args.merge_inputs.len(), 2);
    }
}
