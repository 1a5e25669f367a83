//! # corpus_mill
//!
//! A corpus-building pipeline that crawls news sites, RSS feeds, and
//! Wikipedia dumps, extracts clean article text, removes duplicates, and
//! assembles balanced, split text datasets.
//!
//! ## Features
//!
//! - Polite fetching: per-domain rate limits, robots.txt compliance, an
//!   append-only on-disk response cache, and bounded retry with backoff
//! - Discovery through sitemaps (index-aware, depth-bounded) and RSS feeds,
//!   with incremental `--since` crawls
//! - Streaming Wikipedia dump ingestion with wiki-markup stripping
//! - Exact (SHA-256) and near-duplicate (MinHash/LSH) deduplication
//! - Quota balancing across label, source, and length for the
//!   language-identification dataset
//! - Stratified, seeded train/validation/test splitting and JSONL export
//!
//! ## Usage
//!
//! ```sh
//! corpus_mill clean-text --config config.yaml --sources sources.yaml --since 7d
//! corpus_mill language-id --config config.yaml
//! ```
//!
//! ## Architecture
//!
//! Each run is a staged pipeline: discover → fetch → extract → clean →
//! validate → dedup → split → export. Failures degrade stage by stage —
//! a dead URL, a malformed sitemap, or a missing optional capability cost
//! only their own documents, never the run.

use std::collections::HashMap;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::NaiveDateTime;
use clap::Parser;
use futures::stream::{self, StreamExt};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod clean;
mod cli;
mod config;
mod dedup;
mod discover;
mod error;
mod extract;
mod fetch;
mod langcheck;
mod models;
mod outputs;
mod sample;
mod sources;
mod split;
mod wiki;

use cli::{CleanTextArgs, Cli, Command, LanguageIdArgs};
use config::PipelineConfig;
use discover::feed::RssContentReader;
use error::PipelineError;
use extract::{ArticleExtractor, CssExtractor};
use fetch::Fetcher;
use langcheck::LanguageClassifier;
use models::{Document, Sample, SplitSet};
use sources::Source;

/// Concurrent page fetches per source. Order-preserving (`buffered`), since
/// document order feeds straight into first-wins deduplication.
const FETCH_CONCURRENCY: usize = 8;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Cli::parse();

    // Config problems are fatal before any work starts.
    let config = config::load_config(args.config_path())?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.clone()));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("corpus_mill starting up");

    match args.command {
        Command::CleanText(args) => run_clean_text(config, args).await?,
        Command::LanguageId(args) => run_language_id(config, args).await?,
    }

    let elapsed = start_time.elapsed();
    info!(?elapsed, secs = elapsed.as_secs(), "execution complete");
    Ok(())
}

/// The crawl → clean → dedup → split → export pipeline.
async fn run_clean_text(
    config: PipelineConfig,
    args: CleanTextArgs,
) -> Result<(), PipelineError> {
    let since = args.since.as_deref().map(discover::dates::parse_since).transpose()?;

    if !args.merge_inputs.is_empty() && args.no_split {
        return Err(PipelineError::InvalidArg(
            "--merge-input cannot be used with --no-split".to_string(),
        ));
    }
    if !args.merge_inputs.is_empty() && args.dry_run {
        return Err(PipelineError::InvalidArg(
            "--merge-input cannot be used with --dry-run".to_string(),
        ));
    }

    if !args.merge_inputs.is_empty() {
        return run_merge_inputs(&config, &args).await;
    }

    let sources = sources::load_sources(&args.sources)?;
    let names = (!args.source_names.is_empty()).then_some(args.source_names.as_slice());
    let sources = sources::filter_sources(sources, names);
    if sources.is_empty() {
        warn!("no sources enabled or matched the filter");
        return Ok(());
    }

    let fetcher = Fetcher::new(&config.collection).map_err(|e| {
        error!(error = %e, "failed to build fetcher");
        PipelineError::Config(e.to_string())
    })?;
    let feed_reader = RssContentReader;
    let extractor = CssExtractor;

    if args.dry_run {
        return run_dry_run(&sources, &fetcher, since, &feed_reader).await;
    }

    // ---- Collect raw documents, source by source ----
    let mut raw_documents: Vec<Document> = Vec::new();
    for source in &sources {
        let collected = if source.kind == "wiki" {
            collect_wikipedia_documents(source, &fetcher, &config, args.limit).await
        } else {
            collect_news_documents(
                source,
                &fetcher,
                &config,
                since,
                args.limit,
                &feed_reader,
                &extractor,
            )
            .await
        };
        info!(source = %source.name, count = collected.len(), "collected documents");
        raw_documents.extend(collected);
    }
    info!(count = raw_documents.len(), "collected raw documents");

    // ---- Clean, normalize, validate ----
    // No classifier is wired in by default; when validation is enabled the
    // stage degrades with a warning (see `langcheck`).
    let classifier: Option<&dyn LanguageClassifier> = None;
    let processed = apply_processing_pipeline(raw_documents, &config, classifier, !args.no_split);
    info!(count = processed.len(), "processed documents after cleaning");

    if args.no_split {
        let output_dir = Path::new(&config.output.output_dir).join("raw");
        let path = output_dir.join(format!("{}.jsonl", args.output_suffix));
        outputs::jsonl::export_jsonl(&processed, &path, config.output.compression.as_deref())
            .await?;
        return Ok(());
    }

    // ---- Dedup, split, export ----
    let deduped = dedup::deduplicate_documents(processed, &config.deduplication);
    info!(count = deduped.len(), "documents after deduplication");

    let splits = split::split_dataset(deduped, &config.splits);
    export_document_splits(&splits, &config).await?;
    Ok(())
}

/// Merge pre-crawled JSONL files: dedup, re-id, split, export.
async fn run_merge_inputs(
    config: &PipelineConfig,
    args: &CleanTextArgs,
) -> Result<(), PipelineError> {
    let mut documents: Vec<Document> = Vec::new();
    for path in &args.merge_inputs {
        let loaded: Vec<Document> = outputs::jsonl::load_jsonl(path)?;
        info!(path = %path.display(), count = loaded.len(), "loaded merge input");
        documents.extend(loaded);
    }
    info!(count = documents.len(), "loaded documents from merge inputs");

    let mut deduped = dedup::deduplicate_documents(documents, &config.deduplication);
    for document in &mut deduped {
        document.assign_id();
    }
    let splits = split::split_dataset(deduped, &config.splits);
    export_document_splits(&splits, config).await?;
    Ok(())
}

/// Discovery-only pass: log what a real run would fetch.
async fn run_dry_run(
    sources: &[Source],
    fetcher: &Fetcher,
    since: Option<NaiveDateTime>,
    feed_reader: &RssContentReader,
) -> Result<(), PipelineError> {
    for source in sources {
        if source.kind == "wiki" {
            info!(source = %source.name, dump = ?source.dump_file, "wikipedia dump configured");
            continue;
        }
        if source.rss_use_content {
            let entries =
                discover::collect_rss_entries(source, fetcher, since, Some(feed_reader)).await;
            info!(source = %source.name, count = entries.len(), "dry run: RSS entries");
        } else {
            let urls = discover::discover_urls(source, fetcher, since).await;
            info!(source = %source.name, count = urls.len(), "dry run: URLs");
        }
    }
    Ok(())
}

/// Crawl one news source into raw documents.
async fn collect_news_documents(
    source: &Source,
    fetcher: &Fetcher,
    config: &PipelineConfig,
    since: Option<NaiveDateTime>,
    limit: Option<usize>,
    feed_reader: &RssContentReader,
    extractor: &dyn ArticleExtractor,
) -> Vec<Document> {
    if source.url.is_empty() {
        warn!(source = %source.name, "missing URL for source");
        return Vec::new();
    }
    let source_domain = source.host();

    // Full-content feeds skip page fetching entirely.
    if source.rss_use_content {
        let mut entries =
            discover::collect_rss_entries(source, fetcher, since, Some(feed_reader)).await;
        if let Some(limit) = limit {
            entries.truncate(limit);
        }
        return entries
            .into_iter()
            .map(|entry| Document {
                text: entry.text,
                title: entry.title,
                date: entry.date.map(|d| d.date().to_string()),
                url: entry.url,
                source: source_domain.clone(),
                language: source.language.clone(),
                domain: Some(source.kind.clone()),
                id: None,
            })
            .collect();
    }

    let mut urls = discover::discover_urls(source, fetcher, since).await;
    if let Some(limit) = limit {
        urls.truncate(limit);
    }
    info!(source = %source.name, count = urls.len(), "discovered URLs");

    let rate_limit = source
        .rate_limit
        .unwrap_or(config.collection.default_rate_limit);
    let use_alternate = source.use_alternate_client;

    let source_meta = Arc::new((source_domain, source.language.clone(), source.kind.clone()));
    stream::iter(urls)
        .map(|url| {
            let meta = Arc::clone(&source_meta);
            async move {
                let html = fetcher.fetch(&url, rate_limit, use_alternate).await?;
                let article = extractor.extract(&html, &url)?;
                if article.text.is_empty() {
                    return None;
                }
                debug!(%url, bytes = article.text.len(), "extracted article");
                Some(Document {
                    text: article.text,
                    title: article.title,
                    date: article.date.map(|d| d.date().to_string()),
                    url,
                    source: meta.0.clone(),
                    language: meta.1.clone(),
                    domain: Some(meta.2.clone()),
                    id: None,
                })
            }
        })
        .buffered(FETCH_CONCURRENCY)
        .filter_map(std::future::ready)
        .collect()
        .await
}

/// Download (once) and read a Wikipedia dump into documents.
async fn collect_wikipedia_documents(
    source: &Source,
    fetcher: &Fetcher,
    config: &PipelineConfig,
    limit: Option<usize>,
) -> Vec<Document> {
    let (Some(dump_url), Some(dump_file)) = (&source.dump_url, &source.dump_file) else {
        warn!(source = %source.name, "missing dump configuration");
        return Vec::new();
    };

    let cache_dir = Path::new(&config.collection.cache_dir).join("wikipedia");
    let dump_path =
        match wiki::download_dump(fetcher.client(), dump_url, dump_file, &cache_dir).await {
            Ok(path) => path,
            Err(e) => {
                warn!(source = %source.name, error = %e, "dump download failed; skipping source");
                return Vec::new();
            }
        };

    let pages = match wiki::open_dump(&dump_path) {
        Ok(pages) => pages,
        Err(e) => {
            warn!(source = %source.name, error = %e, "cannot open dump; skipping source");
            return Vec::new();
        }
    };

    let source_domain = source.host();
    let mut documents = Vec::new();
    for page in pages {
        if let Some(limit) = limit {
            if documents.len() >= limit {
                break;
            }
        }
        documents.push(Document {
            url: wiki::page_url(&source.url, &page.title),
            text: page.text,
            title: Some(page.title),
            date: None,
            source: source_domain.clone(),
            language: source.language.clone(),
            domain: Some(source.kind.clone()),
            id: None,
        });
    }
    documents
}

/// Clean, normalize, quality-gate, and language-validate documents.
///
/// Every drop is logged with its reason and URL. Survivors get stable ids
/// when `assign_ids` is set; raw (`--no-split`) exports leave ids unset so
/// the merge pass assigns them after cross-file dedup.
fn apply_processing_pipeline(
    documents: Vec<Document>,
    config: &PipelineConfig,
    classifier: Option<&dyn LanguageClassifier>,
    assign_ids: bool,
) -> Vec<Document> {
    let mut processed = Vec::new();
    for mut document in documents {
        let text = clean::clean_document(&document.text, &config.cleaning);
        let text = clean::normalize_document(&text, &config.cleaning);
        if !clean::passes_quality_checks(&text, &config.cleaning, &config.quality) {
            debug!(url = %document.url, "dropped: failed quality checks");
            continue;
        }
        document.text = text;
        if document.language.as_deref().unwrap_or("").is_empty() {
            debug!(url = %document.url, "dropped: no language tag");
            continue;
        }
        if !langcheck::validate_language(&document, &config.language_assignment, classifier) {
            debug!(url = %document.url, "dropped: language validation");
            continue;
        }
        if assign_ids {
            document.assign_id();
        }
        processed.push(document);
    }
    processed
}

/// Write train/validation/test JSONL plus per-split statistics.
async fn export_document_splits(
    splits: &SplitSet<Document>,
    config: &PipelineConfig,
) -> Result<(), PipelineError> {
    let output_dir = PathBuf::from(&config.output.output_dir);
    for (name, items) in splits.iter_named() {
        let path = output_dir.join(format!("{name}.jsonl"));
        outputs::jsonl::export_jsonl(items, &path, config.output.compression.as_deref()).await?;
        info!(split = name, count = items.len(), "exported split");
    }
    if config.output.save_statistics {
        let stats_dir = config
            .output
            .statistics_dir
            .clone()
            .map(PathBuf::from)
            .unwrap_or_else(|| output_dir.join("stats"));
        outputs::stats::save_split_stats(splits, &stats_dir).await?;
    }
    Ok(())
}

/// The load → extract → balance → split → export pipeline for the
/// language-identification dataset.
async fn run_language_id(
    config: PipelineConfig,
    args: LanguageIdArgs,
) -> Result<(), PipelineError> {
    let input_path = args
        .input_path
        .clone()
        .or_else(|| config.source.source_dataset_path.clone().map(PathBuf::from))
        .ok_or_else(|| {
            PipelineError::Config("source_dataset_path is required for language-id".to_string())
        })?;

    let documents = load_clean_documents(&input_path)?;
    if documents.is_empty() {
        warn!(path = %input_path.display(), "no documents found");
        return Ok(());
    }
    info!(count = documents.len(), "loaded clean-text documents");

    let mut rng = StdRng::seed_from_u64(config.splits.random_seed);
    let label_mapping: &HashMap<String, String> = &config.labeling.source_mappings;

    let mut samples: Vec<Sample> = Vec::new();
    for document in &documents {
        if let Some(sample) =
            sample::extract_sample(document, &config.extraction, label_mapping, &mut rng)
        {
            samples.push(sample);
        }
    }
    info!(count = samples.len(), "extracted candidate samples");

    let mut samples = sample::apply_balancing(
        samples,
        &config.balancing,
        &config.extraction.length_buckets,
        &mut rng,
    );
    info!(count = samples.len(), "balanced samples");

    let target = &config.dataset.target_size;
    if let Some(max_samples) = target.max_samples {
        if samples.len() > max_samples {
            samples.truncate(max_samples);
        }
    }
    if let Some(min_samples) = target.min_samples {
        if samples.len() < min_samples {
            warn!(
                count = samples.len(),
                min_samples, "samples below minimum target"
            );
        }
    }
    if let Some(limit) = args.limit {
        samples.truncate(limit);
    }

    let splits = split::split_dataset(samples, &config.splits);
    let output_dir = PathBuf::from(&config.output.output_dir);
    for (name, items) in splits.iter_named() {
        let path = output_dir.join(format!("{name}.jsonl"));
        outputs::jsonl::export_jsonl(items, &path, config.output.compression.as_deref()).await?;
        info!(split = name, count = items.len(), "exported split");
    }
    Ok(())
}

/// Load clean documents from a file, or from a directory holding a family
/// of `*.jsonl.gz` / `*.jsonl` files (compressed preferred).
fn load_clean_documents(path: &Path) -> Result<Vec<Document>, PipelineError> {
    if !path.exists() {
        return Err(PipelineError::Config(format!(
            "input path not found: {}",
            path.display()
        )));
    }
    if path.is_file() {
        return outputs::jsonl::load_jsonl(path);
    }

    let mut gz_files = Vec::new();
    let mut plain_files = Vec::new();
    for entry in std::fs::read_dir(path)? {
        let entry_path = entry?.path();
        let name = entry_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if name.ends_with(".jsonl.gz") {
            gz_files.push(entry_path);
        } else if name.ends_with(".jsonl") {
            plain_files.push(entry_path);
        }
    }
    let mut files = if gz_files.is_empty() { plain_files } else { gz_files };
    files.sort();

    let mut documents = Vec::new();
    for file in files {
        documents.extend(outputs::jsonl::load_jsonl::<Document>(&file)?);
    }
    Ok(documents)
}
