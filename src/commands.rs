// Command bodies for the CLI
// Collaborators are built once from the configuration and passed down


use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use console::style;
use tracing::{info, warn};

use crate::config::{Config, EmbedderConfig, EmbedderProvider, show_config};
use crate::dataset::{FolktaleRecord, builtin_folktales, load_records};
use crate::embeddings::{Embedder, OllamaClient, build_embedder};
use crate::evaluation::{BenchmarkCase, Evaluator, default_benchmark, load_benchmark};
use crate::indexer::{IndexManager, IndexingStats};
use crate::search::{FieldWeights, LexicalBaseline, ScoredHit, Scorer, WeightedQuery};
use crate::store::{DocumentStore, IndexSchema, OpenSearchStore};

/// Per-invocation weight overrides; unset fields keep the configured weight
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WeightOverrides {
    pub name: Option<f32>,
    pub story: Option<f32>,
    pub attributes: Option<f32>,
}

impl WeightOverrides {
    #[inline]
    pub fn apply(&self, base: FieldWeights) -> FieldWeights {
        FieldWeights::new(
            self.name.unwrap_or(base.name),
            self.story.unwrap_or(base.story),
            self.attributes.unwrap_or(base.attributes),
        )
    }
}

/// Resolve the configuration directory and load `config.toml` from it
#[inline]
pub fn load_config(config_dir: Option<&Path>) -> Result<Config> {
    let dir = Config::config_dir(config_dir).context("Failed to resolve configuration directory")?;
    Config::load(&dir)
}

/// Dataset from the command line, else the configured path, else the built-in corpus
#[inline]
pub fn load_dataset(config: &Config, dataset: Option<&Path>) -> Result<Vec<FolktaleRecord>> {
    match dataset.or(config.dataset.path.as_deref()) {
        Some(path) => load_records(path)
            .with_context(|| format!("Failed to load dataset from {}", path.display())),
        None => {
            info!("Using the built-in folktale corpus");
            Ok(builtin_folktales()?)
        }
    }
}

/// Connect to the configured OpenSearch node
#[inline]
pub fn connect_store(config: &Config) -> Result<OpenSearchStore> {
    OpenSearchStore::new(&config.store).context("Failed to initialize OpenSearch client")
}

fn schema_for(config: &Config, embedder: &dyn Embedder) -> IndexSchema {
    IndexSchema::new(config.scoring.composition, embedder.dimension())
}

fn ensure_index(store: &dyn DocumentStore, index: &str) -> Result<()> {
    if !store.index_exists(index)? {
        bail!(
            "index '{}' does not exist; run `folktale-search index` first",
            index
        );
    }
    Ok(())
}

/// Print ranked hits, one `* name (score: s)` line each
#[inline]
pub fn print_hits<W: Write>(out: &mut W, hits: &[ScoredHit]) -> io::Result<()> {
    if hits.is_empty() {
        writeln!(out, "No matches.")?;
    }
    for hit in hits {
        writeln!(out, "* {} (score: {:.4})", hit.name, hit.score)?;
    }
    Ok(())
}

/// Rebuild the index from `records` and print the assigned ids
#[inline]
pub fn index_dataset<W: Write>(
    store: &dyn DocumentStore,
    embedder: &dyn Embedder,
    config: &Config,
    records: &[FolktaleRecord],
    out: &mut W,
) -> Result<IndexingStats> {
    let manager = IndexManager::new(store, embedder, config.scoring.composition);
    let stats = manager
        .rebuild(&config.store.index_name, records)
        .with_context(|| format!("Failed to build index {}", config.store.index_name))?;

    for (id, record) in stats.ids.iter().zip(records) {
        writeln!(out, "id: {} - {}", id, record.name)?;
    }
    if stats.document_count != records.len() {
        warn!(
            "Index {} reports {} documents, expected {}",
            stats.index,
            stats.document_count,
            records.len()
        );
    }
    Ok(stats)
}

/// Run one weighted vector query and print the ranking
#[inline]
pub fn vector_search<W: Write>(
    store: &dyn DocumentStore,
    embedder: &dyn Embedder,
    config: &Config,
    query: &str,
    top_k: usize,
    weights: FieldWeights,
    out: &mut W,
) -> Result<Vec<ScoredHit>> {
    let index = &config.store.index_name;
    ensure_index(store, index)?;

    let scorer = Scorer::new(
        store,
        embedder,
        index.as_str(),
        schema_for(config, embedder),
        config.scoring.offset,
    );
    let hits = scorer.search(&WeightedQuery::new(query, weights), top_k)?;
    print_hits(out, &hits)?;
    Ok(hits)
}

/// Run one more-like-this query and print the ranking
#[inline]
pub fn lexical_search<W: Write>(
    store: &dyn DocumentStore,
    config: &Config,
    query: &str,
    top_k: usize,
    out: &mut W,
) -> Result<Vec<ScoredHit>> {
    let index = &config.store.index_name;
    ensure_index(store, index)?;

    let baseline = LexicalBaseline::new(store, index.as_str(), config.lexical.clone());
    let hits = baseline.search(query, top_k)?;
    print_hits(out, &hits)?;
    Ok(hits)
}

/// Evaluate `cases`, printing each row as it completes, then write the CSV report
#[inline]
pub fn run_evaluation<W: Write>(
    store: &dyn DocumentStore,
    embedder: &dyn Embedder,
    config: &Config,
    cases: &[BenchmarkCase],
    top_k: usize,
    report_path: &Path,
    out: &mut W,
) -> Result<usize> {
    let index = &config.store.index_name;
    ensure_index(store, index)?;

    let scorer = Scorer::new(
        store,
        embedder,
        index.as_str(),
        schema_for(config, embedder),
        config.scoring.offset,
    );
    let lexical = LexicalBaseline::new(store, index.as_str(), config.lexical.clone());
    let evaluator = Evaluator::new(&scorer, &lexical, config.scoring.weights);

    let report = evaluator.evaluate_with(cases, top_k, |row| {
        writeln!(out, "{}", row.query)?;
        writeln!(out, "  expected: {}", row.expected)?;
        writeln!(out, "  vector:   {}", row.vector_results)?;
        writeln!(out, "  mlt:      {}", row.mlt_results)?;
        Ok(())
    })?;

    report
        .write_csv(report_path)
        .with_context(|| format!("Failed to write report to {}", report_path.display()))?;
    Ok(report.len())
}

/// Build the configured embedder. An Ollama provider must be reachable and
/// serve the configured model before anything is embedded.
#[inline]
pub fn connect_embedder(config: &EmbedderConfig) -> Result<Box<dyn Embedder>> {
    if config.provider != EmbedderProvider::Ollama {
        return build_embedder(config);
    }

    let client = OllamaClient::new(config).context("Failed to initialize Ollama client")?;
    client.health_check().with_context(|| {
        format!(
            "Ollama is not ready to embed with model '{}'",
            config.ollama.model
        )
    })?;
    Ok(Box::new(client))
}

/// `index` command
#[inline]
pub fn index(config: &Config, dataset: Option<&Path>) -> Result<()> {
    let records = load_dataset(config, dataset)?;
    let store = connect_store(config)?;
    let embedder = connect_embedder(&config.embedder)?;

    let stats = index_dataset(&store, embedder.as_ref(), config, &records, &mut io::stdout())?;
    eprintln!(
        "{} Indexed {} folktales into {}",
        style("✓").green(),
        stats.document_count,
        style(&stats.index).cyan()
    );
    Ok(())
}

/// `search_vector` command
#[inline]
pub fn search_vector(
    config: &Config,
    query: &str,
    top_k: Option<usize>,
    overrides: WeightOverrides,
) -> Result<()> {
    let store = connect_store(config)?;
    let embedder = connect_embedder(&config.embedder)?;
    let weights = overrides.apply(config.scoring.weights);
    let top_k = top_k.unwrap_or(config.evaluation.top_k);

    vector_search(
        &store,
        embedder.as_ref(),
        config,
        query,
        top_k,
        weights,
        &mut io::stdout(),
    )?;
    Ok(())
}

/// `search_mlt` command
#[inline]
pub fn search_mlt(config: &Config, query: &str, top_k: Option<usize>) -> Result<()> {
    let store = connect_store(config)?;
    let top_k = top_k.unwrap_or(config.evaluation.top_k);

    lexical_search(&store, config, query, top_k, &mut io::stdout())?;
    Ok(())
}

/// `evaluate` command
#[inline]
pub fn evaluate(
    config: &Config,
    benchmark: Option<&Path>,
    top_k: Option<usize>,
    output: Option<PathBuf>,
) -> Result<()> {
    let cases = match benchmark {
        Some(path) => load_benchmark(path)
            .with_context(|| format!("Failed to load benchmark from {}", path.display()))?,
        None => default_benchmark(),
    };
    let top_k = top_k.unwrap_or(config.evaluation.top_k);
    let report_path = output.unwrap_or_else(|| config.evaluation.report_path.clone());

    let store = connect_store(config)?;
    let embedder = connect_embedder(&config.embedder)?;

    let rows = run_evaluation(
        &store,
        embedder.as_ref(),
        config,
        &cases,
        top_k,
        &report_path,
        &mut io::stdout(),
    )?;
    eprintln!(
        "{} Wrote {} rows to {}",
        style("✓").green(),
        rows,
        style(report_path.display()).cyan()
    );
    Ok(())
}

/// `config` command: optionally write the defaults, then print the configuration
#[inline]
pub fn manage_config(config: &Config, show: bool, init: bool) -> Result<()> {
    if init {
        if config.config_file_path().exists() {
            bail!(
                "configuration file {} already exists",
                config.config_file_path().display()
            );
        }
        config.save()?;
        eprintln!(
            "{} Wrote default configuration to {}",
            style("✓").green(),
            style(config.config_file_path().display()).cyan()
        );
    }

    if show || !init {
        show_config(config)?;
    }
    Ok(())
}
