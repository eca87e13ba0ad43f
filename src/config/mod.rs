// Configuration management module
// TOML settings for the store, embedder, scoring weights, and evaluation

pub mod settings;


use anyhow::Result;
use console::style;

pub use settings::{
    CONFIG_DIR_ENV, Config, ConfigError, DatasetConfig, EmbedderConfig, EmbedderProvider,
    EvaluationConfig, HashConfig, LexicalConfig, OllamaConfig, ScoringConfig, StoreConfig,
    TokenAverageConfig,
};

/// Render the resolved configuration for display. Secrets are never included;
/// only the name of the variable holding the password is shown.
#[inline]
pub fn render_config(config: &Config) -> Result<String> {
    let body = toml::to_string_pretty(config)?;
    Ok(body)
}

#[inline]
pub fn show_config(config: &Config) -> Result<()> {
    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    match config.store.base_url() {
        Ok(url) => eprintln!("  Store URL: {}", style(url).cyan()),
        Err(e) => eprintln!("  Store URL: {} ({})", style("Invalid").red(), e),
    }
    eprintln!("  Index: {}", style(&config.store.index_name).cyan());
    let weights = &config.scoring.weights;
    eprintln!(
        "  Weights: name={} story={} attributes={} (+{})",
        style(weights.name).cyan(),
        style(weights.story).cyan(),
        style(weights.attributes).cyan(),
        style(config.scoring.offset).cyan()
    );
    eprintln!();
    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );
    eprintln!();

    println!("{}", render_config(config)?);
    Ok(())
}
