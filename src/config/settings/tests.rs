use super::*;
use serial_test::serial;
use tempfile::TempDir;

#[test]
fn default_config() {
    let config = Config::default();
    assert_eq!(config.store.protocol, "https");
    assert_eq!(config.store.host, "localhost");
    assert_eq!(config.store.port, 9200);
    assert_eq!(config.store.index_name, "japanese-folktales-vector");
    assert_eq!(config.embedder.provider, EmbedderProvider::Ollama);
    assert_eq!(config.embedder.dimension, 1024);
    assert_eq!(config.embedder.ollama.model, "bge-m3:latest");
    assert_eq!(config.embedder.ollama.timeout_secs, 30);
    assert_eq!(config.embedder.ollama.retry_attempts, 3);
    assert_eq!(config.scoring.weights, FieldWeights::new(0.2, 0.8, 0.0));
    assert!((config.scoring.offset - 1.0).abs() < f32::EPSILON);
    assert_eq!(config.lexical.max_query_terms, 12);
    assert_eq!(config.evaluation.top_k, 5);
}

#[test]
fn default_config_is_valid() {
    assert!(Config::default().validate().is_ok());
}

#[test]
fn store_validation() {
    let config = Config::default();

    let mut invalid = config.clone();
    invalid.store.protocol = "ftp".to_string();
    assert!(matches!(
        invalid.validate(),
        Err(ConfigError::InvalidProtocol(_))
    ));

    let mut invalid = config.clone();
    invalid.store.port = 0;
    assert!(matches!(invalid.validate(), Err(ConfigError::InvalidPort(0))));

    let mut invalid = config.clone();
    invalid.store.index_name = "Folk Tales".to_string();
    assert!(matches!(
        invalid.validate(),
        Err(ConfigError::InvalidIndexName(_))
    ));

    let mut invalid = config;
    invalid.store.index_name = "_hidden".to_string();
    assert!(invalid.validate().is_err());
}

#[test]
fn ollama_validation_only_applies_to_ollama_provider() {
    let mut config = Config::default();
    config.embedder.ollama.model = String::new();
    assert!(matches!(config.validate(), Err(ConfigError::InvalidModel(_))));

    config.embedder.provider = EmbedderProvider::Hash;
    assert!(config.validate().is_ok());
}

#[test]
fn embedder_validation() {
    let mut config = Config::default();
    config.embedder.dimension = 0;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.embedder.ollama.batch_size = 1001;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.embedder.hash.ngram_min = 3;
    config.embedder.hash.ngram_max = 2;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidNgramRange(3, 2))
    ));
}

#[test]
fn request_limits_validation() {
    let mut config = Config::default();
    config.embedder.ollama.timeout_secs = 0;
    assert!(matches!(config.validate(), Err(ConfigError::InvalidTimeout(0))));

    let mut config = Config::default();
    config.embedder.ollama.retry_attempts = 0;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidRetryAttempts(0))
    ));

    let mut config = Config::default();
    config.store.timeout_secs = 0;
    assert!(matches!(config.validate(), Err(ConfigError::InvalidTimeout(0))));

    let mut config = Config::default();
    config.store.retry_attempts = 11;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidRetryAttempts(11))
    ));

    // Only checked when Ollama is the provider
    let mut config = Config::default();
    config.embedder.provider = EmbedderProvider::Hash;
    config.embedder.ollama.timeout_secs = 0;
    assert!(config.validate().is_ok());
}

#[test]
fn ollama_request_limits_from_toml() {
    let parsed: Config = toml::from_str(
        r#"
        [embedder.ollama]
        model = "bge-m3:latest"
        timeout_secs = 120
        retry_attempts = 5
        "#,
    )
    .expect("ollama section should parse");

    assert_eq!(parsed.embedder.ollama.timeout_secs, 120);
    assert_eq!(parsed.embedder.ollama.retry_attempts, 5);
    assert_eq!(parsed.embedder.ollama.batch_size, 16);
    assert!(parsed.validate().is_ok());
}

#[test]
fn input_limit() {
    let mut config = EmbedderConfig::default();
    assert_eq!(config.input_limit(), Some(2048));
    config.max_input_chars = 0;
    assert_eq!(config.input_limit(), None);
}

#[test]
fn weight_validation() {
    let mut config = Config::default();
    config.scoring.weights.story = -0.1;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidWeight("story", _))
    ));

    let mut config = Config::default();
    config.scoring.weights.name = f32::NAN;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.scoring.offset = f32::INFINITY;
    assert!(matches!(config.validate(), Err(ConfigError::InvalidOffset(_))));
}

#[test]
fn attributes_weight_requires_attributes_vector() {
    let mut config = Config::default();
    config.scoring.weights = FieldWeights::new(0.2, 0.6, 0.2);
    assert!(matches!(
        config.validate(),
        Err(ConfigError::WeightWithoutField(_, _))
    ));

    config.scoring.composition = FieldComposition::SeparateWithAttributes;
    assert!(config.validate().is_ok());
}

#[test]
fn lexical_validation() {
    let mut config = Config::default();
    config.lexical.fields.clear();
    assert!(matches!(config.validate(), Err(ConfigError::NoLexicalFields)));

    let mut config = Config::default();
    config.lexical.max_query_terms = 0;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.evaluation.top_k = 0;
    assert!(matches!(config.validate(), Err(ConfigError::InvalidTopK(0))));
}

#[test]
fn url_generation() {
    let config = Config::default();
    let url = config.store.base_url().expect("store url");
    assert_eq!(url.as_str(), "https://localhost:9200/");

    let url = config.embedder.ollama.ollama_url().expect("ollama url");
    assert_eq!(url.as_str(), "http://localhost:11434/");
}

#[test]
fn toml_serialization() {
    let config = Config::default();
    let toml_str = toml::to_string(&config).expect("should serialize toml correctly");
    let parsed_config: Config = toml::from_str(&toml_str).expect("should parse toml correctly");
    assert_eq!(config, parsed_config);
}

#[test]
fn partial_toml_uses_defaults() {
    let parsed: Config = toml::from_str(
        r#"
        [scoring]
        composition = "separate"

        [scoring.weights]
        name = 0.3
        story = 0.7
        "#,
    )
    .expect("partial config should parse");

    assert_eq!(parsed.scoring.composition, FieldComposition::Separate);
    assert_eq!(parsed.scoring.weights, FieldWeights::new(0.3, 0.7, 0.0));
    assert_eq!(parsed.store, StoreConfig::default());
}

#[test]
fn load_missing_config_returns_defaults() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = Config::load(temp_dir.path()).expect("missing file is not an error");
    assert_eq!(config.get_base_dir(), temp_dir.path());
    assert_eq!(config.store, StoreConfig::default());
}

#[test]
fn save_and_load_round_trip() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut config = Config {
        base_dir: temp_dir.path().join("nested"),
        ..Config::default()
    };
    config.embedder.provider = EmbedderProvider::Hash;
    config.embedder.dimension = 256;
    config.scoring.weights = FieldWeights::new(0.3, 0.7, 0.0);
    config.save().expect("save");

    let loaded = Config::load(temp_dir.path().join("nested")).expect("load");
    assert_eq!(loaded, config);
}

#[test]
fn invalid_file_fails_validation_on_load() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    std::fs::write(
        temp_dir.path().join("config.toml"),
        "[store]\nport = 0\n",
    )
    .expect("write config");

    assert!(Config::load(temp_dir.path()).is_err());
}

#[test]
#[serial]
fn config_dir_resolution() {
    let temp_dir = TempDir::new().expect("should create temp dir");

    let explicit = Config::config_dir(Some(temp_dir.path())).expect("explicit");
    assert_eq!(explicit, temp_dir.path());

    // SAFETY: serialized with the other env-mutating tests
    unsafe { std::env::set_var(CONFIG_DIR_ENV, temp_dir.path()) };
    let from_env = Config::config_dir(None).expect("from env");
    unsafe { std::env::remove_var(CONFIG_DIR_ENV) };

    assert_eq!(from_env, temp_dir.path());
}

#[test]
#[serial]
fn password_from_environment() {
    use secrecy::ExposeSecret;

    let store = StoreConfig {
        password_env: "FOLKTALE_SEARCH_TEST_PASSWORD".to_string(),
        ..StoreConfig::default()
    };

    // SAFETY: serialized with the other env-mutating tests
    unsafe { std::env::remove_var("FOLKTALE_SEARCH_TEST_PASSWORD") };
    assert!(matches!(
        store.password(),
        Err(ConfigError::MissingPassword(_))
    ));

    unsafe { std::env::set_var("FOLKTALE_SEARCH_TEST_PASSWORD", "s3cret") };
    let password = store.password().expect("password is set");
    unsafe { std::env::remove_var("FOLKTALE_SEARCH_TEST_PASSWORD") };

    assert_eq!(password.expose_secret(), "s3cret");
}
