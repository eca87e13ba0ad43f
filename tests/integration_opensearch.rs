#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

// Integration tests that require a running OpenSearch node
// Run with: OPENSEARCH_INITIAL_ADMIN_PASSWORD=... cargo test --test integration_opensearch -- --ignored

use std::env;

use folktale_search::config::{LexicalConfig, StoreConfig};
use folktale_search::dataset::builtin_folktales;
use folktale_search::document::FieldComposition;
use folktale_search::embeddings::HashEmbedder;
use folktale_search::indexer::IndexManager;
use folktale_search::search::{FieldWeights, LexicalBaseline, Scorer, WeightedQuery};
use folktale_search::store::{DocumentStore, OpenSearchStore};
use tracing::info;

const TEST_INDEX: &str = "folktale-search-integration";

fn store_config() -> StoreConfig {
    let mut config = StoreConfig {
        index_name: TEST_INDEX.to_string(),
        ..StoreConfig::default()
    };
    if let Ok(host) = env::var("OPENSEARCH_HOST") {
        config.host = host;
    }
    if let Some(port) = env::var("OPENSEARCH_PORT").ok().and_then(|p| p.parse().ok()) {
        config.port = port;
    }
    config
}

fn create_integration_test_store() -> OpenSearchStore {
    OpenSearchStore::new(&store_config()).expect("Failed to create OpenSearch client")
}

fn init_test_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init()
        .ok();
}

#[test]
#[ignore = "requires a running OpenSearch node"]
fn real_opensearch_index_lifecycle() {
    init_test_tracing();

    let store = create_integration_test_store();
    let embedder = HashEmbedder::new(128, 1..=2).expect("embedder");
    let manager = IndexManager::new(&store, &embedder, FieldComposition::StoryWithAttributes);
    let records = builtin_folktales().expect("builtin");

    let first = manager.rebuild(TEST_INDEX, &records).expect("first rebuild");
    let second = manager.rebuild(TEST_INDEX, &records).expect("second rebuild");
    info!("Indexed {} then {} documents", first.document_count, second.document_count);

    assert_eq!(first.document_count, records.len());
    assert_eq!(second.document_count, records.len());

    store.delete_index(TEST_INDEX).expect("cleanup");
    assert!(!store.index_exists(TEST_INDEX).expect("exists"));
}

#[test]
#[ignore = "requires a running OpenSearch node"]
fn real_opensearch_vector_and_lexical_search() {
    init_test_tracing();

    let store = create_integration_test_store();
    let embedder = HashEmbedder::new(128, 1..=2).expect("embedder");
    let manager = IndexManager::new(&store, &embedder, FieldComposition::StoryWithAttributes);
    manager
        .rebuild(TEST_INDEX, &builtin_folktales().expect("builtin"))
        .expect("rebuild");

    let scorer = Scorer::new(&store, &embedder, TEST_INDEX, manager.schema().clone(), 1.0);
    let vector = scorer
        .search(&WeightedQuery::new("カチカチ山", FieldWeights::default()), 5)
        .expect("vector search");
    info!("Vector hits: {:?}", vector);
    assert_eq!(vector[0].name, "カチカチ山");
    assert!(vector.windows(2).all(|w| w[0].score >= w[1].score));

    let lexical = LexicalBaseline::new(&store, TEST_INDEX, LexicalConfig::default())
        .search("カチカチ山", 5)
        .expect("lexical search");
    info!("Lexical hits: {:?}", lexical);
    assert!(!lexical.is_empty());

    store.delete_index(TEST_INDEX).expect("cleanup");
}

#[test]
#[ignore = "requires a running OpenSearch node"]
fn real_opensearch_rejects_wrong_password() {
    init_test_tracing();

    let store = OpenSearchStore::with_password(&store_config(), String::from("definitely-wrong").into())
        .expect("client");
    let result = store.index_exists(TEST_INDEX);
    assert!(result.is_err(), "wrong password should fail: {:?}", result);
}
