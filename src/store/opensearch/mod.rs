
use std::fmt::Write as _;
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::{debug, info};
use url::Url;

use super::{
    DocumentStore, IndexSchema, MoreLikeThisQuery, QuerySpec, StoreHit, TextField,
    WeightedCosineQuery,
};
use crate::config::StoreConfig;
use crate::document::EmbeddedDocument;
use crate::http::{self, RequestError};
use crate::{FolktaleError, Result};

/// OpenSearch REST client with the k-NN plugin
pub struct OpenSearchStore {
    base_url: Url,
    username: String,
    password: SecretString,
    agent: ureq::Agent,
    retry_attempts: u32,
}

#[derive(Debug, Deserialize)]
struct IndexResponse {
    #[serde(rename = "_id")]
    id: String,
}

#[derive(Debug, Deserialize)]
struct CountResponse {
    count: usize,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    hits: HitsEnvelope,
}

#[derive(Debug, Deserialize)]
struct HitsEnvelope {
    hits: Vec<RawHit>,
}

#[derive(Debug, Deserialize)]
struct RawHit {
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "_score")]
    score: Option<f32>,
    #[serde(rename = "_source")]
    source: HitSource,
}

#[derive(Debug, Deserialize)]
struct HitSource {
    name: String,
}

impl OpenSearchStore {
    #[inline]
    pub fn new(config: &StoreConfig) -> anyhow::Result<Self> {
        let password = config.password()?;
        Self::with_password(config, password)
    }

    /// Construct with an explicit password instead of reading the environment
    #[inline]
    pub fn with_password(config: &StoreConfig, password: SecretString) -> anyhow::Result<Self> {
        let base_url = config.base_url()?;

        Ok(Self {
            base_url,
            username: config.username.clone(),
            password,
            agent: http::build_agent(Duration::from_secs(config.timeout_secs), config.verify_certs),
            retry_attempts: config.retry_attempts,
        })
    }

    fn authorization(&self) -> String {
        let credentials = format!("{}:{}", self.username, self.password.expose_secret());
        format!("Basic {}", STANDARD.encode(credentials))
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| FolktaleError::Store(format!("invalid request path {}: {}", path, e)))
    }

    fn get(&self, path: &str) -> std::result::Result<String, RequestError> {
        let url = self.url(path).map_err(|e| RequestError::Other(e.to_string()))?;
        let auth = self.authorization();
        debug!("GET {}", url);
        http::with_retry(self.base_url.as_str(), self.retry_attempts, || {
            self.agent
                .get(url.as_str())
                .header("Authorization", &auth)
                .call()
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })
    }

    fn head(&self, path: &str) -> std::result::Result<String, RequestError> {
        let url = self.url(path).map_err(|e| RequestError::Other(e.to_string()))?;
        let auth = self.authorization();
        debug!("HEAD {}", url);
        http::with_retry(self.base_url.as_str(), self.retry_attempts, || {
            self.agent
                .head(url.as_str())
                .header("Authorization", &auth)
                .call()
                .map(|_| String::new())
        })
    }

    fn delete(&self, path: &str) -> std::result::Result<String, RequestError> {
        let url = self.url(path).map_err(|e| RequestError::Other(e.to_string()))?;
        let auth = self.authorization();
        debug!("DELETE {}", url);
        http::with_retry(self.base_url.as_str(), self.retry_attempts, || {
            self.agent
                .delete(url.as_str())
                .header("Authorization", &auth)
                .call()
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })
    }

    fn send_json(
        &self,
        method: &str,
        path: &str,
        body: &Value,
    ) -> std::result::Result<String, RequestError> {
        let url = self.url(path).map_err(|e| RequestError::Other(e.to_string()))?;
        let auth = self.authorization();
        let body = body.to_string();
        debug!("{} {}", method, url);
        http::with_retry(self.base_url.as_str(), self.retry_attempts, || {
            let request = if method == "PUT" {
                self.agent.put(url.as_str())
            } else {
                self.agent.post(url.as_str())
            };
            request
                .header("Authorization", &auth)
                .header("Content-Type", "application/json")
                .send(body.as_str())
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })
    }

    fn map_error(&self, action: &str, error: RequestError) -> FolktaleError {
        match error {
            RequestError::Transport(msg) => FolktaleError::StoreConnection(format!(
                "{} failed: {} unreachable: {}",
                action, self.base_url, msg
            )),
            RequestError::Status(status @ (401 | 403)) => FolktaleError::StoreConnection(format!(
                "{} failed: authentication rejected (HTTP {})",
                action, status
            )),
            other => FolktaleError::Store(format!("{} failed: {}", action, other)),
        }
    }
}

fn parse<T: serde::de::DeserializeOwned>(action: &str, body: &str) -> Result<T> {
    serde_json::from_str(body)
        .map_err(|e| FolktaleError::Store(format!("{}: unexpected response: {}", action, e)))
}

/// Index body: k-NN enabled, text fields for name/story, keyword for attributes,
/// one `knn_vector` per declared vector field.
#[inline]
pub fn index_body(schema: &IndexSchema) -> Value {
    let mut properties = Map::new();
    properties.insert("name".to_string(), json!({"type": "text"}));
    properties.insert("story".to_string(), json!({"type": "text"}));
    properties.insert("attributes".to_string(), json!({"type": "keyword"}));
    for field in &schema.vector_fields {
        properties.insert(
            field.property().to_string(),
            json!({"type": "knn_vector", "dimension": schema.dimension}),
        );
    }

    json!({
        "settings": {"index": {"knn": true}},
        "mappings": {"properties": properties}
    })
}

/// Painless source for the weighted score. Zero-weight fields are left out so
/// their similarity is never computed.
#[inline]
pub fn score_script(query: &WeightedCosineQuery) -> String {
    let mut source = String::from("double score = params.offset;");
    for (field, _) in query.weights.active() {
        let _ = write!(
            source,
            " score += params.w_{} * cosineSimilarity(params.query_vector, doc['{}']);",
            field.label(),
            field.property()
        );
    }
    source.push_str(" return score;");
    source
}

#[inline]
pub fn weighted_search_body(query: &WeightedCosineQuery) -> Value {
    let mut params = Map::new();
    params.insert("query_vector".to_string(), json!(query.vector));
    params.insert("offset".to_string(), json!(query.offset));
    for (field, weight) in query.weights.active() {
        params.insert(format!("w_{}", field.label()), json!(weight));
    }

    json!({
        "size": query.size,
        "_source": ["name"],
        "query": {
            "script_score": {
                "query": {"match_all": {}},
                "script": {
                    "source": score_script(query),
                    "params": params
                }
            }
        }
    })
}

#[inline]
pub fn more_like_this_body(query: &MoreLikeThisQuery) -> Value {
    let fields: Vec<&str> = query.fields.iter().map(|f| TextField::property(*f)).collect();
    json!({
        "size": query.size,
        "_source": ["name"],
        "query": {
            "more_like_this": {
                "fields": fields,
                "like": query.like,
                "min_term_freq": query.min_term_freq,
                "max_query_terms": query.max_query_terms,
                "min_doc_freq": query.min_doc_freq
            }
        }
    })
}

impl DocumentStore for OpenSearchStore {
    #[inline]
    fn index_exists(&self, index: &str) -> Result<bool> {
        match self.head(&format!("/{}", index)) {
            Ok(_) => Ok(true),
            Err(RequestError::Status(404)) => Ok(false),
            Err(e) => Err(self.map_error("index existence check", e)),
        }
    }

    #[inline]
    fn create_index(&self, index: &str, schema: &IndexSchema) -> Result<()> {
        self.send_json("PUT", &format!("/{}", index), &index_body(schema))
            .map_err(|e| match e {
                RequestError::Status(400) => FolktaleError::IndexSchema(format!(
                    "store rejected the mapping for {}",
                    index
                )),
                other => self.map_error("create index", other),
            })?;
        info!(
            "Created index {} ({} vector fields, dimension {})",
            index,
            schema.vector_fields.len(),
            schema.dimension
        );
        Ok(())
    }

    #[inline]
    fn delete_index(&self, index: &str) -> Result<()> {
        self.delete(&format!("/{}", index))
            .map_err(|e| self.map_error("delete index", e))?;
        info!("Deleted index {}", index);
        Ok(())
    }

    #[inline]
    fn index_document(&self, index: &str, document: &EmbeddedDocument) -> Result<String> {
        let body = serde_json::to_value(document)
            .map_err(|e| FolktaleError::Store(format!("failed to encode document: {}", e)))?;
        let response = self
            .send_json("POST", &format!("/{}/_doc", index), &body)
            .map_err(|e| match e {
                RequestError::Status(400) => FolktaleError::IndexSchema(format!(
                    "store rejected document '{}'",
                    document.name
                )),
                other => self.map_error("index document", other),
            })?;
        let parsed: IndexResponse = parse("index document", &response)?;
        Ok(parsed.id)
    }

    #[inline]
    fn refresh(&self, index: &str) -> Result<()> {
        self.send_json("POST", &format!("/{}/_refresh", index), &json!({}))
            .map_err(|e| self.map_error("refresh", e))?;
        Ok(())
    }

    #[inline]
    fn count(&self, index: &str) -> Result<usize> {
        let response = self
            .get(&format!("/{}/_count", index))
            .map_err(|e| self.map_error("count", e))?;
        let parsed: CountResponse = parse("count", &response)?;
        Ok(parsed.count)
    }

    #[inline]
    fn search(&self, index: &str, query: &QuerySpec) -> Result<Vec<StoreHit>> {
        let body = match query {
            QuerySpec::WeightedCosine(q) => weighted_search_body(q),
            QuerySpec::MoreLikeThis(q) => more_like_this_body(q),
        };
        let response = self
            .send_json("POST", &format!("/{}/_search", index), &body)
            .map_err(|e| self.map_error("search", e))?;
        let parsed: SearchResponse = parse("search", &response)?;

        Ok(parsed
            .hits
            .hits
            .into_iter()
            .map(|hit| StoreHit {
                id: hit.id,
                name: hit.source.name,
                score: hit.score.unwrap_or(0.0),
            })
            .collect())
    }
}
