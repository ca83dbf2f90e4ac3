//! Qdrant REST client

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::{IndexError, IndexPoint, ScoredPayload, SimilarityIndex};
use crate::config::{IndexConfig, NetworkConfig};
use crate::retry::{with_retry, RetryPolicy};
use crate::types::KnowledgePayload;

const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Deserialize)]
struct QdrantEnvelope<T> {
    result: T,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    #[serde(default)]
    score: Value,
    #[serde(default)]
    payload: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct CountResult {
    count: usize,
}

#[derive(Clone)]
pub struct QdrantIndex {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    retry: RetryPolicy,
}

impl QdrantIndex {
    pub fn new(config: &IndexConfig, network: &NetworkConfig) -> Result<Self, IndexError> {
        let http = reqwest::Client::builder()
            .timeout(network.request_timeout())
            .connect_timeout(network.connect_timeout())
            .build()?;
        Ok(Self {
            http,
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            retry: network.retry_policy(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authed(&self, req: RequestBuilder) -> RequestBuilder {
        match self.api_key.as_deref() {
            Some(key) => req.header("api-key", key),
            None => req,
        }
    }

    /// Vector size of an existing collection, `None` if it does not exist.
    async fn collection_dimension(&self, collection: &str) -> Result<Option<usize>, IndexError> {
        let resp = self
            .authed(self.http.get(self.url(&format!("/collections/{collection}"))))
            .send()
            .await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body: Value = check_status(resp).await?.json().await.map_err(malformed)?;
        // Single unnamed vector config: result.config.params.vectors.size
        body.pointer("/result/config/params/vectors/size")
            .and_then(Value::as_u64)
            .map(|n| Some(n as usize))
            .ok_or_else(|| IndexError::Malformed("collection info without vector size".into()))
    }

    async fn create_collection(&self, collection: &str, dimension: usize) -> Result<(), IndexError> {
        let body = json!({ "vectors": { "size": dimension, "distance": "Cosine" } });
        let resp = self
            .authed(self.http.put(self.url(&format!("/collections/{collection}"))))
            .json(&body)
            .send()
            .await?;
        check_status(resp).await?;
        Ok(())
    }

    async fn upsert_once(&self, collection: &str, points: &[IndexPoint]) -> Result<(), IndexError> {
        let points: Vec<Value> = points
            .iter()
            .map(|p| -> Result<Value, IndexError> {
                Ok(json!({
                    "id": p.point_id().to_string(),
                    "vector": p.vector,
                    "payload": serde_json::to_value(&p.payload).map_err(malformed)?,
                }))
            })
            .collect::<Result<_, _>>()?;

        let resp = self
            .authed(
                self.http
                    .put(self.url(&format!("/collections/{collection}/points?wait=true"))),
            )
            .json(&json!({ "points": points }))
            .send()
            .await?;
        check_collection_status(resp, collection).await?;
        Ok(())
    }

    async fn search_once(
        &self,
        collection: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredPayload>, IndexError> {
        let body = json!({
            "vector": vector,
            "limit": top_k,
            "with_payload": true,
            "with_vector": false,
        });
        let resp = self
            .authed(
                self.http
                    .post(self.url(&format!("/collections/{collection}/points/search"))),
            )
            .json(&body)
            .send()
            .await?;
        let envelope: QdrantEnvelope<Vec<SearchHit>> = check_collection_status(resp, collection)
            .await?
            .json()
            .await
            .map_err(malformed)?;

        let mut hits = Vec::with_capacity(envelope.result.len());
        for hit in envelope.result {
            let Some(score) = parse_score(&hit.score) else {
                warn!(score = %hit.score, "Skipping search hit with unreadable score");
                continue;
            };
            let Some(payload) = hit.payload else {
                warn!("Skipping search hit without payload");
                continue;
            };
            match serde_json::from_value::<KnowledgePayload>(payload) {
                Ok(payload) => hits.push(ScoredPayload { payload, score }),
                Err(e) => warn!(error = %e, "Skipping search hit with foreign payload"),
            }
        }
        Ok(hits)
    }

    async fn count_once(&self, collection: &str) -> Result<usize, IndexError> {
        let resp = self
            .authed(
                self.http
                    .post(self.url(&format!("/collections/{collection}/points/count"))),
            )
            .json(&json!({ "exact": true }))
            .send()
            .await?;
        let envelope: QdrantEnvelope<CountResult> = check_collection_status(resp, collection)
            .await?
            .json()
            .await
            .map_err(malformed)?;
        Ok(envelope.result.count)
    }
}

fn malformed(e: impl std::fmt::Display) -> IndexError {
    IndexError::Malformed(e.to_string())
}

async fn check_status(resp: Response) -> Result<Response, IndexError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let mut body = resp.text().await.unwrap_or_default();
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    Err(IndexError::Rejected {
        status: status.as_u16(),
        body,
    })
}

async fn check_collection_status(resp: Response, collection: &str) -> Result<Response, IndexError> {
    if resp.status() == StatusCode::NOT_FOUND {
        return Err(IndexError::CollectionMissing(collection.to_string()));
    }
    check_status(resp).await
}

/// Qdrant reports a plain number; some proxies wrap it as `{distance}` or
/// `{value}`. Distances convert to similarity as `1 - d`.
fn parse_score(raw: &Value) -> Option<f64> {
    match raw {
        Value::Number(n) => n.as_f64(),
        Value::Object(map) => {
            if let Some(d) = map.get("distance").and_then(Value::as_f64) {
                Some(1.0 - d)
            } else {
                map.get("value").and_then(Value::as_f64)
            }
        }
        _ => None,
    }
}

#[async_trait]
impl SimilarityIndex for QdrantIndex {
    async fn ensure_collection(&self, collection: &str, dimension: usize) -> Result<(), IndexError> {
        let existing = with_retry(self.retry, "qdrant_get_collection", || {
            self.collection_dimension(collection)
        })
        .await?;

        match existing {
            Some(expected) if expected != dimension => Err(IndexError::DimensionMismatch {
                expected,
                actual: dimension,
            }),
            Some(_) => {
                debug!(collection, dimension, "Collection exists");
                Ok(())
            }
            None => {
                with_retry(self.retry, "qdrant_create_collection", || {
                    self.create_collection(collection, dimension)
                })
                .await?;
                info!(collection, dimension, "Created collection (cosine)");
                Ok(())
            }
        }
    }

    async fn upsert(&self, collection: &str, points: &[IndexPoint]) -> Result<(), IndexError> {
        if points.is_empty() {
            return Ok(());
        }
        with_retry(self.retry, "qdrant_upsert", || self.upsert_once(collection, points)).await
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredPayload>, IndexError> {
        with_retry(self.retry, "qdrant_search", || {
            self.search_once(collection, vector, top_k)
        })
        .await
    }

    async fn count(&self, collection: &str) -> Result<usize, IndexError> {
        with_retry(self.retry, "qdrant_count", || self.count_once(collection)).await
    }

    async fn health(&self) -> bool {
        let req = self.authed(self.http.get(self.url("/healthz")));
        match req.send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                debug!(error = %e, "Qdrant health check failed");
                false
            }
        }
    }

    fn backend_name(&self) -> &'static str {
        "qdrant"
    }
}
