use std::time::{Duration, Instant};

use reqwest::{Client, header::HeaderMap};
use serde_json::Value;

use crate::{Error, Result, cache::EmbeddingCache};
use mnema_config::EmbeddingProviderConfig;

/// Guardrail applied before any network call. The provider itself rejects
/// inputs past ~36 KB, so we fail fast a comfortable margin under that.
pub const MAX_TEXT_BYTES: usize = 30_000;
pub const PROVIDER_HARD_LIMIT_BYTES: usize = 36_000;

const BACKOFF_BASE_MS: u64 = 2_000;
const MAX_BACKOFF_DOUBLINGS: u32 = 6;
const HEALTH_PROBE_TEXT: &str = "health probe";

#[derive(Clone, Debug, serde::Serialize)]
pub struct Embedding {
	pub vector: Vec<f32>,
	pub dimension: usize,
	pub provider: String,
	pub cached: bool,
}

#[derive(Clone, Debug, serde::Serialize)]
pub struct BatchEmbedding {
	pub vectors: Vec<Vec<f32>>,
	pub cache_hits: usize,
	pub duration: Duration,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
	Available,
	Unavailable,
}

#[derive(Clone, Debug, serde::Serialize)]
pub struct HealthReport {
	pub status: HealthStatus,
	pub latency: Option<Duration>,
	pub detail: Option<String>,
}

/// Client for the external embedding provider. Owns the request guardrails,
/// the retry/backoff policy, and the cache lookup/population on every path.
pub struct EmbeddingGateway {
	cfg: EmbeddingProviderConfig,
	client: Client,
	cache: EmbeddingCache,
}
impl EmbeddingGateway {
	pub fn new(cfg: EmbeddingProviderConfig, cache: EmbeddingCache) -> Result<Self> {
		let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;

		Ok(Self { cfg, client, cache })
	}

	pub fn model(&self) -> &str {
		&self.cfg.model
	}

	pub fn cache(&self) -> &EmbeddingCache {
		&self.cache
	}

	pub async fn generate(&self, text: &str) -> Result<Embedding> {
		self.generate_with_model(text, None).await
	}

	/// Same as [`Self::generate`] with the configured model swapped for
	/// another one the provider serves. Cache entries are keyed per model.
	pub async fn generate_with_model(&self, text: &str, model: Option<&str>) -> Result<Embedding> {
		validate_text(text)?;

		let model = model.unwrap_or(self.cfg.model.as_str());

		if let Some(vector) = self.cache.get(text, model) {
			return Ok(Embedding {
				dimension: vector.len(),
				vector,
				provider: self.cfg.provider_id.clone(),
				cached: true,
			});
		}

		let mut vectors =
			self.request_embeddings(model, std::slice::from_ref(&text.to_string())).await?;
		let Some(vector) = vectors.pop() else {
			return Err(Error::InvalidResponse {
				message: "provider returned no vectors for a single input.".to_string(),
			});
		};

		self.cache.put(text, model, vector.clone());

		Ok(Embedding {
			dimension: vector.len(),
			vector,
			provider: self.cfg.provider_id.clone(),
			cached: false,
		})
	}

	pub async fn generate_batch(&self, texts: &[String]) -> Result<BatchEmbedding> {
		let started = Instant::now();

		for text in texts {
			validate_text(text)?;
		}

		let model = self.cfg.model.as_str();
		let mut vectors: Vec<Option<Vec<f32>>> =
			texts.iter().map(|text| self.cache.get(text, model)).collect();
		let cache_hits = vectors.iter().filter(|slot| slot.is_some()).count();
		let missing: Vec<usize> = vectors
			.iter()
			.enumerate()
			.filter_map(|(idx, slot)| slot.is_none().then_some(idx))
			.collect();

		if !missing.is_empty() {
			let miss_texts: Vec<String> =
				missing.iter().map(|idx| texts[*idx].clone()).collect();
			let fetched = self.request_embeddings(model, &miss_texts).await?;

			if fetched.len() != missing.len() {
				return Err(Error::InvalidResponse {
					message: format!(
						"provider returned {} vectors for {} inputs.",
						fetched.len(),
						missing.len()
					),
				});
			}

			for (idx, vector) in missing.into_iter().zip(fetched) {
				self.cache.put(&texts[idx], model, vector.clone());

				vectors[idx] = Some(vector);
			}
		}

		Ok(BatchEmbedding {
			vectors: vectors.into_iter().flatten().collect(),
			cache_hits,
			duration: started.elapsed(),
		})
	}

	pub async fn health_check(&self) -> HealthReport {
		let started = Instant::now();

		match self.request_embeddings(&self.cfg.model, &[HEALTH_PROBE_TEXT.to_string()]).await {
			Ok(_) => HealthReport {
				status: HealthStatus::Available,
				latency: Some(started.elapsed()),
				detail: None,
			},
			Err(err) => HealthReport {
				status: HealthStatus::Unavailable,
				latency: None,
				detail: Some(err.to_string()),
			},
		}
	}

	async fn request_embeddings(&self, model: &str, texts: &[String]) -> Result<Vec<Vec<f32>>> {
		let url = format!("{}{}", self.cfg.api_base, self.cfg.path);
		let headers = crate::auth_headers(&self.cfg.api_key, &self.cfg.default_headers)?;
		let body = serde_json::json!({
			"model": model,
			"input": texts,
		});
		let mut attempt = 0_u32;

		loop {
			match self.send_once(&url, headers.clone(), &body).await {
				Ok(vectors) => return Ok(vectors),
				Err(err) if is_retryable(&err) => {
					if attempt >= self.cfg.max_retries {
						return Err(Error::Provider {
							message: format!(
								"embedding provider unavailable after {attempt} retries: {err}"
							),
						});
					}

					attempt += 1;

					tokio::time::sleep(backoff_for_attempt(attempt)).await;
				},
				Err(err) => return Err(err),
			}
		}
	}

	async fn send_once(&self, url: &str, headers: HeaderMap, body: &Value) -> Result<Vec<Vec<f32>>> {
		let res = self.client.post(url).headers(headers).json(body).send().await?;
		let json: Value = res.error_for_status()?.json().await?;

		parse_embedding_response(json)
	}
}

fn validate_text(text: &str) -> Result<()> {
	if text.trim().is_empty() {
		return Err(Error::InvalidInput {
			message: "embedding text must be non-empty.".to_string(),
		});
	}
	if text.len() > MAX_TEXT_BYTES {
		return Err(Error::InvalidInput {
			message: format!(
				"embedding text is {} bytes; at most {MAX_TEXT_BYTES} is accepted.",
				text.len()
			),
		});
	}

	Ok(())
}

fn is_retryable(err: &Error) -> bool {
	let Error::Reqwest(inner) = err else {
		return false;
	};

	if inner.is_timeout() || inner.is_connect() {
		return true;
	}

	inner
		.status()
		.map(|status| status.as_u16() == 429 || status.is_server_error())
		.unwrap_or(false)
}

fn backoff_for_attempt(attempt: u32) -> Duration {
	let exp = attempt.max(1).saturating_sub(1).min(MAX_BACKOFF_DOUBLINGS);

	Duration::from_millis(BACKOFF_BASE_MS << exp)
}

fn parse_embedding_response(json: Value) -> Result<Vec<Vec<f32>>> {
	let data = json.get("data").and_then(|v| v.as_array()).ok_or_else(|| {
		Error::InvalidResponse { message: "response is missing the data array.".to_string() }
	})?;
	let mut indexed: Vec<(usize, Vec<f32>)> = Vec::with_capacity(data.len());

	for (fallback_index, item) in data.iter().enumerate() {
		let index = item
			.get("index")
			.and_then(|v| v.as_u64())
			.map(|v| v as usize)
			.unwrap_or(fallback_index);
		let embedding = item.get("embedding").and_then(|v| v.as_array()).ok_or_else(|| {
			Error::InvalidResponse {
				message: "response item is missing the embedding array.".to_string(),
			}
		})?;
		let mut vec = Vec::with_capacity(embedding.len());

		for value in embedding {
			let number = value.as_f64().ok_or_else(|| Error::InvalidResponse {
				message: "embedding values must be numeric.".to_string(),
			})?;

			vec.push(number as f32);
		}

		indexed.push((index, vec));
	}

	indexed.sort_by_key(|(index, _)| *index);

	Ok(indexed.into_iter().map(|(_, vec)| vec).collect())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_embeddings_in_index_order() {
		let json = serde_json::json!({
			"data": [
				{ "index": 1, "embedding": [2.0, 3.0] },
				{ "index": 0, "embedding": [0.5, 1.5] }
			]
		});
		let parsed = parse_embedding_response(json).expect("parse failed");

		assert_eq!(parsed.len(), 2);
		assert_eq!(parsed[0], vec![0.5, 1.5]);
		assert_eq!(parsed[1], vec![2.0, 3.0]);
	}

	#[test]
	fn empty_text_fails_before_any_network_call() {
		let err = validate_text("   ").expect_err("expected guardrail failure");

		assert!(matches!(err, Error::InvalidInput { .. }));
	}

	#[test]
	fn oversized_text_fails_before_any_network_call() {
		let text = "x".repeat(MAX_TEXT_BYTES + 1);
		let err = validate_text(&text).expect_err("expected guardrail failure");

		assert!(matches!(err, Error::InvalidInput { .. }));
	}

	#[test]
	fn backoff_doubles_from_a_two_second_base() {
		assert_eq!(backoff_for_attempt(1), Duration::from_secs(2));
		assert_eq!(backoff_for_attempt(2), Duration::from_secs(4));
		assert_eq!(backoff_for_attempt(3), Duration::from_secs(8));
	}

	#[test]
	fn non_numeric_embedding_values_are_rejected() {
		let json = serde_json::json!({
			"data": [{ "index": 0, "embedding": ["oops"] }]
		});

		assert!(parse_embedding_response(json).is_err());
	}
}
