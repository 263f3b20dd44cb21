use std::collections::HashMap;

use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub provider: EmbeddingProviderConfig,
	#[serde(default)]
	pub cache: Cache,
	#[serde(default)]
	pub documents: Documents,
	#[serde(default)]
	pub search: Search,
	#[serde(default)]
	pub decay: Decay,
	#[serde(default)]
	pub ingest: Ingest,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Service {
	pub log_level: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
	pub vector: VectorIndex,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
}

#[derive(Clone, Debug, Deserialize)]
pub struct VectorIndex {
	pub url: String,
	pub collection_prefix: String,
	#[serde(default = "default_distance_metric")]
	pub distance_metric: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub timeout_ms: u64,
	#[serde(default = "default_max_retries")]
	pub max_retries: u32,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Cache {
	pub enabled: bool,
	pub max_entries: usize,
	pub ttl_secs: u64,
}
impl Default for Cache {
	fn default() -> Self {
		Self { enabled: true, max_entries: 4_096, ttl_secs: 3_600 }
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Documents {
	pub default_dimensions: u32,
	/// Per-document-type dimension overrides. Map keys are document type labels.
	pub dimensions: HashMap<String, u32>,
}
impl Default for Documents {
	fn default() -> Self {
		Self { default_dimensions: 768, dimensions: HashMap::new() }
	}
}
impl Documents {
	pub fn dimensions_for(&self, document_type: &str) -> u32 {
		self.dimensions.get(document_type).copied().unwrap_or(self.default_dimensions)
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Search {
	pub default_top_k: u64,
	pub min_similarity: f32,
}
impl Default for Search {
	fn default() -> Self {
		Self { default_top_k: 10, min_similarity: 0.0 }
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Decay {
	pub enabled: bool,
	pub half_life_days: f32,
}
impl Default for Decay {
	fn default() -> Self {
		Self { enabled: false, half_life_days: 30.0 }
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Ingest {
	pub queue_capacity: usize,
}
impl Default for Ingest {
	fn default() -> Self {
		Self { queue_capacity: 256 }
	}
}

fn default_distance_metric() -> String {
	"cosine".to_string()
}

fn default_max_retries() -> u32 {
	3
}
