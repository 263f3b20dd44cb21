pub mod ranking;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{MemoryService, Result};
use mnema_domain::{DocumentType, Tenant, Timeframe, timeframe};
use mnema_storage::filter::MetadataFilter;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchQuery {
	pub tenant: Tenant,
	pub document_type: DocumentType,
	pub query: String,
	pub top_k: Option<u64>,
	pub metadata_filter: Option<Value>,
	pub min_similarity: Option<f32>,
	pub timeframe: Option<Timeframe>,
	pub recency_weighting: Option<bool>,
	pub half_life_days: Option<f32>,
}
impl SearchQuery {
	pub fn new(tenant: Tenant, document_type: DocumentType, query: impl Into<String>) -> Self {
		Self {
			tenant,
			document_type,
			query: query.into(),
			top_k: None,
			metadata_filter: None,
			min_similarity: None,
			timeframe: None,
			recency_weighting: None,
			half_life_days: None,
		}
	}
}

/// Ordered search output. `similarity` is the metric-normalized value in
/// [0, 1]; `score` is what the results are ranked by and only differs from
/// `similarity` when temporal decay is applied.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchResult {
	pub id: Uuid,
	pub document: Value,
	pub metadata: Map<String, Value>,
	pub distance: f32,
	pub similarity: f32,
	pub score: f32,
}

impl MemoryService {
	pub async fn search(&self, query: SearchQuery) -> Result<Vec<SearchResult>> {
		let now = OffsetDateTime::now_utc();
		let top_k = query.top_k.unwrap_or(self.cfg.search.default_top_k);
		let min_similarity = query.min_similarity.unwrap_or(self.cfg.search.min_similarity);
		let apply_decay = query.recency_weighting.unwrap_or(self.cfg.decay.enabled);
		let half_life_days = query.half_life_days.unwrap_or(self.cfg.decay.half_life_days);
		let embedded = self.embedding.generate(&query.query).await?;
		let mut filter = match &query.metadata_filter {
			Some(raw) => MetadataFilter::parse(raw)?,
			None => MetadataFilter::default(),
		};

		// Scope every query to its own document type so types never bleed
		// into each other's results.
		filter.insert_equals("document_type", Value::from(query.document_type.as_str()));

		// A time bound is part of the engine query itself, not a post-filter
		// on an already-truncated top-k.
		if let Some(frame) = &query.timeframe {
			let window = timeframe::resolve(frame, now)?;

			filter.set_window(window.start_unix(), window.end_unix());
		}

		let collection = self.vectors.tenant_collection(&query.tenant).await?;
		let hits = self.vectors.query(&collection, embedded.vector, top_k, &filter).await?;
		let mut results = ranking::rank(
			hits,
			self.vectors.metric(),
			min_similarity,
			apply_decay,
			half_life_days,
			now,
		);

		results.truncate(top_k as usize);

		Ok(results)
	}
}
