use std::collections::HashMap;

use qdrant_client::{
	Qdrant,
	client::Payload,
	qdrant::{
		CountPointsBuilder, CreateCollectionBuilder, DeletePointsBuilder, Distance,
		GetPointsBuilder, PointId, PointStruct, PointsIdsList, Query, QueryPointsBuilder,
		UpsertPointsBuilder, Value as QdrantValue, VectorParamsBuilder, point_id::PointIdOptions,
		value::Kind,
	},
};
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{Error, Result, filter::MetadataFilter, namer};
use mnema_domain::{DistanceMetric, Tenant, VectorMetadata};

const DOCUMENT_KEY: &str = "document";

/// One point to upsert: deterministic id, embedding, curated document, and
/// flat filterable metadata.
#[derive(Clone, Debug)]
pub struct VectorEntry {
	pub id: Uuid,
	pub vector: Vec<f32>,
	pub document: Value,
	pub metadata: VectorMetadata,
}

#[derive(Clone, Debug)]
pub struct StoredVector {
	pub document: Value,
	pub metadata: Map<String, Value>,
}

/// Query hit carrying the raw backend distance; similarity normalization is
/// the search layer's concern.
#[derive(Clone, Debug)]
pub struct ScoredHit {
	pub id: Uuid,
	pub document: Value,
	pub metadata: Map<String, Value>,
	pub distance: f32,
}

/// Per-tenant persistent vector index. Collections are created lazily and
/// the resolved names are cached so repeated writes skip the existence
/// check; creation runs under a lock to keep concurrent callers from racing
/// the same collection into being twice.
pub struct VectorStore {
	client: Qdrant,
	prefix: String,
	metric: DistanceMetric,
	documents: mnema_config::Documents,
	handles: Mutex<HashMap<String, String>>,
}
impl VectorStore {
	pub fn new(cfg: &mnema_config::VectorIndex, documents: mnema_config::Documents) -> Result<Self> {
		let metric = DistanceMetric::parse(&cfg.distance_metric)
			.map_err(|err| Error::Configuration(err.to_string()))?;
		let client = Qdrant::from_url(&cfg.url).build()?;

		Ok(Self {
			client,
			prefix: cfg.collection_prefix.clone(),
			metric,
			documents,
			handles: Mutex::new(HashMap::new()),
		})
	}

	pub fn metric(&self) -> DistanceMetric {
		self.metric
	}

	pub fn dimensions_for(&self, document_type: &str) -> u32 {
		self.documents.dimensions_for(document_type)
	}

	/// Resolves (and lazily creates) the tenant's collection, returning its
	/// name. Cached after the first resolution.
	pub async fn tenant_collection(&self, tenant: &Tenant) -> Result<String> {
		let mut handles = self.handles.lock().await;

		if let Some(name) = handles.get(&tenant.key()) {
			return Ok(name.clone());
		}

		let name = namer::collection_name(&self.prefix, tenant)?;

		if !self.client.collection_exists(&name).await? {
			let params = VectorParamsBuilder::new(
				self.documents.default_dimensions as u64,
				qdrant_distance(self.metric),
			);

			self.client
				.create_collection(CreateCollectionBuilder::new(&name).vectors_config(params))
				.await?;
		}

		handles.insert(tenant.key(), name.clone());

		Ok(name)
	}

	pub async fn upsert(&self, collection: &str, entries: Vec<VectorEntry>) -> Result<()> {
		if entries.is_empty() {
			return Ok(());
		}

		let mut points = Vec::with_capacity(entries.len());

		for entry in entries {
			let expected = self.dimensions_for(entry.metadata.document_type.as_str()) as usize;

			if entry.vector.len() != expected {
				return Err(Error::InvalidArgument(format!(
					"embedding dimension {} does not match the configured {} for document type {}.",
					entry.vector.len(),
					expected,
					entry.metadata.document_type,
				)));
			}

			let mut payload_map = HashMap::new();

			payload_map.insert(DOCUMENT_KEY.to_string(), QdrantValue::from(entry.document));

			for (key, value) in entry.metadata.to_flat_map() {
				payload_map.insert(key, QdrantValue::from(value));
			}

			points.push(PointStruct::new(
				entry.id.to_string(),
				entry.vector,
				Payload::from(payload_map),
			));
		}

		let upsert = UpsertPointsBuilder::new(collection, points).wait(true);

		self.client.upsert_points(upsert).await?;

		Ok(())
	}

	pub async fn fetch(&self, collection: &str, id: Uuid) -> Result<Option<StoredVector>> {
		let get = GetPointsBuilder::new(collection, vec![PointId::from(id.to_string())])
			.with_payload(true);
		let response = self.client.get_points(get).await?;
		let Some(point) = response.result.into_iter().next() else {
			return Ok(None);
		};
		let (document, metadata) = split_payload(point.payload);

		Ok(Some(StoredVector { document, metadata }))
	}

	pub async fn remove(&self, collection: &str, id: Uuid) -> Result<bool> {
		if self.fetch(collection, id).await?.is_none() {
			return Ok(false);
		}

		let selector = PointsIdsList { ids: vec![PointId::from(id.to_string())] };
		let delete = DeletePointsBuilder::new(collection).points(selector).wait(true);

		self.client.delete_points(delete).await?;

		Ok(true)
	}

	pub async fn count(&self, collection: &str) -> Result<u64> {
		let response = self.client.count(CountPointsBuilder::new(collection).exact(true)).await?;

		Ok(response.result.map(|result| result.count).unwrap_or(0))
	}

	pub async fn query(
		&self,
		collection: &str,
		vector: Vec<f32>,
		k: u64,
		filter: &MetadataFilter,
	) -> Result<Vec<ScoredHit>> {
		let mut builder = QueryPointsBuilder::new(collection)
			.query(Query::new_nearest(vector))
			.limit(k)
			.with_payload(true);

		if let Some(engine_filter) = filter.to_qdrant() {
			builder = builder.filter(engine_filter);
		}

		let response = self.client.query(builder).await?;
		let mut hits = Vec::with_capacity(response.result.len());

		for point in response.result {
			let Some(id) = point.id.as_ref().and_then(point_id_to_uuid) else {
				continue;
			};
			let distance = distance_from_score(self.metric, point.score);
			let (document, metadata) = split_payload(point.payload);

			hits.push(ScoredHit { id, document, metadata, distance });
		}

		Ok(hits)
	}
}

fn qdrant_distance(metric: DistanceMetric) -> Distance {
	match metric {
		DistanceMetric::Cosine => Distance::Cosine,
		DistanceMetric::Euclid => Distance::Euclid,
		DistanceMetric::Dot => Distance::Dot,
	}
}

/// The engine reports a higher-is-better score; callers expect the raw
/// metric distance. Cosine scores are similarities in [-1, 1], Euclid scores
/// are signed distances, dot scores pass through untouched.
fn distance_from_score(metric: DistanceMetric, score: f32) -> f32 {
	match metric {
		DistanceMetric::Cosine => 1.0 - score,
		DistanceMetric::Euclid => score.abs(),
		DistanceMetric::Dot => score,
	}
}

fn point_id_to_uuid(point_id: &PointId) -> Option<Uuid> {
	match &point_id.point_id_options {
		Some(PointIdOptions::Uuid(id)) => Uuid::parse_str(id).ok(),
		_ => None,
	}
}

fn split_payload(payload: HashMap<String, QdrantValue>) -> (Value, Map<String, Value>) {
	let mut document = Value::Null;
	let mut metadata = Map::new();

	for (key, value) in payload {
		let json = qdrant_value_to_json(value);

		if key == DOCUMENT_KEY {
			document = json;
		} else {
			metadata.insert(key, json);
		}
	}

	(document, metadata)
}

fn qdrant_value_to_json(value: QdrantValue) -> Value {
	match value.kind {
		Some(Kind::StringValue(text)) => Value::String(text),
		Some(Kind::IntegerValue(int)) => Value::from(int),
		Some(Kind::DoubleValue(double)) => Value::from(double),
		Some(Kind::BoolValue(flag)) => Value::Bool(flag),
		Some(Kind::StructValue(nested)) => Value::Object(
			nested
				.fields
				.into_iter()
				.map(|(key, value)| (key, qdrant_value_to_json(value)))
				.collect(),
		),
		Some(Kind::ListValue(list)) => {
			Value::Array(list.values.into_iter().map(qdrant_value_to_json).collect())
		},
		Some(Kind::NullValue(_)) | None => Value::Null,
	}
}
