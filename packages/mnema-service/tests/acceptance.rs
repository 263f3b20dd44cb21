use std::{sync::Arc, time::Duration};

use serde_json::Value;
use uuid::Uuid;

use mnema_config::{
	Cache, Config, Decay, Documents, EmbeddingProviderConfig, Ingest, Postgres, Search, Service,
	Storage, VectorIndex,
};
use mnema_domain::{DocumentType, Tenant, vector_entry_id};
use mnema_providers::{BatchEmbedding, Embedding};
use mnema_service::{
	BoxFuture, EmbeddingProvider, EventBus, MemoryService, RECORD_STORED, SearchQuery,
	StoreRequest,
};
use mnema_storage::{
	db::Db,
	vector::{VectorEntry, VectorStore},
};
use mnema_testkit::{Error, Result, TestDatabase, env_dsn, env_qdrant_url, with_test_db};

const DIMENSIONS: u32 = 4;

/// Keyword embedding stub: enough geometry for cosine ranking without a
/// provider. "alpha" and "beta" texts are orthogonal.
struct KeywordEmbedding;
impl KeywordEmbedding {
	fn vector_for(text: &str) -> Vec<f32> {
		if text.contains("alpha") {
			vec![1.0, 0.0, 0.0, 0.0]
		} else if text.contains("beta") {
			vec![0.0, 1.0, 0.0, 0.0]
		} else {
			vec![0.0, 0.0, 1.0, 0.0]
		}
	}
}
impl EmbeddingProvider for KeywordEmbedding {
	fn generate<'a>(
		&'a self,
		text: &'a str,
	) -> BoxFuture<'a, mnema_providers::Result<Embedding>> {
		let vector = Self::vector_for(text);

		Box::pin(async move {
			Ok(Embedding {
				dimension: vector.len(),
				vector,
				provider: "stub".to_string(),
				cached: false,
			})
		})
	}

	fn generate_batch<'a>(
		&'a self,
		texts: &'a [String],
	) -> BoxFuture<'a, mnema_providers::Result<BatchEmbedding>> {
		let vectors = texts.iter().map(|text| Self::vector_for(text)).collect::<Vec<_>>();

		Box::pin(async move {
			Ok(BatchEmbedding { vectors, cache_hits: 0, duration: Duration::ZERO })
		})
	}
}

fn vector_config(db: &TestDatabase, url: &str) -> VectorIndex {
	VectorIndex {
		url: url.to_string(),
		collection_prefix: db.collection_prefix(),
		distance_metric: "cosine".to_string(),
	}
}

fn documents_config() -> Documents {
	Documents { default_dimensions: DIMENSIONS, dimensions: Default::default() }
}

fn test_config(db: &TestDatabase, qdrant_url: &str) -> Config {
	Config {
		service: Service { log_level: "warn".to_string() },
		storage: Storage {
			postgres: Postgres { dsn: db.dsn().to_string(), pool_max_conns: 4 },
			vector: vector_config(db, qdrant_url),
		},
		provider: EmbeddingProviderConfig {
			provider_id: "stub".to_string(),
			api_base: "http://localhost:0".to_string(),
			api_key: "unused".to_string(),
			path: "/embeddings".to_string(),
			model: "stub-model".to_string(),
			timeout_ms: 1_000,
			max_retries: 0,
			default_headers: Default::default(),
		},
		cache: Cache::default(),
		documents: documents_config(),
		search: Search { default_top_k: 10, min_similarity: 0.0 },
		decay: Decay::default(),
		ingest: Ingest { queue_capacity: 16 },
	}
}

fn msg<E: std::fmt::Display>(err: E) -> Error {
	Error::Message(err.to_string())
}

fn entry(tenant: &Tenant, record_id: Uuid, vector: Vec<f32>, date: i64) -> VectorEntry {
	let payload = mnema_domain::RecordPayload::normalize(
		DocumentType::Knowledge,
		&serde_json::json!({ "content": "fixture" }),
	)
	.expect("payload");

	VectorEntry {
		id: vector_entry_id(tenant, DocumentType::Knowledge, record_id, None),
		vector,
		document: payload.curated_document(),
		metadata: payload.metadata(date),
	}
}

#[tokio::test]
async fn vector_store_round_trip_isolation_and_time_window() {
	let (Some(dsn), Some(qdrant_url)) = (env_dsn(), env_qdrant_url()) else {
		eprintln!("Skipping; set MNEMA_PG_DSN and MNEMA_QDRANT_URL to run acceptance tests.");

		return;
	};

	with_test_db(&dsn, |db| Box::pin(async move {
		let store =
			VectorStore::new(&vector_config(db, &qdrant_url), documents_config()).map_err(msg)?;
		let tenant_a = Tenant::new("userA", "projA");
		let tenant_b = Tenant::new("userB", "projB");
		let coll_a = store.tenant_collection(&tenant_a).await.map_err(msg)?;
		let coll_b = store.tenant_collection(&tenant_b).await.map_err(msg)?;

		db.track_collection(&coll_a);
		db.track_collection(&coll_b);

		assert_ne!(coll_a, coll_b);

		let early_id = Uuid::new_v4();
		let late_id = Uuid::new_v4();
		let early = entry(&tenant_a, early_id, vec![1.0, 0.0, 0.0, 0.0], 1_000);
		let late = entry(&tenant_a, late_id, vec![1.0, 0.0, 0.0, 0.0], 2_000);
		let early_point = early.id;
		let late_point = late.id;

		store.upsert(&coll_a, vec![early, late]).await.map_err(msg)?;

		// Round trip.
		let stored = store.fetch(&coll_a, early_point).await.map_err(msg)?;

		assert!(stored.is_some(), "expected the stored document back");
		assert_eq!(store.count(&coll_a).await.map_err(msg)?, 2);

		// Tenant isolation: B sees nothing, in its own collection.
		assert_eq!(store.count(&coll_b).await.map_err(msg)?, 0);

		let empty_filter = mnema_storage::filter::MetadataFilter::default();
		let hits_b = store
			.query(&coll_b, vec![1.0, 0.0, 0.0, 0.0], 10, &empty_filter)
			.await
			.map_err(msg)?;

		assert!(hits_b.is_empty(), "tenant B must never observe tenant A's vectors");

		// Half-open window: start included, end excluded.
		let window_filter = mnema_storage::filter::MetadataFilter::parse(&serde_json::json!({
			"date": 1_000,
			"end_date": 2_000,
		}))
		.map_err(msg)?;
		let hits = store
			.query(&coll_a, vec![1.0, 0.0, 0.0, 0.0], 10, &window_filter)
			.await
			.map_err(msg)?;

		assert_eq!(hits.len(), 1);
		assert_eq!(hits[0].id, early_point);

		// Delete round trip.
		assert!(store.remove(&coll_a, late_point).await.map_err(msg)?);
		assert!(store.fetch(&coll_a, late_point).await.map_err(msg)?.is_none());
		assert!(!store.remove(&coll_a, late_point).await.map_err(msg)?);

		Ok(())
	}))
	.await
	.expect("acceptance test failed");
}

#[tokio::test]
async fn ingestion_pipeline_vectorizes_and_search_finds_records() {
	let (Some(dsn), Some(qdrant_url)) = (env_dsn(), env_qdrant_url()) else {
		eprintln!("Skipping; set MNEMA_PG_DSN and MNEMA_QDRANT_URL to run acceptance tests.");

		return;
	};

	with_test_db(&dsn, |db| Box::pin(async move {
		let cfg = Arc::new(test_config(db, &qdrant_url));
		let database = Arc::new(Db::connect(&cfg.storage.postgres).await.map_err(msg)?);

		database.ensure_schema().await.map_err(msg)?;

		let vectors = Arc::new(
			VectorStore::new(&cfg.storage.vector, cfg.documents.clone()).map_err(msg)?,
		);
		let (bus, mut dispatcher) = EventBus::channel(cfg.ingest.queue_capacity);
		let service = MemoryService::new(
			cfg.clone(),
			database.clone(),
			vectors.clone(),
			Arc::new(KeywordEmbedding),
			bus,
		);

		dispatcher.subscribe(RECORD_STORED, service.vectorizer());

		let dispatcher_task = tokio::spawn(dispatcher.run());
		let tenant = Tenant::new("userA", "projA");
		let collection = vectors.tenant_collection(&tenant).await.map_err(msg)?;

		db.track_collection(&collection);

		let stored = service
			.store(StoreRequest {
				tenant: tenant.clone(),
				document_type: DocumentType::Conversation,
				payload: serde_json::json!({
					"summary": "alpha rollout notes",
					"turns": [
						{ "role": "user", "content": "how did the alpha rollout go" },
						{ "role": "assistant", "content": "alpha shipped cleanly" },
					],
				}),
			})
			.await
			.map_err(msg)?;

		// The durable write reports success immediately; the vector arrives
		// eventually.
		wait_for_count(&vectors, &collection, 2).await?;

		// Empty extraction: durably stored, never vectorized.
		let vacant = service
			.store(StoreRequest {
				tenant: tenant.clone(),
				document_type: DocumentType::Conversation,
				payload: serde_json::json!({ "turns": [] }),
			})
			.await
			.map_err(msg)?;

		tokio::time::sleep(Duration::from_millis(300)).await;

		assert_eq!(vectors.count(&collection).await.map_err(msg)?, 2);
		assert!(service.fetch_record(vacant.record_id).await.is_ok());

		let results = service
			.search(SearchQuery {
				min_similarity: Some(0.9),
				..SearchQuery::new(tenant.clone(), DocumentType::Conversation, "alpha status")
			})
			.await
			.map_err(msg)?;

		assert!(!results.is_empty(), "expected the alpha conversation to match");
		assert!(results.iter().all(|result| result.similarity >= 0.9));
		assert!(
			results.iter().all(|result| {
				result.metadata.get("document_type").and_then(Value::as_str)
					== Some("conversation")
			}),
			"results must stay within the queried document type"
		);

		// Best-effort back-write populated the durable record's embedding.
		let record = service.fetch_record(stored.record_id).await.map_err(msg)?;

		assert!(record.embedding.is_some(), "expected the pooled embedding back-write");

		dispatcher_task.abort();

		Ok(())
	}))
	.await
	.expect("acceptance test failed");
}

async fn wait_for_count(store: &VectorStore, collection: &str, expected: u64) -> Result<()> {
	for _ in 0..50 {
		if store.count(collection).await.map_err(msg)? == expected {
			return Ok(());
		}

		tokio::time::sleep(Duration::from_millis(100)).await;
	}

	Err(Error::Message(format!(
		"Timed out waiting for {expected} vectors in {collection:?}."
	)))
}
