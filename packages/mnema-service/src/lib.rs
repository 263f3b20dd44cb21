pub mod bus;
pub mod ingest;
pub mod search;
pub mod vectorize;

mod error;

pub use error::{Error, Result};

pub use bus::{Dispatcher, Event, EventBus, EventHandler, RECORD_STORED, RecordStored};
pub use ingest::{StoreRequest, StoreResponse};
pub use search::{SearchQuery, SearchResult};
pub use vectorize::Vectorizer;

use std::{future::Future, pin::Pin, sync::Arc};

use mnema_config::Config;
use mnema_providers::{BatchEmbedding, Embedding, EmbeddingGateway};
use mnema_storage::{db::Db, vector::VectorStore};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Seam for the embedding path so tests can stand in for the real gateway.
pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn generate<'a>(&'a self, text: &'a str)
	-> BoxFuture<'a, mnema_providers::Result<Embedding>>;

	fn generate_batch<'a>(
		&'a self,
		texts: &'a [String],
	) -> BoxFuture<'a, mnema_providers::Result<BatchEmbedding>>;
}

impl EmbeddingProvider for EmbeddingGateway {
	fn generate<'a>(
		&'a self,
		text: &'a str,
	) -> BoxFuture<'a, mnema_providers::Result<Embedding>> {
		Box::pin(self.generate(text))
	}

	fn generate_batch<'a>(
		&'a self,
		texts: &'a [String],
	) -> BoxFuture<'a, mnema_providers::Result<BatchEmbedding>> {
		Box::pin(self.generate_batch(texts))
	}
}

/// Facade over the whole memory subsystem: durable writes, the event bus
/// feeding the asynchronous vectorizer, and semantic search.
pub struct MemoryService {
	pub cfg: Arc<Config>,
	pub db: Arc<Db>,
	pub vectors: Arc<VectorStore>,
	pub embedding: Arc<dyn EmbeddingProvider>,
	pub bus: EventBus,
}
impl MemoryService {
	pub fn new(
		cfg: Arc<Config>,
		db: Arc<Db>,
		vectors: Arc<VectorStore>,
		embedding: Arc<dyn EmbeddingProvider>,
		bus: EventBus,
	) -> Self {
		Self { cfg, db, vectors, embedding, bus }
	}

	/// Handler for the asynchronous phase, sharing this service's stores and
	/// provider. Subscribe it to [`RECORD_STORED`] on the dispatcher.
	pub fn vectorizer(&self) -> Arc<Vectorizer> {
		Arc::new(Vectorizer::new(
			self.db.clone(),
			self.vectors.clone(),
			self.embedding.clone(),
		))
	}
}
