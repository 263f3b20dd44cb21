use std::sync::Arc;

use crate::{
	BoxFuture, EmbeddingProvider, Error, Result,
	bus::{Event, EventHandler, RecordStored},
};
use mnema_domain::vector_entry_id;
use mnema_storage::{db::Db, records, vector::{VectorEntry, VectorStore}};

/// Asynchronous phase of ingestion: extract text, embed it, upsert the
/// vectors, and best-effort back-write the pooled embedding onto the durable
/// record. Every failure is logged and swallowed; the synchronous write has
/// already succeeded by the time this runs.
pub struct Vectorizer {
	db: Arc<Db>,
	vectors: Arc<VectorStore>,
	embedding: Arc<dyn EmbeddingProvider>,
}
impl Vectorizer {
	pub fn new(
		db: Arc<Db>,
		vectors: Arc<VectorStore>,
		embedding: Arc<dyn EmbeddingProvider>,
	) -> Self {
		Self { db, vectors, embedding }
	}

	async fn vectorize(&self, stored: RecordStored) -> Result<()> {
		let units = stored.payload.units();

		if units.is_empty() {
			tracing::debug!(
				record_id = %stored.record_id,
				"No searchable text extracted. Skipping embedding."
			);

			return Ok(());
		}

		let texts: Vec<String> = units.iter().map(|unit| unit.text.clone()).collect();
		let batch = self.embedding.generate_batch(&texts).await?;

		if batch.vectors.len() != units.len() {
			return Err(Error::Provider {
				message: format!(
					"provider returned {} vectors for {} units.",
					batch.vectors.len(),
					units.len()
				),
			});
		}

		let collection = self.vectors.tenant_collection(&stored.tenant).await?;
		let document = stored.payload.curated_document();
		let metadata = stored.payload.metadata(stored.created_at.unix_timestamp());
		let mut entries = Vec::with_capacity(units.len());

		for (unit, vector) in units.iter().zip(batch.vectors.iter()) {
			entries.push(VectorEntry {
				id: vector_entry_id(
					&stored.tenant,
					stored.document_type,
					stored.record_id,
					unit.sub_index,
				),
				vector: vector.clone(),
				document: document.clone(),
				metadata: metadata.clone(),
			});
		}

		self.vectors.upsert(&collection, entries).await?;

		if let Some(pooled) = mean_pool(&batch.vectors)
			&& let Err(err) =
				records::write_record_embedding(&self.db, stored.record_id, &pooled).await
		{
			tracing::warn!(
				error = %err,
				record_id = %stored.record_id,
				"Embedding back-write failed. The vector index write is kept."
			);
		}

		Ok(())
	}
}

impl EventHandler for Vectorizer {
	fn handle<'a>(&'a self, event: Event) -> BoxFuture<'a, ()> {
		Box::pin(async move {
			let Event::RecordStored(stored) = event;
			let record_id = stored.record_id;

			if let Err(err) = self.vectorize(stored).await {
				tracing::error!(
					error = %err,
					record_id = %record_id,
					"Vectorization failed. The durable record stays without a vector."
				);
			}
		})
	}
}

fn mean_pool(vectors: &[Vec<f32>]) -> Option<Vec<f32>> {
	if vectors.is_empty() {
		return None;
	}

	let dim = vectors[0].len();
	let mut out = vec![0.0_f32; dim];

	for vec in vectors {
		for (idx, value) in vec.iter().enumerate() {
			out[idx] += value;
		}
	}
	for value in &mut out {
		*value /= vectors.len() as f32;
	}

	Some(out)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn pooled_vector_is_the_mean_of_the_units() {
		let vectors = vec![vec![1.0_f32, 3.0_f32], vec![3.0_f32, 5.0_f32]];
		let pooled = mean_pool(&vectors).expect("pooled vector");

		assert_eq!(pooled, vec![2.0_f32, 4.0_f32]);
	}

	#[test]
	fn pooling_nothing_yields_nothing() {
		assert!(mean_pool(&[]).is_none());
	}
}
