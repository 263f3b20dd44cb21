use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::{Result, db::Db, models::MemoryRecord};

pub async fn insert_record_tx(
	tx: &mut Transaction<'_, Postgres>,
	record: &MemoryRecord,
) -> Result<()> {
	sqlx::query(
		"\
INSERT INTO memory_records (
	record_id,
	user_id,
	project_id,
	document_type,
	payload,
	embedding,
	created_at
)
VALUES ($1,$2,$3,$4,$5,$6,$7)",
	)
	.bind(record.record_id)
	.bind(record.user_id.as_str())
	.bind(record.project_id.as_str())
	.bind(record.document_type.as_str())
	.bind(&record.payload)
	.bind(record.embedding.as_deref())
	.bind(record.created_at)
	.execute(&mut **tx)
	.await?;

	Ok(())
}

pub async fn fetch_record(db: &Db, record_id: Uuid) -> Result<Option<MemoryRecord>> {
	let record = sqlx::query_as::<_, MemoryRecord>(
		"\
SELECT
	record_id,
	user_id,
	project_id,
	document_type,
	payload,
	embedding,
	created_at
FROM memory_records
WHERE record_id = $1",
	)
	.bind(record_id)
	.fetch_optional(&db.pool)
	.await?;

	Ok(record)
}

/// Secondary write of a generated embedding back into the durable record.
/// Callers treat a failure here as non-fatal; the vector index write has
/// already succeeded by the time this runs.
pub async fn write_record_embedding(db: &Db, record_id: Uuid, vector: &[f32]) -> Result<()> {
	let result = sqlx::query("UPDATE memory_records SET embedding = $1 WHERE record_id = $2")
		.bind(vector)
		.bind(record_id)
		.execute(&db.pool)
		.await?;

	if result.rows_affected() == 0 {
		return Err(crate::Error::NotFound(format!("memory record {record_id}")));
	}

	Ok(())
}
