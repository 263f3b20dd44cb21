use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct MemoryRecord {
	pub record_id: Uuid,
	pub user_id: String,
	pub project_id: String,
	pub document_type: String,
	pub payload: Value,
	pub embedding: Option<Vec<f32>>,
	pub created_at: OffsetDateTime,
}
