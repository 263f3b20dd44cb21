use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{Event, MemoryService, RecordStored, Result};
use mnema_domain::{DocumentType, RecordPayload, Tenant};
use mnema_storage::{models::MemoryRecord, records};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoreRequest {
	pub tenant: Tenant,
	pub document_type: DocumentType,
	pub payload: Value,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoreResponse {
	pub record_id: Uuid,
	pub created_at: OffsetDateTime,
}

impl MemoryService {
	/// Synchronous phase of ingestion. The record is durable the moment the
	/// transaction commits; vectorization happens later, off this path, and
	/// can never fail this call.
	pub async fn store(&self, req: StoreRequest) -> Result<StoreResponse> {
		let payload = RecordPayload::normalize(req.document_type, &req.payload)?;
		let record_id = Uuid::new_v4();
		let created_at = OffsetDateTime::now_utc();
		let record = MemoryRecord {
			record_id,
			user_id: req.tenant.user_id.clone(),
			project_id: req.tenant.project_id.clone(),
			document_type: req.document_type.as_str().to_string(),
			payload: req.payload,
			embedding: None,
			created_at,
		};
		let mut tx = self.db.pool.begin().await?;

		records::insert_record_tx(&mut tx, &record).await?;

		tx.commit().await?;

		// Only a committed record is announced; a rollback above returns
		// before this line.
		self.bus.publish(Event::RecordStored(RecordStored {
			record_id,
			tenant: req.tenant,
			document_type: req.document_type,
			payload,
			created_at,
		}));

		Ok(StoreResponse { record_id, created_at })
	}

	pub async fn fetch_record(&self, record_id: Uuid) -> Result<MemoryRecord> {
		records::fetch_record(&self.db, record_id).await?.ok_or_else(|| crate::Error::NotFound {
			message: format!("memory record {record_id}"),
		})
	}
}
