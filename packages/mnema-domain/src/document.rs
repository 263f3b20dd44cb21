use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result, tenant::Tenant};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
	Conversation,
	Task,
	Knowledge,
}
impl DocumentType {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Conversation => "conversation",
			Self::Task => "task",
			Self::Knowledge => "knowledge",
		}
	}

	pub fn parse(value: &str) -> Result<Self> {
		match value {
			"conversation" => Ok(Self::Conversation),
			"task" => Ok(Self::Task),
			"knowledge" => Ok(Self::Knowledge),
			_ => Err(Error::UnknownDocumentType { value: value.to_string() }),
		}
	}
}
impl std::fmt::Display for DocumentType {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Deterministic vector point id. The tenant key is part of the name so the
/// same record id can never alias across tenants, and the optional sub-index
/// separates the units of multi-unit records (conversation turns).
pub fn vector_entry_id(
	tenant: &Tenant,
	document_type: DocumentType,
	record_id: Uuid,
	sub_index: Option<u32>,
) -> Uuid {
	let name = match sub_index {
		Some(sub) => format!("{}:{}:{record_id}:{sub}", tenant.key(), document_type.as_str()),
		None => format!("{}:{}:{record_id}", tenant.key(), document_type.as_str()),
	};

	Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn vector_entry_ids_are_deterministic_and_distinct() {
		let tenant = Tenant::new("userA", "projA");
		let record_id = Uuid::new_v4();
		let first = vector_entry_id(&tenant, DocumentType::Conversation, record_id, Some(0));
		let again = vector_entry_id(&tenant, DocumentType::Conversation, record_id, Some(0));
		let other_turn = vector_entry_id(&tenant, DocumentType::Conversation, record_id, Some(1));
		let other_tenant = vector_entry_id(
			&Tenant::new("userB", "projB"),
			DocumentType::Conversation,
			record_id,
			Some(0),
		);

		assert_eq!(first, again);
		assert_ne!(first, other_turn);
		assert_ne!(first, other_tenant);
	}
}
