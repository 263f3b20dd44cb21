use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Error, Result, document::DocumentType};

pub const MAX_TAGS: usize = 5;
const PREVIEW_CHARS: usize = 240;

/// Canonical payload representation. Incoming blobs are normalized exactly
/// once, at the ingestion boundary; storage and search only ever see this
/// shape. Each variant owns its curated-field extraction.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecordPayload {
	Conversation(ConversationPayload),
	Task(TaskPayload),
	Knowledge(KnowledgePayload),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConversationPayload {
	pub summary: Option<String>,
	pub turns: Vec<ConversationTurn>,
	#[serde(flatten)]
	pub context: PayloadContext,
	pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConversationTurn {
	pub role: String,
	pub content: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TaskPayload {
	pub title: Option<String>,
	pub outcome: Option<String>,
	pub summary: Option<String>,
	pub content: Option<String>,
	#[serde(flatten)]
	pub context: PayloadContext,
	pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KnowledgePayload {
	pub title: Option<String>,
	pub summary: Option<String>,
	pub content: Option<String>,
	#[serde(flatten)]
	pub context: PayloadContext,
	pub extra: Map<String, Value>,
}

/// Fields shared by every payload shape and surfaced as filterable metadata.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PayloadContext {
	pub task: Option<String>,
	pub agent: Option<String>,
	pub component: Option<String>,
	#[serde(default)]
	pub tags: Vec<String>,
}

/// One embeddable unit of a record. Single-unit records carry no sub-index;
/// conversation turns are indexed by their position.
#[derive(Clone, Debug)]
pub struct VectorUnit {
	pub sub_index: Option<u32>,
	pub text: String,
}

/// Flat metadata attached to every vector entry. Dates are Unix seconds
/// because the vector engine only supports numeric range operators.
#[derive(Clone, Debug)]
pub struct VectorMetadata {
	pub document_type: DocumentType,
	pub task: Option<String>,
	pub agent: Option<String>,
	pub component: Option<String>,
	pub date: i64,
	pub tags: Vec<String>,
}
impl VectorMetadata {
	pub fn to_flat_map(&self) -> Map<String, Value> {
		let mut map = Map::new();

		map.insert("document_type".to_string(), Value::from(self.document_type.as_str()));

		if let Some(task) = &self.task {
			map.insert("task".to_string(), Value::from(task.clone()));
		}
		if let Some(agent) = &self.agent {
			map.insert("agent".to_string(), Value::from(agent.clone()));
		}
		if let Some(component) = &self.component {
			map.insert("component".to_string(), Value::from(component.clone()));
		}

		map.insert("date".to_string(), Value::from(self.date));

		for (idx, tag) in self.tags.iter().take(MAX_TAGS).enumerate() {
			map.insert(format!("tag_{idx}"), Value::from(tag.clone()));
		}

		if !self.tags.is_empty() {
			let combined =
				self.tags.iter().take(MAX_TAGS).cloned().collect::<Vec<_>>().join(",");

			map.insert("tags".to_string(), Value::from(combined));
		}

		map
	}
}

impl RecordPayload {
	/// Normalizes a raw blob into the canonical shape. Both the legacy flat
	/// form (a bare `content` field) and the comprehensive enriched form are
	/// accepted; fields that are consumed here never reappear in `extra`.
	pub fn normalize(document_type: DocumentType, raw: &Value) -> Result<Self> {
		let map = raw.as_object().ok_or_else(|| Error::InvalidPayload {
			message: "payload must be an object.".to_string(),
		})?;
		let mut fields = map.clone();
		let context = take_context(&mut fields);

		match document_type {
			DocumentType::Conversation => {
				let summary = take_string(&mut fields, "summary");
				let turns = take_turns(&mut fields)?;
				let legacy = take_string(&mut fields, "content");
				let turns = if turns.is_empty() {
					legacy
						.map(|content| vec![ConversationTurn { role: "user".to_string(), content }])
						.unwrap_or_default()
				} else {
					turns
				};

				Ok(Self::Conversation(ConversationPayload {
					summary,
					turns,
					context,
					extra: fields,
				}))
			},
			DocumentType::Task => Ok(Self::Task(TaskPayload {
				title: take_string(&mut fields, "title"),
				outcome: take_string(&mut fields, "outcome"),
				summary: take_string(&mut fields, "summary"),
				content: take_string(&mut fields, "content"),
				context,
				extra: fields,
			})),
			DocumentType::Knowledge => Ok(Self::Knowledge(KnowledgePayload {
				title: take_string(&mut fields, "title"),
				summary: take_string(&mut fields, "summary"),
				content: take_string(&mut fields, "content"),
				context,
				extra: fields,
			})),
		}
	}

	pub fn document_type(&self) -> DocumentType {
		match self {
			Self::Conversation(_) => DocumentType::Conversation,
			Self::Task(_) => DocumentType::Task,
			Self::Knowledge(_) => DocumentType::Knowledge,
		}
	}

	pub fn context(&self) -> &PayloadContext {
		match self {
			Self::Conversation(payload) => &payload.context,
			Self::Task(payload) => &payload.context,
			Self::Knowledge(payload) => &payload.context,
		}
	}

	/// Searchable text, resolved through the ordered fallback chain: enriched
	/// summary fields first, then the raw content, then whatever uncurated
	/// fields remain, serialized. May be empty, in which case the record gets
	/// no vector at all.
	pub fn searchable_text(&self) -> Option<String> {
		match self {
			Self::Conversation(payload) => non_empty(payload.summary.as_deref())
				.or_else(|| non_empty_joined_turns(&payload.turns))
				.or_else(|| serialized_extra(&payload.extra)),
			Self::Task(payload) => non_empty(payload.summary.as_deref())
				.or_else(|| non_empty(payload.content.as_deref()))
				.or_else(|| non_empty(payload.outcome.as_deref()))
				.or_else(|| serialized_extra(&payload.extra)),
			Self::Knowledge(payload) => non_empty(payload.summary.as_deref())
				.or_else(|| non_empty(payload.content.as_deref()))
				.or_else(|| serialized_extra(&payload.extra)),
		}
	}

	/// Embeddable units. Conversations expand to one unit per turn; every
	/// other record embeds as a single unit. An empty result means the record
	/// stays durable-only.
	pub fn units(&self) -> Vec<VectorUnit> {
		if let Self::Conversation(payload) = self {
			let turn_units = payload
				.turns
				.iter()
				.enumerate()
				.filter_map(|(idx, turn)| {
					non_empty(Some(turn.content.as_str())).map(|content| VectorUnit {
						sub_index: Some(idx as u32),
						text: format!("{}: {content}", turn.role),
					})
				})
				.collect::<Vec<_>>();

			if !turn_units.is_empty() {
				return turn_units;
			}
		}

		self.searchable_text()
			.map(|text| vec![VectorUnit { sub_index: None, text }])
			.unwrap_or_default()
	}

	/// Curated, tenant-facing summary object stored alongside each vector.
	/// Never the full payload.
	pub fn curated_document(&self) -> Value {
		let preview = self.searchable_text().map(|text| truncate_chars(&text, PREVIEW_CHARS));
		let context = self.context();
		let mut map = Map::new();

		map.insert(
			"document_type".to_string(),
			Value::from(self.document_type().as_str()),
		);

		match self {
			Self::Conversation(payload) => {
				if let Some(summary) = non_empty(payload.summary.as_deref()) {
					map.insert("summary".to_string(), Value::from(summary));
				}

				map.insert("turn_count".to_string(), Value::from(payload.turns.len()));
			},
			Self::Task(payload) => {
				if let Some(title) = non_empty(payload.title.as_deref()) {
					map.insert("title".to_string(), Value::from(title));
				}
				if let Some(outcome) = non_empty(payload.outcome.as_deref()) {
					map.insert("outcome".to_string(), Value::from(outcome));
				}
			},
			Self::Knowledge(payload) => {
				if let Some(title) = non_empty(payload.title.as_deref()) {
					map.insert("title".to_string(), Value::from(title));
				}
			},
		}

		if let Some(preview) = preview {
			map.insert("preview".to_string(), Value::from(preview));
		}
		if !context.tags.is_empty() {
			map.insert(
				"tags".to_string(),
				Value::from(context.tags.iter().take(MAX_TAGS).cloned().collect::<Vec<_>>()),
			);
		}

		Value::Object(map)
	}

	pub fn metadata(&self, date_unix: i64) -> VectorMetadata {
		let context = self.context();

		VectorMetadata {
			document_type: self.document_type(),
			task: context.task.clone(),
			agent: context.agent.clone(),
			component: context.component.clone(),
			date: date_unix,
			tags: context.tags.iter().take(MAX_TAGS).cloned().collect(),
		}
	}
}

fn take_context(fields: &mut Map<String, Value>) -> PayloadContext {
	PayloadContext {
		task: take_string(fields, "task"),
		agent: take_string(fields, "agent"),
		component: take_string(fields, "component"),
		tags: take_tags(fields),
	}
}

fn take_string(fields: &mut Map<String, Value>, key: &str) -> Option<String> {
	match fields.remove(key) {
		Some(Value::String(value)) => Some(value),
		Some(other) => {
			fields.insert(key.to_string(), other);

			None
		},
		None => None,
	}
}

fn take_tags(fields: &mut Map<String, Value>) -> Vec<String> {
	let Some(Value::Array(raw)) = fields.remove("tags") else {
		return Vec::new();
	};

	raw.into_iter()
		.filter_map(|value| match value {
			Value::String(tag) if !tag.trim().is_empty() => Some(tag),
			_ => None,
		})
		.collect()
}

fn take_turns(fields: &mut Map<String, Value>) -> Result<Vec<ConversationTurn>> {
	let Some(raw) = fields.remove("turns") else {
		return Ok(Vec::new());
	};
	let Value::Array(entries) = raw else {
		return Err(Error::InvalidPayload { message: "turns must be an array.".to_string() });
	};
	let mut turns = Vec::with_capacity(entries.len());

	for entry in entries {
		let Value::Object(mut turn) = entry else {
			return Err(Error::InvalidPayload {
				message: "each turn must be an object.".to_string(),
			});
		};
		let Some(Value::String(content)) = turn.remove("content") else {
			continue;
		};
		let role = match turn.remove("role") {
			Some(Value::String(role)) if !role.trim().is_empty() => role,
			_ => "user".to_string(),
		};

		turns.push(ConversationTurn { role, content });
	}

	Ok(turns)
}

fn non_empty(value: Option<&str>) -> Option<String> {
	value.map(str::trim).filter(|text| !text.is_empty()).map(str::to_string)
}

fn non_empty_joined_turns(turns: &[ConversationTurn]) -> Option<String> {
	let joined = turns
		.iter()
		.filter(|turn| !turn.content.trim().is_empty())
		.map(|turn| format!("{}: {}", turn.role, turn.content.trim()))
		.collect::<Vec<_>>()
		.join("\n");

	if joined.is_empty() { None } else { Some(joined) }
}

fn serialized_extra(extra: &Map<String, Value>) -> Option<String> {
	if extra.is_empty() {
		return None;
	}

	serde_json::to_string(extra).ok()
}

fn truncate_chars(text: &str, limit: usize) -> String {
	if text.chars().count() <= limit {
		return text.to_string();
	}

	text.chars().take(limit).collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn conversation_turns_expand_to_indexed_units() {
		let raw = serde_json::json!({
			"summary": "Planning session.",
			"turns": [
				{ "role": "user", "content": "Where did we leave off?" },
				{ "role": "assistant", "content": "Reviewing the deploy checklist." },
			],
			"task": "deploy",
			"tags": ["planning", "deploy"],
		});
		let payload = RecordPayload::normalize(DocumentType::Conversation, &raw).expect("payload");
		let units = payload.units();

		assert_eq!(units.len(), 2);
		assert_eq!(units[0].sub_index, Some(0));
		assert_eq!(units[1].sub_index, Some(1));
		assert!(units[0].text.starts_with("user: "));
	}

	#[test]
	fn legacy_flat_content_becomes_a_single_turn() {
		let raw = serde_json::json!({ "content": "One-shot question." });
		let payload = RecordPayload::normalize(DocumentType::Conversation, &raw).expect("payload");
		let units = payload.units();

		assert_eq!(units.len(), 1);
		assert_eq!(units[0].sub_index, Some(0));
	}

	#[test]
	fn extraction_prefers_summary_over_content() {
		let raw = serde_json::json!({
			"summary": "Short summary.",
			"content": "Much longer body text.",
		});
		let payload = RecordPayload::normalize(DocumentType::Knowledge, &raw).expect("payload");

		assert_eq!(payload.searchable_text().as_deref(), Some("Short summary."));
	}

	#[test]
	fn extraction_falls_back_to_serialized_leftovers() {
		let raw = serde_json::json!({ "observation": "disk usage at 91 percent" });
		let payload = RecordPayload::normalize(DocumentType::Knowledge, &raw).expect("payload");
		let text = payload.searchable_text().expect("serialized fallback");

		assert!(text.contains("disk usage"));
	}

	#[test]
	fn vacant_payload_yields_no_units() {
		let raw = serde_json::json!({ "summary": "  ", "turns": [] });
		let payload = RecordPayload::normalize(DocumentType::Conversation, &raw).expect("payload");

		assert!(payload.searchable_text().is_none());
		assert!(payload.units().is_empty());
	}

	#[test]
	fn metadata_caps_tags_and_keeps_them_individually_keyed() {
		let raw = serde_json::json!({
			"content": "body",
			"tags": ["a", "b", "c", "d", "e", "f", "g"],
		});
		let payload = RecordPayload::normalize(DocumentType::Knowledge, &raw).expect("payload");
		let map = payload.metadata(1_700_000_000).to_flat_map();

		assert_eq!(map.get("tag_4").and_then(Value::as_str), Some("e"));
		assert!(!map.contains_key("tag_5"));
		assert_eq!(map.get("tags").and_then(Value::as_str), Some("a,b,c,d,e"));
		assert_eq!(map.get("date").and_then(Value::as_i64), Some(1_700_000_000));
	}

	#[test]
	fn curated_document_is_a_summary_not_the_full_payload() {
		let raw = serde_json::json!({
			"summary": "What happened.",
			"turns": [{ "role": "user", "content": "secret body text" }],
		});
		let payload = RecordPayload::normalize(DocumentType::Conversation, &raw).expect("payload");
		let document = payload.curated_document();

		assert_eq!(document.get("turn_count").and_then(Value::as_u64), Some(1));
		assert!(document.get("turns").is_none());
	}

	#[test]
	fn non_object_payload_is_rejected() {
		let raw = Value::String("not an object".to_string());

		assert!(RecordPayload::normalize(DocumentType::Task, &raw).is_err());
	}
}
