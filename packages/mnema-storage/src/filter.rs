use qdrant_client::qdrant::{Condition, Filter, Range};
use serde_json::Value;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use crate::{Error, Result};

/// Sanitized metadata filter. Callers hand over a flat JSON object; empty
/// nested objects are dropped (the engine rejects `{}` as an operator
/// expression) and `date`/`end_date` keys are folded into a single numeric
/// range condition, since the engine only supports numeric range operators.
#[derive(Clone, Debug, Default)]
pub struct MetadataFilter {
	conditions: Vec<(String, Value)>,
	start_unix: Option<i64>,
	end_unix: Option<i64>,
}
impl MetadataFilter {
	pub fn parse(raw: &Value) -> Result<Self> {
		let map = raw.as_object().ok_or_else(|| {
			Error::InvalidArgument("metadata filter must be an object.".to_string())
		})?;
		let mut filter = Self::default();

		for (key, value) in map {
			match value {
				Value::Null => {},
				Value::Object(nested) if nested.is_empty() => {},
				Value::Object(_) | Value::Array(_) => {
					return Err(Error::InvalidArgument(format!(
						"filter key {key:?} uses an unsupported operator expression."
					)));
				},
				_ if key == "date" => {
					filter.start_unix = Some(to_unix(key, value)?);
				},
				_ if key == "end_date" => {
					filter.end_unix = Some(to_unix(key, value)?);
				},
				Value::Number(number) => {
					let int = number.as_i64().ok_or_else(|| {
						Error::InvalidArgument(format!(
							"filter key {key:?} must be an integer for equality matching."
						))
					})?;

					filter.conditions.push((key.clone(), Value::from(int)));
				},
				Value::String(_) | Value::Bool(_) => {
					filter.conditions.push((key.clone(), value.clone()));
				},
			}
		}

		Ok(filter)
	}

	pub fn insert_equals(&mut self, key: &str, value: Value) {
		self.conditions.push((key.to_string(), value));
	}

	pub fn set_window(&mut self, start_unix: Option<i64>, end_unix: Option<i64>) {
		if start_unix.is_some() {
			self.start_unix = start_unix;
		}
		if end_unix.is_some() {
			self.end_unix = end_unix;
		}
	}

	pub fn is_empty(&self) -> bool {
		self.conditions.is_empty() && self.start_unix.is_none() && self.end_unix.is_none()
	}

	pub(crate) fn to_qdrant(&self) -> Option<Filter> {
		if self.is_empty() {
			return None;
		}

		let mut conditions = Vec::with_capacity(self.conditions.len() + 1);

		for (key, value) in &self.conditions {
			let condition = match value {
				Value::String(text) => Condition::matches(key.clone(), text.clone()),
				Value::Bool(flag) => Condition::matches(key.clone(), *flag),
				Value::Number(number) => {
					Condition::matches(key.clone(), number.as_i64().unwrap_or_default())
				},
				_ => continue,
			};

			conditions.push(condition);
		}

		if self.start_unix.is_some() || self.end_unix.is_some() {
			// Half-open window: the lower bound is inclusive, the upper
			// bound exclusive.
			let range = Range {
				gte: self.start_unix.map(|ts| ts as f64),
				lt: self.end_unix.map(|ts| ts as f64),
				..Default::default()
			};

			conditions.push(Condition::range("date", range));
		}

		Some(Filter::must(conditions))
	}
}

fn to_unix(key: &str, value: &Value) -> Result<i64> {
	if let Some(ts) = value.as_i64() {
		return Ok(ts);
	}
	if let Some(text) = value.as_str() {
		return OffsetDateTime::parse(text, &Rfc3339)
			.map(|dt| dt.unix_timestamp())
			.map_err(|_| {
				Error::InvalidArgument(format!("filter key {key:?} must be an RFC3339 datetime."))
			});
	}

	Err(Error::InvalidArgument(format!(
		"filter key {key:?} must be a Unix timestamp or an RFC3339 string."
	)))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn empty_nested_objects_are_dropped() {
		let raw = serde_json::json!({ "task": "deploy", "junk": {} });
		let filter = MetadataFilter::parse(&raw).expect("filter");

		assert_eq!(filter.conditions.len(), 1);
		assert!(filter.to_qdrant().is_some());
	}

	#[test]
	fn non_empty_operator_expressions_are_rejected() {
		let raw = serde_json::json!({ "task": { "$in": ["a", "b"] } });

		assert!(MetadataFilter::parse(&raw).is_err());
	}

	#[test]
	fn date_keys_fold_into_a_numeric_window() {
		let raw = serde_json::json!({ "date": 1_700_000_000, "end_date": 1_700_086_400 });
		let filter = MetadataFilter::parse(&raw).expect("filter");

		assert_eq!(filter.start_unix, Some(1_700_000_000));
		assert_eq!(filter.end_unix, Some(1_700_086_400));
		assert!(filter.conditions.is_empty());
	}

	#[test]
	fn rfc3339_dates_convert_to_unix_seconds() {
		let raw = serde_json::json!({ "date": "2023-11-14T22:13:20Z" });
		let filter = MetadataFilter::parse(&raw).expect("filter");

		assert_eq!(filter.start_unix, Some(1_700_000_000));
	}

	#[test]
	fn an_all_empty_filter_produces_no_engine_filter() {
		let raw = serde_json::json!({ "junk": {}, "nothing": null });
		let filter = MetadataFilter::parse(&raw).expect("filter");

		assert!(filter.is_empty());
		assert!(filter.to_qdrant().is_none());
	}

	#[test]
	fn float_equality_is_rejected() {
		let raw = serde_json::json!({ "score": 0.5 });

		assert!(MetadataFilter::parse(&raw).is_err());
	}

	#[test]
	fn non_object_filter_is_rejected() {
		let raw = serde_json::json!(["task", "deploy"]);

		assert!(MetadataFilter::parse(&raw).is_err());
	}
}
