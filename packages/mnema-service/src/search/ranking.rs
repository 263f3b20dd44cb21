use std::cmp::Ordering;

use serde_json::Value;
use time::OffsetDateTime;

use crate::search::SearchResult;
use mnema_domain::{DistanceMetric, decay};
use mnema_storage::vector::ScoredHit;

/// Turns raw engine hits into ordered results: metric normalization, the
/// minimum-similarity cutoff, then optional temporal decay with a re-sort.
pub(crate) fn rank(
	hits: Vec<ScoredHit>,
	metric: DistanceMetric,
	min_similarity: f32,
	apply_decay: bool,
	half_life_days: f32,
	now: OffsetDateTime,
) -> Vec<SearchResult> {
	let mut results: Vec<SearchResult> = hits
		.into_iter()
		.filter_map(|hit| {
			let similarity = metric.similarity(hit.distance);

			if similarity < min_similarity {
				return None;
			}

			Some(SearchResult {
				id: hit.id,
				document: hit.document,
				metadata: hit.metadata,
				distance: hit.distance,
				similarity,
				score: similarity,
			})
		})
		.collect();

	if apply_decay {
		for result in &mut results {
			// Results without a date stay undecayed.
			let Some(date) = result.metadata.get("date").and_then(Value::as_i64) else {
				continue;
			};
			let age_days = decay::age_in_days(date, now);

			result.score = decay::decayed_score(result.similarity, age_days, half_life_days);
		}
	}

	results.sort_by(|a, b| cmp_f32_desc(a.score, b.score));

	results
}

fn cmp_f32_desc(a: f32, b: f32) -> Ordering {
	match (a.is_nan(), b.is_nan()) {
		(true, true) => Ordering::Equal,
		(true, false) => Ordering::Greater,
		(false, true) => Ordering::Less,
		(false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
	}
}
