use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Similarity metric of the backing vector index. Raw query output is a
/// metric-specific distance; [`DistanceMetric::similarity`] normalizes it so
/// callers always rank on the same scale.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
	Cosine,
	Euclid,
	Dot,
}
impl DistanceMetric {
	pub fn parse(value: &str) -> Result<Self> {
		match value {
			"cosine" => Ok(Self::Cosine),
			"euclid" => Ok(Self::Euclid),
			"dot" => Ok(Self::Dot),
			_ => Err(Error::UnknownMetric { value: value.to_string() }),
		}
	}

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Cosine => "cosine",
			Self::Euclid => "euclid",
			Self::Dot => "dot",
		}
	}

	/// Cosine distance lives in [0, 2] and L2 in [0, inf), so both map into
	/// [0, 1]. Inner-product scores are already similarities and pass through
	/// unchanged.
	pub fn similarity(self, distance: f32) -> f32 {
		match self {
			Self::Cosine => (1.0 - distance / 2.0).clamp(0.0, 1.0),
			Self::Euclid => (1.0 / (1.0 + distance.max(0.0))).clamp(0.0, 1.0),
			Self::Dot => distance,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn cosine_similarity_is_bounded_and_order_preserving() {
		let near = DistanceMetric::Cosine.similarity(0.1);
		let far = DistanceMetric::Cosine.similarity(1.8);

		assert!((0.0..=1.0).contains(&near));
		assert!((0.0..=1.0).contains(&far));
		assert!(near > far);
	}

	#[test]
	fn euclid_similarity_is_bounded_and_order_preserving() {
		let near = DistanceMetric::Euclid.similarity(0.0);
		let far = DistanceMetric::Euclid.similarity(9.0);

		assert_eq!(near, 1.0);
		assert!((far - 0.1).abs() < 1e-6);
		assert!(near > far);
	}

	#[test]
	fn dot_scores_pass_through() {
		assert_eq!(DistanceMetric::Dot.similarity(0.42), 0.42);
	}

	#[test]
	fn ascending_distance_means_descending_similarity() {
		for metric in [DistanceMetric::Cosine, DistanceMetric::Euclid] {
			let distances = [0.0_f32, 0.2, 0.5, 1.0, 1.9];
			let similarities =
				distances.iter().map(|d| metric.similarity(*d)).collect::<Vec<_>>();

			assert!(similarities.windows(2).all(|pair| pair[0] >= pair[1]));
		}
	}
}
