use time::OffsetDateTime;

pub const DEFAULT_HALF_LIFE_DAYS: f32 = 30.0;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Age of a Unix-seconds timestamp in fractional days. Timestamps in the
/// future clamp to zero instead of boosting the score.
pub fn age_in_days(date_unix: i64, now: OffsetDateTime) -> f32 {
	let elapsed = (now.unix_timestamp() - date_unix) as f64 / SECONDS_PER_DAY;

	elapsed.max(0.0) as f32
}

/// Exponential half-life factor: 1.0 at age zero, 0.5 at exactly one
/// half-life, monotonically decreasing with age.
pub fn decay_factor(age_days: f32, half_life_days: f32) -> f32 {
	if half_life_days <= 0.0 {
		return 1.0;
	}

	0.5_f32.powf(age_days.max(0.0) / half_life_days)
}

pub fn decayed_score(similarity: f32, age_days: f32, half_life_days: f32) -> f32 {
	similarity * decay_factor(age_days, half_life_days)
}
