use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime, Time};

use crate::{Error, Result};

const ARCHIVE_HORIZON_DAYS: i64 = 30;

/// Time bound supplied with a hybrid search: either an explicit window or a
/// named relative expression resolved against the current instant.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Timeframe {
	Named(String),
	Window { start: Option<OffsetDateTime>, end: Option<OffsetDateTime> },
}

/// Half-open absolute window: a timestamp `t` is inside when
/// `start <= t < end`. A missing bound is unbounded on that side.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeWindow {
	pub start: Option<OffsetDateTime>,
	pub end: Option<OffsetDateTime>,
}
impl TimeWindow {
	pub fn contains(&self, ts: OffsetDateTime) -> bool {
		if let Some(start) = self.start
			&& ts < start
		{
			return false;
		}
		if let Some(end) = self.end
			&& ts >= end
		{
			return false;
		}

		true
	}

	pub fn start_unix(&self) -> Option<i64> {
		self.start.map(OffsetDateTime::unix_timestamp)
	}

	pub fn end_unix(&self) -> Option<i64> {
		self.end.map(OffsetDateTime::unix_timestamp)
	}
}

pub fn resolve(timeframe: &Timeframe, now: OffsetDateTime) -> Result<TimeWindow> {
	match timeframe {
		Timeframe::Named(expr) => resolve_named(expr, now),
		Timeframe::Window { start, end } => {
			if let (Some(start), Some(end)) = (start, end)
				&& start >= end
			{
				return Err(Error::InvalidTimeframe {
					message: "window start must be before window end.".to_string(),
				});
			}

			Ok(TimeWindow { start: *start, end: *end })
		},
	}
}

fn resolve_named(expr: &str, now: OffsetDateTime) -> Result<TimeWindow> {
	let normalized = expr.trim().to_ascii_lowercase();
	let midnight = now.replace_time(Time::MIDNIGHT);

	match normalized.as_str() {
		"last-hour" => Ok(TimeWindow { start: Some(now - Duration::hours(1)), end: Some(now) }),
		"today" => Ok(TimeWindow { start: Some(midnight), end: Some(now) }),
		"yesterday" => Ok(TimeWindow {
			start: Some(midnight - Duration::days(1)),
			end: Some(midnight),
		}),
		"recent" | "last-week" => {
			Ok(TimeWindow { start: Some(now - Duration::days(7)), end: Some(now) })
		},
		"last-month" => Ok(TimeWindow {
			start: Some(now - Duration::days(ARCHIVE_HORIZON_DAYS)),
			end: Some(now),
		}),
		"archived" => Ok(TimeWindow {
			start: None,
			end: Some(now - Duration::days(ARCHIVE_HORIZON_DAYS)),
		}),
		_ => resolve_hours_ago(&normalized, now),
	}
}

fn resolve_hours_ago(expr: &str, now: OffsetDateTime) -> Result<TimeWindow> {
	let count = expr
		.strip_suffix("-hours-ago")
		.or_else(|| expr.strip_suffix("-hour-ago"))
		.and_then(|prefix| prefix.parse::<i64>().ok())
		.filter(|count| *count > 0);

	match count {
		Some(hours) => {
			Ok(TimeWindow { start: Some(now - Duration::hours(hours)), end: Some(now) })
		},
		None => Err(Error::InvalidTimeframe {
			message: format!("unsupported relative expression '{expr}'."),
		}),
	}
}
