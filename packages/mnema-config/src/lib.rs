mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Cache, Config, Decay, Documents, EmbeddingProviderConfig, Ingest, Postgres, Search, Service,
	Storage, VectorIndex,
};

use std::{fs, path::Path};

// Collection names are "<prefix>_<16 hex chars>" and the vector engine caps
// names at 63 characters.
const COLLECTION_SUFFIX_LEN: usize = 17;
const MAX_COLLECTION_NAME_LEN: usize = 63;
const MAX_RETRIES_CEILING: u32 = 10;

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.log_level.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.log_level must be non-empty.".to_string(),
		});
	}
	if cfg.storage.postgres.dsn.trim().is_empty() {
		return Err(Error::Validation {
			message: "storage.postgres.dsn must be non-empty.".to_string(),
		});
	}
	if cfg.storage.postgres.pool_max_conns == 0 {
		return Err(Error::Validation {
			message: "storage.postgres.pool_max_conns must be greater than zero.".to_string(),
		});
	}
	if cfg.storage.vector.url.trim().is_empty() {
		return Err(Error::Validation {
			message: "storage.vector.url must be non-empty.".to_string(),
		});
	}

	validate_collection_prefix(&cfg.storage.vector.collection_prefix)?;

	if !matches!(cfg.storage.vector.distance_metric.as_str(), "cosine" | "euclid" | "dot") {
		return Err(Error::Validation {
			message: "storage.vector.distance_metric must be one of cosine, euclid, or dot."
				.to_string(),
		});
	}

	for (label, value) in [
		("provider.provider_id", &cfg.provider.provider_id),
		("provider.api_base", &cfg.provider.api_base),
		("provider.api_key", &cfg.provider.api_key),
		("provider.model", &cfg.provider.model),
	] {
		if value.trim().is_empty() {
			return Err(Error::Validation { message: format!("{label} must be non-empty.") });
		}
	}

	if cfg.provider.timeout_ms == 0 {
		return Err(Error::Validation {
			message: "provider.timeout_ms must be greater than zero.".to_string(),
		});
	}
	if cfg.provider.max_retries > MAX_RETRIES_CEILING {
		return Err(Error::Validation {
			message: format!("provider.max_retries must be {MAX_RETRIES_CEILING} or less."),
		});
	}
	if cfg.cache.enabled {
		if cfg.cache.max_entries == 0 {
			return Err(Error::Validation {
				message: "cache.max_entries must be greater than zero.".to_string(),
			});
		}
		if cfg.cache.ttl_secs == 0 {
			return Err(Error::Validation {
				message: "cache.ttl_secs must be greater than zero.".to_string(),
			});
		}
	}
	if cfg.documents.default_dimensions == 0 {
		return Err(Error::Validation {
			message: "documents.default_dimensions must be greater than zero.".to_string(),
		});
	}

	for (document_type, dimensions) in &cfg.documents.dimensions {
		if *dimensions == 0 {
			return Err(Error::Validation {
				message: format!(
					"documents.dimensions.{document_type} must be greater than zero."
				),
			});
		}
	}

	if cfg.search.default_top_k == 0 {
		return Err(Error::Validation {
			message: "search.default_top_k must be greater than zero.".to_string(),
		});
	}
	if !cfg.search.min_similarity.is_finite() || !(0.0..=1.0).contains(&cfg.search.min_similarity)
	{
		return Err(Error::Validation {
			message: "search.min_similarity must be in the range 0.0-1.0.".to_string(),
		});
	}
	if !cfg.decay.half_life_days.is_finite() || cfg.decay.half_life_days <= 0.0 {
		return Err(Error::Validation {
			message: "decay.half_life_days must be a finite number greater than zero.".to_string(),
		});
	}
	if cfg.ingest.queue_capacity == 0 {
		return Err(Error::Validation {
			message: "ingest.queue_capacity must be greater than zero.".to_string(),
		});
	}

	Ok(())
}

fn validate_collection_prefix(prefix: &str) -> Result<()> {
	if prefix.is_empty() {
		return Err(Error::Validation {
			message: "storage.vector.collection_prefix must be non-empty.".to_string(),
		});
	}
	if prefix.len() + COLLECTION_SUFFIX_LEN > MAX_COLLECTION_NAME_LEN {
		return Err(Error::Validation {
			message: format!(
				"storage.vector.collection_prefix must be {} characters or fewer.",
				MAX_COLLECTION_NAME_LEN - COLLECTION_SUFFIX_LEN
			),
		});
	}
	if !prefix.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-') {
		return Err(Error::Validation {
			message:
				"storage.vector.collection_prefix must contain only alphanumerics, underscores, or dashes."
					.to_string(),
		});
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	cfg.storage.vector.collection_prefix =
		cfg.storage.vector.collection_prefix.trim().to_ascii_lowercase();

	if let Some(stripped) = cfg.provider.api_base.strip_suffix('/') {
		cfg.provider.api_base = stripped.to_string();
	}
}
