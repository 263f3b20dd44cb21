use sha2::{Digest, Sha256};

use crate::{Error, Result};
use mnema_domain::Tenant;

// The vector engine rejects collection names outside this range.
pub const MIN_NAME_LEN: usize = 3;
pub const MAX_NAME_LEN: usize = 63;

const HASH_PREFIX_LEN: usize = 16;

/// Deterministic collection name for a tenant. Tenant keys are long and
/// variable (UUID pairs); hashing them yields a fixed-length, evenly
/// distributed name that always fits the engine's length constraint.
pub fn collection_name(prefix: &str, tenant: &Tenant) -> Result<String> {
	let digest = Sha256::digest(tenant.key().as_bytes());
	let hash = hex::encode(digest);
	let name = format!("{prefix}_{}", &hash[..HASH_PREFIX_LEN]);

	if name.len() < MIN_NAME_LEN || name.len() > MAX_NAME_LEN {
		return Err(Error::Configuration(format!(
			"collection name {name:?} is {} characters; the engine accepts {MIN_NAME_LEN}-{MAX_NAME_LEN}.",
			name.len()
		)));
	}

	Ok(name)
}
