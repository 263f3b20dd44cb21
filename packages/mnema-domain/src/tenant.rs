use serde::{Deserialize, Serialize};

/// Isolation unit. Every tenant owns its own collection in the vector index;
/// nothing written under one tenant is ever visible to another.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tenant {
	pub user_id: String,
	pub project_id: String,
}
impl Tenant {
	pub fn new(user_id: impl Into<String>, project_id: impl Into<String>) -> Self {
		Self { user_id: user_id.into(), project_id: project_id.into() }
	}

	pub fn key(&self) -> String {
		format!("{}:{}", self.user_id, self.project_id)
	}
}
impl std::fmt::Display for Tenant {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}:{}", self.user_id, self.project_id)
	}
}
