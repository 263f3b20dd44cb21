pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid input: {message}")]
	InvalidInput { message: String },
	#[error("Provider error: {message}")]
	Provider { message: String },
	#[error("Not found: {message}")]
	NotFound { message: String },
	#[error("Configuration error: {message}")]
	Configuration { message: String },
	#[error("Persistence error: {message}")]
	Persistence { message: String },
}
impl From<sqlx::Error> for Error {
	fn from(err: sqlx::Error) -> Self {
		Self::Persistence { message: err.to_string() }
	}
}

impl From<mnema_storage::Error> for Error {
	fn from(err: mnema_storage::Error) -> Self {
		match err {
			mnema_storage::Error::Sqlx(inner) => Self::Persistence { message: inner.to_string() },
			mnema_storage::Error::Qdrant(inner) => {
				Self::Persistence { message: inner.to_string() }
			},
			mnema_storage::Error::InvalidArgument(message) => Self::InvalidInput { message },
			mnema_storage::Error::NotFound(message) => Self::NotFound { message },
			mnema_storage::Error::Configuration(message) => Self::Configuration { message },
		}
	}
}

impl From<mnema_providers::Error> for Error {
	fn from(err: mnema_providers::Error) -> Self {
		match err {
			mnema_providers::Error::InvalidInput { message } => Self::InvalidInput { message },
			other => Self::Provider { message: other.to_string() },
		}
	}
}

impl From<mnema_domain::Error> for Error {
	fn from(err: mnema_domain::Error) -> Self {
		Self::InvalidInput { message: err.to_string() }
	}
}
