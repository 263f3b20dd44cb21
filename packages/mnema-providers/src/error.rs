pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Reqwest(#[from] reqwest::Error),
	#[error(transparent)]
	InvalidHeaderName(#[from] reqwest::header::InvalidHeaderName),
	#[error(transparent)]
	InvalidHeaderValue(#[from] reqwest::header::InvalidHeaderValue),
	#[error("Invalid input: {message}")]
	InvalidInput { message: String },
	#[error("Provider error: {message}")]
	Provider { message: String },
	#[error("Invalid provider response: {message}")]
	InvalidResponse { message: String },
}
