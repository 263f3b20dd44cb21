pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid payload: {message}")]
	InvalidPayload { message: String },
	#[error("Invalid timeframe: {message}")]
	InvalidTimeframe { message: String },
	#[error("Unknown document type: {value}")]
	UnknownDocumentType { value: String },
	#[error("Unknown distance metric: {value}")]
	UnknownMetric { value: String },
}
