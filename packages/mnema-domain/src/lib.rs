pub mod decay;
pub mod document;
pub mod metric;
pub mod payload;
pub mod tenant;
pub mod timeframe;

mod error;

pub use error::{Error, Result};

pub use document::{DocumentType, vector_entry_id};
pub use metric::DistanceMetric;
pub use payload::{RecordPayload, VectorMetadata, VectorUnit};
pub use tenant::Tenant;
pub use timeframe::{TimeWindow, Timeframe};
