pub mod db;
pub mod filter;
pub mod models;
pub mod namer;
pub mod records;
pub mod vector;

mod error;

pub use error::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;
