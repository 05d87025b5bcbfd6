pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use crate::adapters::{memory::MemoryWarehouse, snowflake::SnowflakeWarehouse};
pub use crate::config::{CliConfig, SnowflakeConfig};
pub use crate::core::{etl::IngestEngine, fetcher::ApiFetcher};
pub use crate::domain::model::{Dataset, IngestReport, LoadOutcome, Namespace, RawRecord};
pub use crate::utils::error::{IngestError, Result};
