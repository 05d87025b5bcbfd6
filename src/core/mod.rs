pub mod etl;
pub mod fetcher;
pub mod loader;

pub use crate::domain::model::{Dataset, IngestReport, LoadOutcome, Namespace, RawRecord, Statement};
pub use crate::domain::ports::{Warehouse, WarehouseConnection};
pub use crate::utils::error::Result;
