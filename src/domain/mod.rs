// Domain layer: records, datasets, identifiers and the warehouse ports.

pub mod model;
pub mod ports;
