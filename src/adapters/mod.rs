// Adapters layer: concrete warehouse implementations behind the domain ports.

pub mod memory;
pub mod snowflake;
