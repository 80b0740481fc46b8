pub mod aggregation;
pub mod executor;

pub use aggregation::MultiError;
pub use executor::*;
