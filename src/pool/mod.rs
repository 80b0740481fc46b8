pub mod config;
pub mod executor;
pub mod status;

pub use config::*;
pub use executor::*;
pub use status::*;
