pub mod config;
pub mod engine;
pub mod error;
pub mod providers;
pub mod resources;
pub mod store;
pub mod strategy;
pub mod types;

pub use config::Config;
pub use error::SynapseError;
pub use types::*;
