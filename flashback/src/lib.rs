pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod orchestrator;
pub mod types;

pub use error::Error;
pub use error::Result;
