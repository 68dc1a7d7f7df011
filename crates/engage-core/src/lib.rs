pub mod config;
pub mod directory;
pub mod error;
pub mod types;

pub use config::EngageConfig;
pub use error::{EngageError, Result};
pub use types::*;
