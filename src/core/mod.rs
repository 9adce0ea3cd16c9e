// Public modules
pub mod cloud;
pub mod config;
pub mod deploy;
pub mod env;
pub mod error;
pub mod pipeline;
pub mod project;
pub mod ssh;

// Re-export common types for convenience
pub use error::{Error, ErrorCode, ErrorKind, Result};
