pub mod build;
pub mod config;
pub mod discovery;
pub mod error;
pub mod settings;
pub mod validation;
pub mod watch;

// Re-export main types
pub use build::*;
pub use config::*;
pub use error::*;
pub use settings::*;
pub use watch::*;

// Re-export discovery and validation
pub use discovery::{ConfigDiscovery, ENV_PREFIX, discover, discover_with_profile, extract};
pub use validation::{ConfigValidator, FsValidator, SchemaValidator, validate_fs, validate_schema};
