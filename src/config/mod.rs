//! Configuration loading and validation
//!
//! Configuration is a TOML file with sections for the scheduler pacing, the
//! browser resource, storage, and the control API. Only the storage section
//! is mandatory; everything else has working defaults.

mod parser;
mod types;
mod validation;

pub use parser::{compute_config_hash, load_config, load_config_with_hash};
pub use types::{BrowserSettings, Config, CrawlerConfig, ServerConfig, StorageConfig};
pub use validation::validate;
