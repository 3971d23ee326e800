pub mod config;
pub mod dedup;
pub mod domain;
pub mod errors;

pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};
pub use dedup::{BoundedEventRegistry, EventRegistry, Registration};
pub use domain::prospect::ProspectFields;
pub use errors::{ErrorSite, APOLOGY_TEXT};
