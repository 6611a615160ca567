//! confchain-core: layered configuration resolution
//!
//! A [`Config`] answers property lookups from the configuration it was built
//! with, then a validated overlay, then the environment, then the caller's
//! default. Writes through [`Config::set`] update the environment, rewrite
//! env-file variables that reference the changed name, and notify subscribers.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use confchain_core::{Config, ConfigOptions, MemoryEnvironment, Value};
//!
//! let yaml = r#"
//! database:
//!   host: localhost
//!   port: 5432
//! "#;
//!
//! let env: MemoryEnvironment = [("API_KEY", "k-123")].into_iter().collect();
//! let config = Config::with_environment(
//!     serde_yaml::from_str(yaml).unwrap(),
//!     ConfigOptions::default(),
//!     Arc::new(env),
//! );
//!
//! assert_eq!(config.get("database.host").unwrap().as_str(), Some("localhost"));
//! assert_eq!(config.get("API_KEY"), Some(Value::from("k-123")));
//! assert_eq!(config.get_or("TIMEOUT", 30), Value::from(30));
//! ```

pub mod cache;
pub mod dotenv;
pub mod environment;
pub mod error;
pub mod events;
pub mod interpolation;
pub mod options;
pub mod value;

mod config;

pub use cache::ValueCache;
pub use config::{Config, ConfigOptions, VALIDATED_ENV_PROPNAME};
pub use environment::{EnvironmentStore, MemoryEnvironment, ProcessEnvironment};
pub use error::{Error, ErrorKind, Result};
pub use events::{ChangeBroadcaster, ChangeEvent, Subscription};
pub use interpolation::EnvInterpolator;
pub use options::ResolveOptions;
pub use value::Value;
