//! Main Config type for confchain
//!
//! [`Config`] answers a property path from four sources, in a fixed order:
//!
//! 1. the internal configuration supplied at construction,
//! 2. the validated overlay stored under [`VALIDATED_ENV_PROPNAME`],
//! 3. the environment (unless `skip_process_env`), memoized when caching is on,
//! 4. the caller's default.
//!
//! The first source that has the path wins. A missing path is never an error
//! for the resolution methods; it resolves to `None` (or to the default).

use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use serde::de::DeserializeOwned;

use crate::cache::ValueCache;
use crate::environment::{EnvironmentStore, ProcessEnvironment};
use crate::error::{Error, Result};
use crate::events::{ChangeBroadcaster, ChangeEvent};
use crate::interpolation::EnvInterpolator;
use crate::options::ResolveOptions;
use crate::value::Value;

/// Reserved key of the internal configuration that holds the validated overlay
pub const VALIDATED_ENV_PROPNAME: &str = "_PROCESS_ENV_VALIDATED";

/// Configuration options, fixed at construction
#[derive(Debug, Clone, Default)]
pub struct ConfigOptions {
    /// Memoize environment reads
    pub cache: bool,
    /// Never consult the environment during resolution
    pub skip_process_env: bool,
    /// Env files consulted by interpolation, highest precedence first
    pub env_file_paths: Vec<PathBuf>,
}

/// The configuration resolution engine
pub struct Config {
    /// Internal configuration, including the validated overlay
    internal: RwLock<Value>,
    /// Memo of environment reads
    cache: RwLock<ValueCache>,
    /// Environment the engine reads and writes
    env: Arc<dyn EnvironmentStore>,
    /// Change notifications
    changes: ChangeBroadcaster,
    options: ConfigOptions,
}

impl Config {
    /// Create a new Config over the process environment
    pub fn new(value: Value) -> Self {
        Self::with_options(value, ConfigOptions::default())
    }

    /// Create a Config with custom options over the process environment
    pub fn with_options(value: Value, options: ConfigOptions) -> Self {
        Self::with_environment(value, options, Arc::new(ProcessEnvironment))
    }

    /// Create a Config reading and writing the given environment
    pub fn with_environment(
        value: Value,
        options: ConfigOptions,
        env: Arc<dyn EnvironmentStore>,
    ) -> Self {
        Self {
            internal: RwLock::new(value),
            cache: RwLock::new(ValueCache::new(options.cache)),
            env,
            changes: ChangeBroadcaster::new(),
            options,
        }
    }

    /// Load the internal configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Self::from_yaml_with_options(yaml, ConfigOptions::default())
    }

    /// Load the internal configuration from a YAML string with options
    pub fn from_yaml_with_options(yaml: &str, options: ConfigOptions) -> Result<Self> {
        let value: Value = serde_yaml::from_str(yaml).map_err(|e| Error::parse(e.to_string()))?;
        Ok(Self::with_options(value, options))
    }

    /// Load the internal configuration from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        Self::from_json_with_options(json, ConfigOptions::default())
    }

    /// Load the internal configuration from a JSON string with options
    pub fn from_json_with_options(json: &str, options: ConfigOptions) -> Result<Self> {
        let value: Value = serde_json::from_str(json).map_err(|e| Error::parse(e.to_string()))?;
        Ok(Self::with_options(value, options))
    }

    /// Options this Config was built with
    pub fn options(&self) -> &ConfigOptions {
        &self.options
    }

    /// Env files consulted by interpolation
    pub fn env_file_paths(&self) -> &[PathBuf] {
        &self.options.env_file_paths
    }

    /// Stream of changes made through [`Config::set`]
    pub fn changes(&self) -> &ChangeBroadcaster {
        &self.changes
    }

    /// Resolve a path with no default
    pub fn get(&self, path: &str) -> Option<Value> {
        self.resolve(path, &ResolveOptions::new())
    }

    /// Resolve a path, falling back to `default`
    pub fn get_or(&self, path: &str, default: impl Into<Value>) -> Value {
        self.resolve(path, &ResolveOptions::with_default(default))
            .unwrap_or_default()
    }

    /// Resolve a path from positional `(default_or_options, options)`
    /// arguments; see [`ResolveOptions::from_call_args`]
    pub fn get_with_args(
        &self,
        path: &str,
        default_or_options: Option<Value>,
        options: Option<Value>,
    ) -> Option<Value> {
        self.resolve(
            path,
            &ResolveOptions::from_call_args(default_or_options, options),
        )
    }

    /// Resolve a path through internal config, validated overlay,
    /// environment and default, in that order
    pub fn resolve(&self, path: &str, options: &ResolveOptions) -> Option<Value> {
        if let Some(value) = self.get_from_internal_config(path) {
            log::trace!("Resolved '{}' from internal config", path);
            return Some(value);
        }

        if let Some(value) = self.get_from_validated_env(path) {
            log::trace!("Resolved '{}' from validated overlay", path);
            return Some(value);
        }

        if !self.options.skip_process_env {
            if let Some(value) = self.get_from_process_env(path, options.default.as_ref()) {
                return Some(value);
            }
        }

        log::trace!("'{}' not found in any source, using default", path);
        options.default.clone()
    }

    /// Resolve a path that must exist
    pub fn get_required(&self, path: &str) -> Result<Value> {
        self.get(path).ok_or_else(|| Error::path_not_found(path))
    }

    /// Get a resolved string value, with type coercion if needed
    pub fn get_string(&self, path: &str) -> Result<String> {
        let value = self.get_required(path)?;
        match value {
            Value::String(s) => Ok(s),
            Value::Integer(i) => Ok(i.to_string()),
            Value::Float(f) => Ok(f.to_string()),
            Value::Bool(b) => Ok(b.to_string()),
            Value::Null => Ok("null".to_string()),
            _ => Err(Error::type_coercion(path, "string", value.type_name())),
        }
    }

    /// Get a resolved integer value, with type coercion if needed
    pub fn get_i64(&self, path: &str) -> Result<i64> {
        let value = self.get_required(path)?;
        match value {
            Value::Integer(i) => Ok(i),
            Value::String(s) => s
                .trim()
                .parse()
                .map_err(|_| Error::type_coercion(path, "integer", format!("string (\"{}\")", s))),
            _ => Err(Error::type_coercion(path, "integer", value.type_name())),
        }
    }

    /// Get a resolved float value, with type coercion if needed
    pub fn get_f64(&self, path: &str) -> Result<f64> {
        let value = self.get_required(path)?;
        match value {
            Value::Float(f) => Ok(f),
            Value::Integer(i) => Ok(i as f64),
            Value::String(s) => s
                .trim()
                .parse()
                .map_err(|_| Error::type_coercion(path, "float", format!("string (\"{}\")", s))),
            _ => Err(Error::type_coercion(path, "float", value.type_name())),
        }
    }

    /// Get a resolved boolean value; strings must be "true" or "false"
    pub fn get_bool(&self, path: &str) -> Result<bool> {
        let value = self.get_required(path)?;
        match value {
            Value::Bool(b) => Ok(b),
            Value::String(s) => match s.to_lowercase().as_str() {
                "true" => Ok(true),
                "false" => Ok(false),
                _ => Err(Error::type_coercion(
                    path,
                    "boolean",
                    format!("string (\"{}\") - only \"true\" or \"false\" allowed", s),
                )),
            },
            _ => Err(Error::type_coercion(path, "boolean", value.type_name())),
        }
    }

    /// Deserialize the resolved value into `T`
    ///
    /// Environment values are strings; use the `get_i64`-style accessors when
    /// a number or flag may come from the environment.
    pub fn get_as<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let value = self.get_required(path)?;
        let expected = std::any::type_name::<T>();
        serde_json::to_value(&value)
            .and_then(serde_json::from_value)
            .map_err(|e| Error::type_coercion(path, expected, e.to_string()))
    }

    /// Set a value
    ///
    /// Writes the internal configuration and the environment variable named
    /// `path`, propagates the new value into env-file declarations that
    /// reference it, updates the cache when enabled, then emits a
    /// [`ChangeEvent`]. An interpolation error aborts before the cache update
    /// and the event.
    pub fn set(&self, path: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        let old_value = self.get(path);

        self.internal
            .write()
            .expect("config lock poisoned")
            .set_path(path, value.clone());

        let env_value = value.to_env_string();
        self.env.set_var(path, &env_value);
        self.propagate_interpolation(path, &env_value)?;

        {
            let mut cache = self.cache.write().expect("cache lock poisoned");
            if cache.is_enabled() {
                cache.set_if_defined(path, Some(value.clone()));
            }
        }

        log::debug!("Set '{}'", path);
        self.changes.emit(ChangeEvent {
            path: path.to_string(),
            old_value,
            new_value: value,
        });
        Ok(())
    }

    /// Rewrite env-file-declared variables that reference `changed_name`
    ///
    /// Returns the names of the variables rewritten.
    pub fn propagate_interpolation(&self, changed_name: &str, new_value: &str) -> Result<Vec<String>> {
        EnvInterpolator::new(&self.options.env_file_paths, self.env.as_ref())
            .propagate(changed_name, new_value)
    }

    fn get_from_internal_config(&self, path: &str) -> Option<Value> {
        let internal = self.internal.read().expect("config lock poisoned");
        internal.get_path(path).cloned()
    }

    fn get_from_validated_env(&self, path: &str) -> Option<Value> {
        let internal = self.internal.read().expect("config lock poisoned");
        internal
            .get_path(VALIDATED_ENV_PROPNAME)
            .and_then(|overlay| overlay.get_path(path))
            .cloned()
    }

    fn get_from_process_env(&self, path: &str, default: Option<&Value>) -> Option<Value> {
        {
            let cache = self.cache.read().expect("cache lock poisoned");
            if cache.is_enabled() && cache.contains(path) {
                log::trace!("Resolved '{}' from environment cache", path);
                return cache.get_or(path, default.cloned());
            }
        }

        let value = self.env.var(path).map(Value::String);
        if value.is_some() {
            log::trace!("Resolved '{}' from environment", path);
        }

        let mut cache = self.cache.write().expect("cache lock poisoned");
        if cache.is_enabled() {
            cache.set_if_defined(path, value.clone());
        }
        value
    }
}
