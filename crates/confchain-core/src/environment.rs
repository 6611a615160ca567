//! Environment variable stores
//!
//! The engine never touches `std::env` directly. It reads and writes through an
//! [`EnvironmentStore`], which is the live process environment in production
//! ([`ProcessEnvironment`]) and usually a [`MemoryEnvironment`] in tests.
//!
//! Stores do not serialize compound operations. A caller that reads a
//! variable, derives a new value and writes it back is racing every other
//! thread that does the same; hosts with parallel writers must serialize
//! externally.

use std::collections::HashMap;
use std::sync::RwLock;

/// Flat name → string view of an environment
pub trait EnvironmentStore: Send + Sync {
    /// Read a variable, `None` if unset
    fn var(&self, name: &str) -> Option<String>;

    /// Set a variable, overwriting any previous value
    fn set_var(&self, name: &str, value: &str);
}

/// The live process environment
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessEnvironment;

impl ProcessEnvironment {
    /// Names the platform cannot store; `std::env` panics on them
    fn is_storable(name: &str) -> bool {
        !name.is_empty() && !name.contains(['=', '\0'])
    }
}

impl EnvironmentStore for ProcessEnvironment {
    fn var(&self, name: &str) -> Option<String> {
        if !Self::is_storable(name) {
            return None;
        }
        std::env::var_os(name).map(|value| value.to_string_lossy().into_owned())
    }

    fn set_var(&self, name: &str, value: &str) {
        if !Self::is_storable(name) || value.contains('\0') {
            log::warn!("Skipping environment write to '{}': not a valid variable", name);
            return;
        }
        std::env::set_var(name, value);
    }
}

/// An in-memory environment
#[derive(Debug, Default)]
pub struct MemoryEnvironment {
    vars: RwLock<HashMap<String, String>>,
}

impl MemoryEnvironment {
    /// Create an empty environment
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every variable
    pub fn vars(&self) -> HashMap<String, String> {
        self.vars.read().expect("environment lock poisoned").clone()
    }
}

impl<K, V> FromIterator<(K, V)> for MemoryEnvironment
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: RwLock::new(
                iter.into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }
}

impl EnvironmentStore for MemoryEnvironment {
    fn var(&self, name: &str) -> Option<String> {
        self.vars
            .read()
            .expect("environment lock poisoned")
            .get(name)
            .cloned()
    }

    fn set_var(&self, name: &str, value: &str) {
        self.vars
            .write()
            .expect("environment lock poisoned")
            .insert(name.to_string(), value.to_string());
    }
}
