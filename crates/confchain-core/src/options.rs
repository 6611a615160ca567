//! Per-call resolution options
//!
//! [`ResolveOptions`] replaces positional "default value or options" arguments
//! with explicit fields. Callers that still receive loosely-typed arguments
//! (for example from a scripting bridge) can use
//! [`ResolveOptions::from_call_args`], which applies the same disambiguation
//! rule the positional form always had.

use crate::value::Value;

/// Name of the only recognized option key in a loosely-typed options record
pub const INFER_OPTION: &str = "infer";

/// Options for a single resolution
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolveOptions {
    /// Returned when no source has the path
    pub default: Option<Value>,
    /// Caller asked for a typed lookup. Carried for callers that dispatch on
    /// it; it never changes which source answers.
    pub infer: bool,
}

impl ResolveOptions {
    /// No default, not inferred
    pub fn new() -> Self {
        Self::default()
    }

    /// Options with a default value
    pub fn with_default(default: impl Into<Value>) -> Self {
        Self {
            default: Some(default.into()),
            infer: false,
        }
    }

    /// Options for an inferred lookup with no default
    pub fn infer() -> Self {
        Self {
            default: None,
            infer: true,
        }
    }

    /// Mark these options as inferred
    pub fn inferred(mut self) -> Self {
        self.infer = true;
        self
    }

    /// Build options from positional `(default_or_options, options)` arguments
    ///
    /// The second argument counts as an options record only when no third
    /// argument was given; in that case there is no default. In every other
    /// case the second argument is the default, even if it looks like an
    /// options record.
    pub fn from_call_args(default_or_options: Option<Value>, options: Option<Value>) -> Self {
        let first_is_options = default_or_options
            .as_ref()
            .is_some_and(is_options_record);

        match options {
            None if first_is_options => Self::infer(),
            None => Self {
                default: default_or_options,
                infer: false,
            },
            Some(options) => Self {
                default: default_or_options,
                infer: is_options_record(&options),
            },
        }
    }
}

/// A mapping with exactly one key, `infer`, whose value is truthy
pub fn is_options_record(value: &Value) -> bool {
    value.as_mapping().is_some_and(|map| {
        map.len() == 1 && map.get(INFER_OPTION).is_some_and(Value::is_truthy)
    })
}
