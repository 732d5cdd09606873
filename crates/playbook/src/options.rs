//! Free-form per-step options and execution policy

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Worker pool width used when a step does not set one
pub const DEFAULT_CONCURRENCY: usize = 10;

/// How one playbook step is executed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecPolicy {
    /// Maximum tasks running at once; 0 means [`DEFAULT_CONCURRENCY`]
    pub concurrency: usize,
    pub silent_main_bar: bool,
    pub silent_sub_bar: bool,
    /// Record task failures without stopping the playbook
    pub skip_error: bool,
}

impl Default for ExecPolicy {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            silent_main_bar: false,
            silent_sub_bar: false,
            skip_error: false,
        }
    }
}

impl ExecPolicy {
    /// Effective pool width
    pub fn width(&self) -> usize {
        if self.concurrency == 0 {
            DEFAULT_CONCURRENCY
        } else {
            self.concurrency
        }
    }
}

/// Weakly typed options read by task factories
///
/// Factories look up the keys they understand and ignore the rest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Options(Map<String, Value>);

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.get(key).and_then(Value::as_u64)
    }

    /// String list, accepting either an array or a comma separated string
    pub fn get_strings(&self, key: &str) -> Vec<String> {
        match self.get(key) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            Some(Value::String(s)) => s
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        }
    }
}
