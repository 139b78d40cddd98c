//! Session-scoped state.
//!
//! Every tool operation receives the caller's state through the [`StateStore`]
//! trait instead of reaching for anything process-wide, so two sessions never
//! observe each other's corpus pointer or existence verdicts.

mod manager;

use std::collections::HashMap;

use serde_json::{Map, Value};

pub use manager::{Session, SessionManager, SessionSummary};

/// Key holding the most recently created or confirmed corpus identifier.
pub const CURRENT_CORPUS_KEY: &str = "current_corpus";

/// Key holding the memoized existence verdict for an input identifier.
///
/// The identifier is the caller's original string, not the resolved path.
pub fn corpus_exists_key(identifier: &str) -> String {
    format!("corpus_exists_{}", identifier)
}

/// Minimal get/set interface over a session's key-value state.
pub trait StateStore: Send + Sync {
    fn get(&self, key: &str) -> Option<&Value>;

    fn set(&mut self, key: &str, value: Value);

    fn is_truthy(&self, key: &str) -> bool {
        is_truthy(self.get(key))
    }
}

/// Truthiness of a stored value: absent, null, false, zero and empty values are false.
pub fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(flag)) => *flag,
        Some(Value::Number(number)) => number.as_f64().map(|n| n != 0.0).unwrap_or(false),
        Some(Value::String(text)) => !text.is_empty(),
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::Object(map)) => !map.is_empty(),
    }
}

/// The current corpus pointer, if one is set.
pub fn current_corpus(state: &dyn StateStore) -> Option<String> {
    state
        .get(CURRENT_CORPUS_KEY)
        .and_then(|v| v.as_str())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[derive(Debug, Clone, Default)]
pub struct SessionState {
    values: HashMap<String, Value>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Copy of all entries, for inspection endpoints.
    pub fn snapshot(&self) -> Map<String, Value> {
        let mut entries: Vec<(&String, &Value)> = self.values.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries
            .into_iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }
}

impl StateStore for SessionState {
    fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    fn set(&mut self, key: &str, value: Value) {
        self.values.insert(key.to_string(), value);
    }
}
