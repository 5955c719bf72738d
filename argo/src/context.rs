//! Interpreter context
//!
//! A flat, dotted-key string map threaded through step execution, plus
//! `{key}` template substitution (spec.md §4.2, §4.5).

use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct Context {
    values: HashMap<String, String>,
}

impl Context {
    pub fn new() -> Self {
        Self {
            values: HashMap::new(),
        }
    }

    pub fn from_map(values: HashMap<String, String>) -> Self {
        Self { values }
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// Resolve a dotted key, e.g. `"context.user.name"` with the leading
    /// `context.` prefix stripped by the caller (see `condition.rs`), or a
    /// plain key supporting a `.length` suffix that returns the value's
    /// character count.
    pub fn get(&self, key: &str) -> Option<&str> {
        if let Some(base) = key.strip_suffix(".length") {
            // `.length` is handled by callers that need the numeric form;
            // plain `get` just returns the raw value if present.
            return self.values.get(base).map(|s| s.as_str());
        }
        self.values.get(key).map(|s| s.as_str())
    }

    pub fn len_of(&self, key: &str) -> Option<usize> {
        self.values.get(key).map(|s| s.chars().count())
    }

    pub fn as_map(&self) -> &HashMap<String, String> {
        &self.values
    }

    /// Replace every `{key}` occurrence in `template` with its context
    /// value. Unknown keys substitute to the empty string (SPEC_FULL.md
    /// decision: graceful tolerance of missing context, matching
    /// `save_file`'s implicit timestamp behavior).
    pub fn substitute(&self, template: &str) -> String {
        let mut out = String::with_capacity(template.len());
        let mut chars = template.char_indices().peekable();
        let bytes = template.as_bytes();
        let mut i = 0;

        while i < bytes.len() {
            if bytes[i] == b'{' {
                if let Some(end) = template[i + 1..].find('}') {
                    let key = &template[i + 1..i + 1 + end];
                    out.push_str(self.get(key).unwrap_or(""));
                    i = i + 1 + end + 1;
                    continue;
                }
            }
            let ch = template[i..].chars().next().unwrap();
            out.push(ch);
            i += ch.len_utf8();
        }
        let _ = chars.peek();
        out
    }

    /// Recursively apply `substitute` to every string leaf in a JSON value,
    /// leaving numbers, bools, and null untouched. Used by `save_file`'s
    /// `data` field, which is a JSON object literal rather than a template
    /// string (spec.md §4.2).
    pub fn substitute_json(&self, value: &serde_json::Value) -> serde_json::Value {
        match value {
            serde_json::Value::String(s) => serde_json::Value::String(self.substitute(s)),
            serde_json::Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(|v| self.substitute_json(v)).collect())
            }
            serde_json::Value::Object(map) => serde_json::Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), self.substitute_json(v)))
                    .collect(),
            ),
            other => other.clone(),
        }
    }
}
