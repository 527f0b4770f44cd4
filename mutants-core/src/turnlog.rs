//! Structured, replayable audit trail of every AI decision.
//!
//! Entries render deterministically as `[tick] KIND key=value ...`: metadata
//! keys are sorted and booleans print as `true`/`false`, so two runs with the
//! same seed and commands produce byte-identical text.
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::hash::Hasher;
use twox_hash::XxHash64;

/// One audit line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnLogEntry {
    pub tick: u64,
    pub kind: String,
    #[serde(default)]
    pub meta: Map<String, Value>,
}

impl TurnLogEntry {
    #[must_use]
    pub fn render(&self) -> String {
        let meta = format_meta(&self.meta);
        if meta.is_empty() {
            format!("[{}] {}", self.tick, self.kind)
        } else {
            format!("[{}] {} {}", self.tick, self.kind, meta)
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.meta.get(key)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TurnLog {
    tick: u64,
    entries: Vec<TurnLogEntry>,
}

impl TurnLog {
    pub const fn set_tick(&mut self, tick: u64) {
        self.tick = tick;
    }

    #[must_use]
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    /// Record an event. Non-object metadata is stored under `message`.
    pub fn emit(&mut self, kind: &str, meta: Value) {
        let meta = match meta {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("message".to_string(), other);
                map
            }
        };
        let entry = TurnLogEntry {
            tick: self.tick,
            kind: kind.to_string(),
            meta,
        };
        log::info!("{}", entry.render());
        self.entries.push(entry);
    }

    #[must_use]
    pub fn entries(&self) -> &[TurnLogEntry] {
        &self.entries
    }

    /// Entries of a given kind, in emission order.
    pub fn of_kind<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = &'a TurnLogEntry> + 'a {
        self.entries.iter().filter(move |entry| entry.kind == kind)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Full log text, one entry per line.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            out.push_str(&entry.render());
            out.push('\n');
        }
        out
    }

    /// Stable fingerprint of [`TurnLog::render`].
    #[must_use]
    pub fn digest(&self) -> u64 {
        let mut hasher = XxHash64::with_seed(0);
        hasher.write(self.render().as_bytes());
        hasher.finish()
    }
}

/// `key=value` pairs in key order.
#[must_use]
pub fn format_meta(meta: &Map<String, Value>) -> String {
    let mut keys: Vec<&String> = meta.keys().collect();
    keys.sort();
    keys.into_iter()
        .map(|key| format!("{key}={}", format_value(&meta[key.as_str()])))
        .collect::<Vec<_>>()
        .join(" ")
}

fn format_value(value: &Value) -> String {
    match value {
        Value::Null => "-".to_string(),
        Value::Bool(flag) => if *flag { "true" } else { "false" }.to_string(),
        Value::String(text) => text.clone(),
        Value::Array(items) => items
            .iter()
            .map(format_value)
            .collect::<Vec<_>>()
            .join(","),
        other => other.to_string(),
    }
}
