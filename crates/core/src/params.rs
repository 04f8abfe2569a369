//! Reduces a tool-invocation envelope to one flat `name -> value` mapping.
//!
//! The agent platform can carry parameters in three shapes, sometimes at once:
//!
//! 1. `parameters`: a list of `{name, value}` pairs;
//! 2. `requestBody.content.<media-type>.properties`: the same pairs nested under
//!    each media type;
//! 3. `body` (or `payload`): a JSON object, or a string holding one.
//!
//! Strategies run in that order and each one only contributes when its shape is
//! present, so a key set by an earlier shape is overwritten only by a later
//! shape that actually carries it. Every handler goes through the same
//! [`ParameterExtractor`], so the precedence is identical across actions.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

pub type ParameterMap = BTreeMap<String, String>;

pub trait ExtractionStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Adds every parameter this shape carries. Absent or malformed shapes add
    /// nothing.
    fn extract(&self, envelope: &Value, into: &mut ParameterMap);
}

/// `parameters: [{name, value}, ...]`
#[derive(Clone, Copy, Debug, Default)]
pub struct NamedListStrategy;

impl ExtractionStrategy for NamedListStrategy {
    fn name(&self) -> &'static str {
        "named_list"
    }

    fn extract(&self, envelope: &Value, into: &mut ParameterMap) {
        if let Some(Value::Array(entries)) = envelope.get("parameters") {
            insert_named_values(entries, into);
        }
    }
}

/// `requestBody.content[<media-type>].properties: [{name, value}, ...]`
#[derive(Clone, Copy, Debug, Default)]
pub struct MediaPropertiesStrategy;

impl ExtractionStrategy for MediaPropertiesStrategy {
    fn name(&self) -> &'static str {
        "media_properties"
    }

    fn extract(&self, envelope: &Value, into: &mut ParameterMap) {
        let Some(Value::Object(content)) =
            envelope.get("requestBody").and_then(|body| body.get("content"))
        else {
            return;
        };

        for media in content.values() {
            if let Some(Value::Array(properties)) = media.get("properties") {
                insert_named_values(properties, into);
            }
        }
    }
}

/// `body` / `payload` as an object or a JSON-encoded object string. The first
/// of the two that decodes to an object is used.
#[derive(Clone, Copy, Debug, Default)]
pub struct RawBodyStrategy;

impl ExtractionStrategy for RawBodyStrategy {
    fn name(&self) -> &'static str {
        "raw_body"
    }

    fn extract(&self, envelope: &Value, into: &mut ParameterMap) {
        let decoded = ["body", "payload"].into_iter().find_map(|key| match envelope.get(key)? {
            Value::Object(fields) => Some(fields.clone()),
            Value::String(encoded) => match serde_json::from_str::<Value>(encoded) {
                Ok(Value::Object(fields)) => Some(fields),
                _ => None,
            },
            _ => None,
        });

        if let Some(fields) = decoded {
            insert_object(&fields, into);
        }
    }
}

pub struct ParameterExtractor {
    strategies: Vec<Box<dyn ExtractionStrategy>>,
}

impl Default for ParameterExtractor {
    fn default() -> Self {
        Self::new(vec![
            Box::new(NamedListStrategy),
            Box::new(MediaPropertiesStrategy),
            Box::new(RawBodyStrategy),
        ])
    }
}

impl ParameterExtractor {
    pub fn new(strategies: Vec<Box<dyn ExtractionStrategy>>) -> Self {
        Self { strategies }
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|strategy| strategy.name()).collect()
    }

    pub fn extract(&self, envelope: &Value) -> ParameterMap {
        let mut parameters = ParameterMap::new();
        for strategy in &self.strategies {
            strategy.extract(envelope, &mut parameters);
        }
        parameters
    }
}

fn insert_named_values(entries: &[Value], into: &mut ParameterMap) {
    for entry in entries {
        let Some(name) = entry.get("name").and_then(Value::as_str) else {
            continue;
        };
        if let Some(value) = entry.get("value").and_then(stringify) {
            into.insert(name.to_string(), value);
        }
    }
}

fn insert_object(fields: &Map<String, Value>, into: &mut ParameterMap) {
    for (name, value) in fields {
        if let Some(value) = stringify(value) {
            into.insert(name.clone(), value);
        }
    }
}

/// Strings pass through untouched; nulls carry no value.
fn stringify(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}
