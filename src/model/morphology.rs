//! Parsed morphology documents
//!
//! A morphology is a declarative definition of a chunk, stratum, system or
//! cluster. Schema validation and defaulting belong to the loader; here the
//! document is only parsed and carried around as part of a `Source`.

use crate::error::{MorphError, MorphResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Kind of component a morphology defines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MorphologyKind {
    /// A buildable source unit
    Chunk,
    /// A named group of chunks
    Stratum,
    /// A named group of strata
    System,
    /// A named group of systems
    Cluster,
}

impl MorphologyKind {
    /// Parse from the `kind` field value
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "chunk" => Some(Self::Chunk),
            "stratum" => Some(Self::Stratum),
            "system" => Some(Self::System),
            "cluster" => Some(Self::Cluster),
            _ => None,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Self::Chunk => "chunk",
            Self::Stratum => "stratum",
            Self::System => "system",
            Self::Cluster => "cluster",
        }
    }
}

impl fmt::Display for MorphologyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A parsed morphology document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Morphology {
    data: Map<String, Value>,
}

impl Morphology {
    /// Wrap an already parsed document
    pub fn new(data: Map<String, Value>) -> Self {
        Self { data }
    }

    /// Parse a JSON morphology; `filename` only appears in error messages.
    ///
    /// The document must be an object with a known `kind`.
    pub fn from_json(text: &str, filename: &str) -> MorphResult<Self> {
        let value: Value = serde_json::from_str(text).map_err(|e| MorphError::Morphology {
            filename: filename.to_string(),
            reason: format!("syntax error: {}", e),
        })?;

        let Value::Object(data) = value else {
            return Err(MorphError::Morphology {
                filename: filename.to_string(),
                reason: "not a dictionary".to_string(),
            });
        };

        let morph = Self { data };
        if morph.kind().is_none() {
            return Err(MorphError::Morphology {
                filename: filename.to_string(),
                reason: format!("unknown kind {:?}", morph.data.get("kind")),
            });
        }
        Ok(morph)
    }

    /// The `kind` field, if present and known
    pub fn kind(&self) -> Option<MorphologyKind> {
        self.data
            .get("kind")
            .and_then(Value::as_str)
            .and_then(MorphologyKind::parse)
    }

    /// The component name: `name`, falling back to the legacy per-kind key
    /// (`"chunk": "foo"`)
    pub fn name(&self) -> Option<&str> {
        if let Some(name) = self.data.get("name").and_then(Value::as_str) {
            return Some(name);
        }
        let kind = self.kind()?;
        self.data.get(kind.as_str()).and_then(Value::as_str)
    }

    /// Look up a top-level field
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.data.get(field)
    }

    /// Canonical serialized form, stable for identical documents
    pub fn canonical_json(&self) -> String {
        sorted(&Value::Object(self.data.clone())).to_string()
    }
}

/// Rebuild objects with keys inserted in sorted order, whatever ordering the
/// map implementation uses
fn sorted(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut out = Map::new();
            for key in keys {
                out.insert(key.clone(), sorted(&map[key.as_str()]));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
        other => other.clone(),
    }
}
