use jsonschema::Validator;
use serde_json::{json, Value};

use crate::error::{CitreeError, Result};

/// Shape a configuration document must have before job entries are read.
///
/// Documents are lists; entries may hold other sections (projects,
/// pipelines, secrets) which are accepted without inspection.
fn document_schema() -> Value {
    json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "type": "array",
        "items": {
            "type": "object",
            "properties": {
                "job": {
                    "type": "object",
                    "required": ["name"],
                    "properties": {
                        "name": { "type": "string", "minLength": 1 },
                        "parent": { "type": ["string", "null"] },
                        "description": { "type": "string" },
                        "branches": {
                            "oneOf": [
                                { "type": "string" },
                                { "type": "array", "items": { "type": "string" } }
                            ]
                        },
                        "vars": { "type": "object" }
                    }
                }
            }
        }
    })
}

pub struct ConfigSchema {
    validator: Validator,
}

impl ConfigSchema {
    pub fn new() -> Result<Self> {
        let validator = jsonschema::validator_for(&document_schema())
            .map_err(|e| CitreeError::Config(format!("Invalid configuration schema: {e}")))?;
        Ok(Self { validator })
    }

    /// Returns every violation in `document`; empty when it is valid.
    pub fn violations(&self, document: &Value) -> Vec<String> {
        self.validator
            .iter_errors(document)
            .map(|e| format!("{}: {}", e.instance_path, e))
            .collect()
    }
}
