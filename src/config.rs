// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::error::{Error, Result};

use serde::Deserialize;

/// Engine wide settings.
///
/// ```json
/// { "maxTextLength": 4000, "trackJson": true, "strictFunctionArity": false }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Longest text, in characters, kept in the text slot. Longer text and
    /// json spill into the byte slot.
    pub max_text_length: usize,

    /// Register json variables for dirty tracking.
    pub track_json: bool,

    /// Register serialized variables for dirty tracking.
    pub track_serializable: bool,

    /// Make the `variables:` functions available.
    pub json_functions: bool,

    /// Check argument counts of functions that declare one.
    pub strict_function_arity: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_text_length: 4000,
            track_json: true,
            track_serializable: true,
            json_functions: true,
            strict_function_arity: false,
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()
    }

    #[cfg(feature = "yaml")]
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: EngineConfig =
            serde_yaml::from_str(yaml).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()
    }

    fn validate(self) -> Result<Self> {
        if self.max_text_length == 0 {
            return Err(Error::Config("maxTextLength must be positive".to_string()));
        }
        Ok(self)
    }

    /// Shortest text that no longer fits the text slot.
    pub fn min_spill_length(&self) -> usize {
        self.max_text_length + 1
    }
}
