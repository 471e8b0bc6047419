//! YAML documents
//!
//! Data-carrying enum variants (`Target`, `ActionTactic`, `WaitCondition`) are written as
//! single-key maps (`settle_then_native: 300`, `label: {text: Save}`) instead of YAML tags,
//! at any nesting depth.

use serde::de::DeserializeOwned;

/// Parses `raw`, reading enum variants in single-key map form.
pub fn from_yaml_str<T: DeserializeOwned>(raw: &str) -> Result<T, serde_yaml::Error> {
    serde_yaml::with::singleton_map_recursive::deserialize(serde_yaml::Deserializer::from_str(raw))
}
