// src/config/outputs.rs
use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputsConfig {
    #[serde(default)]
    pub outputs: Vec<OutputSpec>,
}

/// One delivery sink, e.g. `{ type = "discord", settings = { webhook_env = "..." } }`.
#[derive(Debug, Clone, Deserialize)]
pub struct OutputSpec {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub settings: Map<String, Value>,
}
