use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::StructuringError;

/// Which structuring path to take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StructuringMode {
    Ai,
    Heuristic,
}

/// Size of the schema requested from the model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptDetail {
    #[default]
    Standard,
    /// Adds equipment, nutrition, dietary tags, difficulty, source, storage, variations.
    Detailed,
}

/// Response shape flag passed to the completion API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CompletionMode {
    JsonStructured,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub prompt: String,
    pub system: String,
    pub mode: CompletionMode,
}

impl CompletionRequest {
    pub fn json(prompt: String, system: &str) -> Self {
        Self {
            prompt,
            system: system.to_string(),
            mode: CompletionMode::JsonStructured,
        }
    }
}

/// Hosted completion API abstraction (allows mocking for tests).
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Free-form reply text, expected to contain one JSON object.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, StructuringError>;

    fn model_name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_mode_serializes_kebab_case() {
        let json = serde_json::to_string(&CompletionMode::JsonStructured).unwrap();
        assert_eq!(json, "\"json-structured\"");
    }

    #[test]
    fn mode_round_trips_lowercase() {
        let mode: StructuringMode = serde_json::from_str("\"heuristic\"").unwrap();
        assert_eq!(mode, StructuringMode::Heuristic);
    }
}
