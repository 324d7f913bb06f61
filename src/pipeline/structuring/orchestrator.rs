use std::sync::Arc;

use tracing::Instrument;

use super::heuristic::parse_recipe_text;
use super::openai::OpenAiClient;
use super::parser::parse_recipe_response;
use super::prompt::{build_recipe_prompt, build_recovery_prompt, RECIPE_SYSTEM_PROMPT};
use super::sanitize::sanitize_for_model;
use super::types::{CompletionClient, CompletionRequest, PromptDetail, StructuringMode};
use super::StructuringError;
use crate::config::ConverterConfig;
use crate::models::RecipeCandidate;
use crate::pipeline::error::ConversionError;

/// Turns normalized text into a recipe candidate, through the completion API
/// or the local heuristic parser.
pub struct RecipeStructurer {
    client: Option<Arc<dyn CompletionClient>>,
    detail: PromptDetail,
}

impl RecipeStructurer {
    pub fn with_client(client: Arc<dyn CompletionClient>) -> Self {
        Self {
            client: Some(client),
            detail: PromptDetail::Standard,
        }
    }

    /// No completion API: `Ai` requests use the heuristic parser.
    pub fn heuristic_only() -> Self {
        Self {
            client: None,
            detail: PromptDetail::Standard,
        }
    }

    pub fn with_detail(mut self, detail: PromptDetail) -> Self {
        self.detail = detail;
        self
    }

    pub fn from_config(config: &ConverterConfig) -> Result<Self, ConversionError> {
        let structurer = match OpenAiClient::from_settings(&config.ai)? {
            Some(client) => Self::with_client(Arc::new(client)),
            None => Self::heuristic_only(),
        };
        let detail = if config.ai.detailed {
            PromptDetail::Detailed
        } else {
            PromptDetail::Standard
        };
        Ok(structurer.with_detail(detail))
    }

    pub fn has_client(&self) -> bool {
        self.client.is_some()
    }

    /// Structure `text`. `Ok(None)` means the text is not recipe-shaped.
    pub async fn structure(
        &self,
        text: &str,
        mode: StructuringMode,
    ) -> Result<Option<RecipeCandidate>, ConversionError> {
        let span = tracing::info_span!("structure_recipe", ?mode, chars = text.len());
        self.structure_inner(text, mode).instrument(span).await
    }

    async fn structure_inner(
        &self,
        text: &str,
        mode: StructuringMode,
    ) -> Result<Option<RecipeCandidate>, ConversionError> {
        if text.trim().is_empty() {
            return Err(ConversionError::empty_input());
        }

        let client = match (mode, &self.client) {
            (StructuringMode::Ai, Some(client)) => client,
            (StructuringMode::Ai, None) => {
                tracing::info!("No completion client configured, using heuristic parser");
                return Ok(parse_recipe_text(text));
            }
            (StructuringMode::Heuristic, _) => return Ok(parse_recipe_text(text)),
        };

        match self.structure_with_model(client.as_ref(), text).await {
            Ok(candidate) => {
                tracing::info!(
                    ingredients = candidate.ingredients.len(),
                    instructions = candidate.instructions.len(),
                    "AI structuring complete"
                );
                Ok(Some(candidate))
            }
            Err(e) if e.is_parse_error() => Err(e.into()),
            Err(e) => {
                tracing::warn!(error = %e, "Completion API failed, trying heuristic parser");
                match parse_recipe_text(text) {
                    Some(candidate) => Ok(Some(candidate)),
                    None => Err(e.into()),
                }
            }
        }
    }

    /// One model call, plus one recovery call if the reply does not parse.
    async fn structure_with_model(
        &self,
        client: &dyn CompletionClient,
        text: &str,
    ) -> Result<RecipeCandidate, StructuringError> {
        let sanitized = sanitize_for_model(text);
        if sanitized.trim().is_empty() {
            return Err(StructuringError::InputEmpty);
        }

        let prompt = build_recipe_prompt(&sanitized, self.detail);
        let reply = client
            .complete(&CompletionRequest::json(prompt, RECIPE_SYSTEM_PROMPT))
            .await?;

        match parse_recipe_response(&reply) {
            Ok(candidate) => return Ok(candidate),
            Err(e) if e.is_parse_error() => {
                tracing::warn!(
                    model = client.model_name(),
                    error = %e,
                    "Completion reply unreadable, retrying with recovery prompt"
                );
            }
            Err(e) => return Err(e),
        }

        let recovery = build_recovery_prompt(&sanitized);
        let reply = client
            .complete(&CompletionRequest::json(recovery, RECIPE_SYSTEM_PROMPT))
            .await?;
        parse_recipe_response(&reply)
    }
}
