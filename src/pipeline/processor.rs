//! Recipe conversion chain: extract → structure → complete.
//!
//! Holds no UI concerns. Progress and cancellation come in through the
//! `ExtractionContext`; the caller decides how to render the outcome.

use serde::Serialize;

use crate::config::ConverterConfig;
use crate::models::StructuredRecipe;
use crate::pipeline::error::ConversionError;
use crate::pipeline::extraction::{ExtractionContext, ExtractionOrchestrator, RawDocument};
use crate::pipeline::structuring::{complete, RecipeStructurer, StructuringMode};

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// What a conversion produced.
///
/// `RawText` is the negative result of structuring: the document was read but
/// is not recipe-shaped, so the caller shows the text as is.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ConversionOutcome {
    Recipe { recipe: StructuredRecipe },
    RawText { text: String },
}

impl ConversionOutcome {
    pub fn recipe(&self) -> Option<&StructuredRecipe> {
        match self {
            ConversionOutcome::Recipe { recipe } => Some(recipe),
            ConversionOutcome::RawText { .. } => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Converter
// ---------------------------------------------------------------------------

pub struct RecipeConverter {
    extractor: ExtractionOrchestrator,
    structurer: RecipeStructurer,
}

impl RecipeConverter {
    pub fn new(extractor: ExtractionOrchestrator, structurer: RecipeStructurer) -> Self {
        Self {
            extractor,
            structurer,
        }
    }

    pub fn from_config(config: &ConverterConfig) -> Result<Self, ConversionError> {
        Ok(Self::new(
            ExtractionOrchestrator::from_config(config)?,
            RecipeStructurer::from_config(config)?,
        ))
    }

    /// Full chain for one document.
    ///
    /// 1. Extract and normalize text (progress and cancellation via `ctx`)
    /// 2. Structure into a candidate, by model or heuristic per `mode`
    /// 3. Complete the candidate into a recipe with every required field
    pub async fn convert(
        &self,
        document: RawDocument,
        mode: StructuringMode,
        ctx: &ExtractionContext,
    ) -> Result<ConversionOutcome, ConversionError> {
        let text = self.extractor.extract(document, ctx).await?;

        let structured = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => return Err(ConversionError::cancelled()),
            result = self.structurer.structure(text.as_str(), mode) => result?,
        };

        match structured {
            Some(candidate) => {
                let recipe = complete(candidate);
                tracing::info!(
                    ingredients = recipe.ingredients.len(),
                    instructions = recipe.instructions.len(),
                    equipment = recipe.equipment_needed.len(),
                    "Recipe conversion complete"
                );
                Ok(ConversionOutcome::Recipe { recipe })
            }
            None => {
                tracing::info!(chars = text.as_str().len(), "Text is not recipe-shaped");
                Ok(ConversionOutcome::RawText {
                    text: text.into_string(),
                })
            }
        }
    }
}
