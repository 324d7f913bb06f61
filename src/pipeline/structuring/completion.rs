use uuid::Uuid;

use crate::config::PLACEHOLDER_IMAGE_URL;
use crate::models::{CandidateEquipment, Equipment, RecipeCandidate, StructuredRecipe};

pub const UNTITLED_RECIPE: &str = "Untitled Recipe";
pub const PLACEHOLDER_EQUIPMENT_NAME: &str = "Equipment";
pub const PLACEHOLDER_INGREDIENT: &str = "Add your ingredients here";
pub const PLACEHOLDER_INSTRUCTION: &str = "Add your preparation steps here";

/// Fill every required field of a candidate. Never fails.
///
/// Equipment without an id gets a fresh UUID v4; existing ids are kept as is.
/// The result is always marked converted.
pub fn complete(candidate: RecipeCandidate) -> StructuredRecipe {
    let ingredients = non_empty_or(candidate.ingredient_lines(), PLACEHOLDER_INGREDIENT);
    let instructions = non_empty_or(candidate.instruction_lines(), PLACEHOLDER_INSTRUCTION);

    let title = candidate
        .title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| UNTITLED_RECIPE.to_string());

    let image_url = candidate
        .image_url
        .filter(|u| !u.trim().is_empty())
        .unwrap_or_else(|| PLACEHOLDER_IMAGE_URL.to_string());

    StructuredRecipe {
        title,
        introduction: candidate.introduction,
        ingredients,
        instructions,
        prep_time: candidate.prep_time,
        rest_time: candidate.rest_time,
        bake_time: candidate.bake_time,
        total_time: candidate.total_time,
        servings: candidate.servings,
        difficulty: candidate.difficulty,
        source: candidate.source,
        nutrition: candidate.nutrition,
        notes: candidate.notes,
        tags: candidate.tags,
        equipment_needed: candidate
            .equipment_needed
            .into_iter()
            .map(complete_equipment)
            .collect(),
        is_converted: true,
        image_url,
    }
}

fn complete_equipment(item: CandidateEquipment) -> Equipment {
    let id = item
        .id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let name = item
        .name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| PLACEHOLDER_EQUIPMENT_NAME.to_string());

    Equipment {
        id,
        name,
        affiliate_link: item.affiliate_link,
    }
}

fn non_empty_or(lines: Vec<String>, placeholder: &str) -> Vec<String> {
    if lines.is_empty() {
        vec![placeholder.to_string()]
    } else {
        lines
    }
}
