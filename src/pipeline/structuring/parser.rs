use serde::Deserialize;
use serde_json::Value;

use super::StructuringError;
use crate::models::candidate::lenient_text;
use crate::models::{CandidateEquipment, IngredientEntry, InstructionEntry, RecipeCandidate};

/// Parse a completion reply into a recipe candidate.
///
/// Accepts a fenced JSON block or a bare object surrounded by prose. Fails
/// unless both ingredients and instructions carry at least one entry.
pub fn parse_recipe_response(response: &str) -> Result<RecipeCandidate, StructuringError> {
    let json_str = extract_json_object(response)?;
    let mut value: Value = serde_json::from_str(json_str)
        .map_err(|e| StructuringError::JsonParsing(e.to_string()))?;

    // Some models wrap the answer: {"recipe": {...}}
    if let Some(inner) = value.get("recipe").filter(|v| v.is_object()) {
        if value.get("ingredients").is_none() {
            value = inner.clone();
        }
    }
    if !value.is_object() {
        return Err(StructuringError::MalformedResponse(
            "top-level JSON is not an object".into(),
        ));
    }

    let raw: RawRecipe =
        serde_json::from_value(value).map_err(|e| StructuringError::JsonParsing(e.to_string()))?;
    let candidate = raw.into_candidate();

    if candidate.ingredients.is_empty() || candidate.instructions.is_empty() {
        return Err(StructuringError::SchemaMismatch(format!(
            "{} ingredients, {} instructions",
            candidate.ingredients.len(),
            candidate.instructions.len()
        )));
    }
    Ok(candidate)
}

/// Locate the JSON object inside a reply: ```json fence, plain fence, or
/// first `{` to last `}`.
fn extract_json_object(response: &str) -> Result<&str, StructuringError> {
    for fence in ["```json", "```JSON", "```"] {
        if let Some(start) = response.find(fence) {
            let content_start = start + fence.len();
            if let Some(len) = response[content_start..].find("```") {
                let block = response[content_start..content_start + len].trim();
                if block.starts_with('{') {
                    return Ok(block);
                }
            }
        }
    }

    let start = response
        .find('{')
        .ok_or_else(|| StructuringError::MalformedResponse("No JSON object found".into()))?;
    let end = response
        .rfind('}')
        .filter(|end| *end > start)
        .ok_or_else(|| StructuringError::MalformedResponse("Unclosed JSON object".into()))?;
    Ok(&response[start..=end])
}

/// Everything a model might send, under the names models actually use.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawRecipe {
    #[serde(alias = "name", alias = "recipeName", deserialize_with = "lenient_text")]
    title: Option<String>,
    #[serde(alias = "description", alias = "intro", deserialize_with = "lenient_text")]
    introduction: Option<String>,
    ingredients: Option<Vec<Value>>,
    #[serde(alias = "steps", alias = "method", alias = "directions")]
    instructions: Option<Vec<Value>>,
    #[serde(alias = "prep_time", deserialize_with = "lenient_text")]
    prep_time: Option<String>,
    #[serde(alias = "cookTime", alias = "cook_time", alias = "bake_time", deserialize_with = "lenient_text")]
    bake_time: Option<String>,
    #[serde(alias = "rest_time", deserialize_with = "lenient_text")]
    rest_time: Option<String>,
    #[serde(alias = "total_time", deserialize_with = "lenient_text")]
    total_time: Option<String>,
    #[serde(alias = "yield", alias = "serves", deserialize_with = "lenient_text")]
    servings: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    difficulty: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    source: Option<String>,
    notes: Option<Value>,
    #[serde(alias = "dietaryTags", alias = "dietary_tags")]
    tags: Option<Value>,
    #[serde(alias = "equipment", alias = "equipment_needed")]
    equipment_needed: Option<Vec<Value>>,
    nutrition: Option<Value>,
    #[serde(deserialize_with = "lenient_text")]
    storage: Option<String>,
    variations: Option<Value>,
    #[serde(alias = "image", alias = "image_url", deserialize_with = "lenient_text")]
    image_url: Option<String>,
}

impl RawRecipe {
    fn into_candidate(self) -> RecipeCandidate {
        let mut notes = string_list(self.notes);
        if let Some(storage) = non_blank(self.storage) {
            notes.push(format!("Storage: {storage}"));
        }
        notes.extend(
            string_list(self.variations)
                .into_iter()
                .map(|v| format!("Variation: {v}")),
        );

        RecipeCandidate {
            title: non_blank(self.title),
            introduction: non_blank(self.introduction),
            ingredients: parse_ingredients(self.ingredients.as_deref()),
            instructions: parse_instructions(self.instructions.as_deref()),
            prep_time: non_blank(self.prep_time),
            rest_time: non_blank(self.rest_time),
            bake_time: non_blank(self.bake_time),
            total_time: non_blank(self.total_time),
            servings: non_blank(self.servings),
            difficulty: non_blank(self.difficulty),
            source: non_blank(self.source),
            nutrition: nutrition_lines(self.nutrition),
            notes,
            tags: string_list(self.tags),
            equipment_needed: parse_equipment(self.equipment_needed.as_deref()),
            image_url: non_blank(self.image_url),
        }
    }
}

fn parse_ingredients(items: Option<&[Value]>) -> Vec<IngredientEntry> {
    parse_array_lenient::<IngredientEntry>(items)
        .into_iter()
        .filter_map(|entry| match entry {
            IngredientEntry::Plain(line) => {
                let line = line.trim();
                (!line.is_empty()).then(|| IngredientEntry::Plain(line.to_string()))
            }
            structured => (!structured.display_line().is_empty()).then_some(structured),
        })
        .collect()
}

fn parse_instructions(items: Option<&[Value]>) -> Vec<InstructionEntry> {
    parse_array_lenient::<InstructionEntry>(items)
        .into_iter()
        .filter_map(|entry| match entry {
            InstructionEntry::Plain(text) => {
                let text = text.trim();
                (!text.is_empty()).then(|| InstructionEntry::Plain(text.to_string()))
            }
            step => (!step.display_line().is_empty()).then_some(step),
        })
        .collect()
}

/// Equipment arrives as plain names or as objects.
fn parse_equipment(items: Option<&[Value]>) -> Vec<CandidateEquipment> {
    items
        .unwrap_or_default()
        .iter()
        .filter_map(|v| match v {
            Value::String(name) => Some(CandidateEquipment {
                name: Some(name.trim().to_string()),
                ..Default::default()
            }),
            Value::Object(_) => serde_json::from_value(v.clone()).ok(),
            _ => None,
        })
        .collect()
}

/// `{"calories": "350 kcal"}` → `["calories: 350 kcal"]`; arrays pass through.
fn nutrition_lines(value: Option<Value>) -> Vec<String> {
    match value {
        Some(Value::Object(map)) => map
            .into_iter()
            .filter_map(|(key, v)| scalar_text(&v).map(|text| format!("{key}: {text}")))
            .collect(),
        other => string_list(other),
    }
}

/// A string or an array of scalars, as trimmed non-empty strings.
fn string_list(value: Option<Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items.iter().filter_map(scalar_text).collect(),
        Some(v) => scalar_text(&v).into_iter().collect(),
        None => vec![],
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Parse an array leniently: skip items that fail to deserialize.
fn parse_array_lenient<T: for<'de> Deserialize<'de>>(items: Option<&[Value]>) -> Vec<T> {
    match items {
        None => vec![],
        Some(arr) => arr
            .iter()
            .filter_map(|v| serde_json::from_value(v.clone()).ok())
            .collect(),
    }
}
