use super::types::PromptDetail;

pub const RECIPE_SYSTEM_PROMPT: &str = r#"
You are a recipe structuring assistant. Your ONLY role is to convert recipe
text into a JSON object. You extract information that is explicitly present
in the text.

RULES:
1. Extract ONLY what the text states. Do not invent ingredients or steps.
2. Keep quantities and units exactly as written.
3. If a field is missing, use null (or an empty array for lists).
4. Reply with a single JSON object and nothing else.
"#;

const STANDARD_SCHEMA: &str = r#"{
  "title": "Recipe name",
  "description": "Short introduction or null",
  "ingredients": [
    {"quantity": "2", "unit": "cups", "name": "flour", "note": "sifted or null"}
  ],
  "steps": ["First step", "Second step"],
  "prepTime": "e.g. 15 minutes or null",
  "cookTime": "e.g. 30 minutes or null",
  "restTime": "e.g. 1 hour or null",
  "totalTime": "e.g. 1 hour 45 minutes or null",
  "servings": "e.g. 4 or null",
  "notes": ["tip or remark"]"#;

const DETAILED_SCHEMA_EXTRA: &str = r#",
  "equipment": [{"name": "Stand mixer"}],
  "nutrition": {"calories": "350 kcal", "protein": "8 g"},
  "dietaryTags": ["vegetarian"],
  "difficulty": "easy | medium | hard",
  "source": "Cookbook, website or author, or null",
  "storage": "How to store leftovers, or null",
  "variations": ["Optional variation"]"#;

/// Build the main structuring prompt around already-sanitized text.
pub fn build_recipe_prompt(text: &str, detail: PromptDetail) -> String {
    let extra = match detail {
        PromptDetail::Standard => "",
        PromptDetail::Detailed => DETAILED_SCHEMA_EXTRA,
    };

    format!(
        r#"<recipe>
{text}
</recipe>

Convert the recipe above into the following JSON structure.
List every ingredient and every step in the order they appear.

{STANDARD_SCHEMA}{extra}
}}"#
    )
}

/// Narrower prompt used once after an unparseable reply.
pub fn build_recovery_prompt(text: &str) -> String {
    format!(
        r#"<recipe>
{text}
</recipe>

Your previous answer could not be read. Reply with ONLY a valid JSON object
of exactly this shape, with no commentary and no code fences:

{{"title": "Recipe name", "ingredients": ["one ingredient per entry"], "instructions": ["one step per entry"]}}"#
    )
}
