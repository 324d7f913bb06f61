use serde::{Deserialize, Deserializer, Serialize};

/// Partial recipe produced by a structuring path, before completion.
///
/// Replaced wholesale each time structuring runs; never patched field by field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeCandidate {
    pub title: Option<String>,
    pub introduction: Option<String>,
    pub ingredients: Vec<IngredientEntry>,
    pub instructions: Vec<InstructionEntry>,
    pub prep_time: Option<String>,
    pub rest_time: Option<String>,
    pub bake_time: Option<String>,
    pub total_time: Option<String>,
    pub servings: Option<String>,
    pub difficulty: Option<String>,
    pub source: Option<String>,
    pub nutrition: Vec<String>,
    pub notes: Vec<String>,
    pub tags: Vec<String>,
    pub equipment_needed: Vec<CandidateEquipment>,
    pub image_url: Option<String>,
}

impl RecipeCandidate {
    /// Canonical ingredient lines, trimmed, empties dropped.
    pub fn ingredient_lines(&self) -> Vec<String> {
        self.ingredients
            .iter()
            .map(IngredientEntry::display_line)
            .filter(|l| !l.is_empty())
            .collect()
    }

    /// Canonical instruction lines, trimmed, empties dropped.
    pub fn instruction_lines(&self) -> Vec<String> {
        self.instructions
            .iter()
            .map(InstructionEntry::display_line)
            .filter(|l| !l.is_empty())
            .collect()
    }

    /// Both required lists carry at least one non-blank entry.
    pub fn has_required_lists(&self) -> bool {
        !self.ingredient_lines().is_empty() && !self.instruction_lines().is_empty()
    }
}

/// An ingredient as delivered by a structuring path: either a free-text line
/// or a quantity/unit/name breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IngredientEntry {
    Plain(String),
    Structured(StructuredIngredient),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredIngredient {
    #[serde(default, alias = "amount", deserialize_with = "lenient_text")]
    pub quantity: Option<String>,
    #[serde(default, alias = "measure", deserialize_with = "lenient_text")]
    pub unit: Option<String>,
    #[serde(alias = "ingredient", alias = "item")]
    pub name: String,
    #[serde(default, alias = "notes", alias = "preparation", deserialize_with = "lenient_text")]
    pub note: Option<String>,
}

impl IngredientEntry {
    /// Single display form shared by both shapes, e.g. `"2 cups flour, sifted"`.
    pub fn display_line(&self) -> String {
        match self {
            IngredientEntry::Plain(line) => line.trim().to_string(),
            IngredientEntry::Structured(s) => {
                let head = [s.quantity.as_deref(), s.unit.as_deref(), Some(s.name.as_str())]
                    .into_iter()
                    .flatten()
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .collect::<Vec<_>>()
                    .join(" ");
                match s.note.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
                    Some(note) if !head.is_empty() => format!("{head}, {note}"),
                    Some(note) => note.to_string(),
                    None => head,
                }
            }
        }
    }
}

impl From<&str> for IngredientEntry {
    fn from(line: &str) -> Self {
        IngredientEntry::Plain(line.to_string())
    }
}

/// A method step: free text or a numbered step object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InstructionEntry {
    Plain(String),
    Step {
        #[serde(default)]
        step: Option<u32>,
        #[serde(alias = "instruction", alias = "description")]
        text: String,
    },
}

impl InstructionEntry {
    pub fn display_line(&self) -> String {
        match self {
            InstructionEntry::Plain(text) | InstructionEntry::Step { text, .. } => {
                text.trim().to_string()
            }
        }
    }
}

impl From<&str> for InstructionEntry {
    fn from(text: &str) -> Self {
        InstructionEntry::Plain(text.to_string())
    }
}

/// Equipment as delivered before completion; `id` and `name` may be missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateEquipment {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub affiliate_link: Option<String>,
}

/// Accept strings and numbers for free-text fields; anything else becomes `None`.
/// Models regularly answer `"quantity": 2` or `"prepTime": 15`.
pub(crate) fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| match v {
        serde_json::Value::String(s) => Some(s),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }))
}
