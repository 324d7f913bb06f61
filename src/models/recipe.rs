use serde::{Deserialize, Serialize};

use crate::config::PLACEHOLDER_IMAGE_URL;

/// A finished recipe record, ready for display and storage.
///
/// A `Default` recipe is the empty value a session starts with. Only the
/// completer (`pipeline::structuring::complete`) produces records with
/// `is_converted == true`, and only those may be saved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredRecipe {
    pub title: String,
    pub introduction: Option<String>,
    pub ingredients: Vec<String>,
    pub instructions: Vec<String>,
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
    pub equipment_needed: Vec<Equipment>,
    pub is_converted: bool,
    pub image_url: String,
}

impl Default for StructuredRecipe {
    fn default() -> Self {
        Self {
            title: String::new(),
            introduction: None,
            ingredients: vec![],
            instructions: vec![],
            prep_time: None,
            rest_time: None,
            bake_time: None,
            total_time: None,
            servings: None,
            difficulty: None,
            source: None,
            nutrition: vec![],
            notes: vec![],
            tags: vec![],
            equipment_needed: vec![],
            is_converted: false,
            image_url: PLACEHOLDER_IMAGE_URL.to_string(),
        }
    }
}

impl StructuredRecipe {
    /// Whether the record went through completion and may be persisted.
    pub fn is_savable(&self) -> bool {
        self.is_converted
    }
}

/// A piece of kitchen equipment with a stable identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Equipment {
    pub id: String,
    pub name: String,
    pub affiliate_link: Option<String>,
}
