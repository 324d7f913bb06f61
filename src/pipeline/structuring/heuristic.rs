//! Rule-based structuring for semi-structured recipe text.
//!
//! Recognizes labeled sections (`Ingredients:`, `Method:`, `Prep Time:` ...).
//! A section runs until the next marker or the end of the text, even when OCR
//! collapsed several sections onto one line. Lines before the first marker
//! give the title and introduction.

use std::sync::LazyLock;

use regex::Regex;

use crate::models::{IngredientEntry, InstructionEntry, RecipeCandidate};

/// Section marker at line start, followed by `:` or alone on its line.
/// Longer alternatives come first so `Preparation Time` wins over `Preparation`.
static SECTION_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*(prep(?:aration)?\s+time|cook(?:ing)?\s+time|bak(?:e|ing)\s+time|rest(?:ing)?\s+time|total\s+time|ingredients|instructions|method|directions|preparation|notes|servings|yield|makes)\s*(?::\s*(.*?)\s*|)$",
    )
    .unwrap()
});

/// Colon-terminated marker anywhere in a line. Bare headings without a colon
/// only count at line start.
static INLINE_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:prep(?:aration)?\s+time|cook(?:ing)?\s+time|bak(?:e|ing)\s+time|rest(?:ing)?\s+time|total\s+time|ingredients|instructions|method|directions|preparation|notes|servings|yield|makes)\s*:",
    )
    .unwrap()
});

/// `1.`, `2)`, `-`, `*`, `•` list prefixes. Numbers need trailing space so
/// `1.5 cups` stays an unprefixed line.
static ITEM_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:\d{1,3}[.)]|[-*•])(?:\s+|$)(.*)$").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Ingredients,
    Instructions,
    Notes,
    PrepTime,
    CookTime,
    RestTime,
    TotalTime,
    Servings,
}

impl Section {
    fn from_marker(marker: &str) -> Self {
        let lower = marker.to_lowercase();
        let head = lower.split_whitespace().next().unwrap_or("");
        match head {
            "ingredients" => Section::Ingredients,
            "instructions" | "method" | "directions" => Section::Instructions,
            "notes" => Section::Notes,
            "servings" | "yield" | "makes" => Section::Servings,
            "cook" | "cooking" | "bake" | "baking" => Section::CookTime,
            "rest" | "resting" => Section::RestTime,
            "total" => Section::TotalTime,
            // "prep time", "preparation time", or the bare "preparation" heading
            _ if lower.contains("time") => Section::PrepTime,
            _ => Section::Instructions,
        }
    }

    fn is_list(&self) -> bool {
        matches!(
            self,
            Section::Ingredients | Section::Instructions | Section::Notes
        )
    }
}

#[derive(Default)]
struct SectionBody<'a> {
    inline: Option<&'a str>,
    lines: Vec<&'a str>,
}

/// Cut a line in front of every colon marker that is not already at its start.
fn split_inline_markers(line: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut start = 0;
    for marker in INLINE_MARKER.find_iter(line) {
        if line[start..marker.start()].trim().is_empty() {
            continue;
        }
        segments.push(&line[start..marker.start()]);
        start = marker.start();
    }
    segments.push(&line[start..]);
    segments
}

/// Parse marker-labeled recipe text.
///
/// Returns `None` unless both an ingredients and an instructions section
/// yield at least one item: not recipe-shaped, not an error.
pub fn parse_recipe_text(text: &str) -> Option<RecipeCandidate> {
    let mut preamble: Vec<&str> = Vec::new();
    let mut sections: Vec<(Section, SectionBody)> = Vec::new();

    for line in text.lines().flat_map(split_inline_markers) {
        if let Some(caps) = SECTION_MARKER.captures(line) {
            let section = Section::from_marker(&caps[1]);
            let inline = caps.get(2).map(|m| m.as_str()).filter(|s| !s.is_empty());
            sections.push((
                section,
                SectionBody {
                    inline,
                    lines: Vec::new(),
                },
            ));
            continue;
        }
        match sections.last_mut() {
            Some((_, body)) => body.lines.push(line),
            None => preamble.push(line),
        }
    }

    let found_required = sections
        .iter()
        .any(|(s, _)| matches!(s, Section::Ingredients | Section::Instructions));
    if !found_required {
        return None;
    }

    let mut candidate = RecipeCandidate::default();
    let mut preamble_lines = preamble.iter().map(|l| l.trim()).filter(|l| !l.is_empty());
    candidate.title = preamble_lines.next().map(str::to_string);
    let intro: Vec<&str> = preamble_lines.collect();
    if !intro.is_empty() {
        candidate.introduction = Some(intro.join(" "));
    }

    for (section, body) in sections {
        if section.is_list() {
            let mut lines = Vec::with_capacity(body.lines.len() + 1);
            lines.extend(body.inline);
            lines.extend(body.lines);
            let items = split_items(&lines);
            match section {
                Section::Ingredients => candidate
                    .ingredients
                    .extend(items.into_iter().map(IngredientEntry::Plain)),
                Section::Instructions => candidate
                    .instructions
                    .extend(items.into_iter().map(InstructionEntry::Plain)),
                _ => candidate.notes.extend(items),
            }
            continue;
        }

        let value = body
            .inline
            .or_else(|| body.lines.iter().map(|l| l.trim()).find(|l| !l.is_empty()))
            .map(str::to_string);
        let slot = match section {
            Section::PrepTime => &mut candidate.prep_time,
            Section::CookTime => &mut candidate.bake_time,
            Section::RestTime => &mut candidate.rest_time,
            Section::TotalTime => &mut candidate.total_time,
            _ => &mut candidate.servings,
        };
        if slot.is_none() {
            *slot = value;
        }
    }

    if !candidate.has_required_lists() {
        tracing::debug!(
            ingredients = candidate.ingredients.len(),
            instructions = candidate.instructions.len(),
            "Heuristic sections found but a required list is empty"
        );
        return None;
    }

    tracing::debug!(
        ingredients = candidate.ingredients.len(),
        instructions = candidate.instructions.len(),
        "Heuristic structuring matched"
    );
    Some(candidate)
}

/// Split section lines into trimmed, non-empty items.
///
/// When any line carries a list prefix, prefixed lines start items and
/// unprefixed lines continue the previous one. Otherwise every line is an item.
fn split_items(lines: &[&str]) -> Vec<String> {
    let prefixed = lines.iter().any(|l| ITEM_PREFIX.is_match(l));
    let mut items: Vec<String> = Vec::new();
    let mut continuing = false;

    for line in lines {
        if let Some(caps) = ITEM_PREFIX.captures(line) {
            let content = caps[1].trim();
            items.push(content.to_string());
            continuing = true;
            continue;
        }

        let content = line.trim();
        if content.is_empty() {
            continue;
        }
        match items.last_mut() {
            Some(last) if prefixed && continuing => {
                if !last.is_empty() {
                    last.push(' ');
                }
                last.push_str(content);
            }
            _ => items.push(content.to_string()),
        }
    }

    items.retain(|item| !item.is_empty());
    items
}
