use std::sync::LazyLock;

use regex::Regex;

static HORIZONTAL_RUNS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t]{2,}").unwrap());

static LINE_EDGE_SPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]+|[ \t]+$").unwrap());

static EXCESS_NEWLINES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());

/// `1 / 2` → `1/2`
static FRACTION_SLASH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d)[ \t]*/[ \t]*(\d)").unwrap());

/// `200 g` → `200g`
static DETACHED_UNIT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d)[ \t]+(kg|mg|g|ml|cl|dl|l|oz|lbs|lb)\b").unwrap()
});

/// `180 oC`, `350 ° F` → `180°C`, `350°F`
static TEMPERATURE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d)[ \t]*[oO°][ \t]*([CF])\b").unwrap());

/// `10\nminutes` → `10 minutes`
static DETACHED_TIME_UNIT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d)\s+(minutes|minute|mins|min|hours|hour|hrs|hr|seconds|second|secs|sec)\b")
        .unwrap()
});

/// Clean raw extracted text: whitespace collapsing plus repair of the OCR
/// artifacts that show up in recipes (fractions, units, temperatures, times).
///
/// Total and idempotent: `normalize(&normalize(s)) == normalize(s)`.
pub fn normalize(raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }

    let text = raw.replace("\r\n", "\n").replace('\r', "\n");
    let text: String = text
        .chars()
        .filter(|c| *c == '\n' || *c == '\t' || !(c.is_control() || is_invisible(*c)))
        .collect();

    let text = HORIZONTAL_RUNS.replace_all(&text, " ");
    let text = LINE_EDGE_SPACE.replace_all(&text, "");
    let text = replace_until_stable(&FRACTION_SLASH, &text, "${1}/${2}");
    let text = DETACHED_UNIT.replace_all(&text, "${1}${2}");
    let text = TEMPERATURE.replace_all(&text, "${1}°${2}");
    let text = DETACHED_TIME_UNIT.replace_all(&text, "${1} ${2}");
    let text = EXCESS_NEWLINES.replace_all(&text, "\n\n");

    text.trim().to_string()
}

fn is_invisible(c: char) -> bool {
    matches!(
        c,
        '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{2060}' | '\u{FEFF}'
    )
}

/// Matches that share a digit (`1 / 2 / 3`) need a second pass.
fn replace_until_stable(re: &Regex, text: &str, replacement: &str) -> String {
    let mut current = text.to_string();
    loop {
        let next = re.replace_all(&current, replacement).into_owned();
        if next == current {
            return current;
        }
        current = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_returns_empty() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   \n\n  "), "");
    }

    #[test]
    fn collapses_excess_newlines_to_two() {
        assert_eq!(normalize("Line one\n\n\n\n\nLine two"), "Line one\n\nLine two");
        assert_eq!(normalize("a\n\nb"), "a\n\nb");
    }

    #[test]
    fn collapses_space_runs() {
        assert_eq!(normalize("2   cups\t\tflour"), "2 cups flour");
    }

    #[test]
    fn whitespace_only_lines_count_as_blank() {
        assert_eq!(normalize("a\n  \n \t \n\nb"), "a\n\nb");
    }

    #[test]
    fn repairs_fraction_spacing() {
        assert_eq!(normalize("1 / 2 cup sugar"), "1/2 cup sugar");
        assert_eq!(normalize("2 1 /4 cups"), "2 1/4 cups");
        assert_eq!(normalize("1 / 2 / 3"), "1/2/3");
    }

    #[test]
    fn joins_detached_units() {
        assert_eq!(normalize("200 g butter"), "200g butter");
        assert_eq!(normalize("250 ml milk and 1 L water"), "250ml milk and 1L water");
        assert_eq!(normalize("2 large eggs"), "2 large eggs");
        assert_eq!(normalize("1 lb beef"), "1lb beef");
    }

    #[test]
    fn repairs_temperatures() {
        assert_eq!(normalize("Preheat to 180 oC"), "Preheat to 180°C");
        assert_eq!(normalize("Bake at 350 OF"), "Bake at 350°F");
        assert_eq!(normalize("Bake at 350 ° F"), "Bake at 350°F");
        assert_eq!(normalize("Bake at 200°C"), "Bake at 200°C");
    }

    #[test]
    fn joins_detached_time_units() {
        assert_eq!(normalize("Bake 25\nminutes"), "Bake 25 minutes");
        assert_eq!(normalize("rest 2 \n\n hours"), "rest 2 hours");
        assert_eq!(normalize("simmer 10 min"), "simmer 10 min");
    }

    #[test]
    fn converts_carriage_returns() {
        assert_eq!(normalize("a\r\nb\rc"), "a\nb\nc");
    }

    #[test]
    fn strips_control_and_invisible_characters() {
        assert_eq!(normalize("Flour\x00\x07 mix\u{200B}ed"), "Flour mixed");
    }

    #[test]
    fn preserves_accents_and_symbols() {
        let text = "Crème brûlée • 1/2 tsp vanilla – 150°C";
        assert_eq!(normalize(text), text);
    }

    #[test]
    fn normalization_is_idempotent() {
        let samples = [
            "",
            "Ingredients:\n\n\n\n- 2  cups flour\n- 1 / 2 tsp salt\n- 200 g butter",
            "Bake at 180 oC for 25\n\n\nminutes   then rest 2 hrs",
            "  \t leading\t\tand trailing \r\n\r\n\r\n\r\nspaces  ",
            "1 / 2 / 3 / 4 g",
            "5 o C 6 O F 7 ° C",
            "Serves 4\n\n\n\n\nL",
            "x\u{FEFF}y\x01z",
            "10 \n \n \n min",
        ];
        for s in samples {
            let once = normalize(s);
            assert_eq!(normalize(&once), once, "not idempotent for {s:?}");
        }
    }
}
