use std::sync::LazyLock;

use regex::Regex;

static SPECIAL_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\p{Alphabetic}\p{N}_\s]|\p{Uppercase}").unwrap());
static WHITESPACE_RUNS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Canonical column/table identifier: lowercase, special characters dropped,
/// whitespace runs joined by a single underscore, no leading or trailing `_`.
///
/// Lowercasing happens first so that characters whose lowercase form expands
/// into non-alphanumerics (for example `İ`) are cleaned in the same pass.
/// Letters that stay uppercase after lowercasing (mathematical alphanumerics
/// such as `𝐀`) have no lowercase form and are treated as special characters.
pub fn to_snake_case(label: &str) -> String {
    let lowered = label.to_lowercase();
    let spaced = SPECIAL_CHARS.replace_all(&lowered, " ");
    let joined = WHITESPACE_RUNS.replace_all(&spaced, "_");
    joined.trim_matches('_').to_string()
}
