//! Identifier case conversion for target-language names.

use regex::Regex;
use std::sync::LazyLock;

static ALL_LOWER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\A[a-z\d]*\z").expect("valid regex"));
static ALL_UPPER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\A[A-Z_0-9]*\z").expect("valid regex"));
static SEPARATED_WORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:_|-|\.|::|,| |<|>|\*|&|\(|\))([a-z\d]*)").expect("valid regex")
});
static ACRONYM_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([A-Z\d]+)([A-Z][a-z])").expect("valid regex"));
static LOWER_UPPER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([a-z])([A-Z])").expect("valid regex"));
static LOWER_DIGIT_UPPER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([a-z])(\d+[A-Z])").expect("valid regex"));

/// First character upper-cased, the rest untouched.
pub fn upcase_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// `lowercase_type` to `LowercaseType`, `Container<Tests::Item>` to `ContainerTestsItem`.
/// All-caps names are kept as written.
pub fn camelize(s: &str) -> String {
    if ALL_LOWER.is_match(s) {
        return upcase_first(s);
    }
    if ALL_UPPER.is_match(s) {
        return s.to_string();
    }
    let lead_len = s
        .find(|c: char| !(c.is_ascii_lowercase() || c.is_ascii_digit()))
        .unwrap_or(s.len());
    let mut out = upcase_first(&s[..lead_len]);
    let rest = SEPARATED_WORD.replace_all(&s[lead_len..], |caps: &regex::Captures<'_>| {
        upcase_first(&caps[1])
    });
    out.push_str(&rest);
    out
}

/// `getRows` to `get_rows`, `Outer::HTTPServer` to `outer/http_server`.
pub fn underscore(s: &str) -> String {
    if !s.contains(|c: char| c.is_ascii_uppercase() || c == '-') && !s.contains("::") {
        return s.to_string();
    }
    let word = s.replace("::", "/");
    let word = ACRONYM_WORD.replace_all(&word, "${1}_${2}");
    let word = LOWER_UPPER.replace_all(&word, "${1}_${2}");
    let word = LOWER_DIGIT_UPPER.replace_all(&word, "${1}_${2}");
    word.replace('-', "_").to_lowercase()
}
