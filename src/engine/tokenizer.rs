//! Marking tokenizer
//!
//! Reads named attribute values out of a free-form order string by matching
//! it against the template's example markings, in declaration order. The
//! first example whose separator structure fits wins.

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::engine::patterns::{CompiledGroup, CompiledPatterns};
use crate::entities::PatternAction;

const SEPARATORS: &[char] = &['*', '-', '_', ' ', 'x'];

fn is_separator(c: char) -> bool {
    SEPARATORS.contains(&c)
}

fn upper_run() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[A-ZА-ЯЁ]{2,}").expect("valid regex"))
}

fn spaced_upper() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"([A-ZА-ЯЁ]+) ([A-ZА-ЯЁ]+)").expect("valid regex"))
}

fn hyphenated_upper() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[A-ZА-ЯЁ]+-[A-ZА-ЯЁ]+").expect("valid regex"))
}

/// Attribute values extracted from one order string
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Marking {
    /// The example marking that matched
    pub example: String,

    /// Attribute name and value, in example order
    pub attributes: Vec<(String, String)>,

    /// Text matched by a coating pattern, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coating: Option<String>,
}

impl Marking {
    /// A marking built from explicit attribute values
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            example: String::new(),
            attributes: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            coating: None,
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

/// Original text of every `@n@` token inserted into the working string
#[derive(Debug, Clone, Default)]
struct Replacements {
    originals: Vec<String>,
    coating: Option<String>,
}

impl Replacements {
    fn push(&mut self, original: &str) -> String {
        self.originals.push(original.to_string());
        format!("@{}@", self.originals.len())
    }

    /// Later tokens may enclose earlier ones, so restore newest first
    fn restore(&self, text: &str) -> String {
        let mut out = text.to_string();
        for (i, original) in self.originals.iter().enumerate().rev() {
            let token = format!("@{}@", i + 1);
            if out.contains(&token) {
                out = out.replace(&token, original);
            }
        }
        out
    }

    fn tokenize_matches(&mut self, text: &str, regex: &Regex, coating: bool) -> String {
        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        for m in regex.find_iter(text) {
            if m.as_str().is_empty() {
                continue;
            }
            out.push_str(&text[last..m.start()]);
            let token = self.push(m.as_str());
            if coating && self.coating.is_none() {
                self.coating = Some(m.as_str().trim().to_string());
            }
            out.push_str(&token);
            last = m.end();
        }
        out.push_str(&text[last..]);
        out
    }
}

/// One positional segment of an example marking
#[derive(Debug, Clone, PartialEq)]
struct Segment {
    name: String,
    prefix: String,
    suffix: String,
}

/// Split an example into named segments and its separator skeleton.
/// Separators inside `[...]` belong to the placeholder name.
fn parse_example(example: &str) -> (Vec<Segment>, Vec<char>) {
    let mut raw = Vec::new();
    let mut skeleton = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;

    for c in example.chars() {
        match c {
            '[' => {
                depth += 1;
                current.push(c);
            }
            ']' => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            c if depth == 0 && is_separator(c) => {
                skeleton.push(c);
                if !current.is_empty() {
                    raw.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        raw.push(current);
    }

    let segments = raw
        .iter()
        .enumerate()
        .map(|(i, text)| match (text.find('['), text.rfind(']')) {
            (Some(open), Some(close)) if open < close => Segment {
                name: text[open + 1..close].trim().to_string(),
                prefix: text[..open].to_string(),
                suffix: text[close + 1..].to_string(),
            },
            _ => Segment {
                name: format!("Part{}", i + 1),
                prefix: String::new(),
                suffix: String::new(),
            },
        })
        .collect();

    (segments, skeleton)
}

fn split_values(text: &str) -> Vec<&str> {
    text.split(is_separator).filter(|s| !s.is_empty()).collect()
}

fn has_skeleton(text: &str, skeleton: &[char]) -> bool {
    let mut chars = text.chars();
    skeleton.iter().all(|s| chars.any(|c| c == *s))
}

/// Cut the order string down to the marking itself: from the first run of
/// two or more uppercase letters, else from just after the fallback marker
fn trim_to_marking<'a>(order: &'a str, fallback_marker: &str) -> Option<&'a str> {
    if let Some(m) = upper_run().find(order) {
        return Some(order[m.start()..].trim());
    }
    order
        .find(fallback_marker)
        .map(|i| order[i + fallback_marker.len()..].trim())
}

/// Join uppercase runs separated by a single space with a hyphen
fn normalize(text: &str) -> String {
    let mut current = text.to_string();
    loop {
        let next = spaced_upper().replace_all(&current, "${1}-${2}").into_owned();
        if next == current {
            return current;
        }
        current = next;
    }
}

fn apply_group(text: &str, group: Option<&CompiledGroup>, replacements: &mut Replacements) -> String {
    let Some(group) = group else {
        return text.to_string();
    };
    let mut out = text.to_string();
    for pattern in &group.patterns {
        out = match pattern.action {
            PatternAction::Discard => pattern.regex.replace_all(&out, "").into_owned(),
            PatternAction::Keep => {
                replacements.tokenize_matches(&out, &pattern.regex, pattern.coating)
            }
        };
    }
    out
}

fn match_example(
    example: &str,
    working: &str,
    replacements: &Replacements,
) -> Option<Marking> {
    let (segments, skeleton) = parse_example(example);
    if segments.is_empty() || !has_skeleton(working, &skeleton) {
        return None;
    }

    let mut replacements = replacements.clone();
    let mut working = working.to_string();
    if split_values(&working).len() != segments.len() {
        working = replacements.tokenize_matches(&working, hyphenated_upper(), false);
    }
    let values = split_values(&working);
    if values.len() != segments.len() {
        return None;
    }

    let attributes = segments
        .iter()
        .zip(values)
        .map(|(segment, raw)| {
            let value = replacements.restore(raw);
            let value = value.strip_prefix(segment.prefix.as_str()).unwrap_or(&value);
            let value = value.strip_suffix(segment.suffix.as_str()).unwrap_or(value);
            (segment.name.clone(), value.to_string())
        })
        .collect();

    Some(Marking {
        example: example.to_string(),
        attributes,
        coating: replacements.coating,
    })
}

/// Match `order` against `examples`; `None` when no example fits
pub fn tokenize(order: &str, examples: &[String], patterns: &CompiledPatterns) -> Option<Marking> {
    let group = patterns.select(order);
    let Some(trimmed) = trim_to_marking(order, &patterns.fallback_marker) else {
        tracing::debug!(order, "no uppercase run or fallback marker in order string");
        return None;
    };

    let mut replacements = Replacements::default();
    let working = apply_group(&normalize(trimmed), group, &mut replacements);
    tracing::debug!(
        group = group.map(|g| g.name.as_str()).unwrap_or("-"),
        working = %working,
        "prepared order string"
    );

    for example in examples {
        if let Some(marking) = match_example(example, &working, &replacements) {
            tracing::debug!(example = %example, "marking example matched");
            return Some(marking);
        }
        tracing::debug!(example = %example, "marking example rejected");
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{MarkingCatalog, PatternDef, PatternGroupDef};

    fn builtin() -> CompiledPatterns {
        CompiledPatterns::compile(&MarkingCatalog::default()).unwrap()
    }

    fn examples(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_round_trip() {
        let marking = tokenize(
            "AB-500x1200",
            &examples(&["[Series]-[Height]x[Length]"]),
            &builtin(),
        )
        .unwrap();
        assert_eq!(marking.get("Series"), Some("AB"));
        assert_eq!(marking.get("Height"), Some("500"));
        assert_eq!(marking.get("Length"), Some("1200"));
        assert_eq!(marking.coating, None);
    }

    #[test]
    fn test_discarded_suffix_and_positional_names() {
        let catalog = MarkingCatalog {
            pattern_groups: vec![PatternGroupDef {
                name: "generic".into(),
                keyword: None,
                patterns: vec![PatternDef {
                    regex: "-EXTRA$".into(),
                    action: PatternAction::Discard,
                    coating: false,
                }],
            }],
            ..Default::default()
        };
        let patterns = CompiledPatterns::compile(&catalog).unwrap();
        let marking = tokenize("AA-111-BB-EXTRA", &examples(&["AA-111-BB"]), &patterns).unwrap();
        assert_eq!(
            marking.attributes,
            vec![
                ("Part1".to_string(), "AA".to_string()),
                ("Part2".to_string(), "111".to_string()),
                ("Part3".to_string(), "BB".to_string()),
            ]
        );
    }

    #[test]
    fn test_leading_noise_is_trimmed() {
        let marking = tokenize(
            "order 12: AB-500x1200",
            &examples(&["[Series]-[Height]x[Length]"]),
            &builtin(),
        )
        .unwrap();
        assert_eq!(marking.get("Series"), Some("AB"));
    }

    #[test]
    fn test_fallback_marker() {
        let marking = tokenize("no. #12-40", &examples(&["[Dn]-[Pn]"]), &builtin()).unwrap();
        assert_eq!(marking.get("Dn"), Some("12"));
        assert_eq!(marking.get("Pn"), Some("40"));

        assert!(tokenize("12-40", &examples(&["[Dn]-[Pn]"]), &builtin()).is_none());
    }

    #[test]
    fn test_coating_and_remarks() {
        let marking = tokenize(
            "AB-500x1200 (urgent) RAL 9016",
            &examples(&["[Series]-[Height]x[Length] [Color]"]),
            &builtin(),
        )
        .unwrap();
        assert_eq!(marking.get("Length"), Some("1200"));
        assert_eq!(marking.get("Color"), Some("RAL 9016"));
        assert_eq!(marking.coating.as_deref(), Some("RAL 9016"));
    }

    #[test]
    fn test_spaced_uppercase_runs_collapse() {
        let marking =
            tokenize("AB CD-500", &examples(&["[Series]-[Height]"]), &builtin()).unwrap();
        assert_eq!(marking.get("Series"), Some("AB-CD"));
        assert_eq!(marking.get("Height"), Some("500"));
    }

    #[test]
    fn test_first_match_wins() {
        let list = examples(&["[A]-[B]", "[A]-[B]-[C]"]);
        let marking = tokenize("AB-1-2", &list, &builtin()).unwrap();
        assert_eq!(marking.example, "[A]-[B]-[C]");

        let marking = tokenize("AB-1", &list, &builtin()).unwrap();
        assert_eq!(marking.example, "[A]-[B]");
    }

    #[test]
    fn test_skeleton_mismatch() {
        assert!(tokenize("AB-500", &examples(&["[A]x[B]"]), &builtin()).is_none());
    }

    #[test]
    fn test_literal_prefix_is_stripped() {
        let marking = tokenize("AB-H500", &examples(&["[Series]-H[Height]"]), &builtin()).unwrap();
        assert_eq!(marking.get("Height"), Some("500"));
    }

    #[test]
    fn test_cyrillic_marking() {
        let marking = tokenize("РК-300", &examples(&["[Серия]-[Высота]"]), &builtin()).unwrap();
        assert_eq!(marking.get("Серия"), Some("РК"));
        assert_eq!(marking.get("Высота"), Some("300"));
    }

    #[test]
    fn test_parse_example_brackets_hold_separators() {
        let (segments, skeleton) = parse_example("[Series name]-[Height]");
        assert_eq!(segments[0].name, "Series name");
        assert_eq!(skeleton, vec!['-']);
    }
}
