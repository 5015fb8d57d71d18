//! Best-effort response normalizer.
//!
//! The remote endpoint's response schema varies by deployment. Extraction
//! rules are tried in order against the decoded JSON tree; whatever cannot
//! be matched degrades to a stringified value, so normalization never fails.

use serde_json::Value;

/// One step of a descent into a JSON tree.
#[derive(Debug, Clone, Copy)]
enum Step {
    /// Take the first element of a non-empty array.
    First,
    /// Take a field of an object.
    Field(&'static str),
}

/// `output[0].content[0].text`, starting below the `output` key.
///
/// Each group either resolves completely or the value it started from is
/// the dead end: an empty `content` list stringifies `output[0]`, not the
/// list itself.
const OUTPUT_PATH: &[&[Step]] = &[
    &[Step::First],
    &[Step::Field("content"), Step::First],
    &[Step::Field("text")],
];

type Rule = fn(&Value) -> Option<String>;

/// Named extraction rules, in priority order.
const RULES: &[(&str, Rule)] = &[("output", extract_output), ("predictions", extract_predictions)];

/// Extract the assistant text from a raw response.
pub fn normalize(raw: &Value) -> String {
    RULES
        .iter()
        .find_map(|(_, rule)| rule(raw))
        .unwrap_or_else(|| stringify(raw))
}

/// Name of the rule that matches `raw`, or `None` when the stringify
/// fallback applies.
pub fn matching_rule(raw: &Value) -> Option<&'static str> {
    RULES
        .iter()
        .find(|(_, rule)| rule(raw).is_some())
        .map(|(name, _)| *name)
}

/// Strings verbatim, everything else as compact JSON.
pub fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn extract_output(raw: &Value) -> Option<String> {
    raw.get("output").map(|output| descend(output, OUTPUT_PATH))
}

fn extract_predictions(raw: &Value) -> Option<String> {
    let first = raw.get("predictions")?.as_array()?.first()?;
    match first {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => map.get("content").map(stringify),
        _ => None,
    }
}

/// Follow `path` group by group and stringify the value the first
/// unresolved group started from.
fn descend(value: &Value, path: &[&[Step]]) -> String {
    let Some((group, rest)) = path.split_first() else {
        return stringify(value);
    };

    match group.iter().try_fold(value, |current, step| take(current, *step)) {
        Some(child) => descend(child, rest),
        None => stringify(value),
    }
}

fn take(value: &Value, step: Step) -> Option<&Value> {
    match step {
        Step::First => value.as_array()?.first(),
        Step::Field(name) => value.as_object()?.get(name),
    }
}
