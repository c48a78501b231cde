//! Named formatting helpers.
//!
//! A helper mapping is a list of rules:
//!
//! ```json
//! [{ "source": "entity.name", "target": "name", "method": "upperCase" }]
//! ```
//!
//! Rules run in order over a copy of the source. Each reads `source`, applies
//! `method` and writes the result at `target` (defaulting to `source`). The
//! copy, with every rule applied, is the helper's projection.
//!
//! | method                        | effect                                                       |
//! |-------------------------------|--------------------------------------------------------------|
//! | `regex`                       | first capture group (or whole match) of pattern `value`; null when nothing matches |
//! | `remove`                      | deletes `source`                                             |
//! | `upperCase` / `lowerCase`     | case conversion of strings                                   |
//! | `trim`                        | strips surrounding whitespace from strings                   |
//! | `toString`                    | renders numbers and booleans as strings                      |
//! | `toNumber`                    | parses strings as numbers; null when unparseable             |
//! | `default`                     | writes `value` when `source` is missing or null              |
//! | `mergeArrayEachItemWithValue` | merges object `value` into every item of an array            |
//! | `setTimeToRecordUTC`          | normalises a date/date-time string to midnight UTC (RFC 3339) |

use chrono::{DateTime, NaiveDate, SecondsFormat, TimeZone, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

use crate::path::{self, deep_merge};
use crate::BuildError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HelperMethod {
    Regex,
    Remove,
    UpperCase,
    LowerCase,
    Trim,
    ToString,
    ToNumber,
    Default,
    MergeArrayEachItemWithValue,
    #[serde(rename = "setTimeToRecordUTC")]
    SetTimeToRecordUtc,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HelperRule {
    pub source: String,
    #[serde(default)]
    pub target: Option<String>,
    pub method: HelperMethod,
    #[serde(default)]
    pub value: Option<Value>,
}

#[derive(Debug)]
struct CompiledRule {
    rule: HelperRule,
    pattern: Option<Regex>,
}

#[derive(Debug)]
pub struct HelpersTransformer {
    rules: Vec<CompiledRule>,
}

impl HelpersTransformer {
    /// Parse and pre-compile a helper mapping.
    ///
    /// # Errors
    /// [`BuildError::InvalidHelper`] for malformed rules, unknown methods, or
    /// regex rules without a valid pattern.
    pub fn try_from_mapping(mapping: &Value) -> Result<Self, BuildError> {
        let rules: Vec<HelperRule> = serde_json::from_value(mapping.clone())
            .map_err(|e| BuildError::InvalidHelper(e.to_string()))?;

        let rules = rules
            .into_iter()
            .map(|rule| {
                let pattern = match rule.method {
                    HelperMethod::Regex => {
                        let raw = rule.value.as_ref().and_then(Value::as_str).ok_or_else(|| {
                            BuildError::InvalidHelper(format!(
                                "regex rule on '{}' needs a string pattern",
                                rule.source
                            ))
                        })?;
                        Some(Regex::new(raw).map_err(|e| BuildError::InvalidHelper(e.to_string()))?)
                    }
                    _ => None,
                };
                Ok(CompiledRule { rule, pattern })
            })
            .collect::<Result<Vec<_>, BuildError>>()?;

        Ok(Self { rules })
    }

    pub fn transform(&self, source: &Value) -> Value {
        let mut output = source.clone();

        for compiled in &self.rules {
            let rule = &compiled.rule;
            let target = rule.target.as_deref().unwrap_or(&rule.source);
            let current = path::get(&output, &rule.source).cloned();

            if rule.method == HelperMethod::Remove {
                path::remove(&mut output, &rule.source);
                continue;
            }

            let result = match (rule.method, current) {
                (HelperMethod::Default, None | Some(Value::Null)) => rule.value.clone(),
                (HelperMethod::Default, Some(existing)) => Some(existing),
                (_, None) => None,
                (method, Some(value)) => Some(apply(method, value, rule, compiled.pattern.as_ref())),
            };

            if let Some(result) = result {
                path::set(&mut output, target, result);
            }
        }

        output
    }
}

fn apply(method: HelperMethod, value: Value, rule: &HelperRule, pattern: Option<&Regex>) -> Value {
    match method {
        HelperMethod::Regex => match (&value, pattern) {
            (Value::String(s), Some(re)) => re
                .captures(s)
                .and_then(|caps| caps.get(1).or_else(|| caps.get(0)))
                .map(|m| Value::String(m.as_str().to_owned()))
                .unwrap_or(Value::Null),
            _ => Value::Null,
        },
        HelperMethod::UpperCase => map_str(value, |s| s.to_uppercase()),
        HelperMethod::LowerCase => map_str(value, |s| s.to_lowercase()),
        HelperMethod::Trim => map_str(value, |s| s.trim().to_owned()),
        HelperMethod::ToString => match value {
            Value::Number(n) => Value::String(n.to_string()),
            Value::Bool(b) => Value::String(b.to_string()),
            other => other,
        },
        HelperMethod::ToNumber => match value {
            Value::String(s) => parse_number(s.trim()),
            n @ Value::Number(_) => n,
            _ => Value::Null,
        },
        HelperMethod::MergeArrayEachItemWithValue => match (value, &rule.value) {
            (Value::Array(items), Some(patch)) => Value::Array(
                items
                    .into_iter()
                    .map(|mut item| {
                        deep_merge(&mut item, patch.clone());
                        item
                    })
                    .collect(),
            ),
            (other, _) => other,
        },
        HelperMethod::SetTimeToRecordUtc => match &value {
            Value::String(s) => midnight_utc(s).map(Value::String).unwrap_or(value),
            _ => value,
        },
        // Handled before dispatch.
        HelperMethod::Remove | HelperMethod::Default => value,
    }
}

fn map_str(value: Value, f: impl FnOnce(&str) -> String) -> Value {
    match value {
        Value::String(s) => Value::String(f(&s)),
        other => other,
    }
}

fn parse_number(raw: &str) -> Value {
    if let Ok(i) = raw.parse::<i64>() {
        return Value::Number(i.into());
    }
    raw.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

fn midnight_utc(raw: &str) -> Option<String> {
    let date = match DateTime::parse_from_rfc3339(raw) {
        Ok(dt) => dt.with_timezone(&Utc).date_naive(),
        Err(_) => NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()?,
    };
    let midnight = Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?);
    Some(midnight.to_rfc3339_opts(SecondsFormat::Secs, true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn helper(rules: Value) -> HelpersTransformer {
        HelpersTransformer::try_from_mapping(&rules).expect("valid mapping")
    }

    #[test]
    fn regex_extracts_first_capture_group() {
        let t = helper(json!([
            { "source": "phone", "target": "areaCode", "method": "regex", "value": "^\\+(\\d+)" }
        ]));
        let out = t.transform(&json!({ "phone": "+44 20 7946 0000" }));
        assert_eq!(out["areaCode"], "44");
        assert_eq!(out["phone"], "+44 20 7946 0000");
    }

    #[test]
    fn remove_deletes_the_source_path() {
        let t = helper(json!([{ "source": "secret", "method": "remove" }]));
        assert_eq!(t.transform(&json!({ "secret": 1, "keep": 2 })), json!({ "keep": 2 }));
    }

    #[test]
    fn default_only_fills_missing_values() {
        let t = helper(json!([
            { "source": "country", "method": "default", "value": "GB" },
            { "source": "currency", "method": "default", "value": "GBP" }
        ]));
        let out = t.transform(&json!({ "country": "US" }));
        assert_eq!(out["country"], "US");
        assert_eq!(out["currency"], "GBP");
    }

    #[test]
    fn string_and_number_conversions() {
        let t = helper(json!([
            { "source": "amount", "method": "toNumber" },
            { "source": "id", "method": "toString" },
            { "source": "name", "method": "trim" }
        ]));
        let out = t.transform(&json!({ "amount": " 12.5 ", "id": 7, "name": "  acme " }));
        assert_eq!(out["amount"], json!(12.5));
        assert_eq!(out["id"], "7");
        assert_eq!(out["name"], "acme");
    }

    #[test]
    fn merges_value_into_every_array_item() {
        let t = helper(json!([
            { "source": "documents", "method": "mergeArrayEachItemWithValue", "value": { "status": "new" } }
        ]));
        let out = t.transform(&json!({ "documents": [{ "id": 1 }, { "id": 2 }] }));
        assert_eq!(
            out["documents"],
            json!([{ "id": 1, "status": "new" }, { "id": 2, "status": "new" }])
        );
    }

    #[test]
    fn dates_are_normalised_to_midnight_utc() {
        let t = helper(json!([
            { "source": "dob", "method": "setTimeToRecordUTC" },
            { "source": "seen", "method": "setTimeToRecordUTC" }
        ]));
        let out = t.transform(&json!({ "dob": "1990-04-01", "seen": "2024-01-02T15:30:00+02:00" }));
        assert_eq!(out["dob"], "1990-04-01T00:00:00Z");
        assert_eq!(out["seen"], "2024-01-02T00:00:00Z");
    }

    #[test]
    fn unknown_method_is_a_build_error() {
        let result = HelpersTransformer::try_from_mapping(&json!([
            { "source": "a", "method": "teleport" }
        ]));
        assert!(matches!(result, Err(BuildError::InvalidHelper(_))));
    }

    #[test]
    fn regex_without_pattern_is_a_build_error() {
        let result = HelpersTransformer::try_from_mapping(&json!([
            { "source": "a", "method": "regex" }
        ]));
        assert!(matches!(result, Err(BuildError::InvalidHelper(_))));
    }
}
