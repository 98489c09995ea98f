//! Required-field lookup and value coercion for raw session objects.

use crate::models::{PendingRecord, Record, RequiredField, SourceRef};
use serde_json::{Map, Value};

/// Key aliases tried, in order, for each required field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldAliases {
    pub vocation: Vec<String>,
    pub mode: Vec<String>,
    pub zone: Vec<String>,
    pub metric: Vec<String>,
}

impl Default for FieldAliases {
    fn default() -> Self {
        Self::from(&crate::config::IngestConfig::default())
    }
}

impl From<&crate::config::IngestConfig> for FieldAliases {
    fn from(config: &crate::config::IngestConfig) -> Self {
        Self {
            vocation: config.vocation_fields.clone(),
            mode: config.mode_fields.clone(),
            zone: config.zone_fields.clone(),
            metric: config.metric_fields.clone(),
        }
    }
}

/// Result of resolving one field on a raw object.
#[derive(Debug, Clone, PartialEq)]
enum Lookup<T> {
    Found(T),
    Missing,
    Invalid,
}

impl<T> Lookup<T> {
    fn note(
        &self,
        field: RequiredField,
        missing: &mut Vec<RequiredField>,
        invalid: &mut Vec<RequiredField>,
    ) {
        match self {
            Lookup::Found(_) => {}
            Lookup::Missing => missing.push(field),
            Lookup::Invalid => invalid.push(field),
        }
    }

    fn found(self) -> Option<T> {
        match self {
            Lookup::Found(value) => Some(value),
            _ => None,
        }
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn first_present<'a>(object: &'a Map<String, Value>, keys: &[String]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| object.get(key))
        .find(|value| !is_blank(value))
}

fn text_field(object: &Map<String, Value>, keys: &[String]) -> Lookup<String> {
    match first_present(object, keys) {
        None => Lookup::Missing,
        Some(Value::String(s)) => Lookup::Found(s.trim().to_string()),
        Some(Value::Number(n)) => Lookup::Found(n.to_string()),
        Some(Value::Bool(b)) => Lookup::Found(b.to_string()),
        Some(_) => Lookup::Invalid,
    }
}

fn metric_field(object: &Map<String, Value>, keys: &[String]) -> Lookup<f64> {
    let parsed = match first_present(object, keys) {
        None => return Lookup::Missing,
        Some(Value::Number(n)) => n.as_f64().filter(|v| v.is_finite()),
        Some(Value::String(s)) => parse_number(s),
        Some(_) => None,
    };

    match parsed {
        Some(value) => Lookup::Found(value),
        None => Lookup::Invalid,
    }
}

/// Parse a numeric string as exported by the game client.
///
/// Thousands separators (`,`, spaces, `_`) are dropped; `.` is the decimal
/// point. Non-finite results are rejected.
pub fn parse_number(text: &str) -> Option<f64> {
    let cleaned: String = text
        .trim()
        .chars()
        .filter(|c| !matches!(c, ',' | '_' | ' ' | '\u{a0}'))
        .collect();

    if cleaned.is_empty() {
        return None;
    }

    let value: f64 = cleaned.parse().ok()?;
    value.is_finite().then_some(value)
}

/// Split a raw session object into a complete record or a pending entry.
pub fn classify(
    object: &Map<String, Value>,
    aliases: &FieldAliases,
    source: SourceRef,
) -> Result<Record, PendingRecord> {
    let vocation = text_field(object, &aliases.vocation);
    let mode = text_field(object, &aliases.mode);
    let zone = text_field(object, &aliases.zone);
    let metric = metric_field(object, &aliases.metric);

    let mut missing = Vec::new();
    let mut invalid = Vec::new();
    vocation.note(RequiredField::Vocation, &mut missing, &mut invalid);
    mode.note(RequiredField::Mode, &mut missing, &mut invalid);
    zone.note(RequiredField::Zone, &mut missing, &mut invalid);
    metric.note(RequiredField::Metric, &mut missing, &mut invalid);

    match (vocation, mode, zone, metric) {
        (Lookup::Found(vocation), Lookup::Found(mode), Lookup::Found(zone), Lookup::Found(metric)) => {
            Ok(Record {
                vocation,
                mode,
                zone,
                metric,
                source,
            })
        }
        (vocation, mode, zone, _) => Err(PendingRecord {
            source,
            vocation: vocation.found(),
            mode: mode.found(),
            zone: zone.found(),
            missing,
            invalid,
            raw: object.clone(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn source() -> SourceRef {
        SourceRef {
            file: "hunt.json".to_string(),
            entry: 1,
        }
    }

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn test_complete_record() {
        let raw = object(json!({
            "Vocation": "Knight",
            "Mode": "Hunting",
            "Zone": "Cave",
            "Metric": 10,
            "Loot": "12,000"
        }));

        let record = classify(&raw, &FieldAliases::default(), source()).unwrap();
        assert_eq!(record.vocation, "Knight");
        assert_eq!(record.mode, "Hunting");
        assert_eq!(record.zone, "Cave");
        assert_eq!(record.metric, 10.0);
    }

    #[test]
    fn test_missing_fields_go_pending() {
        let raw = object(json!({ "Vocation": "Knight" }));

        let pending = classify(&raw, &FieldAliases::default(), source()).unwrap_err();
        assert_eq!(pending.vocation.as_deref(), Some("Knight"));
        assert_eq!(
            pending.missing,
            vec![RequiredField::Mode, RequiredField::Zone, RequiredField::Metric]
        );
        assert!(pending.invalid.is_empty());
    }

    #[test]
    fn test_blank_and_null_count_as_missing() {
        let raw = object(json!({
            "Vocation": "  ",
            "Mode": null,
            "Zone": "Cave",
            "Metric": 5
        }));

        let pending = classify(&raw, &FieldAliases::default(), source()).unwrap_err();
        assert_eq!(
            pending.missing,
            vec![RequiredField::Vocation, RequiredField::Mode]
        );
    }

    #[test]
    fn test_aliases_resolve_in_order() {
        let raw = object(json!({
            "vocation": "Druid",
            "mode": "Solo",
            "Zona": "",
            "Hunt Place": "Roshamuul",
            "metric": "1,250.5"
        }));

        let record = classify(&raw, &FieldAliases::default(), source()).unwrap();
        assert_eq!(record.zone, "Roshamuul");
        assert_eq!(record.metric, 1250.5);
    }

    #[test]
    fn test_invalid_metric_goes_pending() {
        for metric in [json!("lots"), json!("NaN"), json!("inf"), json!([1]), json!(true)] {
            let raw = object(json!({
                "Vocation": "Knight",
                "Mode": "Solo",
                "Zone": "Cave",
                "Metric": metric
            }));

            let pending = classify(&raw, &FieldAliases::default(), source()).unwrap_err();
            assert!(pending.missing.is_empty());
            assert_eq!(pending.invalid, vec![RequiredField::Metric]);
            assert_eq!(pending.zone.as_deref(), Some("Cave"));
        }
    }

    #[test]
    fn test_structured_category_is_invalid() {
        let raw = object(json!({
            "Vocation": { "name": "Knight" },
            "Mode": "Solo",
            "Zone": "Cave",
            "Metric": 1
        }));

        let pending = classify(&raw, &FieldAliases::default(), source()).unwrap_err();
        assert_eq!(pending.invalid, vec![RequiredField::Vocation]);
        assert_eq!(pending.vocation, None);
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("1,234"), Some(1234.0));
        assert_eq!(parse_number(" 12 500 "), Some(12500.0));
        assert_eq!(parse_number("-3.5"), Some(-3.5));
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("12k"), None);
        assert_eq!(parse_number("infinity"), None);
    }
}
