//! Source row -> target row, one column rule at a time.
//!
//! Nothing in here fails: a value that cannot be converted becomes null and the
//! row carries on to the insert.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::{Map, Number, Value};
use uuid::Uuid;

use crate::jobs::model::{ColumnMapping, ConvertType};

/// Numbers keep their source digits (`arbitrary_precision`), so NUMERIC
/// values reach the insert unrounded.
pub type SourceRow = Map<String, Value>;

/// Target values in mapping order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TargetRow {
    columns: Vec<(String, Value)>,
}

impl TargetRow {
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(c, _)| c.as_str())
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .rev()
            .find(|(c, _)| c == column)
            .map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// JSON object handed to `json_populate_record`.
    pub fn to_json(&self) -> Value {
        let mut obj = Map::with_capacity(self.columns.len());
        for (c, v) in &self.columns {
            obj.insert(c.clone(), v.clone());
        }
        Value::Object(obj)
    }

    /// Same as [`to_json`](Self::to_json) restricted to the given columns.
    pub fn project(&self, columns: &[&str]) -> Value {
        let mut obj = Map::with_capacity(columns.len());
        for c in columns {
            obj.insert((*c).to_string(), self.get(c).cloned().unwrap_or(Value::Null));
        }
        Value::Object(obj)
    }
}

pub fn build_target_row(mappings: &[ColumnMapping], source: &SourceRow) -> TargetRow {
    let columns = mappings
        .iter()
        .map(|m| (m.target_column.clone(), resolve_value(m, source)))
        .collect();
    TargetRow { columns }
}

pub fn resolve_value(mapping: &ColumnMapping, source: &SourceRow) -> Value {
    let raw = match mapping.fixed_value() {
        Some(fixed) if fixed.eq_ignore_ascii_case("guid") => {
            Value::String(Uuid::new_v4().to_string())
        }
        Some(fixed) if fixed.eq_ignore_ascii_case("null") => Value::Null,
        Some(fixed) => Value::String(fixed.to_string()),
        None => mapping
            .source_column()
            .and_then(|c| source.get(c))
            .cloned()
            .unwrap_or(Value::Null),
    };
    convert(raw, mapping.convert_type)
}

pub fn convert(value: Value, to: ConvertType) -> Value {
    if value.is_null() {
        return value;
    }
    match to {
        ConvertType::None => value,
        ConvertType::DateTime => match value {
            Value::String(s) => parse_datetime(&s).map(Value::String).unwrap_or(Value::Null),
            other => other,
        },
        ConvertType::Int => to_int(&value)
            .map(|n| Value::Number(n.into()))
            .unwrap_or(Value::Null),
        ConvertType::Float => to_float(&value)
            .and_then(Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::Null),
    }
}

/// ISO-8601 date-time first, then a bare `YYYY-MM-DD`.
/// Output keeps the offset when the input had one.
fn parse_datetime(s: &str) -> Option<String> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.to_rfc3339());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string());
        }
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%:z"] {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.to_rfc3339());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .map(|d| d.format("%Y-%m-%dT00:00:00").to_string())
}

fn to_int(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && *f >= i64::MIN as f64 && *f <= i64::MAX as f64)
                .map(|f| f.trunc() as i64)
        }),
        Value::Bool(b) => Some(i64::from(*b)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn to_float(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashSet;

    fn mapping(source: Option<&str>, target: &str) -> ColumnMapping {
        ColumnMapping {
            source_table: "src".into(),
            target_table: "dst".into(),
            source_column: source.map(str::to_string),
            target_column: target.into(),
            fixed_value: None,
            convert_type: ConvertType::None,
            is_key: false,
        }
    }

    fn row(v: Value) -> SourceRow {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn source_value_passes_through() {
        let m = mapping(Some("name"), "label");
        assert_eq!(resolve_value(&m, &row(json!({"name": "ada"}))), json!("ada"));
        assert_eq!(resolve_value(&m, &row(json!({}))), Value::Null);
    }

    #[test]
    fn fixed_values_win_over_source() {
        let mut m = mapping(Some("name"), "label");
        m.fixed_value = Some("constant".into());
        assert_eq!(resolve_value(&m, &row(json!({"name": "ada"}))), json!("constant"));

        m.fixed_value = Some("Null".into());
        assert_eq!(resolve_value(&m, &row(json!({"name": "ada"}))), Value::Null);
    }

    #[test]
    fn guid_values_are_fresh_uuids() {
        let mut m = mapping(None, "uid");
        m.fixed_value = Some("guid".into());
        let src = row(json!({}));

        let mut seen = HashSet::new();
        for _ in 0..500 {
            let v = resolve_value(&m, &src);
            let s = v.as_str().unwrap().to_string();
            assert!(Uuid::parse_str(&s).is_ok());
            assert!(seen.insert(s));
        }
    }

    #[test]
    fn int_conversion_nulls_garbage() {
        assert_eq!(convert(json!("42"), ConvertType::Int), json!(42));
        assert_eq!(convert(json!(" 7 "), ConvertType::Int), json!(7));
        assert_eq!(convert(json!(3.9), ConvertType::Int), json!(3));
        assert_eq!(convert(json!(true), ConvertType::Int), json!(1));
        assert_eq!(convert(json!("4.5"), ConvertType::Int), Value::Null);
        assert_eq!(convert(json!("abc"), ConvertType::Int), Value::Null);
        assert_eq!(convert(json!({"a": 1}), ConvertType::Int), Value::Null);
    }

    #[test]
    fn float_conversion_nulls_garbage() {
        assert_eq!(convert(json!("2.5"), ConvertType::Float), json!(2.5));
        assert_eq!(convert(json!(2), ConvertType::Float), json!(2.0));
        assert_eq!(convert(json!("NaN"), ConvertType::Float), Value::Null);
        assert_eq!(convert(json!("x"), ConvertType::Float), Value::Null);
    }

    #[test]
    fn datetime_parses_iso_then_date_only() {
        assert_eq!(
            convert(json!("2024-03-01T10:20:30"), ConvertType::DateTime),
            json!("2024-03-01T10:20:30")
        );
        assert_eq!(
            convert(json!("2024-03-01 10:20:30.5"), ConvertType::DateTime),
            json!("2024-03-01T10:20:30.500")
        );
        assert_eq!(
            convert(json!("2024-03-01T10:20:30+02:00"), ConvertType::DateTime),
            json!("2024-03-01T10:20:30+02:00")
        );
        assert_eq!(
            convert(json!("2024-03-01"), ConvertType::DateTime),
            json!("2024-03-01T00:00:00")
        );
        assert_eq!(convert(json!("01/03/2024"), ConvertType::DateTime), Value::Null);
        assert_eq!(convert(json!(20240301), ConvertType::DateTime), json!(20240301));
    }

    #[test]
    fn null_survives_every_conversion() {
        for ct in [ConvertType::None, ConvertType::DateTime, ConvertType::Int, ConvertType::Float] {
            assert_eq!(convert(Value::Null, ct), Value::Null);
        }
    }

    #[test]
    fn target_row_keeps_mapping_order() {
        let mut fixed = mapping(None, "kind");
        fixed.fixed_value = Some("import".into());
        let mut qty = mapping(Some("qty"), "quantity");
        qty.convert_type = ConvertType::Int;
        let mappings = vec![mapping(Some("id"), "id"), fixed, qty];

        let target = build_target_row(&mappings, &row(json!({"id": 9, "qty": "n/a"})));

        assert_eq!(target.columns().collect::<Vec<_>>(), vec!["id", "kind", "quantity"]);
        assert_eq!(target.get("quantity"), Some(&Value::Null));
        assert_eq!(
            target.to_json(),
            json!({"id": 9, "kind": "import", "quantity": null})
        );
        assert_eq!(target.project(&["id"]), json!({"id": 9}));
    }

    #[test]
    fn unconverted_numbers_keep_every_digit() {
        let source: SourceRow = serde_json::from_str(
            r#"{"amount": 12345678901234567.123456789012345678, "big": 1234567890123456789012345678901234567890}"#,
        )
        .unwrap();
        let mappings = vec![mapping(Some("amount"), "amount"), mapping(Some("big"), "big")];

        let target = build_target_row(&mappings, &source);

        assert_eq!(
            target.to_json().to_string(),
            r#"{"amount":12345678901234567.123456789012345678,"big":1234567890123456789012345678901234567890}"#
        );
    }
}
