//! Typed-value coercion for loosely typed wire fields.
//!
//! The gateway encodes booleans and numbers as strings in some fields and
//! as native JSON in others. [`normalize`] collapses both forms into the
//! native JSON scalar before any domain logic looks at a field.

use serde_json::{Number, Value};

/// Recursively coerces string scalars into booleans or numbers.
///
/// - `"True"` / `"true"` become `true`, `"False"` / `"false"` become `false`.
/// - A string that parses fully as a finite number becomes a number
///   (integers stay integers).
/// - Every other string is passed through unchanged.
///
/// Objects and arrays are normalized element-wise; object key order is kept.
/// The pass is idempotent.
#[must_use]
pub fn normalize(value: Value) -> Value {
    match value {
        Value::String(s) => normalize_string(s),
        Value::Array(items) => Value::Array(items.into_iter().map(normalize).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, item)| (key, normalize(item)))
                .collect(),
        ),
        other => other,
    }
}

fn normalize_string(s: String) -> Value {
    match s.as_str() {
        "True" | "true" => Value::Bool(true),
        "False" | "false" => Value::Bool(false),
        _ => match parse_number(&s) {
            Some(number) => Value::Number(number),
            None => Value::String(s),
        },
    }
}

/// Parses a whole string as a finite JSON number.
fn parse_number(s: &str) -> Option<Number> {
    if let Ok(int) = s.parse::<i64>() {
        return Some(Number::from(int));
    }
    if let Ok(uint) = s.parse::<u64>() {
        return Some(Number::from(uint));
    }
    let float = s.parse::<f64>().ok().filter(|f| f.is_finite())?;
    Number::from_f64(float)
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn boolean_strings_become_booleans() {
        assert_eq!(normalize(json!("True")), json!(true));
        assert_eq!(normalize(json!("true")), json!(true));
        assert_eq!(normalize(json!("False")), json!(false));
        assert_eq!(normalize(json!("false")), json!(false));
    }

    #[test]
    fn other_casings_stay_strings() {
        assert_eq!(normalize(json!("TRUE")), json!("TRUE"));
        assert_eq!(normalize(json!("yes")), json!("yes"));
    }

    #[test]
    fn numeric_strings_become_numbers() {
        assert_eq!(normalize(json!("500")), json!(500));
        assert_eq!(normalize(json!("-5")), json!(-5));
        assert_eq!(normalize(json!("2.5")), json!(2.5));
    }

    #[test]
    fn non_finite_and_partial_numbers_stay_strings() {
        assert_eq!(normalize(json!("NaN")), json!("NaN"));
        assert_eq!(normalize(json!("inf")), json!("inf"));
        assert_eq!(normalize(json!("1A40")), json!("1A40"));
        assert_eq!(normalize(json!("")), json!(""));
        assert_eq!(normalize(json!(" 12")), json!(" 12"));
    }

    #[test]
    fn nested_values_are_normalized() {
        let raw = json!({
            "clock_msg": {
                "area_id": "lb",
                "clock": "28800",
                "paused": "False",
                "extras": ["1", "x", {"flag": "true"}]
            }
        });
        let expected = json!({
            "clock_msg": {
                "area_id": "lb",
                "clock": 28800,
                "paused": false,
                "extras": [1, "x", {"flag": true}]
            }
        });
        assert_eq!(normalize(raw), expected);
    }

    #[test]
    fn already_typed_values_pass_through() {
        let raw = json!({"a": 1, "b": true, "c": null, "d": 2.25});
        assert_eq!(normalize(raw.clone()), raw);
    }

    #[test]
    fn key_order_is_preserved() {
        let raw = json!({"to": "0102", "descr": "1A40", "from": "0101"});
        let normalized = normalize(raw);
        let Some(map) = normalized.as_object() else {
            panic!("expected object");
        };
        let keys: Vec<&str> = map.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["to", "descr", "from"]);
    }

    #[test]
    fn normalize_is_idempotent() {
        let samples = vec![
            json!("True"),
            json!("12.50"),
            json!("-0"),
            json!("1e3"),
            json!("18446744073709551615"),
            json!({"SG_MSG": {"obj_id": "S12", "new_state": "3", "list": ["false", "7"]}}),
            json!([null, "x", 4, "4"]),
        ];
        for sample in samples {
            let once = normalize(sample);
            let twice = normalize(once.clone());
            assert_eq!(once, twice);
        }
    }
}
