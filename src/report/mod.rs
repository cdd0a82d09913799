//! # Analysis Reports
//!
//! Measurements come out of the acoustic analyzer as plain `f64` values, and
//! plenty of them are undefined: a formant that could not be tracked is `NaN`,
//! a degenerate correlation can produce an infinity. JSON has no token for
//! either, so everything that leaves the service goes through a [`ReportValue`]
//! tree first and is sanitized before it is serialized.
//!
//! ## Rust Concepts:
//! - **Recursive enums**: `List` and `Map` hold more `ReportValue`s, which is
//!   how a tree of arbitrary depth is expressed without trait objects
//! - **Manual `Serialize`**: lets the tree decide its own wire format while
//!   still plugging into `serde_json` and actix's `HttpResponse::json`
//! - **`Vec<(String, ReportValue)>` instead of `HashMap`**: keeps key order stable

pub mod series;

use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

pub use series::{shape, OutputMode};

/// A JSON-shaped value that may still contain non-finite numbers.
#[derive(Debug, Clone, PartialEq)]
pub enum ReportValue {
    Null,
    Number(f64),
    Text(String),
    List(Vec<ReportValue>),
    /// Object with insertion-ordered keys
    Map(Vec<(String, ReportValue)>),
}

impl ReportValue {
    /// Build a map from `(key, value)` pairs, keeping their order.
    pub fn map<K: Into<String>>(entries: Vec<(K, ReportValue)>) -> Self {
        ReportValue::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// `Some(x)` becomes a number, `None` becomes null.
    pub fn optional(value: Option<f64>) -> Self {
        value.map(ReportValue::Number).unwrap_or(ReportValue::Null)
    }

    /// Replace every NaN and ±infinity in the tree with `Null`.
    ///
    /// Shape and key order are kept, non-numeric leaves pass through
    /// untouched, and running it on an already sanitized tree is a no-op.
    pub fn sanitize(self) -> Self {
        match self {
            ReportValue::Number(n) if !n.is_finite() => ReportValue::Null,
            ReportValue::List(items) => {
                ReportValue::List(items.into_iter().map(ReportValue::sanitize).collect())
            }
            ReportValue::Map(entries) => ReportValue::Map(
                entries
                    .into_iter()
                    .map(|(key, value)| (key, value.sanitize()))
                    .collect(),
            ),
            other => other,
        }
    }

    /// True when no numeric leaf anywhere in the tree is NaN or infinite.
    pub fn is_finite(&self) -> bool {
        match self {
            ReportValue::Number(n) => n.is_finite(),
            ReportValue::List(items) => items.iter().all(ReportValue::is_finite),
            ReportValue::Map(entries) => entries.iter().all(|(_, v)| v.is_finite()),
            _ => true,
        }
    }

    /// Look up a key in a `Map`; `None` for other variants.
    #[cfg(test)]
    pub fn get(&self, key: &str) -> Option<&ReportValue> {
        match self {
            ReportValue::Map(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Convenience for building `{"error": message}` bodies.
    pub fn error(message: impl Into<String>) -> Self {
        ReportValue::map(vec![("error", ReportValue::Text(message.into()))])
    }
}

impl Serialize for ReportValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ReportValue::Null => serializer.serialize_unit(),
            // serde_json writes non-finite floats as `null` already, this just
            // makes the unsanitized case explicit for other serializers
            ReportValue::Number(n) if !n.is_finite() => serializer.serialize_unit(),
            ReportValue::Number(n) => serializer.serialize_f64(*n),
            ReportValue::Text(s) => serializer.serialize_str(s),
            ReportValue::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            ReportValue::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn messy_tree() -> ReportValue {
        ReportValue::map(vec![
            ("pitch", ReportValue::List(vec![
                ReportValue::map(vec![("x", ReportValue::Number(0.1)), ("y", ReportValue::Number(f64::NAN))]),
                ReportValue::map(vec![("x", ReportValue::Number(0.2)), ("y", ReportValue::Number(210.5))]),
            ])),
            ("f1", ReportValue::List(vec![ReportValue::Number(f64::INFINITY), ReportValue::Number(f64::NEG_INFINITY)])),
            ("label", ReportValue::Text("NaN".to_string())),
            ("unit", ReportValue::Text("Hz".to_string())),
            ("hnr", ReportValue::Null),
        ])
    }

    #[test]
    fn test_sanitize_replaces_non_finite_numbers() {
        let clean = messy_tree().sanitize();
        assert!(clean.is_finite());

        let pitch = match clean.get("pitch") {
            Some(ReportValue::List(points)) => points.clone(),
            other => panic!("unexpected pitch value: {:?}", other),
        };
        assert_eq!(pitch[0].get("y"), Some(&ReportValue::Null));
        assert_eq!(pitch[1].get("y"), Some(&ReportValue::Number(210.5)));
        assert_eq!(
            clean.get("f1"),
            Some(&ReportValue::List(vec![ReportValue::Null, ReportValue::Null]))
        );
    }

    #[test]
    fn test_sanitize_keeps_non_numeric_leaves_and_order() {
        let clean = messy_tree().sanitize();
        assert_eq!(clean.get("label"), Some(&ReportValue::Text("NaN".to_string())));
        assert_eq!(clean.get("unit"), Some(&ReportValue::Text("Hz".to_string())));

        let json = serde_json::to_string(&clean).unwrap();
        let pitch_at = json.find("\"pitch\"").unwrap();
        let f1_at = json.find("\"f1\"").unwrap();
        let hnr_at = json.find("\"hnr\"").unwrap();
        assert!(pitch_at < f1_at && f1_at < hnr_at);
    }

    #[test]
    fn test_sanitize_is_idempotent() {
        let once = messy_tree().sanitize();
        let twice = once.clone().sanitize();
        assert_eq!(once, twice);
    }

    /// Lists of maps of lists, with the three given leaves planted at
    /// different depths next to finite numbers and text.
    fn deep_tree(nan: ReportValue, inf: ReportValue, neg_inf: ReportValue) -> ReportValue {
        let frame = |t: f64, leaf: ReportValue| {
            ReportValue::map(vec![
                ("t", ReportValue::Number(t)),
                ("values", ReportValue::List(vec![
                    ReportValue::Number(t * 100.0),
                    ReportValue::List(vec![leaf, ReportValue::Text("inf".to_string())]),
                ])),
            ])
        };
        ReportValue::map(vec![
            ("tracks", ReportValue::List(vec![
                ReportValue::List(vec![frame(0.0, nan.clone()), frame(0.5, inf.clone())]),
                ReportValue::List(vec![frame(1.0, ReportValue::Number(-3.25)), frame(1.5, neg_inf.clone())]),
            ])),
            ("summary", ReportValue::map(vec![
                ("spread", ReportValue::List(vec![inf, ReportValue::Number(0.0)])),
                ("mean", nan),
            ])),
            ("floor", neg_inf),
        ])
    }

    #[test]
    fn test_sanitize_reaches_every_depth() {
        let messy = deep_tree(
            ReportValue::Number(f64::NAN),
            ReportValue::Number(f64::INFINITY),
            ReportValue::Number(f64::NEG_INFINITY),
        );
        assert!(!messy.is_finite());

        let clean = messy.sanitize();
        let expected = deep_tree(ReportValue::Null, ReportValue::Null, ReportValue::Null);
        assert_eq!(clean, expected);
        assert!(clean.is_finite());
        assert_eq!(clean.clone().sanitize(), clean);

        let json = serde_json::to_value(&clean).unwrap();
        assert!(json["tracks"][0][0]["values"][1][0].is_null());
        assert_eq!(json["tracks"][1][0]["values"][1][0], -3.25);
        assert_eq!(json["tracks"][0][1]["values"][1][1], "inf");
        assert!(json["floor"].is_null());
    }

    #[test]
    fn test_serialized_output_has_no_nan_tokens() {
        let json = serde_json::to_string(&messy_tree().sanitize()).unwrap();
        assert!(!json.contains("Infinity"));
        // a bare NaN token would make this parse fail
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(parsed["f1"][0].is_null());
        assert_eq!(parsed["label"], "NaN");
    }

    #[test]
    fn test_error_body_shape() {
        let json = serde_json::to_value(ReportValue::error("No file uploaded")).unwrap();
        assert_eq!(json, serde_json::json!({"error": "No file uploaded"}));
    }
}
