//! Frame body decoding: JSON parse, normalization, variant identification.
//!
//! Decoding never fails past this module. A body that is not valid JSON
//! becomes a [`DomainMessage::ParseError`], valid JSON with no recognized
//! key becomes [`DomainMessage::Unknown`].
//!
//! The feed sometimes batches several complete JSON objects into one frame
//! with no separator. Parsed as one document, such a batch would collapse
//! duplicate keys and silently drop messages, so [`decode_snapshot`]
//! splits on the `}{` boundary first and decodes each fragment on its own.

pub mod normalize;

pub use normalize::normalize;

use serde_json::Value;

use crate::domain::DomainMessage;

/// Recognized top-level keys in priority order.
const ROUTES: [(&str, fn(Value) -> DomainMessage); 7] = [
    ("CA_MSG", DomainMessage::Step),
    ("CB_MSG", DomainMessage::Cancel),
    ("CC_MSG", DomainMessage::Interpose),
    ("SG_MSG", DomainMessage::Signal),
    ("clock_msg", DomainMessage::ClockTick),
    ("train_location", DomainMessage::TrainLocation),
    ("train_delay", DomainMessage::TrainDelay),
];

/// Maps a normalized document to its variant.
///
/// The first key of the priority list present at the top level wins and
/// its value becomes the payload. Anything else is `Unknown`.
#[must_use]
pub fn identify(value: Value) -> DomainMessage {
    let Value::Object(mut map) = value else {
        return DomainMessage::Unknown { raw: value };
    };
    for (key, variant) in ROUTES {
        if let Some(payload) = map.remove(key) {
            return variant(payload);
        }
    }
    DomainMessage::Unknown {
        raw: Value::Object(map),
    }
}

/// Decodes a body holding a single JSON document.
#[must_use]
pub fn decode_one(raw_body: &str) -> DomainMessage {
    match serde_json::from_str::<Value>(raw_body) {
        Ok(value) => identify(normalize(value)),
        Err(err) => DomainMessage::ParseError {
            raw: raw_body.to_string(),
            reason: err.to_string(),
        },
    }
}

/// Decodes a body that may hold several concatenated JSON documents.
///
/// Each fragment is decoded independently, so a malformed fragment yields
/// its own `ParseError` without affecting its neighbours. A body without
/// a boundary decodes exactly like [`decode_one`].
#[must_use]
pub fn decode_snapshot(raw_body: &str) -> Vec<DomainMessage> {
    split_fragments(raw_body)
        .into_iter()
        .map(decode_one)
        .collect()
}

/// Splits a body at every `}` followed by optional whitespace and `{`.
///
/// The whitespace between fragments is dropped. The scan is purely
/// textual: braces inside string values are not special-cased.
#[must_use]
pub fn split_fragments(raw_body: &str) -> Vec<&str> {
    let mut fragments = Vec::new();
    let mut rest = raw_body;
    while let Some((end, next_start)) = next_boundary(rest) {
        let (Some(head), Some(tail)) = (rest.get(..end), rest.get(next_start..)) else {
            break;
        };
        fragments.push(head);
        rest = tail;
    }
    fragments.push(rest);
    fragments
}

/// Finds the first boundary in `s`: returns the end of the fragment
/// (just past `}`) and the start of the next one (the `{`).
fn next_boundary(s: &str) -> Option<(usize, usize)> {
    for (idx, _) in s.match_indices('}') {
        let end = idx + 1;
        let after = s.get(end..)?;
        let trimmed = after.trim_start();
        if trimmed.starts_with('{') {
            return Some((end, s.len() - trimmed.len()));
        }
    }
    None
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn identify_each_recognized_key() {
        let cases = [
            (json!({"CA_MSG": {"descr": "1A40", "from": "0101", "to": "0103"}}), "step"),
            (json!({"CB_MSG": {"descr": "1A40", "from": "0103"}}), "cancel"),
            (json!({"CC_MSG": {"descr": "1A40", "to": "0105"}}), "interpose"),
            (json!({"SG_MSG": {"obj_type": "signal", "obj_id": "S1", "new_state": 0}}), "signal"),
            (json!({"clock_msg": {"clock": 100}}), "clock_tick"),
            (json!({"train_location": {"headcode": "1A40", "location": "EUS"}}), "train_location"),
            (json!({"train_delay": {"headcode": "1A40", "delay": 120}}), "train_delay"),
        ];
        for (doc, expected) in cases {
            assert_eq!(identify(doc).kind_str(), expected);
        }
    }

    #[test]
    fn identify_returns_payload_of_key() {
        let msg = identify(json!({"CA_MSG": {"descr": "1A40", "to": "0103"}}));
        assert_eq!(msg, DomainMessage::Step(json!({"descr": "1A40", "to": "0103"})));
    }

    #[test]
    fn identify_follows_priority_order() {
        let msg = identify(json!({"clock_msg": {"clock": 1}, "SG_MSG": {"obj_id": "S9"}}));
        assert_eq!(msg.kind_str(), "signal");
    }

    #[test]
    fn identify_unrecognized_object() {
        let doc = json!({"heartbeat": 1});
        assert_eq!(identify(doc.clone()), DomainMessage::Unknown { raw: doc });
    }

    #[test]
    fn identify_non_object() {
        assert_eq!(identify(json!(42)), DomainMessage::Unknown { raw: json!(42) });
    }

    #[test]
    fn decode_one_normalizes_payload() {
        let msg = decode_one(r#"{"clock_msg":{"area_id":"lb","clock":"100","interval":"500","paused":"False"}}"#);
        let expected = json!({"area_id": "lb", "clock": 100, "interval": 500, "paused": false});
        assert_eq!(msg, DomainMessage::ClockTick(expected));
    }

    #[test]
    fn decode_one_reports_parse_error() {
        let msg = decode_one("{not json");
        let DomainMessage::ParseError { raw, reason } = msg else {
            panic!("expected parse error");
        };
        assert_eq!(raw, "{not json");
        assert!(!reason.is_empty());
    }

    #[test]
    fn split_without_boundary_is_single_fragment() {
        let body = r#"{"CA_MSG":{"descr":"1A40"}}"#;
        assert_eq!(split_fragments(body), vec![body]);
    }

    #[test]
    fn split_at_adjacent_and_spaced_boundaries() {
        let body = "{\"a\":1}{\"b\":2} \n {\"c\":3}";
        assert_eq!(split_fragments(body), vec!["{\"a\":1}", "{\"b\":2}", "{\"c\":3}"]);
    }

    #[test]
    fn split_keeps_nested_closing_braces() {
        let body = r#"{"SG_MSG":{"obj_id":"S1"}}{"SG_MSG":{"obj_id":"S2"}}"#;
        let fragments = split_fragments(body);
        assert_eq!(
            fragments,
            vec![r#"{"SG_MSG":{"obj_id":"S1"}}"#, r#"{"SG_MSG":{"obj_id":"S2"}}"#]
        );
    }

    #[test]
    fn snapshot_matches_individual_decodes() {
        let a = json!({"SG_MSG": {"obj_type": "signal", "obj_id": "S1", "new_state": "0"}});
        let b = json!({"CA_MSG": {"descr": "2B11", "from": "0101", "to": "0103"}});
        let a_text = a.to_string();
        let b_text = b.to_string();

        let batch = decode_snapshot(&format!("{a_text}{b_text}"));
        assert_eq!(batch, vec![decode_one(&a_text), decode_one(&b_text)]);
    }

    #[test]
    fn snapshot_isolates_malformed_fragment() {
        let body = r#"{"SG_MSG":{"obj_id":"S1"}}{"CA_MSG":{"descr":}{"CB_MSG":{"descr":"1A40"}}"#;
        let batch = decode_snapshot(body);
        let kinds: Vec<&str> = batch.iter().map(DomainMessage::kind_str).collect();
        assert_eq!(kinds, vec!["signal", "parse_error", "cancel"]);
    }

    #[test]
    fn snapshot_preserves_duplicate_keys() {
        let body = r#"{"SG_MSG":{"obj_id":"S1"}}{"SG_MSG":{"obj_id":"S2"}}{"SG_MSG":{"obj_id":"S3"}}"#;
        let batch = decode_snapshot(body);
        assert_eq!(batch.len(), 3);
        let ids: Vec<Option<&str>> = batch
            .iter()
            .map(|m| m.field("obj_id").and_then(Value::as_str))
            .collect();
        assert_eq!(ids, vec![Some("S1"), Some("S2"), Some("S3")]);
    }

    #[test]
    fn snapshot_of_single_document_equals_decode_one() {
        let body = r#"{"train_delay":{"headcode":"1A40","delay":"120","time":"3600"}}"#;
        assert_eq!(decode_snapshot(body), vec![decode_one(body)]);
    }
}
