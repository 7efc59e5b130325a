//! Payload normalization.
//!
//! Form forwarders are inconsistent about how they deliver fields, so the
//! normalizer gathers candidates from every place they have been seen and
//! merges them in a fixed order (later sources win):
//!
//! 1. The body, parsed according to its declared content type
//! 2. A JSON object double-encoded in a `form_data` body field
//! 3. The query string
//! 4. URL-encoded pairs smuggled into header values
//!
//! Aliases (`Name`, `email_address`, `msg`, ...) are resolved last. Nothing
//! in here fails: an unreadable source simply contributes no fields.

use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::types::{CandidateFieldSet, RawInboundPayload, REQUIRED_FIELDS};

/// Body field carrying a JSON-encoded copy of the form.
pub const FORM_DATA_FIELD: &str = "form_data";

/// Alias lists per canonical field, tried in order.
pub const FIELD_ALIASES: [(&str, &[&str]); 3] = [
    ("name", &["Name", "full_name", "fullname", "form[name]"]),
    ("email", &["Email", "email_address", "form[email]"]),
    (
        "message",
        &["Message", "msg", "comments", "comment", "form[message]"],
    ),
];

/// How the body should be read, decided by the declared content type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyKind {
    Json,
    Form,
}

/// Fields read out of the body.
#[derive(Debug, Default)]
struct BodyFields {
    keys: Vec<String>,
    pairs: Vec<(String, String)>,
    form_data: Option<String>,
}

/// Extract a candidate field set from a raw request.
pub fn normalize(raw: &RawInboundPayload) -> CandidateFieldSet {
    let mut fields = CandidateFieldSet::new();
    fields.content_type = raw.content_type.clone();

    let body = read_body(raw);
    fields.body_keys = body.keys;
    fields.merge(body.pairs);

    if let Some(encoded) = body.form_data.as_deref() {
        fields.merge(parse_form_data(encoded));
    }

    fields.query_keys = raw.query.iter().map(|(k, _)| k.clone()).collect();
    fields.merge(raw.query.iter().cloned());

    for (header_name, value) in &raw.headers {
        if let Some(pairs) = header_pairs(value) {
            warn!(
                header = %header_name,
                keys = ?pairs.iter().map(|(k, _)| k.as_str()).collect::<Vec<_>>(),
                "header_fields_recovered"
            );
            fields.merge(pairs);
        }
    }

    resolve_aliases(&mut fields);

    debug!(
        field_count = fields.len(),
        body_keys = ?fields.body_keys,
        query_keys = ?fields.query_keys,
        "payload_normalized"
    );

    fields
}

/// Copy the first non-blank alias into each missing or blank canonical field.
pub fn resolve_aliases(fields: &mut CandidateFieldSet) {
    for (canonical, aliases) in FIELD_ALIASES {
        if fields.get_non_blank(canonical).is_some() {
            continue;
        }

        let found = aliases
            .iter()
            .find_map(|alias| fields.get_non_blank(alias).map(|v| (*alias, v.to_string())));

        if let Some((alias, value)) = found {
            debug!(field = canonical, alias = alias, "field_alias_resolved");
            fields.insert(canonical, value);
        }
    }
}

fn body_kind(content_type: Option<&str>) -> Option<BodyKind> {
    let essence = content_type?.split(';').next()?.trim().to_ascii_lowercase();

    match essence.as_str() {
        "application/json" => Some(BodyKind::Json),
        "application/x-www-form-urlencoded" => Some(BodyKind::Form),
        other if other.ends_with("+json") => Some(BodyKind::Json),
        _ => None,
    }
}

fn read_body(raw: &RawInboundPayload) -> BodyFields {
    if raw.body.is_empty() {
        return BodyFields::default();
    }

    match body_kind(raw.content_type.as_deref()) {
        Some(BodyKind::Json) => match serde_json::from_slice::<Value>(&raw.body) {
            Ok(Value::Object(object)) => json_body_fields(object),
            Ok(_) => {
                debug!("json_body_not_an_object");
                BodyFields::default()
            }
            Err(e) => {
                debug!(error = %e, body_length = raw.body.len(), "json_body_parse_failed");
                BodyFields::default()
            }
        },
        Some(BodyKind::Form) => {
            let pairs: Vec<(String, String)> = url::form_urlencoded::parse(&raw.body)
                .into_owned()
                .collect();
            let form_data = pairs
                .iter()
                .rev()
                .find(|(k, _)| k == FORM_DATA_FIELD)
                .map(|(_, v)| v.clone());

            BodyFields {
                keys: pairs.iter().map(|(k, _)| k.clone()).collect(),
                pairs,
                form_data,
            }
        }
        None => {
            debug!(
                content_type = ?raw.content_type,
                body_length = raw.body.len(),
                "body_ignored_for_content_type"
            );
            BodyFields::default()
        }
    }
}

fn json_body_fields(object: Map<String, Value>) -> BodyFields {
    let form_data = match object.get(FORM_DATA_FIELD) {
        Some(Value::String(s)) => Some(s.clone()),
        _ => None,
    };

    BodyFields {
        keys: object.keys().cloned().collect(),
        pairs: scalar_pairs(object),
        form_data,
    }
}

/// Keep string, number and boolean members; drop null, arrays and objects.
fn scalar_pairs(object: Map<String, Value>) -> Vec<(String, String)> {
    object
        .into_iter()
        .filter_map(|(key, value)| match value {
            Value::String(s) => Some((key, s)),
            Value::Number(n) => Some((key, n.to_string())),
            Value::Bool(b) => Some((key, b.to_string())),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        })
        .collect()
}

fn parse_form_data(encoded: &str) -> Vec<(String, String)> {
    match serde_json::from_str::<Value>(encoded) {
        Ok(Value::Object(object)) => scalar_pairs(object),
        Ok(_) => {
            debug!("form_data_not_an_object");
            Vec::new()
        }
        Err(e) => {
            debug!(error = %e, "form_data_parse_failed");
            Vec::new()
        }
    }
}

/// Parse a header value as URL-encoded pairs, keeping them only when they
/// carry one of the canonical fields.
///
/// Any client can set arbitrary headers, so this path is kept for
/// compatibility with existing senders and logged whenever it contributes.
fn header_pairs(value: &str) -> Option<Vec<(String, String)>> {
    if !value.contains('=') {
        return None;
    }

    let pairs: Vec<(String, String)> = url::form_urlencoded::parse(value.as_bytes())
        .into_owned()
        .collect();

    pairs
        .iter()
        .any(|(k, _)| REQUIRED_FIELDS.contains(&k.as_str()))
        .then_some(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Bytes;
    use proptest::prelude::*;
    use std::collections::BTreeMap;

    fn json_payload(body: &str) -> RawInboundPayload {
        RawInboundPayload {
            content_type: Some("application/json".to_string()),
            body: Bytes::from(body.to_string()),
            ..Default::default()
        }
    }

    fn owned(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_json_body_taken_verbatim() {
        let raw = json_payload(r#"{"name":"Ann","email":"ann@example.com","message":"Hello"}"#);

        let fields = normalize(&raw);

        let expected: BTreeMap<String, String> = owned(&[
            ("email", "ann@example.com"),
            ("message", "Hello"),
            ("name", "Ann"),
        ])
        .into_iter()
        .collect();
        assert_eq!(fields.fields(), &expected);
        assert_eq!(fields.body_keys.len(), 3);
    }

    proptest! {
        #[test]
        fn prop_json_triple_taken_verbatim(
            name in prop_oneof![Just(String::new()), Just("  ".to_string()), "\\PC{0,20}"],
            email in prop_oneof![Just(String::new()), Just("\t".to_string()), "\\PC{0,20}"],
            message in prop_oneof![Just(String::new()), Just(" ".to_string()), "\\PC{0,20}"],
        ) {
            let body = serde_json::json!({ "name": &name, "email": &email, "message": &message });
            let raw = json_payload(&body.to_string());

            let fields = normalize(&raw);

            let expected: BTreeMap<String, String> = [
                ("name".to_string(), name),
                ("email".to_string(), email),
                ("message".to_string(), message),
            ]
            .into_iter()
            .collect();
            prop_assert_eq!(fields.fields(), &expected);
        }
    }

    #[test]
    fn test_json_content_type_with_charset() {
        let mut raw = json_payload(r#"{"name":"Ann"}"#);
        raw.content_type = Some("Application/JSON; charset=utf-8".to_string());

        assert_eq!(normalize(&raw).get("name"), Some("Ann"));
    }

    #[test]
    fn test_urlencoded_body() {
        let raw = RawInboundPayload {
            content_type: Some("application/x-www-form-urlencoded".to_string()),
            body: Bytes::from_static(b"name=Ann+Lee&email=ann%40example.com&message=Hi%21"),
            ..Default::default()
        };

        let fields = normalize(&raw);

        assert_eq!(fields.get("name"), Some("Ann Lee"));
        assert_eq!(fields.get("email"), Some("ann@example.com"));
        assert_eq!(fields.get("message"), Some("Hi!"));
    }

    #[test]
    fn test_query_recovers_fields_from_empty_body() {
        let raw = RawInboundPayload {
            query: owned(&[("name", "A"), ("email", "a@b.com"), ("message", "Hi")]),
            ..json_payload("{}")
        };

        let fields = normalize(&raw);

        assert_eq!(fields.get("name"), Some("A"));
        assert_eq!(fields.get("email"), Some("a@b.com"));
        assert_eq!(fields.get("message"), Some("Hi"));
        assert_eq!(fields.query_keys, vec!["name", "email", "message"]);
        assert!(fields.body_keys.is_empty());
    }

    #[test]
    fn test_aliases_resolved() {
        let raw = json_payload(r#"{"Name":"A","email_address":"a@b.com","msg":"Hi"}"#);

        let fields = normalize(&raw);

        assert_eq!(fields.get("name"), Some("A"));
        assert_eq!(fields.get("email"), Some("a@b.com"));
        assert_eq!(fields.get("message"), Some("Hi"));
    }

    #[test]
    fn test_alias_order_and_blank_skipped() {
        let raw = json_payload(
            r#"{"Name":"  ","full_name":"Full","fullname":"Later","comments":"c1","comment":"c2"}"#,
        );

        let fields = normalize(&raw);

        assert_eq!(fields.get("name"), Some("Full"));
        assert_eq!(fields.get("message"), Some("c1"));
        assert!(fields.get("email").is_none());
    }

    #[test]
    fn test_blank_canonical_replaced_by_alias() {
        let raw = json_payload(r#"{"name":"","Name":"Ann"}"#);
        assert_eq!(normalize(&raw).get("name"), Some("Ann"));
    }

    #[test]
    fn test_bracketed_form_aliases() {
        let raw = RawInboundPayload {
            content_type: Some("application/x-www-form-urlencoded".to_string()),
            body: Bytes::from_static(
                b"form%5Bname%5D=Ann&form%5Bemail%5D=a%40b.com&form%5Bmessage%5D=Yo",
            ),
            ..Default::default()
        };

        let fields = normalize(&raw);

        assert_eq!(fields.get("name"), Some("Ann"));
        assert_eq!(fields.get("email"), Some("a@b.com"));
        assert_eq!(fields.get("message"), Some("Yo"));
    }

    #[test]
    fn test_form_data_double_encoded() {
        let raw = json_payload(
            r#"{"form_data":"{\"name\":\"Ann\",\"email\":\"a@b.com\",\"message\":\"Hi\"}"}"#,
        );

        let fields = normalize(&raw);

        assert_eq!(fields.get("name"), Some("Ann"));
        assert_eq!(fields.get("message"), Some("Hi"));
    }

    #[test]
    fn test_form_data_overrides_body() {
        let raw = json_payload(r#"{"name":"Outer","form_data":"{\"name\":\"Inner\"}"}"#);
        assert_eq!(normalize(&raw).get("name"), Some("Inner"));
    }

    #[test]
    fn test_form_data_in_urlencoded_body() {
        let raw = RawInboundPayload {
            content_type: Some("application/x-www-form-urlencoded".to_string()),
            body: Bytes::from_static(b"form_data=%7B%22email%22%3A%22a%40b.com%22%7D"),
            ..Default::default()
        };

        assert_eq!(normalize(&raw).get("email"), Some("a@b.com"));
    }

    #[test]
    fn test_malformed_form_data_ignored() {
        let raw = json_payload(r#"{"name":"Ann","form_data":"{not json"}"#);

        let fields = normalize(&raw);

        assert_eq!(fields.get("name"), Some("Ann"));
        assert_eq!(fields.get("form_data"), Some("{not json"));
    }

    #[test]
    fn test_query_overrides_body() {
        let raw = RawInboundPayload {
            query: owned(&[("name", "FromQuery")]),
            ..json_payload(r#"{"name":"FromBody"}"#)
        };

        assert_eq!(normalize(&raw).get("name"), Some("FromQuery"));
    }

    #[test]
    fn test_header_pairs_merged_when_canonical() {
        let raw = RawInboundPayload {
            headers: owned(&[
                ("x-form", "name=Ann&email=a%40b.com&extra=1"),
                ("x-other", "foo=bar"),
                ("accept", "*/*"),
            ]),
            ..Default::default()
        };

        let fields = normalize(&raw);

        assert_eq!(fields.get("name"), Some("Ann"));
        assert_eq!(fields.get("email"), Some("a@b.com"));
        assert_eq!(fields.get("extra"), Some("1"));
        assert!(fields.get("foo").is_none());
    }

    #[test]
    fn test_headers_override_query() {
        let raw = RawInboundPayload {
            query: owned(&[("message", "query")]),
            headers: owned(&[("x-form", "message=header")]),
            ..Default::default()
        };

        assert_eq!(normalize(&raw).get("message"), Some("header"));
    }

    #[test]
    fn test_malformed_json_contributes_nothing() {
        let raw = RawInboundPayload {
            query: owned(&[("name", "Ann")]),
            ..json_payload("{\"name\": ")
        };

        let fields = normalize(&raw);

        assert_eq!(fields.get("name"), Some("Ann"));
        assert!(fields.body_keys.is_empty());
    }

    #[test]
    fn test_json_array_body_ignored() {
        let fields = normalize(&json_payload(r#"[{"name":"Ann"}]"#));
        assert!(fields.is_empty());
    }

    #[test]
    fn test_missing_content_type_ignores_body() {
        let raw = RawInboundPayload {
            content_type: None,
            body: Bytes::from_static(br#"{"name":"Ann"}"#),
            ..Default::default()
        };

        let fields = normalize(&raw);

        assert!(fields.is_empty());
        assert!(fields.body_keys.is_empty());
    }

    #[test]
    fn test_non_string_scalars_stringified() {
        let raw = json_payload(r#"{"name":42,"email":true,"message":null,"tags":["a"]}"#);

        let fields = normalize(&raw);

        assert_eq!(fields.get("name"), Some("42"));
        assert_eq!(fields.get("email"), Some("true"));
        assert!(!fields.contains_key("message"));
        assert!(!fields.contains_key("tags"));
        assert_eq!(fields.body_keys.len(), 4);
    }

    #[test]
    fn test_body_kind() {
        assert_eq!(body_kind(Some("application/json")), Some(BodyKind::Json));
        assert_eq!(
            body_kind(Some("application/vnd.api+json")),
            Some(BodyKind::Json)
        );
        assert_eq!(
            body_kind(Some("application/x-www-form-urlencoded; charset=UTF-8")),
            Some(BodyKind::Form)
        );
        assert_eq!(body_kind(Some("text/plain")), None);
        assert_eq!(body_kind(None), None);
    }
}
