use crate::utils::error::{HubError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Parses an RFC 8288 `Link` header such as
/// `<https://h/issues?page=2>; rel="next", <https://h/issues?page=5>; rel="last"`.
///
/// URLs are read from between `<` and `>`, so commas inside a query string
/// stay part of the URL. A link's parameters end at the next `,`. Links
/// without a `rel` parameter are skipped.
pub fn parse_link_header(value: &str) -> HashMap<String, String> {
    let mut links = HashMap::new();
    let mut rest = value;

    while let Some(open) = rest.find('<') {
        let after = &rest[open + 1..];
        let Some(close) = after.find('>') else {
            break;
        };
        let url = &after[..close];

        let tail = &after[close + 1..];
        let (params, next) = match tail.find(',') {
            Some(comma) => (&tail[..comma], &tail[comma + 1..]),
            None => (tail, ""),
        };
        rest = next;

        let rel = params.split(';').map(str::trim).find_map(|param| {
            param
                .strip_prefix("rel=\"")
                .and_then(|r| r.strip_suffix('"'))
        });
        if let Some(rel) = rel {
            links.insert(rel.to_string(), url.trim().to_string());
        }
    }

    links
}

/// The `pagination` block Aha! attaches to list responses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AhaPage {
    pub total_records: u64,
    pub total_pages: u64,
    pub current_page: u64,
}

impl AhaPage {
    pub fn has_next(&self) -> bool {
        self.current_page < self.total_pages
    }
}

/// Splits an Aha! response body into its page info and payload.
///
/// List responses look like `{"features": [...], "pagination": {...}}`; the
/// payload is the value of the non-`pagination` key. Bodies without a
/// `pagination` key are returned whole.
pub fn split_envelope(body: &[u8]) -> Result<(Option<AhaPage>, serde_json::Value)> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok((None, serde_json::Value::Null));
    }

    let value: serde_json::Value = serde_json::from_slice(body)?;
    let serde_json::Value::Object(mut map) = value else {
        return Ok((None, value));
    };

    let Some(info) = map.remove("pagination") else {
        return Ok((None, serde_json::Value::Object(map)));
    };

    let page: AhaPage = serde_json::from_value(info)?;
    let payload = map
        .into_iter()
        .next()
        .map(|(_, v)| v)
        .unwrap_or(serde_json::Value::Null);

    Ok((Some(page), payload))
}

/// Unwraps a single-resource body such as `{"feature": {...}}`.
pub fn unwrap_envelope<T: DeserializeOwned>(body: &[u8], key: &str) -> Result<T> {
    let mut value: serde_json::Value = serde_json::from_slice(body)?;
    let inner = value
        .get_mut(key)
        .map(serde_json::Value::take)
        .ok_or_else(|| HubError::UnexpectedValue {
            field: key.to_string(),
            message: "missing from response".to_string(),
        })?;
    Ok(serde_json::from_value(inner)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_link_header_next_and_last() {
        let header = r#"<https://ghe.example.com/api/v3/repositories/1/issues?page=2>; rel="next", <https://ghe.example.com/api/v3/repositories/1/issues?page=4>; rel="last""#;
        let links = parse_link_header(header);

        assert_eq!(links.len(), 2);
        assert_eq!(
            links.get("next").unwrap(),
            "https://ghe.example.com/api/v3/repositories/1/issues?page=2"
        );
        assert_eq!(
            links.get("last").unwrap(),
            "https://ghe.example.com/api/v3/repositories/1/issues?page=4"
        );
    }

    #[test]
    fn test_parse_link_header_skips_malformed_parts() {
        let links = parse_link_header(r#"garbage, <https://h/x>; rel="prev", https://h/y; rel="next""#);
        assert_eq!(links.len(), 1);
        assert_eq!(links.get("prev").unwrap(), "https://h/x");
    }

    #[test]
    fn test_parse_link_header_keeps_commas_inside_urls() {
        let header = r#"<https://h/repos/acme/api/issues?labels=bug,ui&page=2>; rel="next", <https://h/repos/acme/api/issues?labels=bug,ui&page=3>; rel="last""#;
        let links = parse_link_header(header);

        assert_eq!(
            links.get("next").unwrap(),
            "https://h/repos/acme/api/issues?labels=bug,ui&page=2"
        );
        assert_eq!(
            links.get("last").unwrap(),
            "https://h/repos/acme/api/issues?labels=bug,ui&page=3"
        );
    }

    #[test]
    fn test_parse_link_header_extra_params() {
        let links = parse_link_header(r#"<https://h/x?page=2>; title="more"; rel="next""#);
        assert_eq!(links.get("next").unwrap(), "https://h/x?page=2");
        assert!(parse_link_header("").is_empty());
        assert!(parse_link_header("<https://h/x?page=2").is_empty());
    }

    #[test]
    fn test_split_envelope_with_pagination() {
        let body = r#"{"features":[{"id":"1"}],"pagination":{"total_records":3,"total_pages":2,"current_page":1}}"#;
        let (page, payload) = split_envelope(body.as_bytes()).unwrap();

        let page = page.unwrap();
        assert_eq!(page.total_pages, 2);
        assert!(page.has_next());
        assert_eq!(payload, serde_json::json!([{"id": "1"}]));
    }

    #[test]
    fn test_split_envelope_without_pagination() {
        let body = r#"{"feature":{"id":"1"}}"#;
        let (page, payload) = split_envelope(body.as_bytes()).unwrap();
        assert!(page.is_none());
        assert_eq!(payload, serde_json::json!({"feature": {"id": "1"}}));
    }

    #[test]
    fn test_last_page_has_no_next() {
        let page = AhaPage {
            total_records: 0,
            total_pages: 0,
            current_page: 1,
        };
        assert!(!page.has_next());
    }

    #[test]
    fn test_unwrap_envelope_missing_key() {
        #[derive(Deserialize)]
        struct Thing {
            #[allow(dead_code)]
            id: String,
        }
        let err = unwrap_envelope::<Thing>(br#"{"other":{}}"#, "thing").err().unwrap();
        assert!(matches!(err, HubError::UnexpectedValue { .. }));
    }
}
