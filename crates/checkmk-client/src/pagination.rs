//! Collection walking.
//!
//! Checkmk collection responses look like
//! `{"value": [...], "links": {"next": "<url>"}}` (newer releases emit
//! `links` as an array of `{"rel": "next", "href": ...}` objects instead).
//! [`CheckmkClient::collect_all`] follows `next` until it disappears and
//! concatenates every page in order.

use serde_json::Value;
use tracing::debug;

use crate::credentials::Credentials;
use crate::error::Result;
use crate::request::{CheckmkClient, RequestSpec};

/// The items of one page.
///
/// Reads `value` when it is an array, takes the body itself when it is an
/// array, and otherwise treats the whole body as a single item.  A `Null`
/// body (no content) contributes nothing.
pub fn page_items(body: Value) -> Vec<Value> {
    match body {
        Value::Null => Vec::new(),
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("value") {
            Some(Value::Array(items)) => items,
            Some(other) => {
                map.insert("value".to_string(), other);
                vec![Value::Object(map)]
            }
            None => vec![Value::Object(map)],
        },
        other => vec![other],
    }
}

/// The `next` link of a page, if it has one.
pub fn next_link(body: &Value) -> Option<String> {
    let links = body.get("links")?;
    let href = match links {
        Value::Object(map) => map.get("next").and_then(Value::as_str),
        Value::Array(entries) => entries
            .iter()
            .find(|entry| entry.get("rel").and_then(Value::as_str) == Some("next"))
            .and_then(|entry| entry.get("href"))
            .and_then(Value::as_str),
        _ => None,
    }?;
    let href = href.trim();
    (!href.is_empty()).then(|| href.to_string())
}

impl CheckmkClient {
    /// Fetch every page of a collection and return the concatenated items.
    ///
    /// The first request is `spec` as given; each following request reuses
    /// its method and headers with the `next` link as the path and no
    /// query parameters (the link already carries them).  The walk ends
    /// only when a page has no `next` link.
    pub async fn collect_all(&self, credentials: &Credentials, spec: RequestSpec) -> Result<Vec<Value>> {
        let mut items = Vec::new();
        let mut current = spec;
        let mut pages = 0usize;

        loop {
            let template = current.clone();
            let body = self.request(credentials, current).await?;
            pages += 1;

            let next = next_link(&body);
            let page = page_items(body);
            debug!(
                path = %template.path,
                page = pages,
                items = page.len(),
                has_next = next.is_some(),
                "fetched collection page"
            );
            items.extend(page);

            match next {
                Some(link) => {
                    current = RequestSpec {
                        path: link,
                        query: Vec::new(),
                        ..template
                    };
                }
                None => break,
            }
        }

        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::testing::MockTransport;

    fn creds() -> Credentials {
        Credentials::new("https://cmk", "site", "u", "p")
    }

    #[test]
    fn items_come_from_value_array() {
        assert_eq!(
            page_items(json!({"value": [{"id": 1}, {"id": 2}]})),
            vec![json!({"id": 1}), json!({"id": 2})]
        );
    }

    #[test]
    fn bare_array_and_single_object_pages() {
        assert_eq!(page_items(json!([1, 2])), vec![json!(1), json!(2)]);
        assert_eq!(page_items(json!({"id": "x"})), vec![json!({"id": "x"})]);
        assert!(page_items(Value::Null).is_empty());
    }

    #[test]
    fn next_link_from_object_and_array_forms() {
        assert_eq!(
            next_link(&json!({"links": {"next": "/p2"}})),
            Some("/p2".to_string())
        );
        assert_eq!(
            next_link(&json!({"links": [
                {"rel": "self", "href": "/p1"},
                {"rel": "next", "href": "/p2"}
            ]})),
            Some("/p2".to_string())
        );
        assert_eq!(next_link(&json!({"links": {"self": "/p1"}})), None);
        assert_eq!(next_link(&json!({"links": {"next": ""}})), None);
        assert_eq!(next_link(&json!({"value": []})), None);
    }

    #[tokio::test]
    async fn follows_next_links_in_order() {
        let mock = Arc::new(MockTransport::new());
        mock.push_json(200, json!({"value": [1, 2], "links": {"next": "/page/2"}}));
        mock.push_json(200, json!({"value": [3], "links": {}}));

        let items = CheckmkClient::new(mock.clone())
            .collect_all(
                &creds(),
                RequestSpec::get("/domain-types/host_config/collections/all")
                    .with_query("effective_attributes", "true"),
            )
            .await
            .unwrap();

        assert_eq!(items, vec![json!(1), json!(2), json!(3)]);
        let sent = mock.requests();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].query.len(), 1);
        assert_eq!(sent[1].url, "https://cmk/site/check_mk/api/1.0/page/2");
        assert!(sent[1].query.is_empty());
    }

    #[tokio::test]
    async fn page_error_aborts_the_walk() {
        let mock = Arc::new(MockTransport::new());
        mock.push_json(200, json!({"value": [1], "links": {"next": "/page/2"}}));
        mock.push_json(500, json!({"title": "Internal Server Error"}));

        let err = CheckmkClient::new(mock)
            .collect_all(&creds(), RequestSpec::get("/page/1"))
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(500));
    }

    #[tokio::test]
    async fn repeated_next_link_is_followed_to_the_end() {
        let mock = Arc::new(MockTransport::new());
        let next = json!({"next": "/domain-types/event/collections/all"});
        mock.push_json(200, json!({"value": [1, 2], "links": next.clone()}));
        mock.push_json(200, json!({"value": [3, 4], "links": next}));
        mock.push_json(200, json!({"value": [5]}));

        let items = CheckmkClient::new(mock.clone())
            .collect_all(
                &creds(),
                RequestSpec::get("/domain-types/event/collections/all"),
            )
            .await
            .unwrap();
        assert_eq!(items, vec![json!(1), json!(2), json!(3), json!(4), json!(5)]);
        assert_eq!(mock.request_count(), 3);
        assert_eq!(mock.pending(), 0);
    }

    #[tokio::test]
    async fn next_link_to_another_host_fails_the_walk() {
        let mock = Arc::new(MockTransport::new());
        mock.push_json(
            200,
            json!({"value": [1], "links": {"next": "https://elsewhere.example.net/page/2"}}),
        );

        let err = CheckmkClient::new(mock.clone())
            .collect_all(&creds(), RequestSpec::get("/page/1"))
            .await
            .unwrap_err();
        assert!(matches!(err, crate::error::ClientError::InvalidResponse { .. }));
        assert_eq!(mock.request_count(), 1);
    }
}
