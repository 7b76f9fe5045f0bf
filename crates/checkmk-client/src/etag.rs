//! Entity tags and the tag-reading request.

use std::fmt;

use serde_json::Value;

use crate::credentials::Credentials;
use crate::error::Result;
use crate::request::{CheckmkClient, RequestSpec};

/// Normalize a raw `ETag` header value.
///
/// Strips a weak-validator prefix (`W/`), surrounding double quotes and
/// whitespace.  `"abc123"`, `W/"abc123"` and `abc123` all become `abc123`.
pub fn normalize_etag(raw: &str) -> String {
    let mut tag = raw.trim();
    if let Some(rest) = tag.strip_prefix("W/").or_else(|| tag.strip_prefix("w/")) {
        tag = rest.trim();
    }
    tag.trim_matches('"').trim().to_string()
}

/// A non-empty, normalized entity tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityTag(String);

impl EntityTag {
    /// Normalize `raw`; `None` when nothing is left.
    pub fn parse(raw: &str) -> Option<Self> {
        let tag = normalize_etag(raw);
        (!tag.is_empty()).then_some(Self(tag))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The value to send as `If-Match`: the tag wrapped in double quotes.
    pub fn if_match(&self) -> String {
        format!("\"{}\"", self.0)
    }
}

impl fmt::Display for EntityTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A response body together with the tag the server sent for it.
#[derive(Debug, Clone, PartialEq)]
pub struct Tagged {
    pub body: Value,
    /// Normalized tag; empty when the server sent none.  Empty means "no
    /// tag available", never a valid tag.
    pub etag: String,
}

impl Tagged {
    pub fn entity_tag(&self) -> Option<EntityTag> {
        EntityTag::parse(&self.etag)
    }

    pub fn has_tag(&self) -> bool {
        !self.etag.is_empty()
    }
}

impl CheckmkClient {
    /// Send a request and return its body along with the normalized `ETag`
    /// response header.
    pub async fn read_with_tag(&self, credentials: &Credentials, spec: RequestSpec) -> Result<Tagged> {
        let response = self.execute(credentials, spec).await?;
        let etag = response
            .headers
            .get("etag")
            .map(normalize_etag)
            .unwrap_or_default();
        Ok(Tagged {
            body: response.body,
            etag,
        })
    }
}
