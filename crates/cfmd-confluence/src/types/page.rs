//! Confluence page types.

use serde::{Deserialize, Serialize};

/// Confluence page.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Page {
    /// Page ID.
    pub id: String,
    /// Content type (always "page").
    #[serde(rename = "type", default = "page_type")]
    pub content_type: String,
    /// Page title.
    pub title: String,
    /// Owning space.
    #[serde(default)]
    pub space: Option<SpaceRef>,
    /// Version information.
    pub version: Version,
    /// Page body content.
    #[serde(default)]
    pub body: Option<Body>,
    /// Parents from the space root down.
    #[serde(default)]
    pub ancestors: Vec<Ancestor>,
    /// Hypermedia links.
    #[serde(rename = "_links", default)]
    pub links: Option<Links>,
}

fn page_type() -> String {
    "page".to_owned()
}

impl Page {
    /// Storage-format body, empty when not expanded.
    pub fn storage_value(&self) -> &str {
        self.body
            .as_ref()
            .and_then(|b| b.storage.as_ref())
            .map_or("", |s| s.value.as_str())
    }

    /// Space key, if the space was expanded.
    pub fn space_key(&self) -> Option<&str> {
        self.space.as_ref().map(|s| s.key.as_str())
    }

    /// Direct parent page ID.
    pub fn parent_id(&self) -> Option<&str> {
        self.ancestors.last().map(|a| a.id.as_str())
    }
}

/// Page as returned by listing endpoints, without body or version.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PageSummary {
    /// Page ID.
    pub id: String,
    /// Page title.
    pub title: String,
    /// Content type.
    #[serde(rename = "type", default)]
    pub content_type: Option<String>,
    /// Owning space, if expanded.
    #[serde(default)]
    pub space: Option<SpaceRef>,
    /// Version, if expanded.
    #[serde(default)]
    pub version: Option<Version>,
}

/// Space reference embedded in content.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SpaceRef {
    /// Space key.
    pub key: String,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
}

/// Page version.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Version {
    /// Version number.
    pub number: u32,
    /// Last modification timestamp.
    #[serde(default)]
    pub when: Option<String>,
    /// Version message/comment.
    #[serde(default)]
    pub message: Option<String>,
}

/// Page body content.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Body {
    /// Storage format content.
    #[serde(default)]
    pub storage: Option<Storage>,
}

/// Storage format representation.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Storage {
    /// HTML content in Confluence storage format.
    pub value: String,
    /// Content representation (always "storage").
    pub representation: String,
}

/// Ancestor reference.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Ancestor {
    /// Page ID.
    pub id: String,
}

/// Hypermedia links.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Links {
    /// Web UI link.
    #[serde(default)]
    pub webui: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_expanded_page() {
        let page: Page = serde_json::from_str(
            r#"{
                "id": "123",
                "type": "page",
                "title": "Intro",
                "space": {"key": "DOCS", "name": "Docs", "type": "global"},
                "version": {"number": 3, "when": "2026-01-01T00:00:00Z"},
                "body": {"storage": {"value": "<p>Hi</p>", "representation": "storage"}},
                "ancestors": [{"id": "1"}, {"id": "7"}],
                "extensions": {"position": "none"}
            }"#,
        )
        .unwrap();

        assert_eq!(page.version.number, 3);
        assert_eq!(page.storage_value(), "<p>Hi</p>");
        assert_eq!(page.space_key(), Some("DOCS"));
        assert_eq!(page.parent_id(), Some("7"));
    }

    #[test]
    fn test_body_missing_when_not_expanded() {
        let page: Page =
            serde_json::from_str(r#"{"id": "1", "title": "T", "version": {"number": 1}}"#).unwrap();
        assert_eq!(page.storage_value(), "");
        assert_eq!(page.content_type, "page");
        assert_eq!(page.parent_id(), None);
    }
}
