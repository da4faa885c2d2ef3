//! Page references given on the command line.

use crate::error::ConfluenceError;

/// Resolve a page ID or page URL to a page ID.
///
/// Accepts a bare numeric ID, a URL with a `pageId=N` query parameter
/// (`/pages/viewpage.action?pageId=N`), or a URL whose path contains
/// `/pages/N` (`/spaces/DOCS/pages/N/Title`).
///
/// # Errors
///
/// Returns [`ConfluenceError::InvalidPageRef`] if no ID can be found.
pub fn parse_page_ref(reference: &str) -> Result<String, ConfluenceError> {
    let reference = reference.trim();
    if is_page_id(reference) {
        return Ok(reference.to_owned());
    }

    let without_fragment = reference.split('#').next().unwrap_or_default();
    let (path, query) = without_fragment
        .split_once('?')
        .unwrap_or((without_fragment, ""));

    let from_query = query
        .split('&')
        .filter_map(|pair| pair.strip_prefix("pageId="))
        .find(|id| is_page_id(id));
    if let Some(id) = from_query {
        return Ok(id.to_owned());
    }

    let segments: Vec<&str> = path.split('/').collect();
    if let Some(index) = segments.iter().position(|s| *s == "pages")
        && let Some(id) = segments.get(index + 1).filter(|id| is_page_id(id))
    {
        return Ok((*id).to_owned());
    }

    Err(ConfluenceError::InvalidPageRef(reference.to_owned()))
}

fn is_page_id(text: &str) -> bool {
    !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_bare_id() {
        assert_eq!(parse_page_ref(" 123456 ").unwrap(), "123456");
    }

    #[test]
    fn test_viewpage_url() {
        assert_eq!(
            parse_page_ref("https://wiki.example.com/pages/viewpage.action?spaceKey=DOCS&pageId=42")
                .unwrap(),
            "42"
        );
    }

    #[test]
    fn test_cloud_style_path() {
        assert_eq!(
            parse_page_ref("https://x.atlassian.net/wiki/spaces/DOCS/pages/98765/Getting+Started")
                .unwrap(),
            "98765"
        );
    }

    #[test]
    fn test_viewpage_without_id_is_invalid() {
        assert!(matches!(
            parse_page_ref("https://wiki.example.com/pages/viewpage.action?title=Home"),
            Err(ConfluenceError::InvalidPageRef(_))
        ));
    }

    #[test]
    fn test_garbage_is_invalid() {
        assert!(matches!(
            parse_page_ref("not a page"),
            Err(ConfluenceError::InvalidPageRef(r)) if r == "not a page"
        ));
        assert!(parse_page_ref("").is_err());
    }
}
