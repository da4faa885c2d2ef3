//! Macro preservation for interactive edits.
//!
//! Confluence elements with no Markdown counterpart are swapped for
//! `[[CONFLUENCE-MACRO-n]]` placeholders before editing. Their original
//! markup travels with the Markdown in a base64 JSON comment block and is
//! substituted back after the edited text is converted to storage format.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use regex::Regex;

use crate::error::ConvertError;
use crate::markdown::{PLACEHOLDER_TAG, render_markdown};
use crate::parser::parse_fragment;
use crate::serializer::serialize_element;
use crate::tree::TreeNode;

/// Opening line of the embedded macro block.
pub const MACRO_BLOCK_START: &str = "<!-- CONFLUENCE_MACROS_START";

/// Closing line of the embedded macro block.
pub const MACRO_BLOCK_END: &str = "CONFLUENCE_MACROS_END -->";

static MACRO_BLOCK_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\s*<!-- CONFLUENCE_MACROS_START\r?\n(.*?)\r?\nCONFLUENCE_MACROS_END -->\r?\n?")
        .expect("invalid macro block regex")
});

/// Placeholder to original storage markup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MacroMap {
    entries: BTreeMap<String, String>,
}

impl MacroMap {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    fn get(&self, placeholder: &str) -> Option<&str> {
        self.entries.get(placeholder).map(String::as_str)
    }

    /// Store markup under the next placeholder and return the placeholder.
    fn insert(&mut self, markup: String) -> String {
        let placeholder = format!("[[CONFLUENCE-MACRO-{}]]", self.entries.len() + 1);
        self.entries.insert(placeholder.clone(), markup);
        placeholder
    }

    /// Encode as base64 of the JSON object.
    #[must_use]
    pub fn encode(&self) -> String {
        STANDARD.encode(serde_json::to_vec(&self.entries).unwrap_or_default())
    }

    /// Decode a block produced by [`MacroMap::encode`].
    ///
    /// # Errors
    ///
    /// Returns [`ConvertError::MacroBlock`] if the text is not base64 of a
    /// JSON string map.
    pub fn decode(encoded: &str) -> Result<Self, ConvertError> {
        let payload = STANDARD
            .decode(encoded.trim())
            .map_err(|e| ConvertError::MacroBlock(e.to_string()))?;
        let entries = serde_json::from_slice(&payload)
            .map_err(|e| ConvertError::MacroBlock(e.to_string()))?;
        Ok(Self { entries })
    }
}

/// Convert storage format to Markdown, replacing Confluence elements with
/// placeholders.
///
/// The outermost `ac:` elements are preserved. Code macros are not, since
/// they map to fenced code blocks.
///
/// # Errors
///
/// Returns [`ConvertError`] if the markup cannot be parsed.
pub fn to_markdown_preserving_macros(html: &str) -> Result<(String, MacroMap), ConvertError> {
    let mut tree = parse_fragment(html)?;
    let mut macros = MacroMap::default();
    replace_macros(&mut tree, &mut macros);

    if !macros.is_empty() {
        tracing::debug!(count = macros.len(), "Preserved Confluence macros");
    }

    Ok((render_markdown(&tree), macros))
}

fn replace_macros(node: &mut TreeNode, macros: &mut MacroMap) {
    for child in &mut node.children {
        if !child.is_confluence_element() {
            replace_macros(child, macros);
        } else if !is_code_macro(child) {
            let placeholder = macros.insert(serialize_element(child));
            let mut replacement = TreeNode::new(PLACEHOLDER_TAG);
            replacement.text = placeholder;
            replacement.tail = std::mem::take(&mut child.tail);
            *child = replacement;
        }
    }
}

fn is_code_macro(node: &TreeNode) -> bool {
    node.tag == "ac:structured-macro" && node.attr("ac:name") == Some("code")
}

/// Substitute placeholders in converted storage markup with the original
/// macro markup.
///
/// A placeholder that forms a whole paragraph replaces the paragraph.
#[must_use]
pub fn restore_macros(html: &str, macros: &MacroMap) -> String {
    let mut restored = html.to_owned();
    for (placeholder, markup) in &macros.entries {
        restored = restored.replace(&format!("<p>{placeholder}</p>"), markup);
        restored = restored.replace(placeholder.as_str(), markup);
    }
    restored
}

/// Append the encoded macro block to Markdown. Empty maps add nothing.
#[must_use]
pub fn embed_macro_block(markdown: &str, macros: &MacroMap) -> String {
    if macros.is_empty() {
        return markdown.to_owned();
    }
    format!(
        "{}\n\n{MACRO_BLOCK_START}\n{}\n{MACRO_BLOCK_END}\n",
        markdown.trim_end(),
        macros.encode()
    )
}

/// Split the embedded macro block off edited Markdown.
///
/// Content without a block yields an empty map.
///
/// # Errors
///
/// Returns [`ConvertError::MacroBlock`] if a block is present but cannot
/// be decoded.
pub fn extract_macro_block(content: &str) -> Result<(String, MacroMap), ConvertError> {
    let Some(captures) = MACRO_BLOCK_PATTERN.captures(content) else {
        return Ok((content.to_owned(), MacroMap::default()));
    };
    let macros = MacroMap::decode(&captures[1])?;
    let remaining = MACRO_BLOCK_PATTERN.replace(content, "\n").into_owned();
    Ok((remaining, macros))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::to_html;
    use pretty_assertions::assert_eq;

    const TOC: &str = r#"<ac:structured-macro ac:name="toc" />"#;

    #[test]
    fn test_macros_replaced_with_numbered_placeholders() {
        let html = format!(
            concat!(
                "<p>Intro</p>{}",
                r#"<p>See <ac:link><ri:page ri:content-title="Setup" /></ac:link> now</p>"#
            ),
            TOC
        );
        let (markdown, macros) = to_markdown_preserving_macros(&html).unwrap();

        assert_eq!(
            markdown,
            "Intro\n\n[[CONFLUENCE-MACRO-1]]\n\nSee [[CONFLUENCE-MACRO-2]] now"
        );
        assert_eq!(macros.len(), 2);
        assert_eq!(macros.get("[[CONFLUENCE-MACRO-1]]"), Some(TOC));
        assert_eq!(
            macros.get("[[CONFLUENCE-MACRO-2]]"),
            Some(r#"<ac:link><ri:page ri:content-title="Setup" /></ac:link>"#)
        );
    }

    #[test]
    fn test_code_macro_stays_editable() {
        let html = concat!(
            r#"<ac:structured-macro ac:name="code">"#,
            "<ac:plain-text-body><![CDATA[ls -la]]></ac:plain-text-body>",
            "</ac:structured-macro>"
        );
        let (markdown, macros) = to_markdown_preserving_macros(html).unwrap();
        assert_eq!(markdown, "```\nls -la\n```");
        assert!(macros.is_empty());
    }

    #[test]
    fn test_restore_after_edit() {
        let html = format!("<p>Intro</p>{TOC}<p>Body</p>");
        let (markdown, macros) = to_markdown_preserving_macros(&html).unwrap();

        let edited = markdown.replace("Body", "New body");
        let restored = restore_macros(&to_html(&edited), &macros);

        assert_eq!(restored, format!("<p>Intro</p>{TOC}<p>New body</p>"));
    }

    #[test]
    fn test_inline_placeholder_restored_in_place() {
        let mut macros = MacroMap::default();
        let placeholder = macros.insert(r#"<ac:emoticon ac:name="tick" />"#.to_owned());
        let restored = restore_macros(&format!("<p>Done {placeholder}</p>"), &macros);
        assert_eq!(restored, r#"<p>Done <ac:emoticon ac:name="tick" /></p>"#);
    }

    #[test]
    fn test_macro_block_embedded_and_extracted() {
        let (markdown, macros) = to_markdown_preserving_macros(&format!("<p>a</p>{TOC}")).unwrap();
        let scratch = embed_macro_block(&markdown, &macros);

        assert!(scratch.contains("<!-- CONFLUENCE_MACROS_START\n"));
        assert!(scratch.ends_with("CONFLUENCE_MACROS_END -->\n"));

        let (content, decoded) = extract_macro_block(&scratch).unwrap();
        assert_eq!(content.trim(), markdown);
        assert_eq!(decoded, macros);
    }

    #[test]
    fn test_content_without_block_has_no_macros() {
        let (content, macros) = extract_macro_block("just text\n").unwrap();
        assert_eq!(content, "just text\n");
        assert!(macros.is_empty());
    }

    #[test]
    fn test_corrupt_block_is_error() {
        let content = "text\n\n<!-- CONFLUENCE_MACROS_START\n%%%\nCONFLUENCE_MACROS_END -->\n";
        assert!(matches!(
            extract_macro_block(content),
            Err(ConvertError::MacroBlock(_))
        ));
    }
}
