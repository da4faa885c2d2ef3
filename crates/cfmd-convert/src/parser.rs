//! Lenient storage-format parser.
//!
//! Builds a [`TreeNode`] tree from XHTML with `quick-xml`. HTML leniencies
//! seen in real page bodies are tolerated: unclosed void elements (`<br>`),
//! mismatched or stray end tags, named HTML entities and bare ampersands.
//! Only markup that is syntactically broken at the XML level (for example
//! an unterminated tag) is reported as an error.

use std::sync::LazyLock;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use regex::Regex;

use crate::entities::{decode_reference, normalize_entities};
use crate::error::ConvertError;
use crate::tree::TreeNode;

/// Tag of the synthetic root holding the fragment's top-level nodes.
pub(crate) const ROOT_TAG: &str = "#root";

/// Script and style elements, removed before parsing. Their bodies are not
/// XML and must never reach an editable surface.
static RAW_TEXT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<script\b[^>]*>.*?</script\s*>|<style\b[^>]*>.*?</style\s*>")
        .expect("invalid raw text regex")
});

/// Elements that never have content or an end tag in HTML.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Parse a storage-format fragment into a tree rooted at [`ROOT_TAG`].
pub(crate) fn parse_fragment(html: &str) -> Result<TreeNode, ConvertError> {
    let without_scripts = RAW_TEXT_PATTERN.replace_all(html, "");
    let normalized = normalize_entities(&without_scripts);

    let mut reader = Reader::from_str(&normalized);
    let config = reader.config_mut();
    config.trim_text(false);
    config.check_end_names = false;
    config.allow_unmatched_ends = true;

    let mut stack = vec![TreeNode::new(ROOT_TAG)];

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let node = element(&reader, &e);
                if VOID_ELEMENTS.contains(&node.tag.as_str()) {
                    attach(&mut stack, node);
                } else {
                    stack.push(node);
                }
            }
            Event::Empty(e) => {
                let node = element(&reader, &e);
                attach(&mut stack, node);
            }
            Event::End(e) => {
                let name = decode_name(&reader, e.name().as_ref());
                close(&mut stack, &name);
            }
            Event::Text(e) => {
                let text = reader.decoder().decode(&e)?;
                current(&mut stack).append_text(&text);
            }
            Event::GeneralRef(e) => {
                let reference = reader.decoder().decode(&e)?;
                current(&mut stack).append_text(&decode_reference(&reference));
            }
            Event::CData(e) => {
                current(&mut stack).append_text(&String::from_utf8_lossy(&e));
            }
            Event::Eof => break,
            Event::Comment(_) | Event::Decl(_) | Event::PI(_) | Event::DocType(_) => {}
        }
    }

    // Implicitly close anything left open at end of input
    while stack.len() > 1 {
        if let Some(node) = stack.pop() {
            attach(&mut stack, node);
        }
    }

    Ok(stack.pop().unwrap_or_else(|| TreeNode::new(ROOT_TAG)))
}

fn current(stack: &mut [TreeNode]) -> &mut TreeNode {
    let last = stack.len() - 1;
    &mut stack[last]
}

fn attach(stack: &mut [TreeNode], node: TreeNode) {
    current(stack).children.push(node);
}

/// Close the innermost open element named `name`, closing everything
/// opened after it. End tags with no open match are ignored.
fn close(stack: &mut Vec<TreeNode>, name: &str) {
    let Some(index) = stack.iter().skip(1).rposition(|n| n.tag == name) else {
        return;
    };
    let target = index + 1;
    while stack.len() > target {
        if let Some(node) = stack.pop() {
            attach(stack, node);
        }
    }
}

fn element(reader: &Reader<&[u8]>, e: &BytesStart<'_>) -> TreeNode {
    let mut node = TreeNode::new(decode_name(reader, e.name().as_ref()));
    for attr in e.attributes().flatten() {
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        if key.starts_with("xmlns") {
            continue;
        }
        let value = attr.unescape_value().map_or_else(
            |_| String::from_utf8_lossy(&attr.value).into_owned(),
            std::borrow::Cow::into_owned,
        );
        node.attrs.push((key, value));
    }
    node
}

fn decode_name(reader: &Reader<&[u8]>, name: &[u8]) -> String {
    reader
        .decoder()
        .decode(name)
        .map_or_else(
            |_| String::from_utf8_lossy(name).into_owned(),
            std::borrow::Cow::into_owned,
        )
        .to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_nested_with_tails() {
        let tree = parse_fragment("<p><strong>Bold</strong> text</p>").unwrap();
        assert_eq!(tree.tag, ROOT_TAG);

        let p = &tree.children[0];
        assert_eq!(p.tag, "p");
        assert_eq!(p.children[0].tag, "strong");
        assert_eq!(p.children[0].text, "Bold");
        assert_eq!(p.children[0].tail, " text");
    }

    #[test]
    fn test_void_elements_without_slash() {
        let tree = parse_fragment("<p>a<br>b</p><hr><p>c</p>").unwrap();
        let tags: Vec<_> = tree.children.iter().map(|c| c.tag.as_str()).collect();
        assert_eq!(tags, ["p", "hr", "p"]);
        assert_eq!(tree.children[0].children[0].tag, "br");
        assert_eq!(tree.children[0].children[0].tail, "b");
    }

    #[test]
    fn test_unclosed_elements_closed_by_parent_end() {
        let tree = parse_fragment("<ul><li>one<li>two</ul><p>after</p>").unwrap();
        assert_eq!(tree.children.len(), 2);
        assert_eq!(tree.children[0].tag, "ul");
        assert_eq!(tree.children[1].tag, "p");
    }

    #[test]
    fn test_stray_end_tag_ignored() {
        let tree = parse_fragment("<p>text</span></p>").unwrap();
        assert_eq!(tree.children[0].text, "text");
    }

    #[test]
    fn test_entities_decoded() {
        let tree = parse_fragment("<p>a&nbsp;&amp;&#x27;b &lt;c&gt;</p>").unwrap();
        assert_eq!(tree.children[0].text, "a\u{00a0}&'b <c>");
    }

    #[test]
    fn test_script_and_style_removed() {
        let tree =
            parse_fragment("<p>keep</p><script>if (a < b) { alert(1) }</script><STYLE>p{}</STYLE>")
                .unwrap();
        assert_eq!(tree.children.len(), 1);
        assert_eq!(tree.text_content(), "keep");
    }

    #[test]
    fn test_cdata_and_namespaced_attributes() {
        let html = concat!(
            r#"<ac:structured-macro ac:name="code">"#,
            r#"<ac:plain-text-body><![CDATA[x < 1 && y]]></ac:plain-text-body>"#,
            "</ac:structured-macro>"
        );
        let tree = parse_fragment(html).unwrap();
        let mac = &tree.children[0];
        assert_eq!(mac.attr("ac:name"), Some("code"));
        assert_eq!(mac.children[0].text, "x < 1 && y");
    }

    #[test]
    fn test_uppercase_tags_lowercased() {
        let tree = parse_fragment("<P>Hi</P>").unwrap();
        assert_eq!(tree.children[0].tag, "p");
    }

    #[test]
    fn test_unterminated_tag_is_error() {
        assert!(parse_fragment("<p>text</p><a href=\"x").is_err());
    }
}
