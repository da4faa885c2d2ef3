//! Storage-format serializer for preserved macro subtrees.

use std::fmt::Write;

use crate::tree::TreeNode;

/// Body element whose content is stored as CDATA.
const PLAIN_TEXT_BODY: &str = "ac:plain-text-body";

/// Serialize a node and its subtree, excluding the node's own tail.
pub(crate) fn serialize_element(node: &TreeNode) -> String {
    let mut out = String::with_capacity(256);
    serialize_node(node, &mut out);
    out
}

fn serialize_node(node: &TreeNode, out: &mut String) {
    out.push('<');
    out.push_str(&node.tag);
    for (key, value) in &node.attrs {
        write!(out, r#" {}="{}""#, key, escape_xml(value, true)).unwrap();
    }

    if node.children.is_empty() && node.text.is_empty() {
        out.push_str(" />");
        return;
    }
    out.push('>');

    if node.tag == PLAIN_TEXT_BODY {
        write_cdata(&node.text_content(), out);
    } else {
        out.push_str(&escape_xml(&node.text, false));
        for child in &node.children {
            serialize_node(child, out);
            out.push_str(&escape_xml(&child.tail, false));
        }
    }

    write!(out, "</{}>", node.tag).unwrap();
}

/// Write `content` as CDATA, splitting any embedded terminator.
fn write_cdata(content: &str, out: &mut String) {
    out.push_str("<![CDATA[");
    out.push_str(&content.replace("]]>", "]]]]><![CDATA[>"));
    out.push_str("]]>");
}

fn escape_xml(text: &str, escape_quotes: bool) -> String {
    let mut result = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' if escape_quotes => result.push_str("&quot;"),
            _ => result.push(ch),
        }
    }
    result
}
