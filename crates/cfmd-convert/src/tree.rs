//! Element tree for parsed storage-format markup.

/// Element node with text/tail layout.
///
/// `text` is the character data before the first child; each child's
/// `tail` is the character data that follows it inside this node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct TreeNode {
    /// Tag name including any namespace prefix (e.g. `p`, `ac:image`).
    pub tag: String,
    /// Attributes in document order.
    pub attrs: Vec<(String, String)>,
    /// Leading text content.
    pub text: String,
    /// Text following this element inside its parent.
    pub tail: String,
    /// Child elements.
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    pub(crate) fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Default::default()
        }
    }

    /// Attribute value by name.
    pub(crate) fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// First direct child with the given tag.
    pub(crate) fn child(&self, tag: &str) -> Option<&TreeNode> {
        self.children.iter().find(|c| c.tag == tag)
    }

    /// Whether this element lives in the Confluence `ac:` namespace.
    pub(crate) fn is_confluence_element(&self) -> bool {
        self.tag.starts_with("ac:")
    }

    /// Concatenated character data of this node and its descendants,
    /// excluding this node's own tail.
    pub(crate) fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        out.push_str(&self.text);
        for child in &self.children {
            child.collect_text(out);
            out.push_str(&child.tail);
        }
    }

    /// Append character data at the current end of this node.
    pub(crate) fn append_text(&mut self, text: &str) {
        match self.children.last_mut() {
            Some(last) => last.tail.push_str(text),
            None => self.text.push_str(text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_content_walks_children_and_tails() {
        let mut p = TreeNode::new("p");
        p.append_text("a ");
        let mut strong = TreeNode::new("strong");
        strong.append_text("b");
        p.children.push(strong);
        p.append_text(" c");
        p.tail = "ignored".to_owned();

        assert_eq!(p.text_content(), "a b c");
    }

    #[test]
    fn test_attr_lookup() {
        let mut node = TreeNode::new("ac:structured-macro");
        node.attrs.push(("ac:name".to_owned(), "code".to_owned()));
        assert_eq!(node.attr("ac:name"), Some("code"));
        assert_eq!(node.attr("ac:schema-version"), None);
        assert!(node.is_confluence_element());
    }
}
