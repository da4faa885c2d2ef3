//! Scratch document layout.
//!
//! ```text
//! # Page title
//!
//! <!-- Edit the content below. Lines starting with <!-- are comments and will be ignored -->
//! <!-- Page ID: 123, Version: 4 -->
//!
//! Markdown body...
//!
//! <!-- CONFLUENCE_MACROS_START
//! base64 JSON
//! CONFLUENCE_MACROS_END -->
//! ```

use cfmd_convert::{ConvertError, MacroMap, embed_macro_block, extract_macro_block, restore_macros, to_html};

use crate::types::Page;

const INSTRUCTIONS: &str =
    "<!-- Edit the content below. Lines starting with <!-- are comments and will be ignored -->";

/// Render the scratch document for a page.
pub(crate) fn render(page: &Page, markdown: &str, macros: &MacroMap) -> String {
    let document = format!(
        "# {}\n\n{INSTRUCTIONS}\n<!-- Page ID: {}, Version: {} -->\n\n{}\n",
        single_line(&page.title),
        page.id,
        page.version.number,
        markdown
    );
    embed_macro_block(&document, macros)
}

/// Edited document converted back to storage format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct EditedDocument {
    /// Title from the first `# ` heading, if present and non-empty.
    pub title: Option<String>,
    /// Storage-format body with macros restored.
    pub body: String,
}

/// Parse an edited scratch document.
///
/// Single-line HTML comments outside fenced code blocks are dropped. A
/// `# ` heading is taken as the title only when it is the first non-blank
/// line, so deleting the title line never promotes a body heading.
pub(crate) fn parse(content: &str) -> Result<EditedDocument, ConvertError> {
    let (content, macros) = extract_macro_block(content)?;

    let mut title = None;
    let mut at_top = true;
    let mut fence: Option<Fence> = None;
    let mut lines = Vec::new();
    for line in content.lines() {
        if let Some(open) = fence {
            if open.closed_by(line) {
                fence = None;
            }
            lines.push(line);
            continue;
        }
        if at_top {
            if line.trim().is_empty() {
                continue;
            }
            at_top = false;
            if let Some(heading) = line.strip_prefix("# ") {
                title = Some(heading.trim().to_owned());
                continue;
            }
        }
        if line.starts_with("<!--") && line.contains("-->") {
            continue;
        }
        fence = Fence::parse(line);
        lines.push(line);
    }

    let markdown = lines.join("\n");
    let body = restore_macros(&to_html(markdown.trim()), &macros);

    Ok(EditedDocument {
        title: title.filter(|t| !t.is_empty()),
        body,
    })
}

/// Opening or closing line of a fenced code block.
#[derive(Debug, Clone, Copy)]
struct Fence {
    marker: char,
    len: usize,
}

impl Fence {
    fn parse(line: &str) -> Option<Self> {
        let trimmed = line.trim_start_matches(' ');
        if line.len() - trimmed.len() > 3 {
            return None;
        }
        let marker = trimmed.chars().next().filter(|c| matches!(c, '`' | '~'))?;
        let len = trimmed.chars().take_while(|&c| c == marker).count();
        let info = &trimmed[len..];
        if len < 3 || (marker == '`' && info.contains('`')) {
            return None;
        }
        Some(Self { marker, len })
    }

    /// A closing fence repeats the opening marker at least as many times
    /// and carries no info string.
    fn closed_by(self, line: &str) -> bool {
        Self::parse(line).is_some_and(|close| close.marker == self.marker && close.len >= self.len)
            && line.trim().chars().all(|c| c == self.marker)
    }
}

fn single_line(text: &str) -> String {
    text.replace(['\r', '\n'], " ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Version;
    use pretty_assertions::assert_eq;

    fn page() -> Page {
        Page {
            id: "123".to_owned(),
            content_type: "page".to_owned(),
            title: "Intro".to_owned(),
            space: None,
            version: Version {
                number: 4,
                when: None,
                message: None,
            },
            body: None,
            ancestors: Vec::new(),
            links: None,
        }
    }

    #[test]
    fn test_render_layout() {
        let document = render(&page(), "Hello **world**", &MacroMap::default());
        assert_eq!(
            document,
            concat!(
                "# Intro\n\n",
                "<!-- Edit the content below. Lines starting with <!-- are comments and will be ignored -->\n",
                "<!-- Page ID: 123, Version: 4 -->\n\n",
                "Hello **world**\n"
            )
        );
    }

    #[test]
    fn test_parse_strips_header_and_converts() {
        let document = render(&page(), "Hello **world**", &MacroMap::default());
        let edited = parse(&document.replace("world", "there")).unwrap();

        assert_eq!(edited.title.as_deref(), Some("Intro"));
        assert_eq!(edited.body, "<p>Hello <strong>there</strong></p>");
    }

    #[test]
    fn test_parse_takes_edited_title() {
        let edited = parse("# Renamed page\n\n## Section\n\ntext").unwrap();
        assert_eq!(edited.title.as_deref(), Some("Renamed page"));
        assert_eq!(edited.body, "<h2>Section</h2><p>text</p>");
    }

    #[test]
    fn test_parse_without_title() {
        let edited = parse("just text").unwrap();
        assert_eq!(edited.title, None);
        assert_eq!(edited.body, "<p>just text</p>");
    }

    #[test]
    fn test_comment_lines_inside_code_fence_are_kept() {
        let storage = concat!(
            "<p>Intro</p>",
            r#"<pre><code class="language-html">&lt;!-- keep me --&gt;"#,
            "\n&lt;div&gt;x&lt;/div&gt;\n</code></pre>"
        );
        let markdown = cfmd_convert::to_markdown(storage).unwrap();
        let document = render(&page(), &markdown, &MacroMap::default());

        let edited = parse(&document.replace("\nIntro\n", "\nIntro edited\n")).unwrap();

        assert_eq!(
            edited.body,
            concat!(
                "<p>Intro edited</p>",
                r#"<pre><code class="language-html">&lt;!-- keep me --&gt;"#,
                "\n&lt;div&gt;x&lt;/div&gt;\n</code></pre>"
            )
        );
    }

    #[test]
    fn test_fence_closes_only_on_matching_marker() {
        let edited = parse("# T\n\n````\n```\n<!-- a -->\n# b\n````\n\n<!-- c -->\ntext").unwrap();

        assert_eq!(edited.title.as_deref(), Some("T"));
        assert_eq!(
            edited.body,
            "<pre><code>```\n&lt;!-- a --&gt;\n# b\n</code></pre><p>text</p>"
        );
    }

    #[test]
    fn test_deleted_title_line_keeps_body_heading() {
        let document = render(&page(), "Lead\n\n# Chapter\n\nbody", &MacroMap::default());
        let without_title = document.replacen("# Intro\n", "", 1);

        let edited = parse(&without_title).unwrap();

        assert_eq!(edited.title, None);
        assert_eq!(edited.body, "<p>Lead</p><h1>Chapter</h1><p>body</p>");
    }

    #[test]
    fn test_title_must_lead_the_document() {
        let edited = parse("intro\n\n# Heading").unwrap();
        assert_eq!(edited.title, None);
        assert_eq!(edited.body, "<p>intro</p><h1>Heading</h1>");
    }

    #[test]
    fn test_macros_round_trip_through_document() {
        let (markdown, macros) = cfmd_convert::to_markdown_preserving_macros(
            r#"<p>a</p><ac:structured-macro ac:name="toc" />"#,
        )
        .unwrap();
        let document = render(&page(), &markdown, &macros);

        let edited = parse(&document).unwrap();

        assert_eq!(edited.body, r#"<p>a</p><ac:structured-macro ac:name="toc" />"#);
    }
}
