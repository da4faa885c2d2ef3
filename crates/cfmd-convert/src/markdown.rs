//! Storage-format tree to Markdown writer.
//!
//! Output conventions keep round-trips diff-stable: ATX headings, `-` as
//! the only bullet marker, fenced code blocks and pipe tables.
//!
//! Each container renders to a list of blocks. Inline content between
//! block elements is gathered into a buffer and flushed as a paragraph.

use std::sync::LazyLock;

use regex::Regex;

use crate::tree::TreeNode;

/// Tag of a placeholder node whose text is emitted verbatim.
pub(crate) const PLACEHOLDER_TAG: &str = "#placeholder";

/// Elements dropped together with their content.
const SKIPPED_ELEMENTS: &[&str] = &[
    "script",
    "style",
    "head",
    "title",
    "meta",
    "link",
    "noscript",
    "template",
    "colgroup",
    "col",
    "caption",
    "ac:parameter",
    "ac:placeholder",
    "ac:emoticon",
];

/// Elements whose children are rendered as blocks in place of the element.
const CONTAINER_ELEMENTS: &[&str] = &[
    "div",
    "section",
    "article",
    "header",
    "footer",
    "main",
    "nav",
    "aside",
    "figure",
    "figcaption",
    "details",
    "summary",
    "center",
    "body",
    "html",
    "li",
    "dl",
    "dt",
    "dd",
    "thead",
    "tbody",
    "tr",
    "ac:layout",
    "ac:layout-section",
    "ac:layout-cell",
    "ac:rich-text-body",
];

/// Confluence macros rendered as block quotes.
const PANEL_MACROS: &[&str] = &["info", "note", "tip", "warning", "panel"];

static ORDERED_MARKER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{1,9})([.)])(\s|$)").expect("invalid ordered marker regex")
});

/// Render a parsed fragment as Markdown.
pub(crate) fn render_markdown(root: &TreeNode) -> String {
    join_blocks(&render_blocks(root))
}

fn join_blocks(blocks: &[String]) -> String {
    blocks
        .iter()
        .filter(|b| !b.trim().is_empty())
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn render_blocks(node: &TreeNode) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut inline = String::new();
    push_text(&mut inline, &node.text);

    for child in &node.children {
        if is_skipped(child) {
            // content dropped, tail kept
        } else if is_block(child) {
            flush_paragraph(&mut inline, &mut blocks);
            render_block(child, &mut blocks);
        } else {
            render_inline(child, &mut inline);
        }
        push_text(&mut inline, &child.tail);
    }

    flush_paragraph(&mut inline, &mut blocks);
    blocks
}

fn is_skipped(node: &TreeNode) -> bool {
    SKIPPED_ELEMENTS.contains(&node.tag.as_str()) || node.tag.starts_with("ri:")
}

fn is_block(node: &TreeNode) -> bool {
    match node.tag.as_str() {
        "p" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "ul" | "ol" | "blockquote" | "pre"
        | "table" | "hr" | "ac:structured-macro" | "ac:task-list" => true,
        tag if CONTAINER_ELEMENTS.contains(&tag) => true,
        _ => !node.is_confluence_element() && node.children.iter().any(is_block),
    }
}

fn render_block(node: &TreeNode, blocks: &mut Vec<String>) {
    match node.tag.as_str() {
        "p" => {
            let mut inline = String::new();
            render_inline_children(node, &mut inline);
            flush_paragraph(&mut inline, blocks);
        }
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
            let level = usize::from(node.tag.as_bytes()[1] - b'0');
            let text = single_line(&inline_content(node));
            if !text.is_empty() {
                blocks.push(format!("{} {text}", "#".repeat(level)));
            }
        }
        "ul" | "ol" => {
            if let Some(list) = render_list(node) {
                blocks.push(list);
            }
        }
        "blockquote" => blocks.push(quote(&render_blocks(node))),
        "pre" => {
            let language = node
                .child("code")
                .and_then(language_class)
                .or_else(|| language_class(node));
            blocks.push(fenced_code(language, &node.text_content()));
        }
        "table" => {
            if let Some(table) = render_table(node) {
                blocks.push(table);
            }
        }
        "hr" => blocks.push("---".to_owned()),
        "ac:structured-macro" => render_macro(node, blocks),
        "ac:task-list" => {
            let items = node
                .children
                .iter()
                .filter(|c| c.tag == "ac:task")
                .map(|task| {
                    task.child("ac:task-body")
                        .map(render_blocks)
                        .unwrap_or_default()
                })
                .collect::<Vec<_>>();
            if !items.is_empty() {
                blocks.push(list_items(&items, None, false));
            }
        }
        _ => blocks.extend(render_blocks(node)),
    }
}

fn render_macro(node: &TreeNode, blocks: &mut Vec<String>) {
    let name = node.attr("ac:name").unwrap_or_default();
    let rich_body = node.child("ac:rich-text-body");
    let plain_body = node.child("ac:plain-text-body");

    match name {
        "code" | "noformat" => {
            let language = if name == "code" {
                macro_parameter(node, "language")
            } else {
                None
            };
            let body = plain_body.map(TreeNode::text_content).unwrap_or_default();
            blocks.push(fenced_code(language, &body));
        }
        panel if PANEL_MACROS.contains(&panel) => {
            let mut inner = Vec::new();
            if let Some(title) = macro_parameter(node, "title") {
                inner.push(format!("**{}**", escape_text(&title)));
            }
            if let Some(body) = rich_body {
                inner.extend(render_blocks(body));
            }
            if !inner.is_empty() {
                blocks.push(quote(&inner));
            }
        }
        _ => {
            if let Some(body) = rich_body {
                blocks.extend(render_blocks(body));
            } else if let Some(body) = plain_body {
                blocks.push(fenced_code(None, &body.text_content()));
            }
        }
    }
}

fn macro_parameter(node: &TreeNode, name: &str) -> Option<String> {
    node.children
        .iter()
        .find(|c| c.tag == "ac:parameter" && c.attr("ac:name") == Some(name))
        .map(|p| p.text_content().trim().to_owned())
        .filter(|value| !value.is_empty())
}

fn language_class(node: &TreeNode) -> Option<String> {
    node.attr("class")?
        .split_whitespace()
        .find_map(|class| class.strip_prefix("language-"))
        .filter(|lang| !lang.is_empty())
        .map(str::to_owned)
}

fn fenced_code(language: Option<String>, content: &str) -> String {
    let content = content.strip_suffix('\n').unwrap_or(content);
    let fence = "`".repeat(longest_backtick_run(content).max(2) + 1);
    format!(
        "{fence}{}\n{content}\n{fence}",
        language.unwrap_or_default()
    )
}

fn longest_backtick_run(text: &str) -> usize {
    text.split(|c| c != '`').map(str::len).max().unwrap_or(0)
}

fn quote(blocks: &[String]) -> String {
    join_blocks(blocks)
        .lines()
        .map(|line| {
            if line.is_empty() {
                ">".to_owned()
            } else {
                format!("> {line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_list(node: &TreeNode) -> Option<String> {
    let items: Vec<&TreeNode> = node.children.iter().filter(|c| c.tag == "li").collect();
    if items.is_empty() {
        return None;
    }

    let start = (node.tag == "ol").then(|| {
        node.attr("start")
            .and_then(|s| s.trim().parse::<u32>().ok())
            .unwrap_or(1)
    });
    let loose = items
        .iter()
        .any(|li| li.children.iter().any(|c| c.tag == "p"));
    let rendered: Vec<Vec<String>> = items.into_iter().map(render_blocks).collect();

    Some(list_items(&rendered, start, loose))
}

/// Format list items, indenting continuation lines under the marker.
fn list_items(items: &[Vec<String>], start: Option<u32>, loose: bool) -> String {
    let item_separator = if loose { "\n\n" } else { "\n" };
    let mut out = Vec::with_capacity(items.len());

    for (index, blocks) in items.iter().enumerate() {
        let marker = match start {
            Some(first) => format!("{}. ", u64::from(first) + index as u64),
            None => "- ".to_owned(),
        };
        let indent = " ".repeat(marker.len());
        let body = blocks
            .iter()
            .filter(|b| !b.trim().is_empty())
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(item_separator);

        if body.is_empty() {
            out.push(marker.trim_end().to_owned());
            continue;
        }

        let mut item = String::new();
        for (line_no, line) in body.lines().enumerate() {
            if line_no == 0 {
                item.push_str(&marker);
            } else {
                item.push('\n');
                if !line.is_empty() {
                    item.push_str(&indent);
                }
            }
            item.push_str(line);
        }
        out.push(item);
    }

    out.join(item_separator)
}

fn render_table(node: &TreeNode) -> Option<String> {
    let mut rows: Vec<&TreeNode> = Vec::new();
    for child in &node.children {
        match child.tag.as_str() {
            "tr" => rows.push(child),
            "thead" | "tbody" | "tfoot" => {
                rows.extend(child.children.iter().filter(|c| c.tag == "tr"));
            }
            _ => {}
        }
    }

    let cells: Vec<Vec<&TreeNode>> = rows
        .iter()
        .map(|row| {
            row.children
                .iter()
                .filter(|c| c.tag == "th" || c.tag == "td")
                .collect()
        })
        .collect();
    let columns = cells.iter().map(Vec::len).max().unwrap_or(0);
    if columns == 0 {
        return None;
    }

    let header = &cells[0];
    let separator: Vec<&str> = (0..columns)
        .map(|i| match header.get(i).and_then(|cell| cell_alignment(cell)) {
            Some("left") => ":---",
            Some("center") => ":---:",
            Some("right") => "---:",
            _ => "---",
        })
        .collect();

    let mut lines = Vec::with_capacity(cells.len() + 1);
    for (index, row) in cells.iter().enumerate() {
        let mut texts: Vec<String> = row.iter().map(|cell| table_cell(cell)).collect();
        texts.resize(columns, String::new());
        lines.push(format!("| {} |", texts.join(" | ")));
        if index == 0 {
            lines.push(format!("| {} |", separator.join(" | ")));
        }
    }

    Some(lines.join("\n"))
}

fn table_cell(cell: &TreeNode) -> String {
    single_line(&render_blocks(cell).join(" ")).replace('|', "\\|")
}

fn cell_alignment(cell: &TreeNode) -> Option<&str> {
    if let Some(align) = cell.attr("align") {
        return Some(align);
    }
    let style = cell.attr("style")?;
    ["left", "center", "right"]
        .into_iter()
        .find(|align| style.contains(&format!("text-align: {align}")) || style.contains(&format!("text-align:{align}")))
}

/// Collapse rendered inline content onto one line.
fn single_line(text: &str) -> String {
    text.replace("\\\n", " ")
        .replace('\n', " ")
        .split(' ')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn inline_content(node: &TreeNode) -> String {
    let mut out = String::new();
    render_inline_children(node, &mut out);
    out
}

fn render_inline_children(node: &TreeNode, out: &mut String) {
    push_text(out, &node.text);
    for child in &node.children {
        if !is_skipped(child) {
            render_inline(child, out);
        }
        push_text(out, &child.tail);
    }
}

fn render_inline(node: &TreeNode, out: &mut String) {
    match node.tag.as_str() {
        "strong" | "b" => wrap(node, "**", out),
        "em" | "i" => wrap(node, "*", out),
        "del" | "s" | "strike" => wrap(node, "~~", out),
        "code" | "tt" | "kbd" | "samp" => push_fragment(out, &code_span(&node.text_content())),
        "a" => render_link(node, out),
        "img" => {
            if let Some(src) = node.attr("src") {
                let image = image(node.attr("alt").unwrap_or_default(), src, node.attr("title"));
                push_fragment(out, &image);
            }
        }
        "br" => {
            if !out.is_empty() && !out.ends_with('\n') {
                out.push_str("\\\n");
            }
        }
        PLACEHOLDER_TAG => push_fragment(out, &node.text),
        "ac:image" => render_confluence_image(node, out),
        "ac:link" => render_confluence_link(node, out),
        "ac:structured-macro" => {
            let name = node.attr("ac:name").unwrap_or_default();
            if name == "code" || name == "noformat" {
                if let Some(body) = node.child("ac:plain-text-body") {
                    push_fragment(out, &code_span(&body.text_content()));
                }
            } else if let Some(body) = node.child("ac:rich-text-body") {
                render_inline_children(body, out);
            }
        }
        _ => render_inline_children(node, out),
    }
}

/// Wrap inline content in an emphasis marker, keeping outer whitespace
/// outside the markers.
fn wrap(node: &TreeNode, marker: &str, out: &mut String) {
    let inner = inline_content(node);
    let trimmed = inner.trim();
    if trimmed.is_empty() {
        push_fragment(out, &inner);
        return;
    }
    let leading = &inner[..inner.len() - inner.trim_start().len()];
    let trailing = &inner[inner.trim_end().len()..];

    push_fragment(out, leading);
    push_fragment(out, &format!("{marker}{trimmed}{marker}"));
    push_fragment(out, trailing);
}

fn render_link(node: &TreeNode, out: &mut String) {
    let text = inline_content(node);
    let Some(href) = node.attr("href").filter(|h| !h.is_empty()) else {
        push_fragment(out, &text);
        return;
    };

    let plain = node.text_content();
    let is_autolink = plain.trim() == href && (href.contains("://") || href.starts_with("mailto:"));
    if is_autolink && !href.contains(char::is_whitespace) {
        push_fragment(out, &format!("<{href}>"));
        return;
    }

    let text = text.trim();
    let label = if text.is_empty() { escape_text(href) } else { text.to_owned() };
    push_fragment(
        out,
        &format!("[{label}]({}{})", destination(href), title_suffix(node.attr("title"))),
    );
}

fn image(alt: &str, src: &str, title: Option<&str>) -> String {
    format!(
        "![{}]({}{})",
        escape_text(alt),
        destination(src),
        title_suffix(title)
    )
}

fn destination(url: &str) -> String {
    if url.contains(|c: char| c.is_whitespace() || c == '(' || c == ')') {
        format!("<{}>", url.replace('<', "%3C").replace('>', "%3E"))
    } else {
        url.to_owned()
    }
}

fn title_suffix(title: Option<&str>) -> String {
    match title.filter(|t| !t.is_empty()) {
        Some(title) => format!(" \"{}\"", title.replace('"', "\\\"")),
        None => String::new(),
    }
}

fn render_confluence_image(node: &TreeNode, out: &mut String) {
    let src = node
        .child("ri:url")
        .and_then(|url| url.attr("ri:value"))
        .or_else(|| {
            node.child("ri:attachment")
                .and_then(|attachment| attachment.attr("ri:filename"))
        });
    if let Some(src) = src {
        let alt = node
            .attr("ac:alt")
            .or_else(|| node.attr("ac:title"))
            .unwrap_or_default();
        push_fragment(out, &image(alt, src, node.attr("ac:title")));
    }
}

fn render_confluence_link(node: &TreeNode, out: &mut String) {
    if let Some(body) = node.child("ac:plain-text-link-body") {
        push_text(out, &body.text_content());
    } else if let Some(body) = node.child("ac:link-body") {
        render_inline_children(body, out);
    } else {
        let target = node
            .child("ri:page")
            .and_then(|page| page.attr("ri:content-title"))
            .or_else(|| {
                node.child("ri:attachment")
                    .and_then(|attachment| attachment.attr("ri:filename"))
            })
            .or_else(|| node.attr("ac:anchor"));
        if let Some(target) = target {
            push_text(out, target);
        }
    }
}

fn code_span(content: &str) -> String {
    let ticks = "`".repeat(longest_backtick_run(content) + 1);
    let needs_padding = content.starts_with('`')
        || content.ends_with('`')
        || (content.starts_with(' ') && content.ends_with(' ') && !content.trim().is_empty());
    if needs_padding {
        format!("{ticks} {content} {ticks}")
    } else {
        format!("{ticks}{content}{ticks}")
    }
}

/// Append escaped character data with HTML whitespace collapsing.
fn push_text(out: &mut String, text: &str) {
    if text.is_empty() {
        return;
    }
    let mut collapsed = String::with_capacity(text.len());
    let mut in_space = false;
    for c in text.chars() {
        if c.is_ascii_whitespace() {
            if !in_space {
                collapsed.push(' ');
            }
            in_space = true;
        } else {
            collapsed.push(c);
            in_space = false;
        }
    }
    push_fragment(out, &escape_text(&collapsed));
}

/// Append rendered Markdown, never doubling a separating space.
fn push_fragment(out: &mut String, fragment: &str) {
    let fragment = if out.ends_with(' ') || out.ends_with('\n') {
        fragment.trim_start_matches(' ')
    } else {
        fragment
    };
    out.push_str(fragment);
}

fn flush_paragraph(inline: &mut String, blocks: &mut Vec<String>) {
    let mut text = std::mem::take(inline);
    while text.trim_end_matches(' ').ends_with("\\\n") {
        let end = text.trim_end_matches(' ').len() - 2;
        text.truncate(end);
    }
    let text = text.trim();
    if text.is_empty() {
        return;
    }
    let paragraph = text
        .split('\n')
        .map(|line| escape_block_start(line.trim_start()))
        .collect::<Vec<_>>()
        .join("\n");
    blocks.push(paragraph);
}

/// Escape Markdown metacharacters in character data.
///
/// `_` inside a word is left alone since it cannot open emphasis there.
/// Brackets are always escaped so literal `[text](url)` stays text.
fn escape_text(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    for (i, &c) in chars.iter().enumerate() {
        match c {
            '\\' | '*' | '`' | '[' | ']' => out.push('\\'),
            '_' => {
                let prev = i > 0 && chars[i - 1].is_alphanumeric();
                let next = chars.get(i + 1).is_some_and(|n| n.is_alphanumeric());
                if !(prev && next) {
                    out.push('\\');
                }
            }
            '<' if chars
                .get(i + 1)
                .is_some_and(|n| n.is_ascii_alphabetic() || matches!(n, '/' | '!' | '?')) =>
            {
                out.push('\\');
            }
            _ => {}
        }
        out.push(c);
    }
    out
}

/// Escape a line start that Markdown would read as a block marker.
fn escape_block_start(line: &str) -> String {
    if line.starts_with('#') || line.starts_with('>') {
        return format!("\\{line}");
    }
    if line == "-" || line == "+" || line.starts_with("- ") || line.starts_with("+ ") {
        return format!("\\{line}");
    }
    if line.len() >= 3 && line.chars().all(|c| c == '-' || c == ' ') {
        return format!("\\{line}");
    }
    ORDERED_MARKER_PATTERN
        .replace(line, "${1}\\${2}${3}")
        .into_owned()
}
