//! Pre-parse cleanup of HTML character references.
//!
//! Storage bodies are XHTML, but pages edited in older editors routinely
//! carry HTML-only named entities (`&nbsp;`, `&mdash;`) and stray bare
//! ampersands. Both would stop an XML reader, so they are normalized first.

use std::sync::LazyLock;

use regex::Regex;

/// An ampersand and, if present, the reference it starts.
static AMPERSAND_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(#[0-9]+;|#[xX][0-9a-fA-F]+;|[a-zA-Z][a-zA-Z0-9]*;)?")
        .expect("invalid ampersand regex")
});

/// Replace HTML-only named entities with characters and escape bare `&`.
///
/// XML's own entities (`amp`, `lt`, `gt`, `quot`, `apos`) and numeric
/// references are left for the XML reader. Unknown named entities are
/// escaped so they survive as literal text.
///
/// CDATA sections are copied untouched.
pub(crate) fn normalize_entities(html: &str) -> String {
    if !html.contains('&') {
        return html.to_owned();
    }

    let mut out = String::with_capacity(html.len());
    let mut rest = html;
    while let Some(start) = rest.find(CDATA_START) {
        out.push_str(&normalize_segment(&rest[..start]));
        let cdata = &rest[start..];
        let end = cdata.find(CDATA_END).map_or(cdata.len(), |i| i + CDATA_END.len());
        out.push_str(&cdata[..end]);
        rest = &cdata[end..];
    }
    out.push_str(&normalize_segment(rest));
    out
}

const CDATA_START: &str = "<![CDATA[";
const CDATA_END: &str = "]]>";

fn normalize_segment(html: &str) -> String {
    AMPERSAND_PATTERN
        .replace_all(html, |caps: &regex::Captures| {
            let Some(reference) = caps.get(1).map(|m| m.as_str()) else {
                return "&amp;".to_owned();
            };
            if reference.starts_with('#') {
                return caps[0].to_owned();
            }
            let name = &reference[..reference.len() - 1];
            match name {
                "amp" | "lt" | "gt" | "quot" | "apos" => caps[0].to_owned(),
                _ => named_entity(name).map_or_else(|| format!("&amp;{reference}"), str::to_owned),
            }
        })
        .into_owned()
}

/// Map an HTML entity name to its character.
fn named_entity(name: &str) -> Option<&'static str> {
    Some(match name {
        "nbsp" => "\u{00a0}",
        "ensp" => "\u{2002}",
        "emsp" => "\u{2003}",
        "thinsp" => "\u{2009}",
        "zwnj" => "\u{200c}",
        "zwj" => "\u{200d}",
        "shy" => "\u{00ad}",

        "mdash" => "\u{2014}",
        "ndash" => "\u{2013}",
        "hellip" => "\u{2026}",
        "bull" => "\u{2022}",
        "middot" => "\u{00b7}",
        "lsquo" => "\u{2018}",
        "rsquo" => "\u{2019}",
        "sbquo" => "\u{201a}",
        "ldquo" => "\u{201c}",
        "rdquo" => "\u{201d}",
        "bdquo" => "\u{201e}",
        "laquo" => "\u{00ab}",
        "raquo" => "\u{00bb}",
        "lsaquo" => "\u{2039}",
        "rsaquo" => "\u{203a}",
        "prime" => "\u{2032}",
        "Prime" => "\u{2033}",

        "larr" => "\u{2190}",
        "uarr" => "\u{2191}",
        "rarr" => "\u{2192}",
        "darr" => "\u{2193}",
        "harr" => "\u{2194}",
        "lArr" => "\u{21d0}",
        "rArr" => "\u{21d2}",
        "hArr" => "\u{21d4}",

        "le" => "\u{2264}",
        "ge" => "\u{2265}",
        "ne" => "\u{2260}",
        "asymp" => "\u{2248}",
        "plusmn" => "\u{00b1}",
        "times" => "\u{00d7}",
        "divide" => "\u{00f7}",
        "minus" => "\u{2212}",
        "infin" => "\u{221e}",
        "deg" => "\u{00b0}",
        "micro" => "\u{00b5}",
        "frac12" => "\u{00bd}",
        "frac14" => "\u{00bc}",
        "frac34" => "\u{00be}",
        "sup1" => "\u{00b9}",
        "sup2" => "\u{00b2}",
        "sup3" => "\u{00b3}",

        "copy" => "\u{00a9}",
        "reg" => "\u{00ae}",
        "trade" => "\u{2122}",
        "sect" => "\u{00a7}",
        "para" => "\u{00b6}",
        "dagger" => "\u{2020}",
        "Dagger" => "\u{2021}",

        "euro" => "\u{20ac}",
        "pound" => "\u{00a3}",
        "yen" => "\u{00a5}",
        "cent" => "\u{00a2}",

        "iexcl" => "\u{00a1}",
        "iquest" => "\u{00bf}",
        "auml" => "\u{00e4}",
        "ouml" => "\u{00f6}",
        "uuml" => "\u{00fc}",
        "Auml" => "\u{00c4}",
        "Ouml" => "\u{00d6}",
        "Uuml" => "\u{00dc}",
        "szlig" => "\u{00df}",
        "eacute" => "\u{00e9}",
        "egrave" => "\u{00e8}",
        "aacute" => "\u{00e1}",
        "agrave" => "\u{00e0}",
        "ccedil" => "\u{00e7}",
        "ntilde" => "\u{00f1}",
        "oslash" => "\u{00f8}",
        "aring" => "\u{00e5}",

        "check" => "\u{2713}",
        "hearts" => "\u{2665}",
        "star" => "\u{2606}",
        _ => return None,
    })
}

/// Resolve a general reference reported by the XML reader.
///
/// Only XML entities and numeric references reach the reader after
/// [`normalize_entities`]; anything else is kept verbatim.
pub(crate) fn decode_reference(reference: &str) -> String {
    match reference {
        "lt" => "<".to_owned(),
        "gt" => ">".to_owned(),
        "amp" => "&".to_owned(),
        "apos" => "'".to_owned(),
        "quot" => "\"".to_owned(),
        s if s.starts_with('#') => {
            let code = if let Some(hex) = s.strip_prefix("#x").or_else(|| s.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok()
            } else {
                s[1..].parse::<u32>().ok()
            };
            code.and_then(char::from_u32)
                .map_or_else(|| format!("&{reference};"), |c| c.to_string())
        }
        _ => format!("&{reference};"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_entities_become_characters() {
        assert_eq!(
            normalize_entities("a&nbsp;b&mdash;c &copy; 2026"),
            "a\u{00a0}b\u{2014}c \u{00a9} 2026"
        );
    }

    #[test]
    fn test_xml_entities_preserved() {
        assert_eq!(normalize_entities("&amp;&lt;&gt;&quot;&apos;"), "&amp;&lt;&gt;&quot;&apos;");
    }

    #[test]
    fn test_numeric_references_preserved() {
        assert_eq!(normalize_entities("&#39;&#x27;"), "&#39;&#x27;");
    }

    #[test]
    fn test_bare_ampersand_escaped() {
        assert_eq!(normalize_entities("R&D and Q & A"), "R&amp;D and Q &amp; A");
    }

    #[test]
    fn test_cdata_untouched() {
        assert_eq!(
            normalize_entities("<p>&nbsp;</p><![CDATA[a && b &nbsp;]]>&mdash;"),
            "<p>\u{00a0}</p><![CDATA[a && b &nbsp;]]>\u{2014}"
        );
    }

    #[test]
    fn test_unknown_entity_kept_as_text() {
        assert_eq!(normalize_entities("&bogus;"), "&amp;bogus;");
    }

    #[test]
    fn test_decode_reference() {
        assert_eq!(decode_reference("lt"), "<");
        assert_eq!(decode_reference("#x27"), "'");
        assert_eq!(decode_reference("#8212"), "\u{2014}");
        assert_eq!(decode_reference("nope"), "&nope;");
    }
}
