//! Pattern-based extraction from BPMN/DMN markup.
//!
//! This is not an XML parser: start tags are matched by regex, so attributes
//! containing `>` or elements hidden in comments or CDATA can be mis-read.
//! Callers go through these helpers so the heuristic can be replaced by a real
//! DOM-based extractor in one place.

use std::sync::LazyLock;

use regex::Regex;

static ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([A-Za-z_][\w.:\-]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#).unwrap()
});

/// A start tag matched by local name, with its attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementMatch {
    /// Qualified tag name as written, e.g. `bpmn:businessRuleTask`.
    pub name: String,
    /// Byte offset of the `<`.
    pub offset: usize,
    /// 1-based line of the `<`.
    pub line: usize,
    pub attributes: Vec<(String, String)>,
}

impl ElementMatch {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Attribute value, treating blank values as absent.
    pub fn non_empty_attr(&self, name: &str) -> Option<&str> {
        self.attr(name).map(str::trim).filter(|v| !v.is_empty())
    }
}

fn start_tag_pattern(local_name: &str) -> Option<Regex> {
    Regex::new(&format!(
        r"<((?:[A-Za-z_][\w.\-]*:)?{})(?:\s([^>]*?))?/?>",
        regex::escape(local_name)
    ))
    .ok()
}

/// Every start tag whose local name is `local_name`, namespace prefix ignored.
pub fn find_elements(content: &str, local_name: &str) -> Vec<ElementMatch> {
    let Some(pattern) = start_tag_pattern(local_name) else {
        return Vec::new();
    };
    pattern
        .captures_iter(content)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let attributes = caps
                .get(2)
                .map(|attrs| parse_attributes(attrs.as_str()))
                .unwrap_or_default();
            Some(ElementMatch {
                name: caps[1].to_string(),
                offset: whole.start(),
                line: line_at(content, whole.start()),
                attributes,
            })
        })
        .collect()
}

fn parse_attributes(raw: &str) -> Vec<(String, String)> {
    ATTRIBUTE
        .captures_iter(raw)
        .map(|caps| {
            let value = caps
                .get(2)
                .or_else(|| caps.get(3))
                .map(|m| unescape(m.as_str()))
                .unwrap_or_default();
            (caps[1].to_string(), value)
        })
        .collect()
}

/// Whether `content` both opens and closes a `local_name` element.
pub fn has_wrapper(content: &str, local_name: &str) -> bool {
    let name = regex::escape(local_name);
    let open = Regex::new(&format!(r"<(?:[A-Za-z_][\w.\-]*:)?{name}[\s>]"));
    let close = Regex::new(&format!(r"</(?:[A-Za-z_][\w.\-]*:)?{name}\s*>"));
    match (open, close) {
        (Ok(open), Ok(close)) => open.is_match(content) && close.is_match(content),
        _ => false,
    }
}

/// Text content of the first `local_name` element, unescaped and trimmed.
pub fn element_text(content: &str, local_name: &str) -> Option<String> {
    let name = regex::escape(local_name);
    let pattern = Regex::new(&format!(
        r"(?s)<(?:[A-Za-z_][\w.\-]*:)?{name}(?:\s[^>]*)?>(.*?)</(?:[A-Za-z_][\w.\-]*:)?{name}\s*>"
    ))
    .ok()?;
    let text = pattern.captures(content)?.get(1)?.as_str().trim();
    (!text.is_empty()).then(|| unescape(text))
}

/// 1-based line number of a byte offset.
pub fn line_at(content: &str, offset: usize) -> usize {
    let end = offset.min(content.len());
    content.as_bytes()[..end].iter().filter(|b| **b == b'\n').count() + 1
}

pub fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            other => out.push(other),
        }
    }
    out
}

pub fn unescape(value: &str) -> String {
    value
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
