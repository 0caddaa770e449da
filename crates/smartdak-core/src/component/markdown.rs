//! Heading-driven Markdown splitting shared by the Markdown-backed components.
//!
//! Documents carry an optional YAML front matter block holding the component
//! `id`, a level-1 title, a free-text preamble and level-2 sections.

use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Default, Deserialize)]
struct FrontMatter {
    #[serde(default)]
    id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub heading: String,
    pub body: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkdownDoc {
    pub id: Option<String>,
    pub title: Option<String>,
    pub preamble: String,
    pub sections: Vec<Section>,
}

impl MarkdownDoc {
    pub fn parse(content: &str) -> Self {
        let (id, body) = split_front_matter(content);
        let mut doc = MarkdownDoc {
            id,
            ..Default::default()
        };

        let mut preamble = Vec::new();
        let mut current: Option<(String, Vec<&str>)> = None;

        for line in body.lines() {
            if let Some(heading) = line.strip_prefix("## ") {
                if let Some((heading, lines)) = current.take() {
                    doc.sections.push(section(heading, &lines));
                }
                current = Some((heading.trim().to_string(), Vec::new()));
            } else if let Some((_, lines)) = current.as_mut() {
                lines.push(line);
            } else if let Some(title) = line.strip_prefix("# ")
                && doc.title.is_none()
            {
                doc.title = Some(title.trim().to_string());
            } else {
                preamble.push(line);
            }
        }
        if let Some((heading, lines)) = current {
            doc.sections.push(section(heading, &lines));
        }
        doc.preamble = preamble.join("\n").trim().to_string();
        doc
    }

    /// Section by heading, compared case-insensitively.
    pub fn section(&self, heading: &str) -> Option<&Section> {
        self.sections
            .iter()
            .find(|s| s.heading.eq_ignore_ascii_case(heading))
    }

    /// List items of the first section matching any of `headings`.
    pub fn items(&self, headings: &[&str]) -> Vec<String> {
        headings
            .iter()
            .find_map(|h| self.section(h))
            .map(|s| list_items(&s.body))
            .unwrap_or_default()
    }
}

fn section(heading: String, lines: &[&str]) -> Section {
    Section {
        heading,
        body: lines.join("\n").trim().to_string(),
    }
}

fn split_front_matter(content: &str) -> (Option<String>, &str) {
    let Some(rest) = content
        .strip_prefix("---\n")
        .or_else(|| content.strip_prefix("---\r\n"))
    else {
        return (None, content);
    };
    let Some(end) = rest.find("\n---") else {
        return (None, content);
    };
    let yaml = &rest[..end];
    let body = rest[end + 4..].trim_start_matches(['\r', '\n']);
    match serde_yaml::from_str::<FrontMatter>(yaml) {
        Ok(front) => (front.id.filter(|id| !id.trim().is_empty()), body),
        Err(e) => {
            debug!(error = %e, "ignoring unparseable front matter");
            (None, body)
        }
    }
}

/// Bulleted (`-`, `*`, `+`) or numbered (`1.`, `1)`) list items in `body`.
pub fn list_items(body: &str) -> Vec<String> {
    body.lines()
        .filter_map(|line| {
            let line = line.trim();
            if let Some(item) = line
                .strip_prefix("- ")
                .or_else(|| line.strip_prefix("* "))
                .or_else(|| line.strip_prefix("+ "))
            {
                return Some(item.trim().to_string());
            }
            let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
            if digits == 0 {
                return None;
            }
            line[digits..]
                .strip_prefix(". ")
                .or_else(|| line[digits..].strip_prefix(") "))
                .map(|item| item.trim().to_string())
        })
        .filter(|item| !item.is_empty())
        .collect()
}

/// Front matter block carrying `id`, or nothing when there is no id.
pub fn front_matter(id: Option<&str>) -> String {
    match id {
        Some(id) if !id.trim().is_empty() => format!("---\nid: {}\n---\n\n", yaml_scalar(id)),
        _ => String::new(),
    }
}

fn yaml_scalar(value: &str) -> String {
    let plain = value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if plain {
        value.to_string()
    } else {
        format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
    }
}

pub fn write_section(out: &mut String, heading: &str, body: &str) {
    out.push_str("## ");
    out.push_str(heading);
    out.push_str("\n\n");
    if !body.trim().is_empty() {
        out.push_str(body.trim());
        out.push_str("\n\n");
    }
}

pub fn bullet_list(items: &[String]) -> String {
    items
        .iter()
        .map(|item| format!("- {item}"))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn numbered_list(items: &[String]) -> String {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| format!("{}. {item}", i + 1))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = "---\nid: anc-registration\n---\n\n# ANC registration\n\nA pregnant woman registers.\n\n## Actors\n\n- Client\n* Midwife\n\n## Steps\n\n1. Client arrives\n2) Midwife records details\n\n### Notes\nnot a list\n";

    #[test]
    fn splits_front_matter_title_and_sections() {
        let doc = MarkdownDoc::parse(DOC);
        assert_eq!(doc.id.as_deref(), Some("anc-registration"));
        assert_eq!(doc.title.as_deref(), Some("ANC registration"));
        assert_eq!(doc.preamble, "A pregnant woman registers.");
        assert_eq!(doc.sections.len(), 2);
        assert_eq!(doc.items(&["actors"]), vec!["Client", "Midwife"]);
        assert_eq!(
            doc.items(&["Workflow", "Steps"]),
            vec!["Client arrives", "Midwife records details"]
        );
    }

    #[test]
    fn no_front_matter_means_no_id() {
        let doc = MarkdownDoc::parse("# Title only\n");
        assert_eq!(doc.id, None);
        assert_eq!(doc.title.as_deref(), Some("Title only"));
        assert!(doc.sections.is_empty());
    }

    #[test]
    fn front_matter_quotes_unusual_ids() {
        assert_eq!(front_matter(Some("a b")), "---\nid: \"a b\"\n---\n\n");
        let doc = MarkdownDoc::parse(&format!("{}# T\n", front_matter(Some("a: b"))));
        assert_eq!(doc.id.as_deref(), Some("a: b"));
        assert_eq!(front_matter(None), "");
    }
}
