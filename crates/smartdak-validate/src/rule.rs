//! The rule seam: what a rule declares, what it returns, and how findings
//! become violations.

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;
use smartdak_core::ValidationLevel;

use crate::file::DakFile;

/// File-type selector. `Any` is the wildcard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Xml,
    Json,
    Yaml,
    Bpmn,
    Dmn,
    #[serde(rename = "*")]
    Any,
}

impl FileType {
    /// Concrete type of a path by extension; `None` for anything else.
    pub fn of(path: &str) -> Option<Self> {
        let name = path.rsplit('/').next().unwrap_or(path);
        let (_, ext) = name.rsplit_once('.')?;
        match ext.to_ascii_lowercase().as_str() {
            "xml" => Some(Self::Xml),
            "json" => Some(Self::Json),
            "yaml" | "yml" => Some(Self::Yaml),
            "bpmn" => Some(Self::Bpmn),
            "dmn" => Some(Self::Dmn),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Xml => "xml",
            Self::Json => "json",
            Self::Yaml => "yaml",
            Self::Bpmn => "bpmn",
            Self::Dmn => "dmn",
            Self::Any => "*",
        }
    }

    /// Whether a rule declaring `selectors` covers `path`.
    pub fn selects(selectors: &[FileType], path: &str) -> bool {
        selectors.contains(&Self::Any)
            || Self::of(path).is_some_and(|t| selectors.contains(&t))
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Facts gathered across the whole file set before any rule runs.
#[derive(Debug, Clone, Default)]
pub struct ValidationContext {
    /// False for single-file runs; cross-file rules stay silent then.
    pub cross_file: bool,
    /// Every non-empty `businessRuleTask/@id` in the BPMN files of the pass.
    pub business_rule_task_ids: BTreeSet<String>,
}

impl ValidationContext {
    pub fn single_file() -> Self {
        Self::default()
    }
}

/// What a rule reports; the engine fills in rule id, component and path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub code: String,
    pub message: String,
    pub line: Option<usize>,
    pub column: Option<usize>,
    pub suggestion: Option<String>,
    /// Overrides the rule's declared level.
    pub level: Option<ValidationLevel>,
}

impl Finding {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            line: None,
            column: None,
            suggestion: None,
            level: None,
        }
    }

    pub fn at_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }

    pub fn at(mut self, line: usize, column: usize) -> Self {
        self.line = Some(line);
        self.column = Some(column);
        self
    }

    pub fn maybe_line(mut self, line: Option<usize>) -> Self {
        self.line = line;
        self
    }

    pub fn suggest(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn with_level(mut self, level: ValidationLevel) -> Self {
        self.level = Some(level);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Violation {
    pub rule_id: String,
    pub component: String,
    pub level: ValidationLevel,
    pub file_path: String,
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl Violation {
    pub(crate) fn from_finding(rule: &dyn ValidationRule, path: &str, finding: Finding) -> Self {
        Self {
            rule_id: rule.id().to_string(),
            component: rule.component().to_string(),
            level: finding.level.unwrap_or(rule.level()),
            file_path: path.to_string(),
            code: finding.code,
            message: finding.message,
            line: finding.line,
            column: finding.column,
            suggestion: finding.suggestion,
        }
    }

    pub fn is_error(&self) -> bool {
        self.level == ValidationLevel::Error
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.file_path)?;
        if let Some(line) = self.line {
            write!(f, ":{line}")?;
            if let Some(column) = self.column {
                write!(f, ":{column}")?;
            }
        }
        write!(f, " {} [{}] {}", self.level, self.code, self.message)
    }
}

/// One independent check. Rules never fail: data problems are findings.
pub trait ValidationRule: Send + Sync {
    /// Stable kebab-case identifier.
    fn id(&self) -> &'static str;
    /// Area of the DAK the rule guards.
    fn component(&self) -> &'static str;
    /// Default level of its findings.
    fn level(&self) -> ValidationLevel;
    fn file_types(&self) -> &'static [FileType];
    fn description(&self) -> &'static str;

    fn applies_to(&self, path: &str) -> bool {
        FileType::selects(self.file_types(), path)
    }

    /// False for rules that judge the path alone.
    fn reads_content(&self) -> bool {
        true
    }

    fn validate(&self, file: &DakFile, ctx: &ValidationContext) -> Vec<Finding>;
}

/// Serializable listing of a registered rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleDescriptor {
    pub id: String,
    pub component: String,
    pub level: ValidationLevel,
    pub file_types: Vec<FileType>,
    pub description: String,
}

impl RuleDescriptor {
    pub fn of(rule: &dyn ValidationRule) -> Self {
        Self {
            id: rule.id().to_string(),
            component: rule.component().to_string(),
            level: rule.level(),
            file_types: rule.file_types().to_vec(),
            description: rule.description().to_string(),
        }
    }
}

// ── Position helpers ─────────────────────────────────────────────────────

/// 1-based line and column of a byte offset.
pub fn line_col(content: &str, offset: usize) -> (usize, usize) {
    let mut end = offset.min(content.len());
    while !content.is_char_boundary(end) {
        end -= 1;
    }
    let before = &content[..end];
    let line = before.matches('\n').count() + 1;
    let column = before
        .rsplit_once('\n')
        .map_or(before, |(_, tail)| tail)
        .chars()
        .count()
        + 1;
    (line, column)
}

/// 1-based line of the first occurrence of `needle`.
pub fn line_of(content: &str, needle: &str) -> Option<usize> {
    content
        .find(needle)
        .map(|offset| line_col(content, offset).0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_types_by_extension() {
        assert_eq!(FileType::of("input/process/a.BPMN"), Some(FileType::Bpmn));
        assert_eq!(FileType::of("sushi-config.yml"), Some(FileType::Yaml));
        assert_eq!(FileType::of("input/fsh/actors/a.fsh"), None);
        assert_eq!(FileType::of("Makefile"), None);
        assert!(FileType::selects(&[FileType::Any], "README"));
        assert!(FileType::selects(&[FileType::Xml, FileType::Dmn], "d/x.dmn"));
        assert!(!FileType::selects(&[FileType::Json], "d/x.dmn"));
    }

    #[test]
    fn positions_are_one_based() {
        let text = "ab\ncdé\nf";
        assert_eq!(line_col(text, 0), (1, 1));
        assert_eq!(line_col(text, 4), (2, 2));
        assert_eq!(line_col(text, text.len()), (3, 2));
        assert_eq!(line_of(text, "f"), Some(3));
        assert_eq!(line_of(text, "zz"), None);
    }

    #[test]
    fn violation_display_includes_position() {
        let v = Violation {
            rule_id: "json-valid".into(),
            component: "json".into(),
            level: ValidationLevel::Error,
            file_path: "dak.json".into(),
            code: "INVALID_JSON".into(),
            message: "trailing comma".into(),
            line: Some(3),
            column: Some(7),
            suggestion: None,
        };
        assert_eq!(v.to_string(), "dak.json:3:7 error [INVALID_JSON] trailing comma");
    }
}
