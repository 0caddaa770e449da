//! Component source descriptors: where a DAK component's data lives.
//!
//! A source is exactly one of a canonical URI, an absolute URL, a path under the
//! repository's `input/` root, or an inline instance. In `dak.json` a source is an
//! object carrying one of the keys `canonical`, `url` or `instance`; `url` values
//! are split into absolute and relative variants on load.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Relative sources may only resolve to paths below this directory.
pub const PERMITTED_ROOT: &str = "input/";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SourceError {
    #[error("source declares none of `canonical`, `url` or `instance`")]
    Empty,
    #[error("source declares more than one of `canonical`, `url` and `instance`")]
    Ambiguous,
}

/// Freshness hints carried alongside a source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
}

/// The populated variant of a [`DakComponentSource`].
#[derive(Debug, Clone, PartialEq)]
pub enum SourceLocation<T> {
    Canonical { uri: String },
    UrlAbsolute { href: String },
    UrlRelative { path: String },
    Inline { data: T },
}

/// One entry of a component collection in `dak.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SourceRepr<T>", into = "SourceRepr<T>")]
#[serde(bound(
    serialize = "T: Serialize + Clone",
    deserialize = "T: DeserializeOwned"
))]
pub struct DakComponentSource<T = serde_json::Value> {
    pub location: SourceLocation<T>,
    pub metadata: Option<SourceMetadata>,
}

impl<T> DakComponentSource<T> {
    pub fn canonical(uri: impl Into<String>) -> Self {
        Self::at(SourceLocation::Canonical { uri: uri.into() })
    }

    /// A `url` source; classified as absolute or relative the same way `dak.json` is.
    pub fn url(url: impl Into<String>) -> Self {
        Self::at(classify_url(url.into()))
    }

    pub fn relative(path: impl Into<String>) -> Self {
        Self::at(SourceLocation::UrlRelative { path: path.into() })
    }

    pub fn inline(data: T) -> Self {
        Self::at(SourceLocation::Inline { data })
    }

    pub fn with_metadata(mut self, metadata: SourceMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn source_type(&self) -> SourceType {
        determine_source_type(self)
    }

    /// The canonical URI, URL or path this source points at; `None` for inline data.
    pub fn reference(&self) -> Option<&str> {
        match &self.location {
            SourceLocation::Canonical { uri } => Some(uri),
            SourceLocation::UrlAbsolute { href } => Some(href),
            SourceLocation::UrlRelative { path } => Some(path),
            SourceLocation::Inline { .. } => None,
        }
    }

    fn at(location: SourceLocation<T>) -> Self {
        Self {
            location,
            metadata: None,
        }
    }
}

fn classify_url<T>(url: String) -> SourceLocation<T> {
    if url.contains("://") {
        SourceLocation::UrlAbsolute { href: url }
    } else {
        SourceLocation::UrlRelative { path: url }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(bound(serialize = "T: Serialize", deserialize = "T: DeserializeOwned"))]
struct SourceRepr<T> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    canonical: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    instance: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    metadata: Option<SourceMetadata>,
}

impl<T> TryFrom<SourceRepr<T>> for DakComponentSource<T> {
    type Error = SourceError;

    fn try_from(repr: SourceRepr<T>) -> Result<Self, Self::Error> {
        let location = match (repr.canonical, repr.url, repr.instance) {
            (Some(uri), None, None) => SourceLocation::Canonical { uri },
            (None, Some(url), None) => classify_url(url),
            (None, None, Some(data)) => SourceLocation::Inline { data },
            (None, None, None) => return Err(SourceError::Empty),
            _ => return Err(SourceError::Ambiguous),
        };
        Ok(Self {
            location,
            metadata: repr.metadata,
        })
    }
}

impl<T> From<DakComponentSource<T>> for SourceRepr<T> {
    fn from(source: DakComponentSource<T>) -> Self {
        let mut repr = SourceRepr {
            canonical: None,
            url: None,
            instance: None,
            metadata: source.metadata,
        };
        match source.location {
            SourceLocation::Canonical { uri } => repr.canonical = Some(uri),
            SourceLocation::UrlAbsolute { href } => repr.url = Some(href),
            SourceLocation::UrlRelative { path } => repr.url = Some(path),
            SourceLocation::Inline { data } => repr.instance = Some(data),
        }
        repr
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceType {
    Canonical,
    UrlAbsolute,
    UrlRelative,
    Inline,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Canonical => "canonical",
            Self::UrlAbsolute => "url-absolute",
            Self::UrlRelative => "url-relative",
            Self::Inline => "inline",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Data produced by resolving a source. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedSource<T> {
    pub data: T,
    pub source_type: SourceType,
    pub resolved_at: DateTime<Utc>,
    pub from_cache: bool,
}

impl<T> ResolvedSource<T> {
    pub fn new(data: T, source_type: SourceType, from_cache: bool) -> Self {
        Self {
            data,
            source_type,
            resolved_at: Utc::now(),
            from_cache,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ResolvedSource<U> {
        ResolvedSource {
            data: f(self.data),
            source_type: self.source_type,
            resolved_at: self.resolved_at,
            from_cache: self.from_cache,
        }
    }
}

/// Pure discriminator; performs no I/O.
pub fn determine_source_type<T>(source: &DakComponentSource<T>) -> SourceType {
    match source.location {
        SourceLocation::Canonical { .. } => SourceType::Canonical,
        SourceLocation::UrlAbsolute { .. } => SourceType::UrlAbsolute,
        SourceLocation::UrlRelative { .. } => SourceType::UrlRelative,
        SourceLocation::Inline { .. } => SourceType::Inline,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathViolation {
    #[error("path is empty")]
    Empty,
    #[error("path `{0}` is absolute")]
    Absolute(String),
    #[error("path `{0}` contains backslashes")]
    Backslash(String),
    #[error("path `{path}` escapes the permitted root `{root}`")]
    EscapesRoot { path: String, root: String },
}

/// Normalize a relative source path into a repository path below `root`.
///
/// Paths already starting with `root` are taken as repository paths, anything
/// else is joined onto `root`. `.` segments are dropped and `..` segments pop;
/// the result must still lie strictly below `root`.
pub fn normalize_relative_path(path: &str, root: &str) -> Result<String, PathViolation> {
    let trimmed = path.trim();
    if trimmed.is_empty() {
        return Err(PathViolation::Empty);
    }
    if trimmed.contains('\\') {
        return Err(PathViolation::Backslash(trimmed.to_string()));
    }
    if trimmed.starts_with('/') || trimmed.contains("://") {
        return Err(PathViolation::Absolute(trimmed.to_string()));
    }

    let root_dir = root.trim_end_matches('/');
    let relative = trimmed.strip_prefix("./").unwrap_or(trimmed);
    let joined = if relative.starts_with(&format!("{root_dir}/")) {
        relative.to_string()
    } else {
        format!("{root_dir}/{relative}")
    };

    let escapes = || PathViolation::EscapesRoot {
        path: trimmed.to_string(),
        root: format!("{root_dir}/"),
    };

    let mut segments: Vec<&str> = Vec::new();
    for segment in joined.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop().ok_or_else(escapes)?;
            }
            other => segments.push(other),
        }
    }

    if segments.len() < 2 || segments[0] != root_dir {
        return Err(escapes());
    }
    Ok(segments.join("/"))
}

/// Structural report from [`validate_source`]; never fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceValidationReport {
    pub source_type: SourceType,
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// Fast structural checks (URL shape, path containment) without network or
/// storage access.
pub fn validate_source<T: Serialize>(source: &DakComponentSource<T>) -> SourceValidationReport {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    match &source.location {
        SourceLocation::Canonical { uri } => {
            if uri.trim().is_empty() {
                errors.push("canonical URI is empty".to_string());
            } else if let Err(e) = Url::parse(uri) {
                errors.push(format!("canonical `{uri}` is not an absolute URI: {e}"));
            }
        }
        SourceLocation::UrlAbsolute { href } => match Url::parse(href) {
            Ok(url) if !matches!(url.scheme(), "http" | "https") => {
                errors.push(format!("unsupported URL scheme `{}` in `{href}`", url.scheme()));
            }
            Ok(url) if url.host_str().is_none() => {
                errors.push(format!("URL `{href}` has no host"));
            }
            Ok(_) => {}
            Err(e) => errors.push(format!("malformed URL `{href}`: {e}")),
        },
        SourceLocation::UrlRelative { path } => {
            if let Err(violation) = normalize_relative_path(path, PERMITTED_ROOT) {
                errors.push(violation.to_string());
            } else if !path.trim_start_matches("./").starts_with(PERMITTED_ROOT) {
                warnings.push(format!(
                    "relative path `{path}` is interpreted below `{PERMITTED_ROOT}`"
                ));
            }
        }
        SourceLocation::Inline { data } => match serde_json::to_value(data) {
            Ok(serde_json::Value::Object(_)) => {}
            Ok(_) => warnings.push("inline instance is not a JSON object".to_string()),
            Err(e) => errors.push(format!("inline instance cannot be represented as JSON: {e}")),
        },
    }

    SourceValidationReport {
        source_type: determine_source_type(source),
        is_valid: errors.is_empty(),
        errors,
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn url_values_split_into_absolute_and_relative() {
        let abs: DakComponentSource = serde_json::from_value(json!({"url": "https://example.org/p.json"})).unwrap();
        let rel: DakComponentSource = serde_json::from_value(json!({"url": "input/process/anc.bpmn"})).unwrap();
        assert_eq!(abs.source_type(), SourceType::UrlAbsolute);
        assert_eq!(rel.source_type(), SourceType::UrlRelative);
    }

    #[test]
    fn source_json_keeps_dak_json_shape() {
        let source: DakComponentSource =
            DakComponentSource::canonical("http://smart.who.int/anc/ActorDefinition/client")
                .with_metadata(SourceMetadata {
                    last_modified: None,
                    etag: Some("W/\"1\"".into()),
                });
        let json = serde_json::to_value(&source).unwrap();
        assert_eq!(
            json,
            json!({
                "canonical": "http://smart.who.int/anc/ActorDefinition/client",
                "metadata": {"etag": "W/\"1\""}
            })
        );
        let parsed: DakComponentSource = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, source);
    }

    #[test]
    fn inline_instance_roundtrip() {
        let source = DakComponentSource::inline(json!({"id": "client", "name": "Client"}));
        let json = serde_json::to_string(&source).unwrap();
        assert!(json.contains("\"instance\""));
        let parsed: DakComponentSource = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.source_type(), SourceType::Inline);
        assert_eq!(parsed.reference(), None);
    }

    #[test]
    fn empty_and_ambiguous_sources_rejected() {
        let empty = serde_json::from_value::<DakComponentSource>(json!({"metadata": {}}));
        assert!(empty.unwrap_err().to_string().contains("none of"));

        let both = serde_json::from_value::<DakComponentSource>(
            json!({"canonical": "http://x.org/a", "url": "input/a.json"}),
        );
        assert!(both.unwrap_err().to_string().contains("more than one"));
    }

    #[test]
    fn relative_paths_join_under_input() {
        assert_eq!(
            normalize_relative_path("process/anc.bpmn", PERMITTED_ROOT).unwrap(),
            "input/process/anc.bpmn"
        );
        assert_eq!(
            normalize_relative_path("./input/fsh/actors/../actors/client.fsh", PERMITTED_ROOT)
                .unwrap(),
            "input/fsh/actors/client.fsh"
        );
    }

    #[test]
    fn relative_paths_cannot_escape_root() {
        for path in ["../sushi-config.yaml", "input/../dak.json", "input", "input/.."] {
            assert!(
                matches!(
                    normalize_relative_path(path, PERMITTED_ROOT),
                    Err(PathViolation::EscapesRoot { .. })
                ),
                "{path} should escape"
            );
        }
        assert_eq!(
            normalize_relative_path("/etc/passwd", PERMITTED_ROOT),
            Err(PathViolation::Absolute("/etc/passwd".into()))
        );
        assert!(matches!(
            normalize_relative_path("input\\a.json", PERMITTED_ROOT),
            Err(PathViolation::Backslash(_))
        ));
    }

    #[test]
    fn validate_source_reports_without_io() {
        let good: DakComponentSource = DakComponentSource::url("https://example.org/a.json");
        assert!(validate_source(&good).is_valid);

        let ftp: DakComponentSource = DakComponentSource::url("ftp://example.org/a.json");
        let report = validate_source(&ftp);
        assert!(!report.is_valid);
        assert!(report.errors[0].contains("unsupported URL scheme"));

        let escaping: DakComponentSource = DakComponentSource::relative("../../secrets.json");
        let report = validate_source(&escaping);
        assert_eq!(report.source_type, SourceType::UrlRelative);
        assert!(!report.is_valid);

        let shorthand: DakComponentSource = DakComponentSource::relative("process/a.bpmn");
        let report = validate_source(&shorthand);
        assert!(report.is_valid);
        assert_eq!(report.warnings.len(), 1);

        let scalar = DakComponentSource::inline(json!(42));
        let report = validate_source(&scalar);
        assert!(report.is_valid);
        assert_eq!(report.warnings, vec!["inline instance is not a JSON object"]);

        let bad_canonical: DakComponentSource = DakComponentSource::canonical("not a uri");
        assert!(!validate_source(&bad_canonical).is_valid);
    }
}
