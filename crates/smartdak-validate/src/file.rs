use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileOrigin {
    Staged,
    Committed,
}

/// One file in a validation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DakFile {
    pub path: String,
    pub content: String,
    pub origin: FileOrigin,
    /// Set when the content could not be read; `content` is then empty.
    pub read_error: Option<String>,
    /// Only the path is known; rules that read content skip the file.
    pub path_only: bool,
}

impl DakFile {
    pub fn staged(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(path, content, FileOrigin::Staged)
    }

    pub fn committed(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(path, content, FileOrigin::Committed)
    }

    pub fn unreadable(path: impl Into<String>, origin: FileOrigin, error: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: String::new(),
            origin,
            read_error: Some(error.into()),
            path_only: false,
        }
    }

    /// A file listed but not fetched, e.g. a binary asset no content rule
    /// looks at.
    pub fn listed(path: impl Into<String>, origin: FileOrigin) -> Self {
        Self {
            path_only: true,
            ..Self::new(path, String::new(), origin)
        }
    }

    fn new(path: impl Into<String>, content: impl Into<String>, origin: FileOrigin) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
            origin,
            read_error: None,
            path_only: false,
        }
    }

    /// Last path segment.
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// Lowercased extension, if any.
    pub fn extension(&self) -> Option<String> {
        let name = self.file_name();
        let (stem, ext) = name.rsplit_once('.')?;
        (!stem.is_empty()).then(|| ext.to_ascii_lowercase())
    }
}
