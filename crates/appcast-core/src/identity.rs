use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

const NAMESPACE_LEAF: &str = "AutoUpdater";

/// Publisher and product name of the host application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppIdentity {
    pub publisher: Option<String>,
    pub name: String,
}

impl AppIdentity {
    #[must_use]
    pub fn new(publisher: Option<impl Into<String>>, name: impl Into<String>) -> Self {
        Self {
            publisher: publisher.map(Into::into),
            name: name.into(),
        }
    }

    /// Key prefix scoping this application's persisted decisions.
    ///
    /// `Acme` / `Widget` becomes `Acme/Widget/AutoUpdater`; without a
    /// publisher it is `Widget/AutoUpdater`.
    #[must_use]
    pub fn namespace(&self) -> Namespace {
        let mut segments = Vec::with_capacity(3);
        if let Some(publisher) = self.publisher.as_deref().filter(|p| !p.trim().is_empty()) {
            segments.push(sanitize_segment(publisher));
        }
        segments.push(sanitize_segment(&self.name));
        segments.push(NAMESPACE_LEAF.to_string());
        Namespace(segments.join("/"))
    }
}

/// Per-application key prefix, usable as a relative path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Namespace(String);

impl Namespace {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn as_path(&self) -> &Path {
        Path::new(&self.0)
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn sanitize_segment(raw: &str) -> String {
    let cleaned: String = raw
        .trim()
        .chars()
        .map(|ch| match ch {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            ch if ch.is_control() => '_',
            ch => ch,
        })
        .collect();
    let cleaned = cleaned.trim_matches('.');
    if cleaned.is_empty() {
        "_".to_string()
    } else {
        cleaned.to_string()
    }
}
