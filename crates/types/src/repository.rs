//! Repository entries as configured by the operator

use serde::{Deserialize, Serialize};
use std::fmt;

/// Position of an entry in the configured sequence
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct EntryId(pub usize);

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Binary (`deb`) or source (`deb-src`) repository
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    #[serde(rename = "deb")]
    Binary,
    #[serde(rename = "deb-src")]
    Source,
}

impl SourceKind {
    #[must_use]
    pub fn keyword(self) -> &'static str {
        match self {
            Self::Binary => "deb",
            Self::Source => "deb-src",
        }
    }
}

/// One configured mirror target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryEntry {
    pub kind: SourceKind,
    /// Base URI without trailing slash
    pub uri: String,
    /// Distribution name; for flat repositories, a directory relative to `uri`
    pub distribution: String,
    /// Empty for flat repositories
    #[serde(default)]
    pub components: Vec<String>,
    #[serde(default)]
    pub architectures: Vec<String>,
    /// Per-entry clean override
    #[serde(default = "default_clean")]
    pub clean: bool,
}

fn default_clean() -> bool {
    true
}

impl RepositoryEntry {
    /// Create an entry, normalising the URI
    #[must_use]
    pub fn new(
        kind: SourceKind,
        uri: impl Into<String>,
        distribution: impl Into<String>,
        components: Vec<String>,
    ) -> Self {
        Self {
            kind,
            uri: uri.into().trim_end_matches('/').to_string(),
            distribution: distribution.into(),
            components,
            architectures: Vec::new(),
            clean: true,
        }
    }

    #[must_use]
    pub fn with_architectures(mut self, architectures: Vec<String>) -> Self {
        self.architectures = architectures;
        self
    }

    #[must_use]
    pub fn is_flat(&self) -> bool {
        self.components.is_empty()
    }

    /// URL of the directory holding the Release files
    #[must_use]
    pub fn release_base_url(&self) -> String {
        let dist = self.distribution.trim_matches('/').trim_start_matches("./");
        let dist = if dist == "." { "" } else { dist };
        match (self.is_flat(), dist.is_empty()) {
            (true, true) => self.uri.clone(),
            (true, false) => format!("{}/{dist}", self.uri),
            (false, _) => format!("{}/dists/{dist}", self.uri),
        }
    }

    /// Path of this entry's repository root under the mirror root
    #[must_use]
    pub fn local_root(&self) -> String {
        sanitise_uri(&self.uri)
    }

    /// URL of a file given relative to the repository root
    #[must_use]
    pub fn url_for(&self, rel: &str) -> String {
        format!("{}/{}", self.uri, rel.trim_start_matches('/'))
    }
}

impl fmt::Display for RepositoryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind.keyword())?;
        if !self.architectures.is_empty() {
            write!(f, " [arch={}]", self.architectures.join(","))?;
        }
        write!(f, " {}", self.uri)?;
        if !self.distribution.is_empty() {
            write!(f, " {}", self.distribution)?;
        }
        for component in &self.components {
            write!(f, " {component}")?;
        }
        Ok(())
    }
}

/// Turn a URI into a relative local path: scheme, credentials and port are dropped.
///
/// `http://user:pw@host:8080/debian/` becomes `host/debian`.
#[must_use]
pub fn sanitise_uri(uri: &str) -> String {
    let rest = uri.split_once("://").map_or(uri, |(_, rest)| rest);
    let (authority, path) = rest.split_once('/').unwrap_or((rest, ""));
    let host = authority.rsplit_once('@').map_or(authority, |(_, host)| host);
    let host = if host.starts_with('[') {
        host.find(']').map_or(host, |end| &host[..=end])
    } else {
        host.split_once(':').map_or(host, |(name, _)| name)
    };
    let path = path.trim_matches('/');
    if path.is_empty() {
        host.to_string()
    } else {
        format!("{host}/{path}")
    }
}
