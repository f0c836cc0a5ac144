//! Index files a repository entry must retrieve

use aptsync_hash::ChecksumSet;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::EntryId;

/// Logical kind of an index file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexKind {
    InRelease,
    Release,
    ReleaseSignature,
    /// `binary-<arch>/Release` or `source/Release`
    ComponentRelease,
    Packages,
    Sources,
    Contents,
    Translation,
    TranslationIndex,
    Commands,
    Dep11,
    ByHash,
    Other,
}

impl IndexKind {
    /// Classify a path listed in a Release file
    #[must_use]
    pub fn classify(path: &str) -> Self {
        let name = path.rsplit('/').next().unwrap_or(path);
        let stem = name.split('.').next().unwrap_or(name);
        if path.contains("/by-hash/") {
            Self::ByHash
        } else if stem == "Release" {
            Self::ComponentRelease
        } else if stem == "Packages" {
            Self::Packages
        } else if stem == "Sources" {
            Self::Sources
        } else if stem.starts_with("Contents-") {
            Self::Contents
        } else if stem.starts_with("Translation-") {
            Self::Translation
        } else if path.ends_with("i18n/Index") {
            Self::TranslationIndex
        } else if stem.starts_with("Commands-") {
            Self::Commands
        } else if path.contains("/dep11/") {
            Self::Dep11
        } else {
            Self::Other
        }
    }

    /// Whether the artifacts listed inside this index are parsed
    #[must_use]
    pub fn lists_artifacts(self) -> bool {
        matches!(self, Self::Packages | Self::Sources)
    }
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::InRelease => "InRelease",
            Self::Release => "Release",
            Self::ReleaseSignature => "Release.gpg",
            Self::ComponentRelease => "component Release",
            Self::Packages => "Packages",
            Self::Sources => "Sources",
            Self::Contents => "Contents",
            Self::Translation => "Translation",
            Self::TranslationIndex => "i18n Index",
            Self::Commands => "Commands",
            Self::Dep11 => "DEP-11",
            Self::ByHash => "by-hash",
            Self::Other => "other",
        };
        f.write_str(s)
    }
}

/// One index file to retrieve for a repository entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDescriptor {
    pub kind: IndexKind,
    pub owner: EntryId,
    pub url: String,
    /// Path relative to the mirror root
    pub rel_path: String,
    /// Where the file is staged during the run
    pub local_path: PathBuf,
    /// Declared by the Release file; unknown for the Release files themselves
    pub size: Option<u64>,
    #[serde(default)]
    pub checksums: ChecksumSet,
}
