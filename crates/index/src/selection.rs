//! Which files listed in a Release file an entry mirrors

use aptsync_hash::ChecksumSet;
use aptsync_types::{IndexKind, RepositoryEntry, SourceKind};
use std::collections::HashSet;

use crate::release::ReleaseFile;

/// Compression suffixes an index may carry
pub const COMPRESSION_SUFFIXES: [&str; 5] = ["gz", "xz", "bz2", "lzma", "zst"];

/// Inputs to index selection besides the entry itself
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionOptions {
    /// Used when the entry declares no architectures
    pub default_architecture: String,
    pub contents: bool,
    pub by_hash: bool,
    pub languages: Vec<String>,
}

impl Default for SelectionOptions {
    fn default() -> Self {
        Self {
            default_architecture: "amd64".to_string(),
            contents: true,
            by_hash: false,
            languages: vec!["en".to_string()],
        }
    }
}

/// An index file chosen from a Release listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedIndex {
    pub kind: IndexKind,
    /// Relative to the Release file's directory
    pub path: String,
    pub size: u64,
    pub checksums: ChecksumSet,
}

/// Pick the index files an entry mirrors, in Release listing order.
///
/// When by-hash is enabled and the Release file declares
/// `Acquire-By-Hash: yes`, every chosen file inside a directory also yields
/// one `by-hash/<Algorithm>/<digest>` sibling per declared checksum.
#[must_use]
pub fn select_indexes(
    entry: &RepositoryEntry,
    release: &ReleaseFile,
    options: &SelectionOptions,
) -> Vec<SelectedIndex> {
    let patterns = patterns_for(entry, options);
    let mut seen = HashSet::new();
    let mut selected = Vec::new();

    for listed in release.entries() {
        let wanted = entry.is_flat() || patterns.iter().any(|p| p.matches(&listed.path));
        if !wanted || !seen.insert(listed.path.clone()) {
            continue;
        }
        selected.push(SelectedIndex {
            kind: IndexKind::classify(&listed.path),
            path: listed.path.clone(),
            size: listed.size,
            checksums: listed.checksums.clone(),
        });
    }

    if options.by_hash && release.acquire_by_hash() {
        let mut hashed = Vec::new();
        for index in &selected {
            let Some((dir, _)) = index.path.rsplit_once('/') else {
                continue;
            };
            for checksum in index.checksums.iter() {
                let path = format!(
                    "{dir}/by-hash/{}/{}",
                    checksum.algorithm().release_field(),
                    checksum.to_hex()
                );
                if seen.insert(path.clone()) {
                    hashed.push(SelectedIndex {
                        kind: IndexKind::ByHash,
                        path,
                        size: index.size,
                        checksums: index.checksums.clone(),
                    });
                }
            }
        }
        selected.extend(hashed);
    }
    selected
}

/// Architectures an entry covers
#[must_use]
pub fn architectures_for(entry: &RepositoryEntry, options: &SelectionOptions) -> Vec<String> {
    if entry.architectures.is_empty() {
        vec![options.default_architecture.clone()]
    } else {
        entry.architectures.clone()
    }
}

/// Strip a known compression suffix: `Packages.xz` gives `Packages`
#[must_use]
pub fn plain_name(path: &str) -> &str {
    path.rsplit_once('.')
        .filter(|(stem, ext)| COMPRESSION_SUFFIXES.contains(ext) && !stem.ends_with('/'))
        .map_or(path, |(stem, _)| stem)
}

#[derive(Debug)]
enum Pattern {
    /// The exact path
    Exact(String),
    /// The path, optionally followed by a compression suffix
    Compressed(String),
    /// `<dir>/<prefix>*<suffix>` optionally compressed, no further `/`
    Wildcard {
        dir: String,
        prefix: String,
        suffix: String,
    },
}

impl Pattern {
    fn matches(&self, path: &str) -> bool {
        match self {
            Self::Exact(p) => path == p,
            Self::Compressed(p) => plain_name(path) == p,
            Self::Wildcard {
                dir,
                prefix,
                suffix,
            } => {
                let plain = plain_name(path);
                let Some(name) = plain
                    .strip_prefix(dir.as_str())
                    .and_then(|rest| rest.strip_prefix('/'))
                else {
                    return false;
                };
                !name.contains('/')
                    && name.len() > prefix.len() + suffix.len()
                    && name.starts_with(prefix.as_str())
                    && name.ends_with(suffix.as_str())
            }
        }
    }
}

fn patterns_for(entry: &RepositoryEntry, options: &SelectionOptions) -> Vec<Pattern> {
    let mut patterns = Vec::new();
    match entry.kind {
        SourceKind::Binary => {
            for arch in architectures_for(entry, options) {
                if options.contents {
                    patterns.push(Pattern::Compressed(format!("Contents-{arch}")));
                }
                for comp in &entry.components {
                    if options.contents {
                        patterns.push(Pattern::Compressed(format!("{comp}/Contents-{arch}")));
                    }
                    patterns.push(Pattern::Exact(format!("{comp}/binary-{arch}/Release")));
                    patterns.push(Pattern::Compressed(format!("{comp}/binary-{arch}/Packages")));
                    patterns.push(Pattern::Compressed(format!("{comp}/cnf/Commands-{arch}")));
                    patterns.push(Pattern::Compressed(format!(
                        "{comp}/dep11/Components-{arch}.yml"
                    )));
                }
            }
            for comp in &entry.components {
                patterns.push(Pattern::Exact(format!("{comp}/i18n/Index")));
                for lang in &options.languages {
                    patterns.push(Pattern::Compressed(format!("{comp}/i18n/Translation-{lang}")));
                    // Regional variants such as Translation-en_GB
                    patterns.push(Pattern::Wildcard {
                        dir: format!("{comp}/i18n"),
                        prefix: format!("Translation-{lang}_"),
                        suffix: String::new(),
                    });
                }
                patterns.push(Pattern::Wildcard {
                    dir: format!("{comp}/dep11"),
                    prefix: "icons-".to_string(),
                    suffix: ".tar".to_string(),
                });
            }
        }
        SourceKind::Source => {
            if options.contents {
                patterns.push(Pattern::Compressed("Contents-source".to_string()));
            }
            for comp in &entry.components {
                if options.contents {
                    patterns.push(Pattern::Compressed(format!("{comp}/Contents-source")));
                }
                patterns.push(Pattern::Exact(format!("{comp}/source/Release")));
                patterns.push(Pattern::Compressed(format!("{comp}/source/Sources")));
            }
        }
    }
    patterns
}
