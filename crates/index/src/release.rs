//! `Release` and `InRelease` files

use aptsync_errors::{Error, IndexError};
use aptsync_hash::{Checksum, ChecksumAlgorithm, ChecksumSet};
use std::borrow::Cow;
use std::collections::HashMap;

use crate::stanza::parse_stanzas;

const SIGNED_HEADER: &str = "-----BEGIN PGP SIGNED MESSAGE-----";
const SIGNATURE_HEADER: &str = "-----BEGIN PGP SIGNATURE-----";

/// One file listed in a Release checksum section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseEntry {
    /// Path relative to the Release file's directory
    pub path: String,
    pub size: u64,
    pub checksums: ChecksumSet,
}

/// Parsed Release file
#[derive(Debug, Clone, Default)]
pub struct ReleaseFile {
    acquire_by_hash: bool,
    entries: Vec<ReleaseEntry>,
    positions: HashMap<String, usize>,
    skipped_lines: Vec<String>,
}

impl ReleaseFile {
    /// Parse Release text; clearsigned `InRelease` input is unwrapped first.
    ///
    /// Checksum lines that are not `<digest> <size> <path>` are collected in
    /// `skipped_lines` rather than failing the file.
    ///
    /// # Errors
    ///
    /// Returns `MalformedRelease` if the text holds no fields at all.
    pub fn parse(text: &str, path: &str) -> Result<Self, Error> {
        let body = strip_clearsign(text);
        let Some(stanza) = parse_stanzas(&body).into_iter().find(|s| !s.is_empty()) else {
            return Err(IndexError::MalformedRelease {
                path: path.to_string(),
                message: "no fields found".to_string(),
            }
            .into());
        };

        let mut release = Self {
            acquire_by_hash: stanza
                .get("Acquire-By-Hash")
                .is_some_and(|v| v.eq_ignore_ascii_case("yes")),
            ..Self::default()
        };

        for field in &stanza.fields {
            let Some(algorithm) = ChecksumAlgorithm::from_release_field(&field.name) else {
                continue;
            };
            let lines = std::iter::once(field.value.as_str())
                .filter(|v| !v.is_empty())
                .chain(field.continuation.iter().map(String::as_str));
            for line in lines {
                if let Err(reason) = release.add_line(algorithm, line) {
                    release.skipped_lines.push(format!("{line} ({reason})"));
                }
            }
        }
        Ok(release)
    }

    fn add_line(&mut self, algorithm: ChecksumAlgorithm, line: &str) -> Result<(), &'static str> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        let [digest, size, path] = parts.as_slice() else {
            return Err("expected digest, size and path");
        };
        let checksum = Checksum::from_hex(algorithm, digest).map_err(|_| "invalid digest")?;
        let size: u64 = size.parse().map_err(|_| "invalid size")?;
        if !is_safe_relative(path) {
            return Err("unsafe path");
        }

        match self.positions.get(*path) {
            Some(&at) => {
                let entry = &mut self.entries[at];
                if entry.size != size {
                    return Err("size disagrees with another section");
                }
                entry.checksums.insert(checksum);
            }
            None => {
                self.positions.insert((*path).to_string(), self.entries.len());
                self.entries.push(ReleaseEntry {
                    path: (*path).to_string(),
                    size,
                    checksums: [checksum].into_iter().collect(),
                });
            }
        }
        Ok(())
    }

    /// Whether the archive serves index files under `by-hash/`
    #[must_use]
    pub fn acquire_by_hash(&self) -> bool {
        self.acquire_by_hash
    }

    /// Listed files in order of first appearance
    #[must_use]
    pub fn entries(&self) -> &[ReleaseEntry] {
        &self.entries
    }

    #[must_use]
    pub fn get(&self, path: &str) -> Option<&ReleaseEntry> {
        self.positions.get(path).map(|&at| &self.entries[at])
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn skipped_lines(&self) -> &[String] {
        &self.skipped_lines
    }
}

/// Remove the clearsign armour of an `InRelease` file.
///
/// Text that is not clearsigned is returned unchanged.
#[must_use]
pub fn strip_clearsign(text: &str) -> Cow<'_, str> {
    if !text.trim_start().starts_with(SIGNED_HEADER) {
        return Cow::Borrowed(text);
    }

    let mut body = String::with_capacity(text.len());
    let mut lines = text.lines().skip_while(|l| l.trim() != SIGNED_HEADER).skip(1);
    // Armour headers (`Hash: ...`) end at the first blank line
    for line in lines.by_ref() {
        if line.trim().is_empty() {
            break;
        }
    }
    for line in lines {
        if line.trim_end() == SIGNATURE_HEADER {
            break;
        }
        body.push_str(line.strip_prefix("- ").unwrap_or(line));
        body.push('\n');
    }
    Cow::Owned(body)
}

/// Relative path without `..`, `.` or empty components
pub(crate) fn is_safe_relative(path: &str) -> bool {
    !path.is_empty()
        && !path.starts_with('/')
        && !path.contains('\\')
        && path
            .split('/')
            .all(|part| !part.is_empty() && part != "." && part != "..")
}
