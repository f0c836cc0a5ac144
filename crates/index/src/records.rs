//! Artifact records from Packages and Sources stanzas

use aptsync_hash::{Checksum, ChecksumAlgorithm, ChecksumSet};
use aptsync_types::IndexKind;
use std::collections::BTreeMap;

use crate::release::is_safe_relative;
use crate::stanza::{parse_stanzas, Stanza};

/// One file named by an index, relative to the repository root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub path: String,
    pub size: u64,
    pub checksums: ChecksumSet,
}

/// Result of validating one stanza
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StanzaOutcome {
    Files(Vec<FileRecord>),
    Malformed { line: usize, reason: String },
}

/// All records of one index file plus the stanzas that were skipped
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedIndex {
    pub records: Vec<FileRecord>,
    /// `(line, reason)` of every skipped stanza
    pub skipped: Vec<(usize, String)>,
}

impl ParsedIndex {
    fn push(&mut self, outcome: StanzaOutcome) {
        match outcome {
            StanzaOutcome::Files(files) => self.records.extend(files),
            StanzaOutcome::Malformed { line, reason } => self.skipped.push((line, reason)),
        }
    }
}

/// Parse a plain Packages or Sources file
#[must_use]
pub fn parse_index(kind: IndexKind, text: &str) -> ParsedIndex {
    let mut parsed = ParsedIndex::default();
    for stanza in parse_stanzas(text) {
        let outcome = match kind {
            IndexKind::Sources => sources_stanza(&stanza),
            _ => packages_stanza(&stanza),
        };
        parsed.push(outcome);
    }
    parsed
}

fn malformed(stanza: &Stanza, reason: impl Into<String>) -> StanzaOutcome {
    StanzaOutcome::Malformed {
        line: stanza.line,
        reason: reason.into(),
    }
}

/// A binary package stanza: `Filename`, `Size` and at least one checksum
#[must_use]
pub fn packages_stanza(stanza: &Stanza) -> StanzaOutcome {
    if stanza.is_empty() {
        return malformed(stanza, "no fields");
    }
    let Some(path) = stanza.get("Filename") else {
        return malformed(stanza, "missing Filename");
    };
    // Flat repositories often write `./name.deb`
    let path = path.trim_start_matches("./");
    if !is_safe_relative(path) {
        return malformed(stanza, format!("unsafe Filename {path}"));
    }
    let Some(size) = stanza.get("Size") else {
        return malformed(stanza, "missing Size");
    };
    let Ok(size) = size.parse::<u64>() else {
        return malformed(stanza, format!("invalid Size {size}"));
    };

    let mut checksums = ChecksumSet::new();
    for algorithm in ChecksumAlgorithm::ALL {
        let Some(digest) = stanza.get(algorithm.packages_field()) else {
            continue;
        };
        match Checksum::from_hex(algorithm, digest) {
            Ok(checksum) => checksums.insert(checksum),
            Err(_) => {
                return malformed(
                    stanza,
                    format!("invalid {} digest", algorithm.packages_field()),
                )
            }
        }
    }
    if checksums.is_empty() {
        return malformed(stanza, "no checksum");
    }

    StanzaOutcome::Files(vec![FileRecord {
        path: path.to_string(),
        size,
        checksums,
    }])
}

/// A source package stanza: `Directory` plus `Files` / `Checksums-*` lists
#[must_use]
pub fn sources_stanza(stanza: &Stanza) -> StanzaOutcome {
    if stanza.is_empty() {
        return malformed(stanza, "no fields");
    }
    let Some(directory) = stanza.get("Directory") else {
        return malformed(stanza, "missing Directory");
    };
    let directory = match directory.trim_start_matches("./").trim_end_matches('/') {
        "." => "",
        other => other,
    };
    if !directory.is_empty() && !is_safe_relative(directory) {
        return malformed(stanza, format!("unsafe Directory {directory}"));
    }

    // Keyed by file name so every list contributes to the same record
    let mut files: BTreeMap<&str, (u64, ChecksumSet)> = BTreeMap::new();
    for algorithm in ChecksumAlgorithm::ALL {
        let Some(field) = stanza.field(algorithm.sources_field()) else {
            continue;
        };
        for line in &field.continuation {
            let parts: Vec<&str> = line.split_whitespace().collect();
            let [digest, size, name] = parts.as_slice() else {
                return malformed(stanza, format!("bad {} line: {line}", field.name));
            };
            let (Ok(checksum), Ok(size)) =
                (Checksum::from_hex(algorithm, digest), size.parse::<u64>())
            else {
                return malformed(stanza, format!("bad {} line: {line}", field.name));
            };
            if name.contains('/') || !is_safe_relative(name) {
                return malformed(stanza, format!("unsafe file name {name}"));
            }
            let record = files.entry(*name).or_insert_with(|| (size, ChecksumSet::new()));
            if record.0 != size {
                return malformed(stanza, format!("conflicting sizes for {name}"));
            }
            record.1.insert(checksum);
        }
    }
    if files.is_empty() {
        return malformed(stanza, "no file list");
    }

    StanzaOutcome::Files(
        files
            .into_iter()
            .map(|(name, (size, checksums))| FileRecord {
                path: if directory.is_empty() {
                    name.to_string()
                } else {
                    format!("{directory}/{name}")
                },
                size,
                checksums,
            })
            .collect(),
    )
}
