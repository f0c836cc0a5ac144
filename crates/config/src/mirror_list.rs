//! Parser for the line-oriented mirror list (`aptsync.conf`)
//!
//! ```text
//! set threads = 8
//! deb [arch=amd64,i386] http://deb.debian.org/debian bookworm main contrib
//! deb-src http://deb.debian.org/debian bookworm main
//! deb http://repo.example.test/flat ./
//! clean http://deb.debian.org/debian False
//! ```

use aptsync_errors::{ConfigError, Error};
use aptsync_types::{RepositoryEntry, SourceKind};
use std::collections::HashMap;

use crate::settings::parse_bool;
use crate::Settings;

/// Written by `aptsync init`
pub const DEFAULT_MIRROR_LIST: &str = "\
############# aptsync mirror list #############
#
# set <option> = <value>
#
# set architecture    = amd64
# set rootPath        = /srv/aptsync
# set contents        = True
# set threads         = 8
# set limitRate       = 500m
# set language        = en
# set forceUpdate     = False
# set byHash          = False
# set disableClean    = False
# set logLevel        = INFO
#
# deb [arch=<arch>,...] <uri> <distribution> <component>...
# deb-src <uri> <distribution> <component>...
# clean <uri> False
#
###############################################

deb http://deb.debian.org/debian bookworm main
";

/// One parsed line of the mirror list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    Set { name: String, value: String },
    Repository(RepositoryEntry),
    Clean { uri: String, enabled: bool },
}

/// Parse the whole mirror list into settings and repository entries.
///
/// Settings start from `settings` and are overridden in file order. Entries
/// without `[arch=...]` get the final default architecture.
///
/// # Errors
///
/// Returns `ConfigError::InvalidLine` with the 1-based line number of the
/// first malformed directive.
pub fn parse_mirror_list(
    text: &str,
    mut settings: Settings,
) -> Result<(Settings, Vec<RepositoryEntry>), Error> {
    let mut entries = Vec::new();
    let mut clean_overrides: HashMap<String, bool> = HashMap::new();

    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = strip_comment(raw).trim();
        if line.is_empty() {
            continue;
        }
        let directive = parse_directive(line).map_err(|message| ConfigError::InvalidLine {
            line: line_no,
            message,
        })?;
        match directive {
            Directive::Set { name, value } => {
                settings.apply(&name, &value).map_err(|e| ConfigError::InvalidLine {
                    line: line_no,
                    message: e.to_string(),
                })?;
            }
            Directive::Repository(entry) => entries.push(entry),
            Directive::Clean { uri, enabled } => {
                clean_overrides.insert(uri, enabled);
            }
        }
    }

    for entry in &mut entries {
        if let Some(enabled) = clean_overrides.get(&entry.uri) {
            entry.clean = *enabled;
        }
        if entry.architectures.is_empty() && entry.kind == SourceKind::Binary {
            entry.architectures.push(settings.architecture.clone());
        }
    }

    Ok((settings, entries))
}

/// Parse a single non-empty, comment-free directive
///
/// # Errors
///
/// Returns a description of what is wrong with the line.
pub fn parse_directive(line: &str) -> Result<Directive, String> {
    let line = line.trim();
    let (keyword, rest) = line
        .split_once(char::is_whitespace)
        .map_or((line, ""), |(k, r)| (k, r.trim()));

    match keyword {
        "set" => parse_set(rest),
        "deb" => parse_repository(SourceKind::Binary, rest).map(Directive::Repository),
        "deb-src" => parse_repository(SourceKind::Source, rest).map(Directive::Repository),
        "clean" => parse_clean(rest),
        "" => Err("empty line".to_string()),
        other => Err(format!("unknown directive `{other}`")),
    }
}

fn parse_set(rest: &str) -> Result<Directive, String> {
    let (name, value) = rest
        .split_once('=')
        .ok_or_else(|| "expected `set <name> = <value>`".to_string())?;
    let name = name.trim();
    if name.is_empty() || name.contains(char::is_whitespace) {
        return Err(format!("invalid setting name `{name}`"));
    }
    Ok(Directive::Set {
        name: name.to_string(),
        value: value.trim().to_string(),
    })
}

fn parse_repository(kind: SourceKind, rest: &str) -> Result<RepositoryEntry, String> {
    let mut architectures = Vec::new();
    let mut rest = rest.trim_start();

    while let Some(options) = rest.strip_prefix('[') {
        let (block, after) = options
            .split_once(']')
            .ok_or_else(|| "unterminated `[` option block".to_string())?;
        for option in block.split_whitespace() {
            let (key, value) = option
                .split_once('=')
                .ok_or_else(|| format!("option `{option}` is not key=value"))?;
            if key == "arch" {
                architectures.extend(
                    value
                        .split(',')
                        .map(str::trim)
                        .filter(|a| !a.is_empty())
                        .map(str::to_string),
                );
            } else {
                tracing::warn!(option = key, "ignoring unsupported repository option");
            }
        }
        rest = after.trim_start();
    }

    let mut tokens = rest.split_whitespace();
    let uri = tokens
        .next()
        .ok_or_else(|| format!("`{}` line has no URI", kind.keyword()))?;
    if !uri.contains("://") {
        return Err(format!("`{uri}` is not a URI"));
    }
    let distribution = tokens.next().unwrap_or("");
    let components: Vec<String> = tokens.map(str::to_string).collect();

    if distribution.ends_with('/') && !components.is_empty() {
        return Err("flat repository (distribution ending in `/`) takes no components".to_string());
    }

    let distribution = if components.is_empty() && distribution == "/" {
        ""
    } else {
        distribution
    };

    Ok(RepositoryEntry::new(kind, uri, distribution, components).with_architectures(architectures))
}

fn parse_clean(rest: &str) -> Result<Directive, String> {
    let mut tokens = rest.split_whitespace();
    let uri = tokens
        .next()
        .ok_or_else(|| "`clean` needs a URI".to_string())?;
    let enabled = match tokens.next() {
        Some(flag) => parse_bool("clean", flag).map_err(|e| e.to_string())?,
        None => true,
    };
    if tokens.next().is_some() {
        return Err("`clean` takes a URI and an optional flag".to_string());
    }
    Ok(Directive::Clean {
        uri: uri.trim_end_matches('/').to_string(),
        enabled,
    })
}

fn strip_comment(line: &str) -> &str {
    line.split_once('#').map_or(line, |(before, _)| before)
}
