#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Repository index resolution for aptsync
//!
//! This crate turns a configured repository entry into the index files it
//! must mirror and the artifacts those indexes reference. It parses the
//! Release file, selects per-architecture and per-component indexes, stages
//! them through the fetcher, expands compressed variants and reads every
//! Packages/Sources stanza into a validated record.

mod decompress;
mod records;
mod release;
mod resolver;
mod selection;
mod stanza;

pub use decompress::{Compression, Decompressor};
pub use records::{
    packages_stanza, parse_index, sources_stanza, FileRecord, ParsedIndex, StanzaOutcome,
};
pub use release::{strip_clearsign, ReleaseEntry, ReleaseFile};
pub use resolver::{IndexFetchSummary, IndexResolver, Resolution, ResolveOptions};
pub use selection::{
    architectures_for, plain_name, select_indexes, SelectedIndex, SelectionOptions,
    COMPRESSION_SUFFIXES,
};
pub use stanza::{parse_stanzas, Field, Stanza};
