//! Debian repository simulation on top of httpmock
//!
//! Builds a `Release` file and a `Packages` index whose sizes and digests
//! match the package bodies served, so the real fetcher and resolver can be
//! exercised end to end.

use aptsync_hash::{Checksum, ChecksumAlgorithm};
use aptsync_types::{RepositoryEntry, SourceKind};
use flate2::write::GzEncoder;
use httpmock::prelude::*;
use httpmock::Mock;
use std::collections::HashMap;
use std::io::Write;

/// Served with every package so a second run can prove freshness
pub const LAST_MODIFIED: &str = "Wed, 21 Oct 2015 07:28:00 GMT";

pub const DISTRIBUTION: &str = "stable";
pub const COMPONENT: &str = "main";
pub const ARCH: &str = "amd64";

/// One `.deb` in the pool
#[derive(Debug, Clone)]
pub struct TestPackage {
    pub name: String,
    /// Path relative to the repository root, e.g. `pool/main/a/a1_1.0_amd64.deb`
    pub filename: String,
    pub content: Vec<u8>,
    /// Size written into the index; differs from `content.len()` for corrupt packages
    pub declared_size: u64,
}

impl TestPackage {
    pub fn new(name: &str, size: usize) -> Self {
        let initial = name.chars().next().unwrap_or('x');
        let content: Vec<u8> = (0..size).map(|i| (i % 251) as u8).collect();
        Self {
            name: name.to_string(),
            filename: format!("pool/{COMPONENT}/{initial}/{name}_1.0_{ARCH}.deb"),
            declared_size: content.len() as u64,
            content,
        }
    }

    fn stanza(&self) -> String {
        let digest = Checksum::from_data(ChecksumAlgorithm::Sha256, &self.content);
        format!(
            "Package: {}\nVersion: 1.0\nArchitecture: {ARCH}\nFilename: {}\nSize: {}\nSHA256: {}\n",
            self.name,
            self.filename,
            self.declared_size,
            digest.to_hex()
        )
    }
}

/// A repository served under `path` on a mock server
pub struct MockRepository<'s> {
    server: &'s MockServer,
    pub path: String,
    pub packages: Vec<TestPackage>,
    gzip_index: bool,
}

/// Live mocks of a published repository
pub struct PublishedRepository<'s> {
    pub release: Mock<'s>,
    pub index: Mock<'s>,
    pub debs: HashMap<String, Mock<'s>>,
}

impl<'s> MockRepository<'s> {
    pub fn new(server: &'s MockServer, path: &str) -> Self {
        Self {
            server,
            path: path.trim_end_matches('/').to_string(),
            packages: Vec::new(),
            gzip_index: false,
        }
    }

    pub fn with_package(mut self, name: &str, size: usize) -> Self {
        self.packages.push(TestPackage::new(name, size));
        self
    }

    /// Index declares `size` bytes but the server sends one byte less
    pub fn with_truncated_package(mut self, name: &str, size: usize) -> Self {
        let mut package = TestPackage::new(name, size);
        package.content.pop();
        self.packages.push(package);
        self
    }

    /// Serve only `Packages.gz`; the plain index must come from decompression
    pub fn with_gzip_index(mut self) -> Self {
        self.gzip_index = true;
        self
    }

    pub fn entry(&self) -> RepositoryEntry {
        RepositoryEntry::new(
            SourceKind::Binary,
            self.server.url(&self.path),
            DISTRIBUTION,
            vec![COMPONENT.to_string()],
        )
        .with_architectures(vec![ARCH.to_string()])
    }

    pub fn package(&self, name: &str) -> &TestPackage {
        self.packages
            .iter()
            .find(|p| p.name == name)
            .unwrap_or_else(|| panic!("no package {name}"))
    }

    /// Path of a package relative to the mirror root
    pub fn mirror_rel(&self, name: &str) -> String {
        format!("{}/{}", self.entry().local_root(), self.package(name).filename)
    }

    /// URL path a package is served from
    pub fn package_path(&self, name: &str) -> String {
        format!("{}/{}", self.path, self.package(name).filename)
    }

    /// Path of the plain binary index relative to the mirror root
    pub fn packages_rel(&self) -> String {
        format!(
            "{}/dists/{DISTRIBUTION}/{COMPONENT}/binary-{ARCH}/Packages",
            self.entry().local_root()
        )
    }

    pub fn packages_text(&self) -> String {
        self.packages
            .iter()
            .map(TestPackage::stanza)
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn release_text(&self, files: &[(String, &[u8])]) -> String {
        let mut text = format!("Origin: Test\nSuite: {DISTRIBUTION}\nSHA256:\n");
        for (path, content) in files {
            let digest = Checksum::from_data(ChecksumAlgorithm::Sha256, content);
            text.push_str(&format!(" {} {} {path}\n", digest.to_hex(), content.len()));
        }
        text
    }

    /// Register every mock and return them for hit counting
    pub fn publish(&self) -> PublishedRepository<'s> {
        let plain = self.packages_text().into_bytes();
        let index_dir = format!("{COMPONENT}/binary-{ARCH}");
        let dists = format!("{}/dists/{DISTRIBUTION}", self.path);

        let (release, index) = if self.gzip_index {
            let compressed = gzip(&plain);
            let release = self.release_text(&[
                (format!("{index_dir}/Packages"), &plain),
                (format!("{index_dir}/Packages.gz"), &compressed),
            ]);
            let index = self.server.mock(|when, then| {
                when.method(GET)
                    .path(format!("{dists}/{index_dir}/Packages.gz"));
                then.status(200).body(&compressed);
            });
            (release, index)
        } else {
            let release = self.release_text(&[(format!("{index_dir}/Packages"), &plain)]);
            let index = self.server.mock(|when, then| {
                when.method(GET).path(format!("{dists}/{index_dir}/Packages"));
                then.status(200).body(&plain);
            });
            (release, index)
        };

        let release = self.server.mock(|when, then| {
            when.method(GET).path(format!("{dists}/Release"));
            then.status(200).body(&release);
        });

        let debs = self
            .packages
            .iter()
            .map(|package| {
                let mock = self.serve_package(package);
                (package.name.clone(), mock)
            })
            .collect();

        PublishedRepository {
            release,
            index,
            debs,
        }
    }

    fn serve_package(&self, package: &TestPackage) -> Mock<'s> {
        let path = format!("{}/{}", self.path, package.filename);
        self.server.mock(|when, then| {
            when.method(GET).path(path);
            then.status(200)
                .header("Last-Modified", LAST_MODIFIED)
                .body(&package.content);
        })
    }

    /// Serve a `Packages.gz` that is not gzip, listed in a matching `Release`.
    ///
    /// The mocks of an earlier `publish` must be deleted first.
    pub fn serve_corrupt_gzip_index(&self) -> (Mock<'s>, Mock<'s>) {
        let corrupt = b"not a gzip stream".to_vec();
        let index_path = format!("{COMPONENT}/binary-{ARCH}/Packages.gz");
        let dists = format!("{}/dists/{DISTRIBUTION}", self.path);
        let release = self.release_text(&[(index_path.clone(), &corrupt)]);

        let release = self.server.mock(|when, then| {
            when.method(GET).path(format!("{dists}/Release"));
            then.status(200).body(&release);
        });
        let index = self.server.mock(|when, then| {
            when.method(GET).path(format!("{dists}/{index_path}"));
            then.status(200).body(&corrupt);
        });
        (release, index)
    }

    /// Answer conditional requests for a package with `304 Not Modified`
    pub fn serve_not_modified(&self, name: &str) -> Mock<'s> {
        let path = self.package_path(name);
        self.server.mock(|when, then| {
            when.method(GET)
                .path(path)
                .header_exists("if-modified-since");
            then.status(304);
        })
    }
}

pub fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}
