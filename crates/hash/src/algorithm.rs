use serde::{Deserialize, Serialize};
use std::fmt;

/// Digest algorithms found in APT indexes, ordered from weakest to strongest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumAlgorithm {
    Md5,
    Sha1,
    Sha256,
    Sha512,
}

impl ChecksumAlgorithm {
    pub const ALL: [Self; 4] = [Self::Md5, Self::Sha1, Self::Sha256, Self::Sha512];

    /// Section heading used in Release files, also the `by-hash/` directory name
    #[must_use]
    pub fn release_field(self) -> &'static str {
        match self {
            Self::Md5 => "MD5Sum",
            Self::Sha1 => "SHA1",
            Self::Sha256 => "SHA256",
            Self::Sha512 => "SHA512",
        }
    }

    /// Field name used inside Packages stanzas
    #[must_use]
    pub fn packages_field(self) -> &'static str {
        match self {
            Self::Md5 => "MD5sum",
            Self::Sha1 => "SHA1",
            Self::Sha256 => "SHA256",
            Self::Sha512 => "SHA512",
        }
    }

    /// Multi-line field name used inside Sources stanzas
    #[must_use]
    pub fn sources_field(self) -> &'static str {
        match self {
            Self::Md5 => "Files",
            Self::Sha1 => "Checksums-Sha1",
            Self::Sha256 => "Checksums-Sha256",
            Self::Sha512 => "Checksums-Sha512",
        }
    }

    /// Match a Release section heading, case-insensitively
    #[must_use]
    pub fn from_release_field(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|a| a.release_field().eq_ignore_ascii_case(name))
    }

    #[must_use]
    pub fn hex_len(self) -> usize {
        match self {
            Self::Md5 => 32,
            Self::Sha1 => 40,
            Self::Sha256 => 64,
            Self::Sha512 => 128,
        }
    }

    /// SHA256 and above are trusted on their own
    #[must_use]
    pub fn is_strong(self) -> bool {
        self >= Self::Sha256
    }
}

impl fmt::Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.release_field())
    }
}
