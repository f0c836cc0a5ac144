use crate::{Checksum, ChecksumAlgorithm, StreamHasher};
use aptsync_errors::Error;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// All digests declared for one file, keyed by algorithm
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChecksumSet {
    digests: BTreeMap<ChecksumAlgorithm, Checksum>,
}

impl ChecksumSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a digest, replacing any earlier one for the same algorithm
    pub fn insert(&mut self, checksum: Checksum) {
        self.digests.insert(checksum.algorithm(), checksum);
    }

    #[must_use]
    pub fn get(&self, algorithm: ChecksumAlgorithm) -> Option<&Checksum> {
        self.digests.get(&algorithm)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.digests.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.digests.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Checksum> {
        self.digests.values()
    }

    /// The strongest declared digest
    #[must_use]
    pub fn strongest(&self) -> Option<&Checksum> {
        self.digests.values().next_back()
    }

    #[must_use]
    pub fn has_strong(&self) -> bool {
        self.digests.keys().any(|a| a.is_strong())
    }

    /// One hasher per declared algorithm, fed from a single pass
    #[must_use]
    pub fn hasher(&self) -> SetHasher {
        SetHasher {
            hashers: self
                .digests
                .keys()
                .map(|algorithm| StreamHasher::new(*algorithm))
                .collect(),
        }
    }

    /// Check every declared digest against the computed ones.
    ///
    /// # Errors
    /// Returns `ChecksumMismatch` for the first declared digest that differs
    /// from its computed counterpart.
    pub fn verify(&self, computed: &ChecksumSet) -> Result<(), Error> {
        for expected in self.digests.values() {
            if let Some(actual) = computed.get(expected.algorithm()) {
                expected.verify(actual)?;
            }
        }
        Ok(())
    }

    /// Compare two declarations of the same file.
    ///
    /// Only algorithms present in both sets are compared. Returns the first
    /// disagreeing pair.
    #[must_use]
    pub fn conflict_with<'a>(&'a self, other: &'a Self) -> Option<(&'a Checksum, &'a Checksum)> {
        self.digests
            .iter()
            .find_map(|(algorithm, ours)| match other.digests.get(algorithm) {
                Some(theirs) if theirs != ours => Some((ours, theirs)),
                _ => None,
            })
    }
}

impl FromIterator<Checksum> for ChecksumSet {
    fn from_iter<I: IntoIterator<Item = Checksum>>(iter: I) -> Self {
        let mut set = Self::new();
        for checksum in iter {
            set.insert(checksum);
        }
        set
    }
}

/// Hashes one stream with several algorithms at once
pub struct SetHasher {
    hashers: Vec<StreamHasher>,
}

impl SetHasher {
    pub fn update(&mut self, data: &[u8]) {
        for hasher in &mut self.hashers {
            hasher.update(data);
        }
    }

    #[must_use]
    pub fn finalize(self) -> ChecksumSet {
        self.hashers.into_iter().map(StreamHasher::finalize).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn md5(data: &[u8]) -> Checksum {
        Checksum::from_data(ChecksumAlgorithm::Md5, data)
    }

    fn sha256(data: &[u8]) -> Checksum {
        Checksum::from_data(ChecksumAlgorithm::Sha256, data)
    }

    #[test]
    fn test_strongest_prefers_sha256_over_md5() {
        let set: ChecksumSet = [md5(b"x"), sha256(b"x")].into_iter().collect();
        assert_eq!(
            set.strongest().map(Checksum::algorithm),
            Some(ChecksumAlgorithm::Sha256)
        );
        assert!(set.has_strong());
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_conflict_only_on_shared_algorithms() {
        let a: ChecksumSet = [md5(b"x")].into_iter().collect();
        let b: ChecksumSet = [sha256(b"y")].into_iter().collect();
        assert!(a.conflict_with(&b).is_none());

        let c: ChecksumSet = [md5(b"y")].into_iter().collect();
        let (ours, theirs) = a.conflict_with(&c).unwrap();
        assert_eq!(ours, &md5(b"x"));
        assert_eq!(theirs, &md5(b"y"));
    }

    #[test]
    fn test_every_declared_digest_is_verified() {
        let declared: ChecksumSet = [md5(b"other"), sha256(b"body")].into_iter().collect();
        let mut hasher = declared.hasher();
        hasher.update(b"bo");
        hasher.update(b"dy");
        let computed = hasher.finalize();

        assert_eq!(computed.len(), 2);
        assert_eq!(computed.get(ChecksumAlgorithm::Sha256), Some(&sha256(b"body")));
        let err = declared.verify(&computed).unwrap_err();
        assert!(err.is_integrity_failure());

        let honest: ChecksumSet = [md5(b"body"), sha256(b"body")].into_iter().collect();
        assert!(honest.verify(&computed).is_ok());
    }

    #[test]
    fn test_empty_set_hashes_nothing() {
        let hasher = ChecksumSet::new().hasher();
        assert!(hasher.finalize().is_empty());
    }

    #[test]
    fn test_md5_only_is_not_strong() {
        let set: ChecksumSet = [md5(b"x")].into_iter().collect();
        assert!(!set.has_strong());
        assert!(!set.is_empty());
    }
}
