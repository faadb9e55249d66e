//! Checksum utilities for file integrity verification

use serde::{Deserialize, Serialize};
use sha2::Digest;

use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use crate::error::{MinidError, Result};

const BLOCK_SIZE: usize = 65536;

/// Hash functions accepted by the identifier service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    Md5,
    Sha1,
    Sha224,
    #[default]
    Sha256,
    Sha384,
    Sha512,
}

impl Algorithm {
    /// Every supported algorithm, in the order manifest fields are scanned
    pub const ALL: [Algorithm; 6] = [
        Algorithm::Md5,
        Algorithm::Sha1,
        Algorithm::Sha224,
        Algorithm::Sha256,
        Algorithm::Sha384,
        Algorithm::Sha512,
    ];

    /// Name used on the wire and as a manifest field
    pub fn name(&self) -> &'static str {
        match self {
            Algorithm::Md5 => "md5",
            Algorithm::Sha1 => "sha1",
            Algorithm::Sha224 => "sha224",
            Algorithm::Sha256 => "sha256",
            Algorithm::Sha384 => "sha384",
            Algorithm::Sha512 => "sha512",
        }
    }

    /// Hex digest of everything readable from `reader`
    pub fn digest_reader(&self, reader: impl Read) -> std::io::Result<String> {
        match self {
            Algorithm::Md5 => hash_reader::<md5::Md5>(reader),
            Algorithm::Sha1 => hash_reader::<sha1::Sha1>(reader),
            Algorithm::Sha224 => hash_reader::<sha2::Sha224>(reader),
            Algorithm::Sha256 => hash_reader::<sha2::Sha256>(reader),
            Algorithm::Sha384 => hash_reader::<sha2::Sha384>(reader),
            Algorithm::Sha512 => hash_reader::<sha2::Sha512>(reader),
        }
    }
}

impl FromStr for Algorithm {
    type Err = MinidError;

    fn from_str(s: &str) -> Result<Self> {
        Algorithm::ALL
            .into_iter()
            .find(|alg| alg.name() == s)
            .ok_or_else(|| MinidError::UnsupportedAlgorithm(s.to_string()))
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn hash_reader<D: Digest>(mut reader: impl Read) -> std::io::Result<String> {
    let mut hasher = D::new();
    let mut buf = vec![0u8; BLOCK_SIZE];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect())
}

/// A single digest of some content, tagged with the function that produced it
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Checksum {
    pub function: String,
    pub value: String,
}

impl Checksum {
    pub fn new(algorithm: Algorithm, value: impl Into<String>) -> Self {
        Self {
            function: algorithm.name().to_string(),
            value: value.into(),
        }
    }

    /// The algorithm for this checksum, if it is one we support
    pub fn algorithm(&self) -> Result<Algorithm> {
        self.function.parse()
    }

    pub fn is_supported(&self) -> bool {
        self.algorithm().is_ok()
    }

    /// Compute the checksum of a file on disk
    pub fn from_file(path: impl AsRef<Path>, algorithm: Algorithm) -> Result<Self> {
        let value = compute_checksum(path, algorithm)?;
        Ok(Self::new(algorithm, value))
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.value, self.function)
    }
}

/// Split checksums into those the service accepts and those it does not
pub fn partition_supported(checksums: Vec<Checksum>) -> (Vec<Checksum>, Vec<Checksum>) {
    checksums.into_iter().partition(Checksum::is_supported)
}

/// Decide whether two checksum sets describe the same content.
///
/// Only functions present in both sets are compared. With no function in
/// common there is no evidence of equality and the answer is `false`; a
/// single disagreeing digest is enough to answer `false`.
pub fn checksums_match(left: &[Checksum], right: &[Checksum]) -> bool {
    let by_function: HashMap<&str, &str> = left
        .iter()
        .map(|c| (c.function.as_str(), c.value.as_str()))
        .collect();

    let mut shared = 0;
    for checksum in right {
        if let Some(value) = by_function.get(checksum.function.as_str()) {
            if *value != checksum.value {
                return false;
            }
            shared += 1;
        }
    }
    shared > 0
}

/// Stream a file through `algorithm` and return its hex digest
pub fn compute_checksum(path: impl AsRef<Path>, algorithm: Algorithm) -> Result<String> {
    let path = path.as_ref();
    if path.is_dir() {
        return Err(MinidError::NotAFile(path.to_path_buf()));
    }
    if !path.exists() {
        return Err(MinidError::FileNotFound(path.to_path_buf()));
    }

    tracing::debug!(path = %path.display(), %algorithm, "computing checksum");
    let file = File::open(path)?;
    Ok(algorithm.digest_reader(file)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sha256(value: &str) -> Checksum {
        Checksum::new(Algorithm::Sha256, value)
    }

    fn md5(value: &str) -> Checksum {
        Checksum::new(Algorithm::Md5, value)
    }

    #[test]
    fn test_algorithm_lookup() {
        assert_eq!("sha256".parse::<Algorithm>().unwrap(), Algorithm::Sha256);
        assert_eq!("md5".parse::<Algorithm>().unwrap(), Algorithm::Md5);
        assert!(matches!(
            "NOT_REAL".parse::<Algorithm>(),
            Err(MinidError::UnsupportedAlgorithm(name)) if name == "NOT_REAL"
        ));
    }

    #[test]
    fn test_known_digests() {
        let data: &[u8] = b"hello";
        assert_eq!(
            Algorithm::Sha256.digest_reader(data).unwrap(),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
        assert_eq!(
            Algorithm::Md5.digest_reader(data).unwrap(),
            "5d41402abc4b2a76b9719d911017c592"
        );
        assert_eq!(
            Algorithm::Sha1.digest_reader(data).unwrap(),
            "aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d"
        );

        // Zero-padded lower-case hex, two characters per byte
        for alg in Algorithm::ALL {
            let digest = alg.digest_reader(&b""[..]).unwrap();
            assert!(digest.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b)));
            assert_eq!(digest.len() % 2, 0);
        }
        assert_eq!(
            Algorithm::Md5.digest_reader(&b""[..]).unwrap(),
            "d41d8cd98f00b204e9800998ecf8427e"
        );
        assert_eq!(Algorithm::Sha384.digest_reader(&b""[..]).unwrap().len(), 96);
    }

    #[test]
    fn test_match_on_shared_function() {
        assert!(checksums_match(&[sha256("A")], &[sha256("A")]));
        assert!(!checksums_match(&[sha256("A")], &[sha256("B")]));
    }

    #[test]
    fn test_digests_compare_exactly() {
        assert!(!checksums_match(&[sha256("abc")], &[sha256("ABC")]));
    }

    #[test]
    fn test_no_shared_function_is_not_a_match() {
        // Same digest text under different functions proves nothing
        assert!(!checksums_match(&[sha256("A")], &[md5("A")]));
        assert!(!checksums_match(&[], &[sha256("A")]));
    }

    #[test]
    fn test_any_disagreement_is_a_mismatch() {
        let left = [sha256("A"), md5("M")];
        let right = [sha256("A"), md5("X")];
        assert!(!checksums_match(&left, &right));
    }

    #[test]
    fn test_extra_functions_are_ignored() {
        let left = [sha256("A"), md5("M")];
        let right = [sha256("A"), Checksum::new(Algorithm::Sha512, "S")];
        assert!(checksums_match(&left, &right));
    }

    #[test]
    fn test_partition_supported() {
        let checksums = vec![
            sha256("A"),
            Checksum { function: "NOT_REAL".into(), value: "irrelevant".into() },
        ];
        let (supported, unsupported) = partition_supported(checksums);
        assert_eq!(supported, vec![sha256("A")]);
        assert_eq!(unsupported.len(), 1);
    }

    #[test]
    fn test_compute_checksum_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            compute_checksum(dir.path(), Algorithm::Sha256),
            Err(MinidError::NotAFile(_))
        ));
        assert!(matches!(
            compute_checksum(dir.path().join("missing.txt"), Algorithm::Sha256),
            Err(MinidError::FileNotFound(_))
        ));
    }

    #[test]
    fn test_checksum_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hello.txt");
        std::fs::write(&path, "hello").unwrap();
        let checksum = Checksum::from_file(&path, Algorithm::Sha256).unwrap();
        assert_eq!(checksum.function, "sha256");
        assert_eq!(
            checksum.value,
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }
}
