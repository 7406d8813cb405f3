//! Assembly identity handling for assembly references.
//!
//! An assembly reference may carry either the full RSA public key of its
//! target or the 8-byte token derived from it. The token is the trailing
//! 8 bytes of the hash of the public key, computed with the hash algorithm
//! the target assembly declares.

use md5::{Digest, Md5};
use sha1::Sha1;

use crate::{file::io::read_le, Result};

/// Hash algorithm identifiers used in the `Assembly` table (`HashAlgId`).
#[allow(non_snake_case)]
pub mod AssemblyHashAlgorithm {
    /// No hash algorithm
    pub const NONE: u32 = 0x0000;
    /// MD5
    pub const MD5: u32 = 0x8003;
    /// SHA-1, the default for assembly identities
    pub const SHA1: u32 = 0x8004;
}

/// An identifier for an `Assembly` reference.
/// Can be either a public key or a hashed token, indicated by the reference flags.
pub enum Identity {
    /// The full RSA public key
    PubKey(Vec<u8>),
    /// 8-byte tail of the public key hash, as declared by the target assembly
    Token(u64),
}

impl Identity {
    /// Create an `Identity` from raw data.
    ///
    /// # Arguments
    /// * `data`    - The data to create the identity from
    /// * `is_pub`  - Is it a public key, or an already-hashed token
    ///
    /// # Errors
    /// Returns an error if token data is shorter than 8 bytes.
    pub fn from(data: &[u8], is_pub: bool) -> Result<Self> {
        Ok(if is_pub {
            Identity::PubKey(data.to_vec())
        } else {
            Identity::Token(read_le::<u64>(data)?)
        })
    }

    /// Get the token for this identity; the token is the last 8 bytes of the
    /// hash of the public key.
    ///
    /// # Arguments
    /// * `algo` - The hash algorithm the target assembly declares
    ///
    /// # Errors
    /// Returns [`crate::Error::NotSupported`] for unknown algorithms.
    pub fn to_token(&self, algo: u32) -> Result<u64> {
        match &self {
            Identity::PubKey(data) => match algo {
                AssemblyHashAlgorithm::MD5 => {
                    let mut hasher = Md5::new();
                    hasher.update(data);

                    let result = hasher.finalize();

                    read_le::<u64>(&result[result.len() - 8..])
                }
                AssemblyHashAlgorithm::NONE | AssemblyHashAlgorithm::SHA1 => {
                    let mut hasher = Sha1::new();
                    hasher.update(data);

                    let result = hasher.finalize();

                    read_le::<u64>(&result[result.len() - 8..])
                }
                _ => Err(crate::Error::NotSupported),
            },
            Identity::Token(token) => Ok(*token),
        }
    }

    /// Serialize the token form as the `PublicKeyOrToken` blob bytes.
    ///
    /// # Errors
    /// Returns an error if the token cannot be derived.
    pub fn token_bytes(&self, algo: u32) -> Result<[u8; 8]> {
        Ok(self.to_token(algo)?.to_le_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_token_reads_le() {
        let data = [0x12, 0x34, 0x56, 0x78, 0x9A, 0xBC, 0xDE, 0xF0];
        let identity = Identity::from(&data, false).unwrap();

        match identity {
            Identity::Token(token) => assert_eq!(token, 0xF0DE_BC9A_7856_3412),
            Identity::PubKey(_) => panic!("Expected Token variant"),
        }
    }

    #[test]
    fn from_token_insufficient_data() {
        assert!(Identity::from(&[1, 2, 3], false).is_err());
    }

    #[test]
    fn token_identity_passes_through() {
        let identity = Identity::Token(0x1234_5678_9ABC_DEF0);
        assert_eq!(
            identity.to_token(AssemblyHashAlgorithm::SHA1).unwrap(),
            0x1234_5678_9ABC_DEF0
        );
        assert_eq!(
            identity.to_token(AssemblyHashAlgorithm::MD5).unwrap(),
            0x1234_5678_9ABC_DEF0
        );
    }

    #[test]
    fn pubkey_sha1_token() {
        let pubkey: Vec<u8> = (0..16).collect();
        let identity = Identity::PubKey(pubkey.clone());

        let token = identity.to_token(AssemblyHashAlgorithm::SHA1).unwrap();

        let mut hasher = Sha1::new();
        hasher.update(&pubkey);
        let digest = hasher.finalize();
        let expected = read_le::<u64>(&digest[digest.len() - 8..]).unwrap();

        assert_eq!(token, expected);
    }

    #[test]
    fn pubkey_md5_differs_from_sha1() {
        let pubkey: Vec<u8> = (0..32).collect();
        let identity = Identity::PubKey(pubkey);

        let md5 = identity.to_token(AssemblyHashAlgorithm::MD5).unwrap();
        let sha1 = identity.to_token(AssemblyHashAlgorithm::SHA1).unwrap();
        assert_ne!(md5, sha1);
    }

    #[test]
    fn unknown_algorithm_is_rejected() {
        let identity = Identity::PubKey(vec![1, 2, 3]);
        assert!(identity.to_token(0x9999).is_err());
    }

    #[test]
    fn token_bytes_round_trip() {
        let identity = Identity::Token(0x0102_0304_0506_0708);
        let bytes = identity.token_bytes(AssemblyHashAlgorithm::SHA1).unwrap();
        assert_eq!(bytes, [0x08, 0x07, 0x06, 0x05, 0x04, 0x03, 0x02, 0x01]);
    }
}
