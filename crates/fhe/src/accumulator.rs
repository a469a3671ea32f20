// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use anyhow::Result;

/// Homomorphic arithmetic over opaque ciphertext bytes.
///
/// `combine` must be associative and commutative and `identity` must be its neutral element so
/// that the order in which submissions arrive never changes the serialized accumulator.
pub trait Accumulator: Send + Sync + 'static {
    /// The accumulator value of a batch that has not received anything yet
    fn identity(&self) -> Vec<u8>;

    /// Add `ciphertext` into `acc`
    fn combine(&self, acc: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>>;

    /// Whether `ciphertext` can be combined at all
    fn is_well_formed(&self, ciphertext: &[u8]) -> bool;

    /// Canonical encoding of an accumulator value, used for state hashing
    fn serialize(&self, acc: &[u8]) -> Result<Vec<u8>>;
}

#[cfg(any(test, feature = "test-helpers"))]
pub use plain::PlainAccumulator;

#[cfg(any(test, feature = "test-helpers"))]
mod plain {
    use super::Accumulator;
    use anyhow::{anyhow, Result};

    /// Cleartext stand-in where a "ciphertext" is a little endian u64 and combining is wrapping
    /// addition. Lets tests drive the coordinator without paying for lattice crypto.
    #[derive(Clone, Copy, Debug, Default)]
    pub struct PlainAccumulator;

    impl PlainAccumulator {
        pub fn encrypt(value: u64) -> Vec<u8> {
            value.to_le_bytes().to_vec()
        }

        pub fn decrypt(ciphertext: &[u8]) -> Result<u64> {
            let bytes: [u8; 8] = ciphertext
                .try_into()
                .map_err(|_| anyhow!("expected 8 bytes, got {}", ciphertext.len()))?;
            Ok(u64::from_le_bytes(bytes))
        }
    }

    impl Accumulator for PlainAccumulator {
        fn identity(&self) -> Vec<u8> {
            Self::encrypt(0)
        }

        fn combine(&self, acc: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
            let sum = Self::decrypt(acc)?.wrapping_add(Self::decrypt(ciphertext)?);
            Ok(Self::encrypt(sum))
        }

        fn is_well_formed(&self, ciphertext: &[u8]) -> bool {
            ciphertext.len() == 8
        }

        fn serialize(&self, acc: &[u8]) -> Result<Vec<u8>> {
            Ok(acc.to_vec())
        }
    }
}
