// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::Accumulator;
use anyhow::{anyhow, bail, Context, Result};
use fhe::bfv::{
    BfvParameters, BfvParametersBuilder, Ciphertext, Encoding, Plaintext, PublicKey, SecretKey,
};
use fhe_traits::{
    DeserializeParametrized, FheDecoder, FheDecrypter, FheEncoder, FheEncrypter, Serialize,
};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use std::sync::{Arc, Mutex};
use tracing::trace;

pub type SharedRng = Arc<Mutex<ChaCha20Rng>>;

/// (degree, plaintext_modulus, moduli)
pub const SET_2048_1032193_1: (usize, u64, [u64; 1]) = (2048, 1032193, [0x3FFFFFFF000001]);

pub fn build_bfv_params_arc(
    degree: usize,
    plaintext_modulus: u64,
    moduli: &[u64],
) -> Result<Arc<BfvParameters>> {
    BfvParametersBuilder::new()
        .set_degree(degree)
        .set_plaintext_modulus(plaintext_modulus)
        .set_moduli(moduli)
        .build_arc()
        .map_err(|e| anyhow!("Failed to build BFV parameters: {e}"))
}

/// Ciphertext addition under fixed BFV parameters.
///
/// The empty byte string is the identity so that a fresh batch does not need a public key to
/// produce an encryption of zero.
#[derive(Clone)]
pub struct BfvAccumulator {
    params: Arc<BfvParameters>,
}

impl BfvAccumulator {
    pub fn new(params: Arc<BfvParameters>) -> Self {
        Self { params }
    }

    pub fn params(&self) -> Arc<BfvParameters> {
        self.params.clone()
    }

    fn parse(&self, bytes: &[u8]) -> Result<Ciphertext> {
        let ct = Ciphertext::from_bytes(bytes, &self.params)
            .map_err(|e| anyhow!("Error deserializing ciphertext: {e}"))?;
        // Addition asserts on matching shapes, so anything but a fresh two part ciphertext is
        // turned away here.
        if ct.c.len() != 2 || ct.level != 0 {
            bail!(
                "Unsupported ciphertext shape: {} parts at level {}",
                ct.c.len(),
                ct.level
            );
        }
        Ok(ct)
    }
}

impl Accumulator for BfvAccumulator {
    fn identity(&self) -> Vec<u8> {
        vec![]
    }

    fn combine(&self, acc: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
        let ct = self.parse(ciphertext)?;
        if acc.is_empty() {
            return Ok(ct.to_bytes());
        }
        let sum = &self.parse(acc)? + &ct;
        trace!("combined ciphertext into accumulator");
        Ok(sum.to_bytes())
    }

    fn is_well_formed(&self, ciphertext: &[u8]) -> bool {
        !ciphertext.is_empty() && self.parse(ciphertext).is_ok()
    }

    fn serialize(&self, acc: &[u8]) -> Result<Vec<u8>> {
        if acc.is_empty() {
            return Ok(vec![]);
        }
        Ok(self.parse(acc)?.to_bytes())
    }
}

/// A BFV key pair with the rng used to encrypt under it. Submitters only need the public half;
/// the decryption oracle holds the secret half.
pub struct BfvKeyset {
    params: Arc<BfvParameters>,
    secret_key: SecretKey,
    public_key: PublicKey,
    rng: SharedRng,
}

impl BfvKeyset {
    pub fn generate(params: Arc<BfvParameters>, rng: SharedRng) -> Result<Self> {
        let mut guard = rng.lock().map_err(|_| anyhow!("rng lock poisoned"))?;
        let secret_key = SecretKey::random(&params, &mut *guard);
        let public_key = PublicKey::new(&secret_key, &mut *guard);
        drop(guard);
        Ok(Self {
            params,
            secret_key,
            public_key,
            rng,
        })
    }

    /// Deterministic keyset, handy for simulations and tests
    pub fn from_seed(params: Arc<BfvParameters>, seed: u64) -> Result<Self> {
        let rng = Arc::new(Mutex::new(ChaCha20Rng::seed_from_u64(seed)));
        Self::generate(params, rng)
    }

    pub fn params(&self) -> Arc<BfvParameters> {
        self.params.clone()
    }

    /// Encrypt `value` into the constant coefficient of a fresh ciphertext
    pub fn encrypt_u64(&self, value: u64) -> Result<Vec<u8>> {
        let pt = Plaintext::try_encode(&[value], Encoding::poly(), &self.params)
            .map_err(|e| anyhow!("Error encoding plaintext: {e}"))?;
        let mut rng = self.rng.lock().map_err(|_| anyhow!("rng lock poisoned"))?;
        let ct = self
            .public_key
            .try_encrypt(&pt, &mut *rng)
            .map_err(|e| anyhow!("Error encrypting data: {e}"))?;
        Ok(ct.to_bytes())
    }

    /// Decrypt a ciphertext and return its constant coefficient
    pub fn decrypt_u64(&self, ciphertext: &[u8]) -> Result<u64> {
        let ct = Ciphertext::from_bytes(ciphertext, &self.params)
            .map_err(|e| anyhow!("Error deserializing ciphertext: {e}"))?;
        let pt = self
            .secret_key
            .try_decrypt(&ct)
            .map_err(|e| anyhow!("Error decrypting ciphertext: {e}"))?;
        let decoded = Vec::<u64>::try_decode(&pt, Encoding::poly())
            .map_err(|e| anyhow!("Error decoding plaintext: {e}"))?;
        decoded
            .first()
            .copied()
            .context("Decoded plaintext was empty")
    }

    /// Encrypt `value` and append a third polynomial, the shape of an unrelinearized product
    #[cfg(any(test, feature = "test-helpers"))]
    pub fn encrypt_u64_three_part(&self, value: u64) -> Result<Vec<u8>> {
        let ct = Ciphertext::from_bytes(&self.encrypt_u64(value)?, &self.params)
            .map_err(|e| anyhow!("Error deserializing ciphertext: {e}"))?;
        let parts = vec![ct.c[0].clone(), ct.c[1].clone(), ct.c[1].clone()];
        let extended = Ciphertext::new(parts, &self.params)
            .map_err(|e| anyhow!("Error building ciphertext: {e}"))?;
        Ok(extended.to_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> Result<(BfvAccumulator, BfvKeyset)> {
        let (degree, plaintext_modulus, moduli) = SET_2048_1032193_1;
        let params = build_bfv_params_arc(degree, plaintext_modulus, &moduli)?;
        Ok((
            BfvAccumulator::new(params.clone()),
            BfvKeyset::from_seed(params, 42)?,
        ))
    }

    #[test]
    fn sums_encrypted_values() -> Result<()> {
        let (acc, keys) = setup()?;
        let mut sum = acc.identity();
        for v in [5u64, 7, 11] {
            sum = acc.combine(&sum, &keys.encrypt_u64(v)?)?;
        }
        assert_eq!(keys.decrypt_u64(&sum)?, 23);
        Ok(())
    }

    #[test]
    fn combine_order_does_not_change_bytes() -> Result<()> {
        let (acc, keys) = setup()?;
        let a = keys.encrypt_u64(3)?;
        let b = keys.encrypt_u64(9)?;
        let c = keys.encrypt_u64(14)?;

        let forward = acc.combine(&acc.combine(&acc.combine(&acc.identity(), &a)?, &b)?, &c)?;
        let backward = acc.combine(&acc.combine(&acc.combine(&acc.identity(), &c)?, &b)?, &a)?;
        assert_eq!(forward, backward);
        assert_eq!(acc.serialize(&forward)?, acc.serialize(&backward)?);
        Ok(())
    }

    #[test]
    fn identity_is_neutral() -> Result<()> {
        let (acc, keys) = setup()?;
        let a = keys.encrypt_u64(8)?;
        assert_eq!(acc.combine(&acc.identity(), &a)?, acc.serialize(&a)?);
        assert!(acc.serialize(&acc.identity())?.is_empty());
        Ok(())
    }

    #[test]
    fn rejects_malformed_ciphertexts() -> Result<()> {
        let (acc, keys) = setup()?;
        assert!(acc.is_well_formed(&keys.encrypt_u64(1)?));
        assert!(!acc.is_well_formed(&[]));
        assert!(!acc.is_well_formed(b"definitely not a ciphertext"));
        assert!(acc.combine(&acc.identity(), b"junk").is_err());
        Ok(())
    }

    #[test]
    fn rejects_three_part_ciphertexts() -> Result<()> {
        let (acc, keys) = setup()?;
        let fresh = keys.encrypt_u64(2)?;
        let extended = keys.encrypt_u64_three_part(3)?;
        assert!(!acc.is_well_formed(&extended));
        assert!(acc.combine(&acc.identity(), &extended).is_err());
        assert!(acc.combine(&fresh, &extended).is_err());
        assert!(acc.combine(&extended, &fresh).is_err());
        assert!(acc.serialize(&extended).is_err());
        Ok(())
    }
}
