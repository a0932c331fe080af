//! Password-to-keypair derivation.
//!
//! Turns `(password, salt, config identity)` into a deterministic 32-byte
//! seed via Argon2id, then into an ed25519 claim keypair. The config identity
//! is fed in as Argon2 associated data, so the same password under two
//! configurations yields unrelated keys.
//!
//! # Security Model
//!
//! - Memory-hard derivation slows brute-force guessing of low-entropy
//!   passwords.
//! - Domain separation via the config identity prevents cross-configuration
//!   key reuse: learning the beneficiary key of one escrow says nothing about
//!   deposits made under a different configuration.
//! - This module performs no equality checks. A wrong password produces a
//!   different keypair whose signatures simply fail verification downstream.
//!
//! Passwords, seeds, and signing keys never leave the caller's process; only
//! the derived public key and the salt are submitted at deposit time.

use argon2::{Algorithm, Argon2, AssociatedData, ParamsBuilder, Version};
use ed25519_dalek::{Signer, SigningKey};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{Address, EscrowError, PublicKey, Result, Salt};

/// Argon2id cost parameters.
///
/// The defaults match the argon2 crate's current recommendation (19 MiB,
/// 2 passes, 1 lane). Derivation cost is a deployment knob: every legitimate
/// claimant pays it once per claim, an attacker pays it per password guess.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KdfParams {
    /// Memory cost in KiB.
    pub memory_kib: u32,
    /// Number of passes over memory.
    pub iterations: u32,
    /// Degree of parallelism (lanes).
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            memory_kib: 19 * 1024,
            iterations: 2,
            parallelism: 1,
        }
    }
}

impl KdfParams {
    /// Cheap parameters for tests and benchmarks.
    ///
    /// **Warning**: provides no meaningful brute-force resistance. Never use
    /// for real deposits.
    pub fn fast_insecure() -> Self {
        Self {
            memory_kib: 64,
            iterations: 1,
            parallelism: 1,
        }
    }
}

/// A derived 32-byte seed. Secret-equivalent to the password; wiped on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct Seed([u8; 32]);

impl Seed {
    /// Raw seed bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl std::fmt::Debug for Seed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print seed material.
        f.write_str("Seed(..)")
    }
}

/// An ed25519 keypair derived from a password.
///
/// Whoever can produce this keypair controls the escrow recorded under its
/// public key.
pub struct ClaimKeypair {
    signing: SigningKey,
}

impl ClaimKeypair {
    /// Derive the keypair deterministically from a seed.
    pub fn from_seed(seed: &Seed) -> Self {
        Self {
            signing: SigningKey::from_bytes(seed.as_bytes()),
        }
    }

    /// The public half, used as the escrow beneficiary.
    pub fn public_key(&self) -> PublicKey {
        PublicKey::from(&self.signing.verifying_key())
    }

    /// Sign an arbitrary message with the claim key.
    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.signing.sign(message).to_bytes()
    }
}

impl std::fmt::Debug for ClaimKeypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Only the public half is printable.
        write!(f, "ClaimKeypair({})", self.public_key())
    }
}

/// Derive a 32-byte seed from `(password, salt, domain)` with Argon2id.
///
/// `domain` is the configuration identity, supplied as Argon2 associated
/// data. It is not secret; it binds the derivation to one configuration.
///
/// Deterministic: identical inputs always yield identical seeds.
pub fn derive_seed(
    password: &[u8],
    salt: &Salt,
    domain: &Address,
    params: &KdfParams,
) -> Result<Seed> {
    let ad = AssociatedData::new(domain.as_bytes())
        .map_err(|e| EscrowError::invalid_parameter("domain", e.to_string()))?;
    let argon_params = ParamsBuilder::new()
        .m_cost(params.memory_kib)
        .t_cost(params.iterations)
        .p_cost(params.parallelism)
        .data(ad)
        .build()
        .map_err(|e| EscrowError::invalid_parameter("kdf_params", e.to_string()))?;

    let argon = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon_params);
    let mut seed = [0u8; 32];
    argon
        .hash_password_into(password, salt.as_bytes(), &mut seed)
        .map_err(|e| EscrowError::Internal(format!("key derivation failed: {e}")))?;
    Ok(Seed(seed))
}

/// Derive the full claim keypair from `(password, salt, config identity)`.
///
/// Used at deposit time to obtain the beneficiary public key, and at
/// withdraw time (with the salt read off the escrow record) to obtain the
/// signing key.
pub fn derive_claim_keypair(
    password: &[u8],
    salt: &Salt,
    config_identity: &Address,
    params: &KdfParams,
) -> Result<ClaimKeypair> {
    let seed = derive_seed(password, salt, config_identity, params)?;
    Ok(ClaimKeypair::from_seed(&seed))
}
