//! Password-claimable token escrow.
//!
//! A depositor locks fungible tokens for a beneficiary who is identified not
//! by a known public key but by possession of a password. The claim keypair is
//! never transmitted: anyone who knows the password and the public salt
//! recorded on the escrow can re-derive it locally and sign a withdrawal.
//!
//! This crate intentionally stays ledger-agnostic and delegates token movement
//! and account storage to callers through trait-based dependency injection
//! ([`TokenLedger`], [`EscrowStore`], [`SignatureVerifier`]).
//!
//! # Protocol
//!
//! - **Deposit**: the depositor picks a fresh random salt, derives the
//!   beneficiary key from `(password, salt, config identity)` via Argon2id,
//!   and funds an escrow at the address deterministically derived from
//!   `(beneficiary, config)`. Only the public key and salt go on the record.
//! - **Withdraw**: the beneficiary reads the salt off the record, re-derives
//!   the keypair from the password, and signs the canonical withdraw message.
//!   A wrong password yields a different keypair and is rejected as
//!   `Unauthorized` by the signature check; nothing ever compares passwords.
//!
//! # Example
//!
//! ```ignore
//! use password_escrow::{
//!     derive_claim_keypair, DepositRequest, EscrowProtocol, KdfParams, Salt,
//! };
//!
//! let mut rng = rand::thread_rng();
//! let salt = Salt::random(&mut rng);
//! let keypair = derive_claim_keypair(b"voucher code", &salt, &config_identity, &KdfParams::default())?;
//!
//! let escrow_address = protocol.deposit(DepositRequest {
//!     config: config_identity,
//!     depositor,
//!     source,
//!     beneficiary: keypair.public_key(),
//!     salt,
//!     mint,
//!     amount: 1_000_000,
//! }).await?;
//! ```

use serde::{Deserialize, Serialize};

pub mod address;
pub mod config;
pub mod errors;
pub mod escrow;
pub mod kdf;
pub mod ledger;
pub mod protocol;
pub mod store;

/// In-memory collaborators for exercising the protocol without a real ledger.
pub mod test_utils;

pub use address::derive_escrow_address;
pub use config::{ConfigRegistry, ConfigUpdate, Configuration, MAX_FEE_BASIS_POINTS};
pub use errors::{EscrowError, EscrowErrorCode};
pub use escrow::Escrow;
pub use kdf::{derive_claim_keypair, derive_seed, ClaimKeypair, KdfParams, Seed};
pub use ledger::{Ed25519Verifier, SignatureVerifier, TokenAccount, TokenLedger};
pub use protocol::{
    withdraw_message, DepositRequest, EscrowProtocol, WithdrawReceipt, WithdrawRequest,
};
pub use store::{EscrowStore, MemoryEscrowStore};

/// Common result alias for escrow operations.
pub type Result<T> = std::result::Result<T, EscrowError>;

/// An ed25519 public key identifying a signer (depositor, beneficiary,
/// config authority, fee recipient).
///
/// Beneficiary keys are derived from passwords off-ledger; for a given escrow
/// the beneficiary key is the secret-equivalent, so avoid logging it where the
/// escrow is not already public.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublicKey(pub [u8; 32]);

impl PublicKey {
    /// Create a public key from raw bytes.
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Parse a public key from a byte slice, rejecting wrong lengths.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; 32] = bytes.try_into().map_err(|_| {
            EscrowError::invalid_parameter("public_key", "expected 32 bytes")
        })?;
        Ok(Self(arr))
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl From<&ed25519_dalek::VerifyingKey> for PublicKey {
    fn from(key: &ed25519_dalek::VerifyingKey) -> Self {
        Self(key.to_bytes())
    }
}

impl std::fmt::Display for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// A ledger account address.
///
/// Every [`PublicKey`] is also a valid address; derived escrow addresses are
/// hash outputs that need not correspond to any keypair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address(pub [u8; 32]);

impl Address {
    /// Create an address from raw bytes.
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Parse an address from a byte slice, rejecting wrong lengths.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| EscrowError::invalid_parameter("address", "expected 32 bytes"))?;
        Ok(Self(arr))
    }

    /// Raw address bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl From<PublicKey> for Address {
    fn from(key: PublicKey) -> Self {
        Self(key.0)
    }
}

impl From<&PublicKey> for Address {
    fn from(key: &PublicKey) -> Self {
        Self(key.0)
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// Public random bytes mixed into password derivation.
///
/// Stored openly on the escrow record; required to reproduce the beneficiary
/// keypair from the password later. Uniqueness is not required, but fresh
/// salts keep precomputed-table attacks off the table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Salt(pub [u8; 16]);

impl Salt {
    /// Length of a salt in bytes.
    pub const LEN: usize = 16;

    /// Generate a fresh random salt.
    pub fn random(rng: &mut impl rand::RngCore) -> Self {
        let mut bytes = [0u8; Self::LEN];
        rng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Parse a salt from a byte slice, rejecting wrong lengths.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; Self::LEN] = bytes
            .try_into()
            .map_err(|_| EscrowError::invalid_parameter("salt", "expected 16 bytes"))?;
        Ok(Self(arr))
    }

    /// Raw salt bytes.
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl std::fmt::Display for Salt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_key_from_slice_rejects_wrong_length() {
        assert!(PublicKey::from_slice(&[0u8; 31]).is_err());
        assert!(PublicKey::from_slice(&[0u8; 33]).is_err());
        assert!(PublicKey::from_slice(&[7u8; 32]).is_ok());
    }

    #[test]
    fn address_display_is_hex() {
        let addr = Address::new([0xab; 32]);
        assert_eq!(addr.to_string(), "ab".repeat(32));
    }

    #[test]
    fn salts_are_random() {
        let mut rng = rand::thread_rng();
        let a = Salt::random(&mut rng);
        let b = Salt::random(&mut rng);
        assert_ne!(a, b);
    }

    #[test]
    fn public_key_converts_to_address() {
        let key = PublicKey::new([3u8; 32]);
        let addr: Address = key.into();
        assert_eq!(addr.as_bytes(), key.as_bytes());
    }
}
