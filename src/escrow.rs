//! Escrow records and their fixed byte layout.
//!
//! The encoded layout is a compatibility contract, not an implementation
//! detail: external filtered scans select records by matching raw bytes at
//! fixed offsets, so `config` must sit immediately before `depositor` at a
//! known position and the field order may never change.
//!
//! # Wire Format
//!
//! ```text
//! offset  len  field
//!      0    8  record tag (SHA-256("account:Escrow")[..8])
//!      8   32  config
//!     40   32  depositor
//!     72   32  beneficiary
//!    104   16  salt
//!    120   32  mint
//!    152   32  vault
//!    184    8  amount (little-endian u64)
//! ```

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{Address, EscrowError, PublicKey, Result, Salt};

/// Total encoded record length.
pub const RECORD_LEN: usize = 192;
/// Byte offset of the `config` field.
pub const CONFIG_OFFSET: usize = 8;
/// Byte offset of the `depositor` field (contiguous with `config`).
pub const DEPOSITOR_OFFSET: usize = 40;
/// End of the `(config, depositor)` filter window.
pub const FILTER_END: usize = 72;

/// 8-byte tag identifying an encoded escrow record.
pub fn record_tag() -> [u8; 8] {
    let digest = Sha256::digest(b"account:Escrow");
    let mut tag = [0u8; 8];
    tag.copy_from_slice(&digest[..8]);
    tag
}

/// One outstanding claim: funds locked for whoever can re-derive the
/// beneficiary keypair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Escrow {
    /// Derived from `(beneficiary, config)`; primary key and proof that the
    /// record matches its claimed pair. Never mutated.
    pub address: Address,
    /// Identity of the owning configuration.
    pub config: Address,
    /// Public key of the original funder.
    pub depositor: PublicKey,
    /// Password-derived claim key. The record cannot store the password.
    pub beneficiary: PublicKey,
    /// Public KDF salt needed to re-derive the beneficiary keypair.
    pub salt: Salt,
    /// Token type held.
    pub mint: Address,
    /// Token account controlled exclusively by this record.
    pub vault: Address,
    /// Quantity held. Informational; the authoritative balance lives in the
    /// vault.
    pub amount: u64,
}

impl Escrow {
    /// Encode into the fixed layout above.
    pub fn to_bytes(&self) -> [u8; RECORD_LEN] {
        let mut buf = [0u8; RECORD_LEN];
        buf[..8].copy_from_slice(&record_tag());
        buf[CONFIG_OFFSET..40].copy_from_slice(self.config.as_bytes());
        buf[DEPOSITOR_OFFSET..72].copy_from_slice(self.depositor.as_bytes());
        buf[72..104].copy_from_slice(self.beneficiary.as_bytes());
        buf[104..120].copy_from_slice(self.salt.as_bytes());
        buf[120..152].copy_from_slice(self.mint.as_bytes());
        buf[152..184].copy_from_slice(self.vault.as_bytes());
        buf[184..192].copy_from_slice(&self.amount.to_le_bytes());
        buf
    }

    /// Decode a record stored at `address`.
    ///
    /// # Errors
    /// `InvalidParameter` on wrong length or tag.
    pub fn from_bytes(address: Address, bytes: &[u8]) -> Result<Self> {
        if bytes.len() != RECORD_LEN {
            return Err(EscrowError::invalid_parameter(
                "record",
                format!("expected {RECORD_LEN} bytes, got {}", bytes.len()),
            ));
        }
        if bytes[..8] != record_tag() {
            return Err(EscrowError::invalid_parameter(
                "record",
                "unrecognized record tag",
            ));
        }

        let mut amount_bytes = [0u8; 8];
        amount_bytes.copy_from_slice(&bytes[184..192]);

        Ok(Self {
            address,
            config: Address::from_slice(&bytes[CONFIG_OFFSET..40])?,
            depositor: PublicKey::from_slice(&bytes[DEPOSITOR_OFFSET..72])?,
            beneficiary: PublicKey::from_slice(&bytes[72..104])?,
            salt: Salt::from_slice(&bytes[104..120])?,
            mint: Address::from_slice(&bytes[120..152])?,
            vault: Address::from_slice(&bytes[152..184])?,
            amount: u64::from_le_bytes(amount_bytes),
        })
    }

    /// The `(config, depositor)` filter window of an encoded record, as the
    /// external memcmp-style scan sees it.
    pub fn filter_bytes(config: &Address, depositor: &PublicKey) -> [u8; 64] {
        let mut window = [0u8; 64];
        window[..32].copy_from_slice(config.as_bytes());
        window[32..].copy_from_slice(depositor.as_bytes());
        window
    }
}
