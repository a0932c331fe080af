//! External ledger collaborators.
//!
//! The escrow protocol does not move tokens or verify transaction signatures
//! itself; it decides *what* must happen and *what* must be signed, then
//! delegates through these traits. The host ledger provides atomic transfers,
//! account creation/closure, and ed25519 signature verification.

use async_trait::async_trait;
use ed25519_dalek::{Signature, Verifier, VerifyingKey};

use crate::{Address, PublicKey, Result};

/// Point-in-time view of a fungible-token account.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TokenAccount {
    /// Address whose authority controls the balance. For vaults this is the
    /// escrow record's derived address, not any user key.
    pub owner: Address,
    /// Token type held.
    pub mint: Address,
    /// Current balance.
    pub balance: u64,
}

/// The ledger's fungible-token facility.
///
/// Implementations must apply each call atomically: a failed transfer leaves
/// both accounts untouched. Authority checks are the ledger's; the protocol
/// passes the authority it believes entitled and surfaces rejections
/// verbatim.
#[async_trait]
pub trait TokenLedger: Send + Sync {
    /// Look up a token account, `None` if it does not exist.
    async fn account(&self, id: &Address) -> Result<Option<TokenAccount>>;

    /// Create the associated token account for `(owner, mint)`.
    ///
    /// The resulting address is deterministic per pair.
    ///
    /// # Errors
    /// `AlreadyExists` if the account already exists.
    async fn create_account(&self, owner: &Address, mint: &Address) -> Result<Address>;

    /// Return the associated token account for `(owner, mint)`, creating it
    /// if missing.
    async fn associated_account(&self, owner: &Address, mint: &Address) -> Result<Address>;

    /// Move `amount` from `from` to `to` on `authority`'s authority.
    ///
    /// # Errors
    /// - `Unauthorized` if `authority` does not own `from`
    /// - `MintMismatch` if the accounts hold different token types
    /// - `InsufficientFunds` if `from` cannot cover `amount`
    async fn transfer(
        &self,
        from: &Address,
        to: &Address,
        amount: u64,
        authority: &Address,
    ) -> Result<()>;

    /// Close an emptied token account.
    ///
    /// # Errors
    /// - `Unauthorized` if `authority` does not own the account
    /// - `InvalidParameter` if a balance remains
    async fn close_account(&self, id: &Address, authority: &Address) -> Result<()>;
}

/// Capability check binding a message to a claimed signer.
///
/// Injected so hosts can substitute their native transaction-signature layer;
/// the protocol only ever asks "did `signer` sign these bytes?".
pub trait SignatureVerifier: Send + Sync {
    /// Verify `signature` over `message` against `signer`.
    fn verify(&self, signer: &PublicKey, message: &[u8], signature: &[u8; 64]) -> bool;
}

/// Direct ed25519 verification via `ed25519-dalek`.
#[derive(Clone, Copy, Debug, Default)]
pub struct Ed25519Verifier;

impl SignatureVerifier for Ed25519Verifier {
    fn verify(&self, signer: &PublicKey, message: &[u8], signature: &[u8; 64]) -> bool {
        let Ok(verifying) = VerifyingKey::from_bytes(signer.as_bytes()) else {
            // Not a valid curve point (e.g. a derived address): nothing can
            // have signed as it.
            return false;
        };
        let signature = Signature::from_bytes(signature);
        verifying.verify(message, &signature).is_ok()
    }
}
