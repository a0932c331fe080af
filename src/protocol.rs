//! Deposit/withdraw orchestration.
//!
//! State machine per `(beneficiary, config)` pair: **absent** → **deposited**
//! → **withdrawn** (= absent again). No intermediate states, no partial
//! withdrawal, no re-deposit into a live record. The host ledger serializes
//! concurrent transactions touching the same accounts; this module only
//! expresses each transition so that read/write-set overlap on the escrow and
//! vault is sufficient for the ledger to conflict-detect.

use std::sync::Arc;

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::config::{ConfigRegistry, ConfigUpdate, Configuration};
use crate::ledger::{SignatureVerifier, TokenLedger};
use crate::store::EscrowStore;
use crate::{derive_escrow_address, Address, Escrow, EscrowError, PublicKey, Result, Salt};

/// Domain tag for the canonical withdraw message.
const WITHDRAW_MESSAGE_TAG: &[u8] = b"password-escrow:withdraw:v1";

/// The exact bytes a beneficiary must sign to authorize a withdrawal.
///
/// Binding the destination into the message stops an observer from replaying
/// a captured claim signature toward their own account. Domain-tagged so the
/// signature cannot double as authorization for anything else.
pub fn withdraw_message(escrow_address: &Address, destination: &Address) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(WITHDRAW_MESSAGE_TAG);
    hasher.update(escrow_address.as_bytes());
    hasher.update(destination.as_bytes());
    hasher.finalize().into()
}

/// Parameters for a deposit.
#[derive(Clone, Copy, Debug)]
pub struct DepositRequest {
    /// Identity of the configuration to deposit under.
    pub config: Address,
    /// Funder's public key (the ledger has verified its signature on the
    /// enclosing transaction).
    pub depositor: PublicKey,
    /// Funder's token account to draw from.
    pub source: Address,
    /// Password-derived claim key, computed off-ledger by the depositor.
    pub beneficiary: PublicKey,
    /// Fresh public salt used in that derivation.
    pub salt: Salt,
    /// Token type to escrow.
    pub mint: Address,
    /// Quantity to lock.
    pub amount: u64,
}

/// Parameters for a withdrawal.
#[derive(Clone, Copy, Debug)]
pub struct WithdrawRequest {
    /// Address of the escrow to drain.
    pub escrow_address: Address,
    /// Token account receiving the funds.
    pub destination: Address,
    /// Claimed signer; must equal the record's beneficiary.
    pub signer: PublicKey,
    /// Signature over [`withdraw_message`] by the beneficiary key.
    pub signature: [u8; 64],
}

/// Outcome of a successful withdrawal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WithdrawReceipt {
    /// Amount credited to the destination.
    pub amount: u64,
    /// Amount routed to the configuration's fee recipient.
    pub fee: u64,
}

/// Orchestrates deposits and withdrawals over injected collaborators.
pub struct EscrowProtocol<S, L, V> {
    registry: Arc<ConfigRegistry>,
    store: Arc<S>,
    ledger: Arc<L>,
    verifier: V,
}

impl<S, L, V> EscrowProtocol<S, L, V>
where
    S: EscrowStore,
    L: TokenLedger,
    V: SignatureVerifier,
{
    /// Assemble a protocol instance over its collaborators.
    pub fn new(registry: Arc<ConfigRegistry>, store: Arc<S>, ledger: Arc<L>, verifier: V) -> Self {
        Self {
            registry,
            store,
            ledger,
            verifier,
        }
    }

    /// Create a configuration record. See [`ConfigRegistry::initialize`].
    pub fn initialize_config(
        &self,
        identity: Address,
        authority: PublicKey,
        fee_recipient: PublicKey,
        fee_basis_points: u16,
    ) -> Result<Configuration> {
        self.registry
            .initialize(identity, authority, fee_recipient, fee_basis_points)
    }

    /// Mutate a configuration record. See [`ConfigRegistry::update`].
    pub fn update_config(
        &self,
        identity: &Address,
        caller: &PublicKey,
        update: ConfigUpdate,
    ) -> Result<Configuration> {
        self.registry.update(identity, caller, update)
    }

    /// Fetch a configuration record.
    pub fn config(&self, identity: &Address) -> Result<Configuration> {
        self.registry.get(identity)
    }

    /// Lock `amount` of `mint` for whoever can re-derive `beneficiary`.
    ///
    /// Atomically (ledger-arbitrated): creates the escrow record at the
    /// address derived from `(beneficiary, config)`, creates its vault, and
    /// moves the funds in.
    ///
    /// # Errors
    /// - `InvalidParameter` on a zero amount
    /// - `NotFound` if the config or source account is missing
    /// - `MintMismatch` if the source holds a different token
    /// - `AlreadyExists` if an escrow is live for this pair (withdraw first)
    /// - `InsufficientFunds`/`Unauthorized` surfaced from the transfer
    pub async fn deposit(&self, req: DepositRequest) -> Result<Address> {
        if req.amount == 0 {
            return Err(EscrowError::invalid_parameter("amount", "must be positive"));
        }

        let config = self.registry.get(&req.config)?;

        let source = self
            .ledger
            .account(&req.source)
            .await?
            .ok_or_else(|| EscrowError::not_found("token account", req.source))?;
        if source.mint != req.mint {
            return Err(EscrowError::mint_mismatch(req.mint, source.mint));
        }

        let address = derive_escrow_address(&req.beneficiary, &config.identity);
        if self.store.get(&address).await?.is_some() {
            return Err(EscrowError::already_exists("escrow", address));
        }
        let vault = self.ledger.create_account(&address, &req.mint).await?;

        let escrow = Escrow {
            address,
            config: config.identity,
            depositor: req.depositor,
            beneficiary: req.beneficiary,
            salt: req.salt,
            mint: req.mint,
            vault,
            amount: req.amount,
        };

        // Reserving the address before funding keeps a lost race observable
        // as AlreadyExists rather than a double-funded vault.
        if let Err(err) = self.store.create(&escrow).await {
            self.unwind_vault(&vault, &address).await;
            return Err(err);
        }

        if let Err(err) = self
            .ledger
            .transfer(&req.source, &vault, req.amount, &req.depositor.into())
            .await
        {
            if let Err(unwind) = self.store.delete(&address).await {
                tracing::warn!(escrow = %address, error = %unwind, "deposit unwind failed");
            }
            self.unwind_vault(&vault, &address).await;
            return Err(err);
        }

        tracing::info!(
            escrow = %address,
            config = %config.identity,
            amount = req.amount,
            "deposit created"
        );
        Ok(address)
    }

    /// Drain and destroy the escrow at `req.escrow_address`.
    ///
    /// The signer must present a signature over [`withdraw_message`] for this
    /// escrow and destination, made with the beneficiary's private key — the
    /// key only someone with the right password can re-derive. The full vault
    /// balance moves out (net of the config-gated fee), then the vault is
    /// closed and the record deleted.
    ///
    /// # Errors
    /// - `NotFound` if no escrow lives at the address (including after a
    ///   previous successful withdrawal)
    /// - `Unauthorized` on a signer/signature mismatch (wrong password)
    /// - `MintMismatch` if the destination holds a different token
    pub async fn withdraw(&self, req: WithdrawRequest) -> Result<WithdrawReceipt> {
        let escrow = self
            .store
            .get(&req.escrow_address)
            .await?
            .ok_or_else(|| EscrowError::not_found("escrow", req.escrow_address))?;
        let config = self.registry.get(&escrow.config)?;

        let message = withdraw_message(&req.escrow_address, &req.destination);
        let signer_is_beneficiary: bool = req
            .signer
            .as_bytes()
            .ct_eq(escrow.beneficiary.as_bytes())
            .into();
        if !signer_is_beneficiary
            || !self.verifier.verify(&req.signer, &message, &req.signature)
        {
            return Err(EscrowError::Unauthorized(
                "signature does not match the escrow beneficiary".into(),
            ));
        }

        if req.destination == escrow.vault {
            return Err(EscrowError::invalid_parameter(
                "destination",
                "cannot withdraw into the vault itself",
            ));
        }
        let destination = self
            .ledger
            .account(&req.destination)
            .await?
            .ok_or_else(|| EscrowError::not_found("token account", req.destination))?;
        if destination.mint != escrow.mint {
            return Err(EscrowError::mint_mismatch(escrow.mint, destination.mint));
        }

        // The vault balance is authoritative, not the recorded amount.
        let vault = self
            .ledger
            .account(&escrow.vault)
            .await?
            .ok_or_else(|| EscrowError::Internal(format!("vault missing for {}", escrow.address)))?;
        let balance = vault.balance;

        // Fee is config-gated: a zero rate touches no fee account at all.
        let fee = config.fee_amount(balance);
        if fee > 0 {
            let fee_account = self
                .ledger
                .associated_account(&config.fee_recipient.into(), &escrow.mint)
                .await?;
            self.ledger
                .transfer(&escrow.vault, &fee_account, fee, &escrow.address)
                .await?;
        }

        self.ledger
            .transfer(&escrow.vault, &req.destination, balance - fee, &escrow.address)
            .await?;
        self.ledger
            .close_account(&escrow.vault, &escrow.address)
            .await?;
        self.store.delete(&escrow.address).await?;

        tracing::info!(
            escrow = %escrow.address,
            amount = balance - fee,
            fee,
            "withdrawal completed"
        );
        Ok(WithdrawReceipt {
            amount: balance - fee,
            fee,
        })
    }

    /// Enumerate live escrows for `(config, depositor)`.
    ///
    /// The underlying scan is not consistent with concurrent mutation, so
    /// every hit is re-fetched by address and records that vanished in the
    /// meantime are dropped. The result can still go stale immediately;
    /// callers acting on an entry must be prepared for `NotFound`.
    pub async fn find_deposits(
        &self,
        config: &Address,
        depositor: &PublicKey,
    ) -> Result<Vec<Escrow>> {
        let hits = self.store.find(config, depositor).await?;
        let mut live = Vec::with_capacity(hits.len());
        for hit in hits {
            if let Some(current) = self.store.get(&hit.address).await? {
                live.push(current);
            }
        }
        Ok(live)
    }

    /// Best-effort removal of a vault created by a deposit that did not
    /// complete.
    async fn unwind_vault(&self, vault: &Address, authority: &Address) {
        if let Err(err) = self.ledger.close_account(vault, authority).await {
            tracing::warn!(vault = %vault, error = %err, "vault unwind failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::Ed25519Verifier;
    use crate::store::MemoryEscrowStore;
    use crate::test_utils::{MockTokenLedger, TestDeployment};

    #[tokio::test]
    async fn deposit_rejects_zero_amount() {
        let deployment = TestDeployment::new(0);
        let req = deployment.deposit_request(b"pw", 0);
        let err = deployment.protocol.deposit(req).await.unwrap_err();
        assert!(matches!(err, EscrowError::InvalidParameter { .. }));
    }

    #[tokio::test]
    async fn deposit_requires_known_config() {
        let deployment = TestDeployment::new(0);
        let mut req = deployment.deposit_request(b"pw", 100);
        req.config = Address::new([0xee; 32]);
        let err = deployment.protocol.deposit(req).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn deposit_rejects_mint_mismatch() {
        let deployment = TestDeployment::new(0);
        let mut req = deployment.deposit_request(b"pw", 100);
        req.mint = Address::new([0xdd; 32]);
        let err = deployment.protocol.deposit(req).await.unwrap_err();
        assert!(matches!(err, EscrowError::MintMismatch { .. }));
    }

    #[tokio::test]
    async fn failed_transfer_leaves_no_record_behind() {
        let deployment = TestDeployment::new(0);
        // More than the depositor holds.
        let req = deployment.deposit_request(b"pw", TestDeployment::FUNDING + 1);
        let err = deployment.protocol.deposit(req).await.unwrap_err();
        assert!(matches!(err, EscrowError::InsufficientFunds { .. }));

        let address = derive_escrow_address(&req.beneficiary, &req.config);
        assert_eq!(deployment.store.get(&address).await.unwrap(), None);
    }

    #[tokio::test]
    async fn withdraw_message_is_destination_bound() {
        let escrow = Address::new([1u8; 32]);
        let a = withdraw_message(&escrow, &Address::new([2u8; 32]));
        let b = withdraw_message(&escrow, &Address::new([3u8; 32]));
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn protocol_is_generic_over_collaborators() {
        // Compile-time check that the seams stay trait-shaped.
        fn assert_protocol<S: EscrowStore, L: TokenLedger, V: SignatureVerifier>(
            _p: &EscrowProtocol<S, L, V>,
        ) {
        }
        let deployment = TestDeployment::new(0);
        assert_protocol::<MemoryEscrowStore, MockTokenLedger, Ed25519Verifier>(
            &deployment.protocol,
        );
    }
}
