//! Pre-wired deployment for protocol tests.

use std::sync::Arc;

use crate::config::{ConfigRegistry, Configuration};
use crate::kdf::{derive_claim_keypair, ClaimKeypair, KdfParams};
use crate::ledger::Ed25519Verifier;
use crate::protocol::{withdraw_message, DepositRequest, EscrowProtocol, WithdrawRequest};
use crate::store::MemoryEscrowStore;
use crate::{Address, PublicKey, Result, Salt};

use super::MockTokenLedger;

/// One configuration, one funded depositor, and a protocol wired over the
/// in-memory collaborators.
///
/// Claim keys are derived with [`KdfParams::fast_insecure`] so tests stay
/// quick; the derivation path is otherwise identical to production.
pub struct TestDeployment {
    /// Shared config registry.
    pub registry: Arc<ConfigRegistry>,
    /// Shared escrow store.
    pub store: Arc<MemoryEscrowStore>,
    /// Shared token ledger.
    pub ledger: Arc<MockTokenLedger>,
    /// Protocol instance over the above.
    pub protocol: EscrowProtocol<MemoryEscrowStore, MockTokenLedger, Ed25519Verifier>,
    /// The deployment's configuration.
    pub config: Configuration,
    /// Token type used throughout.
    pub mint: Address,
    /// Funder key.
    pub depositor: PublicKey,
    /// Funder's token account, seeded with [`Self::FUNDING`].
    pub source: Address,
}

impl TestDeployment {
    /// Initial balance of the depositor's source account.
    pub const FUNDING: u64 = 10_000_000;

    /// Stand up a deployment whose config charges `fee_basis_points`.
    ///
    /// # Panics
    /// On collaborator failure; this is test plumbing.
    pub fn new(fee_basis_points: u16) -> Self {
        let registry = Arc::new(ConfigRegistry::new());
        let store = Arc::new(MemoryEscrowStore::new());
        let ledger = Arc::new(MockTokenLedger::new());

        let config = registry
            .initialize(
                Address::new([0xc0; 32]),
                PublicKey::new([0xa0; 32]),
                PublicKey::new([0xfe; 32]),
                fee_basis_points,
            )
            .expect("fresh registry");

        let mint = Address::new([0x77; 32]);
        let depositor = PublicKey::new([0xd0; 32]);
        let source = ledger
            .open_funded_account(&depositor.into(), &mint, Self::FUNDING)
            .expect("fresh ledger");

        let protocol = EscrowProtocol::new(
            Arc::clone(&registry),
            Arc::clone(&store),
            Arc::clone(&ledger),
            Ed25519Verifier,
        );

        Self {
            registry,
            store,
            ledger,
            protocol,
            config,
            mint,
            depositor,
            source,
        }
    }

    /// Derive the claim keypair for `password` under this deployment's
    /// configuration.
    pub fn claim_keypair(&self, password: &[u8], salt: &Salt) -> Result<ClaimKeypair> {
        derive_claim_keypair(
            password,
            salt,
            &self.config.identity,
            &KdfParams::fast_insecure(),
        )
    }

    /// Build a deposit request for `amount`, deriving the beneficiary from
    /// `password` with a fresh random salt (readable off the returned
    /// request).
    pub fn deposit_request(&self, password: &[u8], amount: u64) -> DepositRequest {
        let salt = Salt::random(&mut rand::thread_rng());
        let keypair = self
            .claim_keypair(password, &salt)
            .expect("test kdf params are valid");
        DepositRequest {
            config: self.config.identity,
            depositor: self.depositor,
            source: self.source,
            beneficiary: keypair.public_key(),
            salt,
            mint: self.mint,
            amount,
        }
    }

    /// Build a withdraw request by re-deriving the keypair from `password`
    /// and `salt` and signing the canonical message.
    pub fn withdraw_request(
        &self,
        escrow_address: Address,
        destination: Address,
        password: &[u8],
        salt: &Salt,
    ) -> WithdrawRequest {
        let keypair = self
            .claim_keypair(password, salt)
            .expect("test kdf params are valid");
        let message = withdraw_message(&escrow_address, &destination);
        WithdrawRequest {
            escrow_address,
            destination,
            signer: keypair.public_key(),
            signature: keypair.sign(&message),
        }
    }

    /// Open an empty destination account for `owner` on the deployment mint.
    pub fn open_destination(&self, owner: PublicKey) -> Address {
        self.ledger
            .open_funded_account(&owner.into(), &self.mint, 0)
            .expect("fresh owner")
    }
}
