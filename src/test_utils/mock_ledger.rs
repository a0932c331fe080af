//! A simulated fungible-token ledger.
//!
//! Applies each call atomically under one lock, which approximates the real
//! ledger's transaction-level serializability closely enough for protocol
//! tests. Associated account addresses are deterministic per `(owner, mint)`,
//! mirroring the associated-token-account scheme the protocol assumes.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::ledger::{TokenAccount, TokenLedger};
use crate::{Address, EscrowError, Result};

/// In-memory [`TokenLedger`] implementation.
pub struct MockTokenLedger {
    accounts: RwLock<HashMap<Address, TokenAccount>>,
}

fn lock_error(context: &str) -> EscrowError {
    EscrowError::Storage(format!("MockTokenLedger: lock poisoned during {context}"))
}

/// Deterministic associated-account address for `(owner, mint)`.
fn associated_address(owner: &Address, mint: &Address) -> Address {
    let mut hasher = Sha256::new();
    hasher.update(b"token-account");
    hasher.update(owner.as_bytes());
    hasher.update(mint.as_bytes());
    Address::new(hasher.finalize().into())
}

impl MockTokenLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self {
            accounts: RwLock::new(HashMap::new()),
        }
    }

    /// Test helper: open the associated account for `(owner, mint)` seeded
    /// with `balance`.
    pub fn open_funded_account(
        &self,
        owner: &Address,
        mint: &Address,
        balance: u64,
    ) -> Result<Address> {
        let id = associated_address(owner, mint);
        let mut accounts = self
            .accounts
            .write()
            .map_err(|_| lock_error("open_funded_account"))?;
        if accounts.contains_key(&id) {
            return Err(EscrowError::already_exists("token account", id));
        }
        accounts.insert(
            id,
            TokenAccount {
                owner: *owner,
                mint: *mint,
                balance,
            },
        );
        Ok(id)
    }

    /// Current balance of an account, `None` if it does not exist.
    pub fn balance(&self, id: &Address) -> Option<u64> {
        self.accounts
            .read()
            .ok()
            .and_then(|accounts| accounts.get(id).map(|a| a.balance))
    }
}

impl Default for MockTokenLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TokenLedger for MockTokenLedger {
    async fn account(&self, id: &Address) -> Result<Option<TokenAccount>> {
        let accounts = self.accounts.read().map_err(|_| lock_error("account"))?;
        Ok(accounts.get(id).copied())
    }

    async fn create_account(&self, owner: &Address, mint: &Address) -> Result<Address> {
        let id = associated_address(owner, mint);
        let mut accounts = self
            .accounts
            .write()
            .map_err(|_| lock_error("create_account"))?;
        if accounts.contains_key(&id) {
            return Err(EscrowError::already_exists("token account", id));
        }
        accounts.insert(
            id,
            TokenAccount {
                owner: *owner,
                mint: *mint,
                balance: 0,
            },
        );
        Ok(id)
    }

    async fn associated_account(&self, owner: &Address, mint: &Address) -> Result<Address> {
        let id = associated_address(owner, mint);
        let mut accounts = self
            .accounts
            .write()
            .map_err(|_| lock_error("associated_account"))?;
        accounts.entry(id).or_insert(TokenAccount {
            owner: *owner,
            mint: *mint,
            balance: 0,
        });
        Ok(id)
    }

    async fn transfer(
        &self,
        from: &Address,
        to: &Address,
        amount: u64,
        authority: &Address,
    ) -> Result<()> {
        let mut accounts = self.accounts.write().map_err(|_| lock_error("transfer"))?;

        let source = *accounts
            .get(from)
            .ok_or_else(|| EscrowError::not_found("token account", from))?;
        let dest = *accounts
            .get(to)
            .ok_or_else(|| EscrowError::not_found("token account", to))?;

        if authority != &source.owner {
            return Err(EscrowError::Unauthorized(format!(
                "{authority} does not own source account {from}"
            )));
        }
        if source.mint != dest.mint {
            return Err(EscrowError::mint_mismatch(source.mint, dest.mint));
        }
        if source.balance < amount {
            return Err(EscrowError::InsufficientFunds {
                required: amount,
                available: source.balance,
            });
        }
        if from == to {
            return Ok(());
        }
        let new_dest = dest
            .balance
            .checked_add(amount)
            .ok_or_else(|| EscrowError::Internal(format!("balance overflow on {to}")))?;

        // Both sides validated; apply under the same lock so no partial
        // transfer is ever observable.
        if let Some(account) = accounts.get_mut(from) {
            account.balance -= amount;
        }
        if let Some(account) = accounts.get_mut(to) {
            account.balance = new_dest;
        }
        Ok(())
    }

    async fn close_account(&self, id: &Address, authority: &Address) -> Result<()> {
        let mut accounts = self
            .accounts
            .write()
            .map_err(|_| lock_error("close_account"))?;
        let account = accounts
            .get(id)
            .ok_or_else(|| EscrowError::not_found("token account", id))?;
        if authority != &account.owner {
            return Err(EscrowError::Unauthorized(format!(
                "{authority} does not own token account {id}"
            )));
        }
        if account.balance != 0 {
            return Err(EscrowError::invalid_parameter(
                "token_account",
                "cannot close an account holding a balance",
            ));
        }
        accounts.remove(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(byte: u8) -> Address {
        Address::new([byte; 32])
    }

    #[tokio::test]
    async fn transfer_moves_funds() {
        let ledger = MockTokenLedger::new();
        let mint = addr(1);
        let from = ledger.open_funded_account(&addr(2), &mint, 100).unwrap();
        let to = ledger.open_funded_account(&addr(3), &mint, 0).unwrap();

        ledger.transfer(&from, &to, 60, &addr(2)).await.unwrap();
        assert_eq!(ledger.balance(&from), Some(40));
        assert_eq!(ledger.balance(&to), Some(60));
    }

    #[tokio::test]
    async fn transfer_checks_authority_mint_and_balance() {
        let ledger = MockTokenLedger::new();
        let from = ledger.open_funded_account(&addr(2), &addr(1), 100).unwrap();
        let to = ledger.open_funded_account(&addr(3), &addr(1), 0).unwrap();
        let other_mint = ledger.open_funded_account(&addr(3), &addr(9), 0).unwrap();

        let err = ledger.transfer(&from, &to, 10, &addr(8)).await.unwrap_err();
        assert!(matches!(err, EscrowError::Unauthorized(_)));

        let err = ledger
            .transfer(&from, &other_mint, 10, &addr(2))
            .await
            .unwrap_err();
        assert!(matches!(err, EscrowError::MintMismatch { .. }));

        let err = ledger.transfer(&from, &to, 101, &addr(2)).await.unwrap_err();
        assert!(matches!(err, EscrowError::InsufficientFunds { .. }));

        // Nothing moved.
        assert_eq!(ledger.balance(&from), Some(100));
        assert_eq!(ledger.balance(&to), Some(0));
    }

    #[tokio::test]
    async fn associated_account_is_deterministic_and_idempotent() {
        let ledger = MockTokenLedger::new();
        let a = ledger.associated_account(&addr(2), &addr(1)).await.unwrap();
        let b = ledger.associated_account(&addr(2), &addr(1)).await.unwrap();
        assert_eq!(a, b);

        // create_account over the same pair collides.
        let err = ledger.create_account(&addr(2), &addr(1)).await.unwrap_err();
        assert!(matches!(err, EscrowError::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn close_requires_owner_and_zero_balance() {
        let ledger = MockTokenLedger::new();
        let id = ledger.open_funded_account(&addr(2), &addr(1), 5).unwrap();

        let err = ledger.close_account(&id, &addr(9)).await.unwrap_err();
        assert!(matches!(err, EscrowError::Unauthorized(_)));

        let err = ledger.close_account(&id, &addr(2)).await.unwrap_err();
        assert!(matches!(err, EscrowError::InvalidParameter { .. }));

        let sink = ledger.open_funded_account(&addr(3), &addr(1), 0).unwrap();
        ledger.transfer(&id, &sink, 5, &addr(2)).await.unwrap();
        ledger.close_account(&id, &addr(2)).await.unwrap();
        assert_eq!(ledger.balance(&id), None);
    }
}
