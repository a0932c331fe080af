//! Escrow record storage.
//!
//! [`EscrowStore`] is the seam to the ledger's account storage. The bundled
//! [`MemoryEscrowStore`] keeps records in their *encoded* form and implements
//! `find` as a byte comparison at a fixed offset, matching how an external
//! memcmp-style filtered scan behaves against the real ledger.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::escrow::{CONFIG_OFFSET, FILTER_END};
use crate::{Address, Escrow, EscrowError, PublicKey, Result};

/// Storage for live escrow records, keyed by derived address.
#[async_trait]
pub trait EscrowStore: Send + Sync {
    /// Persist a new record at its address.
    ///
    /// # Errors
    /// `AlreadyExists` if a record already lives at `escrow.address` — this
    /// is the collision check that enforces one escrow per
    /// `(beneficiary, config)` pair.
    async fn create(&self, escrow: &Escrow) -> Result<()>;

    /// Point lookup by address.
    async fn get(&self, address: &Address) -> Result<Option<Escrow>>;

    /// Filtered scan over `(config, depositor)`.
    ///
    /// **Not** transactionally consistent with concurrent deposit/withdraw:
    /// results may be stale or about to vanish. Re-fetch by address and
    /// re-check before acting on them.
    async fn find(&self, config: &Address, depositor: &PublicKey) -> Result<Vec<Escrow>>;

    /// Remove the record. Only invoked as part of a withdrawal.
    ///
    /// # Errors
    /// `NotFound` if nothing lives at `address`.
    async fn delete(&self, address: &Address) -> Result<()>;
}

/// In-memory escrow store.
///
/// Records are held encoded so that `find` really scans bytes at the layout
/// contract's offsets rather than comparing decoded fields.
pub struct MemoryEscrowStore {
    records: RwLock<HashMap<Address, Vec<u8>>>,
}

fn lock_error(context: &str) -> EscrowError {
    EscrowError::Storage(format!("MemoryEscrowStore: lock poisoned during {context}"))
}

impl MemoryEscrowStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Number of live records.
    ///
    /// Returns 0 if the lock is poisoned.
    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    /// Check whether the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryEscrowStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EscrowStore for MemoryEscrowStore {
    async fn create(&self, escrow: &Escrow) -> Result<()> {
        let mut records = self.records.write().map_err(|_| lock_error("create"))?;
        if records.contains_key(&escrow.address) {
            return Err(EscrowError::already_exists("escrow", escrow.address));
        }
        records.insert(escrow.address, escrow.to_bytes().to_vec());
        Ok(())
    }

    async fn get(&self, address: &Address) -> Result<Option<Escrow>> {
        let records = self.records.read().map_err(|_| lock_error("get"))?;
        records
            .get(address)
            .map(|bytes| Escrow::from_bytes(*address, bytes))
            .transpose()
    }

    async fn find(&self, config: &Address, depositor: &PublicKey) -> Result<Vec<Escrow>> {
        let window = Escrow::filter_bytes(config, depositor);
        let records = self.records.read().map_err(|_| lock_error("find"))?;
        records
            .iter()
            .filter(|(_, bytes)| bytes[CONFIG_OFFSET..FILTER_END] == window)
            .map(|(address, bytes)| Escrow::from_bytes(*address, bytes))
            .collect()
    }

    async fn delete(&self, address: &Address) -> Result<()> {
        let mut records = self.records.write().map_err(|_| lock_error("delete"))?;
        if records.remove(address).is_none() {
            return Err(EscrowError::not_found("escrow", address));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Salt;

    fn escrow(config: u8, depositor: u8, beneficiary: u8) -> Escrow {
        let beneficiary = PublicKey::new([beneficiary; 32]);
        let config = Address::new([config; 32]);
        Escrow {
            address: crate::derive_escrow_address(&beneficiary, &config),
            config,
            depositor: PublicKey::new([depositor; 32]),
            beneficiary,
            salt: Salt([7u8; 16]),
            mint: Address::new([8u8; 32]),
            vault: Address::new([9u8; 32]),
            amount: 42,
        }
    }

    #[tokio::test]
    async fn create_get_delete() {
        let store = MemoryEscrowStore::new();
        let record = escrow(1, 2, 3);

        store.create(&record).await.unwrap();
        assert_eq!(store.get(&record.address).await.unwrap(), Some(record));

        store.delete(&record.address).await.unwrap();
        assert_eq!(store.get(&record.address).await.unwrap(), None);
    }

    #[tokio::test]
    async fn create_rejects_duplicate_address() {
        let store = MemoryEscrowStore::new();
        let record = escrow(1, 2, 3);

        store.create(&record).await.unwrap();
        let err = store.create(&record).await.unwrap_err();
        assert!(matches!(err, EscrowError::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn delete_missing_is_not_found() {
        let store = MemoryEscrowStore::new();
        let err = store.delete(&Address::new([1u8; 32])).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn find_matches_config_and_depositor_prefix() {
        let store = MemoryEscrowStore::new();
        let a = escrow(1, 2, 3);
        let b = escrow(1, 2, 4); // same pair, different beneficiary
        let other_depositor = escrow(1, 5, 6);
        let other_config = escrow(7, 2, 8);

        for record in [&a, &b, &other_depositor, &other_config] {
            store.create(record).await.unwrap();
        }

        let mut found = store.find(&a.config, &a.depositor).await.unwrap();
        found.sort_by_key(|e| e.address.0);
        let mut expected = vec![a, b];
        expected.sort_by_key(|e| e.address.0);
        assert_eq!(found, expected);

        assert!(store
            .find(&Address::new([9u8; 32]), &a.depositor)
            .await
            .unwrap()
            .is_empty());
    }
}
