//! Deployment configuration records and their registry.
//!
//! A configuration is a singleton-per-address resource: created once,
//! referenced by its ledger address (`identity`), mutable only by its
//! authority. One deployment may host many independent configurations, and
//! key derivation is domain-separated per configuration, so escrows under
//! different configs never share beneficiary keys even for identical
//! passwords.

use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::{Address, EscrowError, PublicKey, Result};

/// Upper bound for `fee_basis_points` (100%).
pub const MAX_FEE_BASIS_POINTS: u16 = 10_000;

/// Administrative parameters for one escrow deployment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration {
    /// Ledger address of this config record. Immutable; escrow addresses and
    /// claim-key derivation are both bound to it.
    pub identity: Address,
    /// Key permitted to mutate fee parameters.
    pub authority: PublicKey,
    /// Key credited with withdrawal fees.
    pub fee_recipient: PublicKey,
    /// Withdrawal fee in basis points, `0..=10_000`. Zero disables the fee
    /// leg entirely.
    pub fee_basis_points: u16,
}

impl Configuration {
    /// Fee owed on a withdrawal of `amount`, rounded down.
    pub fn fee_amount(&self, amount: u64) -> u64 {
        // u128 intermediate: amount * 10_000 can overflow u64.
        ((amount as u128 * self.fee_basis_points as u128) / MAX_FEE_BASIS_POINTS as u128) as u64
    }
}

/// Partial update applied by [`ConfigRegistry::update`].
///
/// `None` fields are left untouched; `identity` can never change.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ConfigUpdate {
    /// Replacement authority, if rotating.
    pub authority: Option<PublicKey>,
    /// Replacement fee recipient.
    pub fee_recipient: Option<PublicKey>,
    /// Replacement fee rate.
    pub fee_basis_points: Option<u16>,
}

/// Registry of configuration records, keyed by identity.
///
/// Callers are authenticated before they get here: `update` takes the caller
/// key that the ledger's signature layer already verified, and only compares
/// it against the stored authority.
pub struct ConfigRegistry {
    configs: RwLock<HashMap<Address, Configuration>>,
}

/// Poisoned locks surface as storage errors rather than panics.
fn lock_error(context: &str) -> EscrowError {
    EscrowError::Storage(format!("ConfigRegistry: lock poisoned during {context}"))
}

fn validate_fee(fee_basis_points: u16) -> Result<()> {
    if fee_basis_points > MAX_FEE_BASIS_POINTS {
        return Err(EscrowError::invalid_parameter(
            "fee_basis_points",
            format!("must be <= {MAX_FEE_BASIS_POINTS}, got {fee_basis_points}"),
        ));
    }
    Ok(())
}

impl ConfigRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            configs: RwLock::new(HashMap::new()),
        }
    }

    /// Create a new configuration record at `identity`.
    ///
    /// # Errors
    /// - `AlreadyExists` if a config already lives at that identity
    /// - `InvalidParameter` if the fee rate exceeds 100%
    pub fn initialize(
        &self,
        identity: Address,
        authority: PublicKey,
        fee_recipient: PublicKey,
        fee_basis_points: u16,
    ) -> Result<Configuration> {
        validate_fee(fee_basis_points)?;

        let mut configs = self.configs.write().map_err(|_| lock_error("initialize"))?;
        if configs.contains_key(&identity) {
            return Err(EscrowError::already_exists("config", identity));
        }

        let config = Configuration {
            identity,
            authority,
            fee_recipient,
            fee_basis_points,
        };
        configs.insert(identity, config);
        tracing::info!(config = %identity, fee_basis_points, "config initialized");
        Ok(config)
    }

    /// Fetch a configuration by identity.
    pub fn get(&self, identity: &Address) -> Result<Configuration> {
        let configs = self.configs.read().map_err(|_| lock_error("get"))?;
        configs
            .get(identity)
            .copied()
            .ok_or_else(|| EscrowError::not_found("config", identity))
    }

    /// Apply `update` to the config at `identity`.
    ///
    /// Succeeds only when `caller` equals the record's current authority.
    /// Rotating the authority takes effect for subsequent updates; the
    /// identity never changes, so existing escrow addresses stay valid.
    pub fn update(
        &self,
        identity: &Address,
        caller: &PublicKey,
        update: ConfigUpdate,
    ) -> Result<Configuration> {
        if let Some(fee) = update.fee_basis_points {
            validate_fee(fee)?;
        }

        let mut configs = self.configs.write().map_err(|_| lock_error("update"))?;
        let config = configs
            .get_mut(identity)
            .ok_or_else(|| EscrowError::not_found("config", identity))?;

        if caller != &config.authority {
            return Err(EscrowError::Unauthorized(format!(
                "caller {caller} is not the config authority"
            )));
        }

        if let Some(authority) = update.authority {
            config.authority = authority;
        }
        if let Some(fee_recipient) = update.fee_recipient {
            config.fee_recipient = fee_recipient;
        }
        if let Some(fee_basis_points) = update.fee_basis_points {
            config.fee_basis_points = fee_basis_points;
        }
        tracing::info!(config = %identity, "config updated");
        Ok(*config)
    }
}

impl Default for ConfigRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_with_config() -> (ConfigRegistry, Configuration) {
        let registry = ConfigRegistry::new();
        let config = registry
            .initialize(
                Address::new([1u8; 32]),
                PublicKey::new([2u8; 32]),
                PublicKey::new([3u8; 32]),
                100,
            )
            .unwrap();
        (registry, config)
    }

    #[test]
    fn initialize_and_get() {
        let (registry, config) = registry_with_config();
        assert_eq!(registry.get(&config.identity).unwrap(), config);
    }

    #[test]
    fn initialize_rejects_duplicate_identity() {
        let (registry, config) = registry_with_config();
        let err = registry
            .initialize(config.identity, config.authority, config.fee_recipient, 0)
            .unwrap_err();
        assert!(matches!(err, EscrowError::AlreadyExists { .. }));
    }

    #[test]
    fn initialize_rejects_fee_over_100_percent() {
        let registry = ConfigRegistry::new();
        let err = registry
            .initialize(
                Address::new([1u8; 32]),
                PublicKey::new([2u8; 32]),
                PublicKey::new([3u8; 32]),
                10_001,
            )
            .unwrap_err();
        assert!(matches!(err, EscrowError::InvalidParameter { .. }));
    }

    #[test]
    fn update_requires_authority() {
        let (registry, config) = registry_with_config();
        let stranger = PublicKey::new([9u8; 32]);
        let err = registry
            .update(
                &config.identity,
                &stranger,
                ConfigUpdate {
                    fee_basis_points: Some(0),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, EscrowError::Unauthorized(_)));

        // Unchanged after the failed attempt.
        assert_eq!(registry.get(&config.identity).unwrap().fee_basis_points, 100);
    }

    #[test]
    fn update_by_authority_applies_and_rotates() {
        let (registry, config) = registry_with_config();
        let new_authority = PublicKey::new([7u8; 32]);

        let updated = registry
            .update(
                &config.identity,
                &config.authority,
                ConfigUpdate {
                    authority: Some(new_authority),
                    fee_basis_points: Some(250),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.fee_basis_points, 250);
        assert_eq!(updated.authority, new_authority);

        // Old authority lost its capability.
        let err = registry
            .update(&config.identity, &config.authority, ConfigUpdate::default())
            .unwrap_err();
        assert!(matches!(err, EscrowError::Unauthorized(_)));

        // New authority holds it.
        registry
            .update(&config.identity, &new_authority, ConfigUpdate::default())
            .unwrap();
    }

    #[test]
    fn update_missing_config_is_not_found() {
        let registry = ConfigRegistry::new();
        let err = registry
            .update(
                &Address::new([1u8; 32]),
                &PublicKey::new([2u8; 32]),
                ConfigUpdate::default(),
            )
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn fee_amount_rounds_down() {
        let (_, mut config) = registry_with_config();
        config.fee_basis_points = 100; // 1%
        assert_eq!(config.fee_amount(1_000_000), 10_000);
        assert_eq!(config.fee_amount(99), 0);

        config.fee_basis_points = 0;
        assert_eq!(config.fee_amount(1_000_000), 0);

        config.fee_basis_points = MAX_FEE_BASIS_POINTS;
        assert_eq!(config.fee_amount(u64::MAX), u64::MAX);
    }
}
