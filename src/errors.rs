//! Error types for escrow operations.
//!
//! Every failure aborts the operation that raised it; the protocol performs
//! no local recovery or retry. Errors are surfaced to callers verbatim with
//! their kind, never swallowed.

/// Error codes for FFI and host integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum EscrowErrorCode {
    /// A record already exists at the target address
    AlreadyExists = 1000,
    /// Record or account not found
    NotFound = 2000,
    /// Signature or authority mismatch
    Unauthorized = 3000,
    /// Token-type mismatch between accounts
    MintMismatch = 4000,
    /// Underlying transfer lacked funds
    InsufficientFunds = 5000,
    /// Malformed input (fee rate, key length, zero amount, ...)
    InvalidParameter = 6000,
    /// Storage layer failure
    Storage = 7000,
    /// Internal/unexpected error
    Internal = 9999,
}

/// Comprehensive error type for escrow operations.
#[derive(Debug, thiserror::Error)]
pub enum EscrowError {
    /// A record already exists at the target address. At deposit time this is
    /// how the one-escrow-per-(beneficiary, config) invariant surfaces.
    #[error("{resource} already exists: {identifier}")]
    AlreadyExists {
        /// Type of resource (e.g., "escrow", "config", "token account")
        resource: &'static str,
        /// Colliding identifier
        identifier: String,
    },

    /// Record or account not found.
    #[error("{resource} not found: {identifier}")]
    NotFound {
        /// Type of resource
        resource: &'static str,
        /// Missing identifier
        identifier: String,
    },

    /// Signature or authority mismatch. A wrong password surfaces here: the
    /// re-derived keypair does not match the recorded beneficiary.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Token-type mismatch between the vault and a source/destination account.
    #[error("mint mismatch: expected {expected}, got {actual}")]
    MintMismatch {
        /// Mint the escrow holds
        expected: String,
        /// Mint of the offending account
        actual: String,
    },

    /// The underlying transfer primitive reported inadequate balance.
    #[error("insufficient funds: need {required}, have {available}")]
    InsufficientFunds {
        /// Amount the transfer needed
        required: u64,
        /// Amount actually available
        available: u64,
    },

    /// Malformed input.
    #[error("invalid {field}: {reason}")]
    InvalidParameter {
        /// Field or parameter name
        field: &'static str,
        /// Reason for invalidity
        reason: String,
    },

    /// Storage layer failure (e.g., a poisoned lock).
    #[error("storage error: {0}")]
    Storage(String),

    /// Internal/unexpected error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl EscrowError {
    /// Get the error code for FFI/host integration.
    pub fn code(&self) -> EscrowErrorCode {
        match self {
            Self::AlreadyExists { .. } => EscrowErrorCode::AlreadyExists,
            Self::NotFound { .. } => EscrowErrorCode::NotFound,
            Self::Unauthorized(_) => EscrowErrorCode::Unauthorized,
            Self::MintMismatch { .. } => EscrowErrorCode::MintMismatch,
            Self::InsufficientFunds { .. } => EscrowErrorCode::InsufficientFunds,
            Self::InvalidParameter { .. } => EscrowErrorCode::InvalidParameter,
            Self::Storage(_) => EscrowErrorCode::Storage,
            Self::Internal(_) => EscrowErrorCode::Internal,
        }
    }

    /// Create an "already exists" error.
    pub fn already_exists(resource: &'static str, identifier: impl ToString) -> Self {
        Self::AlreadyExists {
            resource,
            identifier: identifier.to_string(),
        }
    }

    /// Create a "not found" error.
    pub fn not_found(resource: &'static str, identifier: impl ToString) -> Self {
        Self::NotFound {
            resource,
            identifier: identifier.to_string(),
        }
    }

    /// Create an "invalid parameter" error.
    pub fn invalid_parameter(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            field,
            reason: reason.into(),
        }
    }

    /// Create a "mint mismatch" error.
    pub fn mint_mismatch(expected: impl ToString, actual: impl ToString) -> Self {
        Self::MintMismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    /// Check if this error indicates a missing record.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_match_variants() {
        let err = EscrowError::already_exists("escrow", "abcd");
        assert_eq!(err.code(), EscrowErrorCode::AlreadyExists);

        let err = EscrowError::not_found("config", "ffff");
        assert_eq!(err.code(), EscrowErrorCode::NotFound);
        assert!(err.is_not_found());

        let err = EscrowError::Unauthorized("bad signature".into());
        assert_eq!(err.code(), EscrowErrorCode::Unauthorized);
    }

    #[test]
    fn display_includes_detail() {
        let err = EscrowError::InsufficientFunds {
            required: 1000,
            available: 500,
        };
        let msg = err.to_string();
        assert!(msg.contains("1000"));
        assert!(msg.contains("500"));

        let err = EscrowError::invalid_parameter("fee_basis_points", "must be <= 10000");
        assert!(err.to_string().contains("fee_basis_points"));
    }
}
