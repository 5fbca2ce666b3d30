use serde::{Deserialize, Serialize};
use std::fmt;

use crate::engine::types::{AssetId, UserId};

/// Rejections surfaced synchronously to the submitter. A request that passes
/// validation is guaranteed to be attempted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationError {
    /// The user was never initialized on the exchange
    UnknownUser(UserId),

    /// The user's inventory map has no entry for the asset (size 0 counts as held)
    AssetNotHeld(AssetId),

    /// Buy reservation exceeds available cash
    InsufficientCash,

    /// Sell reservation exceeds available inventory
    InsufficientInventory,

    /// Order size must be a positive number of units
    NonPositiveSize,

    /// Limit price must be a positive number of cents
    NonPositiveLimit,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::UnknownUser(user_id) => {
                write!(f, "user {} is not an exchange user", user_id)
            }
            ValidationError::AssetNotHeld(asset_id) => {
                write!(f, "user does not hold asset {}", asset_id)
            }
            ValidationError::InsufficientCash => write!(f, "not enough cash to cover the order"),
            ValidationError::InsufficientInventory => {
                write!(f, "not enough assets to cover the order")
            }
            ValidationError::NonPositiveSize => write!(f, "order size must be positive"),
            ValidationError::NonPositiveLimit => write!(f, "limit price must be positive"),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Contract violations inside the ledger. These are never user-visible: the
/// submission validator prevents them, and a surviving one is a bug the
/// consumer task fails fast on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerError {
    /// `create_user` for an id that is already present
    UserExists,

    /// `reserve_for_submit` saw an order id that is already recorded
    DuplicateOrder,
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerError::UserExists => write!(f, "user already exists"),
            LedgerError::DuplicateOrder => write!(f, "order id already recorded"),
        }
    }
}

impl std::error::Error for LedgerError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            ValidationError::UnknownUser("u9".to_string()).to_string(),
            "user u9 is not an exchange user"
        );
        assert_eq!(
            ValidationError::InsufficientCash.to_string(),
            "not enough cash to cover the order"
        );
        assert_eq!(LedgerError::DuplicateOrder.to_string(), "order id already recorded");
    }

    #[test]
    fn test_validation_error_serialization() {
        let error = ValidationError::AssetNotHeld("COIN".to_string());
        let serialized = serde_json::to_string(&error).unwrap();
        let deserialized: ValidationError = serde_json::from_str(&serialized).unwrap();
        assert_eq!(error, deserialized);
    }
}
