use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::chain::status::OrderStatus;

/// An escrow order as reported by the chain. Authoritative state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainOrder {
    /// Numeric-string order id assigned by the escrow package
    pub order_id: String,
    pub status: OrderStatus,
    /// Chain-native string-encoded epoch milliseconds
    pub created_at: String,
    pub buyer: String,
    pub companion: String,
    /// Diamond price of the booking
    pub price: u64,
    /// Companion deposit held in escrow
    pub deposit: u64,
}

impl ChainOrder {
    pub fn created_at_ms(&self) -> Option<i64> {
        self.created_at.parse().ok()
    }
}

/// Receipt of an executed admin transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxReceipt {
    pub digest: String,
    #[serde(default)]
    pub effects: Option<serde_json::Value>,
}

/// Dispute resolution parameters, in basis points of the disputed amounts
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ResolveDisputeRequest {
    pub order_id: String,
    /// Share of the service price refunded to the buyer
    #[validate(range(max = 10_000, message = "must be between 0 and 10000 bps"))]
    pub service_refund_bps: u32,
    /// Share of the companion deposit slashed to the buyer
    #[validate(range(max = 10_000, message = "must be between 0 and 10000 bps"))]
    pub deposit_slash_bps: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_created_at_ms_parses_chain_strings() {
        let order = ChainOrder {
            order_id: "7".to_string(),
            status: OrderStatus::Created,
            created_at: "1700000000123".to_string(),
            buyer: "0xb".to_string(),
            companion: "0xc".to_string(),
            price: 500,
            deposit: 50,
        };
        assert_eq!(order.created_at_ms(), Some(1_700_000_000_123));
    }

    #[test]
    fn test_resolve_request_bps_bounds() {
        let ok = ResolveDisputeRequest {
            order_id: "1".to_string(),
            service_refund_bps: 10_000,
            deposit_slash_bps: 0,
        };
        assert!(validator::Validate::validate(&ok).is_ok());

        let too_high = ResolveDisputeRequest {
            order_id: "1".to_string(),
            service_refund_bps: 10_001,
            deposit_slash_bps: 0,
        };
        assert!(validator::Validate::validate(&too_high).is_err());
    }
}
