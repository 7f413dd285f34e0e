use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

use crate::error::{AppError, AppResult};

/// A claimed diamond credit. `digest` and `settled_at` are written once the
/// on-chain transaction lands; a row without them is a claim whose chain call
/// is in flight (or crashed — visible to operators as unsettled).
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct LedgerCreditReceipt {
    pub receipt_id: String,
    pub order_id: Option<String>,
    pub user_address: String,
    pub amount: i64,
    pub memo: Option<String>,
    pub digest: Option<String>,
    pub created_at: DateTime<Utc>,
    pub settled_at: Option<DateTime<Utc>>,
}

/// Result of a credit attempt. A duplicate is a successful no-op, not an
/// error: the first credit's digest is echoed back when known.
#[derive(Debug, Clone, Serialize)]
pub struct CreditOutcome {
    pub duplicated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

/// Diamond amounts arrive as strings from the payment gateway and admin
/// panel. Reject anything that is not a positive integer at the door —
/// fractional or negative amounts are never silently floored here.
pub fn parse_diamond_amount(raw: &str) -> AppResult<u64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AppError::InvalidInput(format!(
            "amount must be a positive integer string, got '{}'",
            raw
        )));
    }
    let amount: u64 = trimmed
        .parse()
        .map_err(|_| AppError::InvalidInput(format!("amount '{}' out of range", raw)))?;
    if amount == 0 {
        return Err(AppError::InvalidInput(
            "amount must be greater than zero".to_string(),
        ));
    }
    Ok(amount)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_amounts() {
        assert_eq!(parse_diamond_amount("100").unwrap(), 100);
        assert_eq!(parse_diamond_amount(" 42 ").unwrap(), 42);
        assert_eq!(parse_diamond_amount("007").unwrap(), 7);
    }

    #[test]
    fn test_rejected_amounts() {
        for raw in ["", "0", "-5", "1.5", "abc", "+3", "1e3", "9999999999999999999999"] {
            assert!(
                parse_diamond_amount(raw).is_err(),
                "'{}' must be rejected",
                raw
            );
        }
    }
}
