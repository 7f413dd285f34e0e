use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::chain::status::{effective_status, OrderStatus};

/// Provenance of a local order row. Stored as plain TEXT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSource {
    /// First observed on chain by a sync pass
    Chain,
    /// Placed through the app, prefixed non-numeric id
    App,
    /// Inserted by seed tooling
    Seed,
}

impl OrderSource {
    pub fn as_str(self) -> &'static str {
        match self {
            OrderSource::Chain => "chain",
            OrderSource::App => "app",
            OrderSource::Seed => "seed",
        }
    }
}

impl std::str::FromStr for OrderSource {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "chain" => Ok(OrderSource::Chain),
            "app" => Ok(OrderSource::App),
            "seed" => Ok(OrderSource::Seed),
            other => Err(format!("unknown order source '{}'", other)),
        }
    }
}

impl sqlx::Type<sqlx::Postgres> for OrderSource {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <&str as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <&str as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Postgres> for OrderSource {
    fn decode(
        value: sqlx::postgres::PgValueRef<'r>,
    ) -> Result<Self, sqlx::error::BoxDynError> {
        let text = <&str as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        text.parse().map_err(Into::into)
    }
}

/// Local mirror of an order: chain state cache plus booking metadata.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct LocalOrder {
    pub id: String,
    pub source: OrderSource,
    pub status: i16,
    pub chain_status: Option<i16>,
    pub buyer_address: Option<String>,
    pub companion_id: Option<String>,
    pub price: i64,
    pub deposit: i64,
    pub meta: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LocalOrder {
    pub fn local_status(&self) -> Option<OrderStatus> {
        OrderStatus::from_i16(self.status)
    }

    /// Cached chain status: the dedicated column, falling back to the legacy
    /// `meta.chain.status` location older rows still carry.
    pub fn cached_chain_status(&self) -> Option<OrderStatus> {
        if let Some(value) = self.chain_status {
            return OrderStatus::from_i16(value);
        }
        self.meta
            .get("chain")
            .and_then(|chain| chain.get("status"))
            .and_then(|status| status.as_i64())
            .and_then(|status| OrderStatus::from_i16(status as i16))
    }

    /// max(local, chain): the local view never regresses a more-advanced
    /// chain status observed earlier.
    pub fn effective_status(&self) -> Option<OrderStatus> {
        effective_status(self.local_status(), self.cached_chain_status())
    }

    pub fn created_at_ms(&self) -> i64 {
        self.created_at.timestamp_millis()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_order() -> LocalOrder {
        LocalOrder {
            id: "1".to_string(),
            source: OrderSource::Chain,
            status: 1,
            chain_status: None,
            buyer_address: None,
            companion_id: None,
            price: 0,
            deposit: 0,
            meta: serde_json::json!({}),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_chain_status_column_wins_over_meta() {
        let mut order = base_order();
        order.chain_status = Some(2);
        order.meta = serde_json::json!({"chain": {"status": 4}});
        assert_eq!(order.cached_chain_status(), Some(OrderStatus::Deposited));
    }

    #[test]
    fn test_legacy_meta_location_fallback() {
        let mut order = base_order();
        order.meta = serde_json::json!({"chain": {"status": 4}});
        assert_eq!(order.cached_chain_status(), Some(OrderStatus::Disputed));
    }

    #[test]
    fn test_effective_status_prefers_advanced_local() {
        // stale chain read: local already saw Completed
        let mut order = base_order();
        order.status = 3;
        order.chain_status = Some(1);
        assert_eq!(order.effective_status(), Some(OrderStatus::Completed));
    }

    #[test]
    fn test_effective_status_without_chain_cache() {
        let order = base_order();
        assert_eq!(order.effective_status(), Some(OrderStatus::Paid));
    }
}
