use serde::Serialize;

use crate::chain::types::ChainOrder;
use crate::orders::models::OrderSource;

pub const DEFAULT_MAX_DELETE: usize = 500;

const HOUR_MS: i64 = 3_600_000;

/// Minimal view of a local order for the cleanup computation; the caller
/// passes snapshots so this stays free of I/O and clocks.
#[derive(Debug, Clone)]
pub struct OrderSnapshot {
    pub id: String,
    pub source: OrderSource,
    pub created_at_ms: i64,
}

/// Outcome of the cleanup computation. `missing` is detection, `eligible`
/// applies the age/provenance filters, `ids` is the bounded action set —
/// kept separate so dry-run previews and destructive sweeps share one
/// deterministic core.
#[derive(Debug, Clone, Serialize)]
pub struct MissingCleanup {
    pub missing: Vec<String>,
    pub eligible: Vec<String>,
    pub ids: Vec<String>,
}

/// True for chain-style ids: non-empty, purely numeric. App-generated ids
/// carry a prefix and are never considered missing from chain.
fn is_chain_style_id(id: &str) -> bool {
    !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit())
}

/// Decide which local mirror rows to purge because their order no longer
/// exists on chain.
///
/// The numeric-id check is a defensive pre-filter only; provenance
/// (`source`) is the authoritative deletion gate, so destructive callers
/// pass `chain_only = true`.
pub fn compute_missing_chain_cleanup(
    chain_orders: &[ChainOrder],
    local_orders: &[OrderSnapshot],
    max_age_hours: u32,
    max_delete: Option<usize>,
    now_ms: i64,
    chain_only: bool,
) -> MissingCleanup {
    let chain_ids: std::collections::HashSet<&str> = chain_orders
        .iter()
        .map(|order| order.order_id.as_str())
        .collect();

    let missing: Vec<&OrderSnapshot> = local_orders
        .iter()
        .filter(|order| is_chain_style_id(&order.id) && !chain_ids.contains(order.id.as_str()))
        .collect();

    let eligible: Vec<&OrderSnapshot> = if max_age_hours > 0 {
        let cutoff = now_ms - i64::from(max_age_hours) * HOUR_MS;
        missing
            .iter()
            .filter(|order| order.created_at_ms < cutoff)
            .filter(|order| !chain_only || order.source == OrderSource::Chain)
            .copied()
            .collect()
    } else if chain_only {
        missing
            .iter()
            .filter(|order| order.source == OrderSource::Chain)
            .copied()
            .collect()
    } else {
        // manual admin-triggered full cleanup
        missing.clone()
    };

    let limit = max_delete.unwrap_or(DEFAULT_MAX_DELETE);
    let ids = eligible
        .iter()
        .take(limit)
        .map(|order| order.id.clone())
        .collect();

    MissingCleanup {
        missing: missing.iter().map(|order| order.id.clone()).collect(),
        eligible: eligible.iter().map(|order| order.id.clone()).collect(),
        ids,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::status::OrderStatus;

    fn chain_order(order_id: &str) -> ChainOrder {
        ChainOrder {
            order_id: order_id.to_string(),
            status: OrderStatus::Paid,
            created_at: "0".to_string(),
            buyer: "0xb".to_string(),
            companion: "0xc".to_string(),
            price: 0,
            deposit: 0,
        }
    }

    fn snapshot(id: &str, source: OrderSource, created_at_ms: i64) -> OrderSnapshot {
        OrderSnapshot {
            id: id.to_string(),
            source,
            created_at_ms,
        }
    }

    #[test]
    fn test_non_numeric_ids_are_never_missing() {
        let cleanup = compute_missing_chain_cleanup(
            &[],
            &[snapshot("ORD-4", OrderSource::App, 0)],
            0,
            None,
            1_000,
            false,
        );
        assert!(cleanup.missing.is_empty());
        assert!(cleanup.ids.is_empty());
    }

    #[test]
    fn test_age_cutoff_is_exclusive_on_the_boundary() {
        let now = 100 * HOUR_MS;
        let cutoff = now - 24 * HOUR_MS;
        let locals = vec![
            snapshot("1", OrderSource::Chain, cutoff),     // exactly at cutoff: kept
            snapshot("2", OrderSource::Chain, cutoff - 1), // strictly older: purged
        ];
        let cleanup = compute_missing_chain_cleanup(&[], &locals, 24, None, now, true);
        assert_eq!(cleanup.missing, vec!["1", "2"]);
        assert_eq!(cleanup.eligible, vec!["2"]);
        assert_eq!(cleanup.ids, vec!["2"]);
    }

    #[test]
    fn test_max_delete_bound() {
        let locals = vec![
            snapshot("1", OrderSource::Chain, 0),
            snapshot("2", OrderSource::Chain, 0),
            snapshot("3", OrderSource::Chain, 0),
        ];
        let cleanup = compute_missing_chain_cleanup(&[], &locals, 0, Some(1), HOUR_MS, true);
        assert_eq!(cleanup.eligible.len(), 3);
        assert_eq!(cleanup.ids, vec!["1"]);
    }

    #[test]
    fn test_chain_only_excludes_other_sources() {
        let locals = vec![
            snapshot("1", OrderSource::Chain, 0),
            snapshot("2", OrderSource::Seed, 0),
        ];
        let cleanup = compute_missing_chain_cleanup(&[], &locals, 0, None, HOUR_MS, true);
        assert_eq!(cleanup.missing, vec!["1", "2"]);
        assert_eq!(cleanup.ids, vec!["1"]);
    }

    #[test]
    fn test_concrete_admin_scenario() {
        // chain has ["1","2"]; "1" is present, "3" is gone, "ORD-4" is app-side
        let now = 1_000 * HOUR_MS;
        let age = now - 100 * HOUR_MS;
        let chain = vec![chain_order("1"), chain_order("2")];
        let locals = vec![
            snapshot("1", OrderSource::Chain, age),
            snapshot("3", OrderSource::Chain, age),
            snapshot("ORD-4", OrderSource::App, age),
        ];
        let cleanup = compute_missing_chain_cleanup(&chain, &locals, 24, None, now, true);
        assert_eq!(cleanup.missing, vec!["3"]);
        assert_eq!(cleanup.ids, vec!["3"]);
    }

    #[test]
    fn test_default_limit_applies() {
        let locals: Vec<OrderSnapshot> = (0..600)
            .map(|i| snapshot(&i.to_string(), OrderSource::Chain, 0))
            .collect();
        let cleanup = compute_missing_chain_cleanup(&[], &locals, 0, None, HOUR_MS, true);
        assert_eq!(cleanup.ids.len(), DEFAULT_MAX_DELETE);
    }
}
