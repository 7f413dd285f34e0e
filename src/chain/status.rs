use serde::{Deserialize, Serialize};

use crate::chain::types::ChainOrder;

/// Escrow order status as stored on chain.
///
/// The integer values are the chain-native representation; ordering is
/// monotonic except for the dispute branch (Disputed -> Resolved,
/// Disputed -> Cancelled). Completed, Resolved and Cancelled are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(i16)]
pub enum OrderStatus {
    Created = 0,
    Paid = 1,
    Deposited = 2,
    Completed = 3,
    Disputed = 4,
    Resolved = 5,
    Cancelled = 6,
}

impl OrderStatus {
    pub fn as_i16(self) -> i16 {
        self as i16
    }

    pub fn from_i16(value: i16) -> Option<Self> {
        match value {
            0 => Some(OrderStatus::Created),
            1 => Some(OrderStatus::Paid),
            2 => Some(OrderStatus::Deposited),
            3 => Some(OrderStatus::Completed),
            4 => Some(OrderStatus::Disputed),
            5 => Some(OrderStatus::Resolved),
            6 => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderStatus::Completed | OrderStatus::Resolved | OrderStatus::Cancelled
        )
    }

    /// Statuses reachable from `self` in one legal step.
    pub fn allowed_transitions(self) -> Vec<OrderStatus> {
        match self {
            OrderStatus::Created => vec![OrderStatus::Paid, OrderStatus::Cancelled],
            OrderStatus::Paid => vec![OrderStatus::Deposited, OrderStatus::Cancelled],
            OrderStatus::Deposited => vec![OrderStatus::Completed, OrderStatus::Disputed],
            OrderStatus::Completed => vec![],
            OrderStatus::Disputed => vec![OrderStatus::Resolved, OrderStatus::Cancelled],
            OrderStatus::Resolved => vec![],
            OrderStatus::Cancelled => vec![],
        }
    }

    pub fn can_transition(self, to: OrderStatus) -> bool {
        self.allowed_transitions().contains(&to)
    }
}

/// Cancellation before deposit is a no-penalty unwind. Once funds are
/// deposited the order must go through dispute resolution instead.
pub fn is_cancelable(status: OrderStatus) -> bool {
    matches!(status, OrderStatus::Created | OrderStatus::Paid)
}

/// An order qualifies for the auto-cancel sweep when it is still cancelable
/// and strictly older than the threshold. An unparseable chain timestamp
/// never qualifies.
pub fn is_auto_cancelable(order: &ChainOrder, now_ms: i64, threshold_ms: i64) -> bool {
    if !is_cancelable(order.status) {
        return false;
    }
    match order.created_at_ms() {
        Some(created_at) => now_ms - created_at > threshold_ms,
        None => false,
    }
}

/// Filter to auto-cancelable orders, preserving input order (callers pass
/// oldest-first), truncated to `limit` to bound transaction volume per sweep.
pub fn pick_auto_cancelable(
    orders: &[ChainOrder],
    now_ms: i64,
    threshold_ms: i64,
    limit: usize,
) -> Vec<&ChainOrder> {
    orders
        .iter()
        .filter(|order| is_auto_cancelable(order, now_ms, threshold_ms))
        .take(limit)
        .collect()
}

/// Merge a freshly observed chain status into the locally cached one.
///
/// The local cache never regresses a more-advanced status it has already
/// reported; a stale chain read loses. Integer max is sufficient here: the
/// only pairs where the ordering is debatable (Resolved vs Cancelled) are
/// both terminal, and the chain never leaves a terminal state, so a fresh
/// read cannot legitimately disagree with a terminal cache entry.
pub fn effective_status(local: Option<OrderStatus>, chain: Option<OrderStatus>) -> Option<OrderStatus> {
    match (local, chain) {
        (Some(l), Some(c)) => Some(l.max(c)),
        (Some(l), None) => Some(l),
        (None, c) => c,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(status: OrderStatus, created_at: &str) -> ChainOrder {
        ChainOrder {
            order_id: "1".to_string(),
            status,
            created_at: created_at.to_string(),
            buyer: "0xbuyer".to_string(),
            companion: "0xcompanion".to_string(),
            price: 1_000,
            deposit: 100,
        }
    }

    #[test]
    fn test_cancelability_is_status_closed() {
        assert!(is_cancelable(OrderStatus::Created));
        assert!(is_cancelable(OrderStatus::Paid));
        for status in [
            OrderStatus::Deposited,
            OrderStatus::Completed,
            OrderStatus::Disputed,
            OrderStatus::Resolved,
            OrderStatus::Cancelled,
        ] {
            assert!(!is_cancelable(status), "{:?} must not be cancelable", status);
        }
    }

    #[test]
    fn test_auto_cancel_threshold_is_strict() {
        let now = 1_000_000;
        let threshold = 1_000;
        // created exactly at the boundary: not eligible
        let boundary = order(OrderStatus::Paid, &(now - threshold).to_string());
        assert!(!is_auto_cancelable(&boundary, now, threshold));
        // one millisecond older: eligible
        let older = order(OrderStatus::Paid, &(now - threshold - 1).to_string());
        assert!(is_auto_cancelable(&older, now, threshold));
    }

    #[test]
    fn test_auto_cancel_ignores_bad_timestamps() {
        let bad = order(OrderStatus::Created, "not-a-number");
        assert!(!is_auto_cancelable(&bad, 1_000_000, 10));
    }

    #[test]
    fn test_pick_respects_limit_and_order() {
        let orders: Vec<ChainOrder> = (0..4)
            .map(|i| {
                let mut o = order(OrderStatus::Created, "0");
                o.order_id = i.to_string();
                o
            })
            .collect();
        let picked = pick_auto_cancelable(&orders, 1_000_000, 1_000, 2);
        assert_eq!(picked.len(), 2);
        assert_eq!(picked[0].order_id, "0");
        assert_eq!(picked[1].order_id, "1");
    }

    #[test]
    fn test_pick_skips_deposited() {
        let orders = vec![
            order(OrderStatus::Paid, "0"),
            order(OrderStatus::Deposited, "0"),
        ];
        let picked = pick_auto_cancelable(&orders, 1_000_000, 1_000, 10);
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].status, OrderStatus::Paid);
    }

    #[test]
    fn test_effective_status_never_regresses() {
        // stale chain read of Paid(1) must not demote a Completed(3) cache
        assert_eq!(
            effective_status(Some(OrderStatus::Completed), Some(OrderStatus::Paid)),
            Some(OrderStatus::Completed)
        );
        assert_eq!(
            effective_status(Some(OrderStatus::Paid), Some(OrderStatus::Disputed)),
            Some(OrderStatus::Disputed)
        );
        assert_eq!(effective_status(None, Some(OrderStatus::Created)), Some(OrderStatus::Created));
        assert_eq!(effective_status(Some(OrderStatus::Paid), None), Some(OrderStatus::Paid));
        assert_eq!(effective_status(None, None), None);
    }

    #[test]
    fn test_terminal_states_have_no_transitions() {
        for status in [
            OrderStatus::Completed,
            OrderStatus::Resolved,
            OrderStatus::Cancelled,
        ] {
            assert!(status.is_terminal());
            assert!(status.allowed_transitions().is_empty());
        }
    }

    #[test]
    fn test_dispute_branch_transitions() {
        assert!(OrderStatus::Disputed.can_transition(OrderStatus::Resolved));
        assert!(OrderStatus::Disputed.can_transition(OrderStatus::Cancelled));
        assert!(!OrderStatus::Disputed.can_transition(OrderStatus::Completed));
        assert!(!OrderStatus::Deposited.can_transition(OrderStatus::Cancelled));
    }

    #[test]
    fn test_i16_round_trip() {
        for value in 0..=6 {
            let status = OrderStatus::from_i16(value).unwrap();
            assert_eq!(status.as_i16(), value);
        }
        assert!(OrderStatus::from_i16(7).is_none());
        assert!(OrderStatus::from_i16(-1).is_none());
    }
}
