use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use uuid::Uuid;

pub type OrderId = Uuid;
pub type MarketId = Uuid;
pub type UserId = Uuid;

/// The outcome an order buys shares in. Both sides of a market's book hold
/// buy orders; an incoming `Yes` matches resting `No` liquidity and vice
/// versa.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Yes,
    No,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Yes => Side::No,
            Side::No => Side::Yes,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderType {
    Market,
    Limit,
    Ioc,
    Fok,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    Pending,
    Partial,
    Filled,
    Cancelled,
}

impl OrderStatus {
    /// A terminal order never re-enters a book.
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Filled | OrderStatus::Cancelled)
    }

    /// Legal transitions:
    /// Pending -> Partial -> Filled, Pending -> Filled,
    /// Pending -> Cancelled, Partial -> Cancelled.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Partial)
                | (Pending, Filled)
                | (Pending, Cancelled)
                | (Partial, Filled)
                | (Partial, Cancelled)
        )
    }
}

/// A priced or unpriced order in a binary market.
///
/// `price` is the limit price for non-market orders and a placeholder (zero
/// unless the caller supplied one) for market orders. `filled` is cumulative;
/// the matcher and the engine facade are the only writers of `filled` and
/// `status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub market_id: MarketId,
    pub user_id: UserId,
    pub side: Side,
    pub order_type: OrderType,
    pub price: Decimal,
    pub size: Decimal,
    pub filled: Decimal,
    pub status: OrderStatus,
    pub created_at: SystemTime,
}

impl Order {
    pub fn remaining(&self) -> Decimal {
        self.size - self.filled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_machine() {
        use OrderStatus::*;
        assert!(Pending.can_transition_to(Partial));
        assert!(Pending.can_transition_to(Filled));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(Partial.can_transition_to(Filled));
        assert!(Partial.can_transition_to(Cancelled));

        assert!(!Partial.can_transition_to(Pending));
        assert!(!Filled.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Pending));
        assert!(!Filled.can_transition_to(Partial));
    }

    #[test]
    fn test_boundary_serialization_is_uppercase() {
        assert_eq!(serde_json::to_string(&Side::Yes).unwrap(), "\"YES\"");
        assert_eq!(serde_json::to_string(&OrderType::Fok).unwrap(), "\"FOK\"");
        assert_eq!(
            serde_json::to_string(&OrderStatus::Cancelled).unwrap(),
            "\"CANCELLED\""
        );
    }
}
