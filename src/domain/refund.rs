use crate::config::PolicyConfig;
use crate::domain::status::OrderStatus;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use utoipa::ToSchema;

/// Issue categories a customer can claim against an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RefundIssue {
    NotDelivered,
    Late,
    WrongItems,
    MissingItems,
    Quality,
    Cancelled,
}

impl FromStr for RefundIssue {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // The mobile clients have shipped several spellings over time.
        match s.to_ascii_uppercase().as_str() {
            "NOT_DELIVERED" | "ORDER_NOT_DELIVERED" | "NO_DELIVERY" => Ok(RefundIssue::NotDelivered),
            "LATE" | "DELIVERED_LATE" | "DELAY" => Ok(RefundIssue::Late),
            "WRONG_ITEMS" | "WRONG_ITEM" => Ok(RefundIssue::WrongItems),
            "MISSING_ITEMS" | "MISSING_ITEM" => Ok(RefundIssue::MissingItems),
            "QUALITY" | "FOOD_QUALITY" | "NOT_EDIBLE" => Ok(RefundIssue::Quality),
            "CANCELLED" | "CANCELED" => Ok(RefundIssue::Cancelled),
            other => Err(format!("unknown refund issue: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RefundType {
    Full,
    Partial,
    Voucher,
}

impl RefundType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefundType::Full => "full",
            RefundType::Partial => "partial",
            RefundType::Voucher => "voucher",
        }
    }
}

/// Who initiated a cancellation claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancellationInitiator {
    Vendor,
    Courier,
    Customer,
    Unknown,
}

impl CancellationInitiator {
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "restaurant" | "vendor" => CancellationInitiator::Vendor,
            "rider" | "delivery" | "staff" => CancellationInitiator::Courier,
            "customer" | "user" | "student" => CancellationInitiator::Customer,
            _ => CancellationInitiator::Unknown,
        }
    }
}

/// An order item line as denormalized onto the order row.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ClaimedItem {
    pub name: String,
    pub price: i64,
    pub quantity: i64,
}

#[derive(Debug, Clone)]
pub struct RefundInput {
    pub issue: RefundIssue,
    pub order_status: OrderStatus,
    /// Order total in centavos.
    pub order_total: i64,
    /// Item lines on the order (name, unit price, quantity).
    pub order_items: Vec<ClaimedItem>,
    /// Item names the customer claims were wrong/missing; empty means the
    /// whole order is claimed.
    pub claimed_item_names: Vec<String>,
    pub delay_minutes: i64,
    pub has_evidence: bool,
    pub initiator: CancellationInitiator,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct RefundDecision {
    /// Centavos to credit; zero when nothing is approved.
    pub approved_amount: i64,
    pub refund_type: RefundType,
    pub auto_approved: bool,
}

impl RefundDecision {
    fn none() -> Self {
        Self {
            approved_amount: 0,
            refund_type: RefundType::Partial,
            auto_approved: false,
        }
    }
}

/// Deterministic refund-eligibility rules. Persisting the audit record and
/// crediting the wallet are the caller's concern; this function only decides.
pub fn evaluate_refund(policy: &PolicyConfig, input: &RefundInput) -> RefundDecision {
    let total = input.order_total.max(0);

    match input.issue {
        RefundIssue::NotDelivered => {
            if input.order_status.is_delivered() {
                RefundDecision::none()
            } else {
                RefundDecision {
                    approved_amount: total,
                    refund_type: RefundType::Full,
                    auto_approved: true,
                }
            }
        }
        RefundIssue::Late => {
            if input.delay_minutes >= policy.late_full_minutes {
                RefundDecision {
                    approved_amount: total,
                    refund_type: RefundType::Full,
                    auto_approved: true,
                }
            } else if input.delay_minutes >= policy.late_partial_minutes {
                RefundDecision {
                    approved_amount: total * policy.late_partial_percent / 100,
                    refund_type: RefundType::Partial,
                    auto_approved: true,
                }
            } else if input.delay_minutes >= policy.late_review_minutes {
                // Logged for manual review as a voucher claim; nothing is
                // credited now.
                RefundDecision {
                    approved_amount: 0,
                    refund_type: RefundType::Voucher,
                    auto_approved: false,
                }
            } else {
                RefundDecision::none()
            }
        }
        RefundIssue::WrongItems | RefundIssue::MissingItems => {
            let names: Vec<String> = input
                .claimed_item_names
                .iter()
                .map(|n| n.trim().to_ascii_lowercase())
                .filter(|n| !n.is_empty())
                .collect();
            let mut amount: i64 = 0;
            for item in &input.order_items {
                let item_name = item.name.trim().to_ascii_lowercase();
                if names.is_empty() || names.contains(&item_name) {
                    amount += item.price.max(0) * item.quantity.max(1);
                }
            }
            let amount = amount.min(total);
            if amount > 0 {
                RefundDecision {
                    approved_amount: amount,
                    refund_type: RefundType::Partial,
                    auto_approved: true,
                }
            } else {
                RefundDecision::none()
            }
        }
        RefundIssue::Quality => {
            if input.has_evidence {
                RefundDecision {
                    approved_amount: total * policy.quality_percent / 100,
                    refund_type: RefundType::Partial,
                    auto_approved: true,
                }
            } else {
                RefundDecision::none()
            }
        }
        RefundIssue::Cancelled => match input.initiator {
            CancellationInitiator::Vendor | CancellationInitiator::Courier => RefundDecision {
                approved_amount: total,
                refund_type: RefundType::Full,
                auto_approved: true,
            },
            CancellationInitiator::Customer => {
                if matches!(
                    input.order_status,
                    OrderStatus::PendingConfirmation | OrderStatus::Confirmed
                ) {
                    RefundDecision {
                        approved_amount: total,
                        refund_type: RefundType::Full,
                        auto_approved: true,
                    }
                } else {
                    RefundDecision::none()
                }
            }
            CancellationInitiator::Unknown => RefundDecision::none(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(issue: RefundIssue, status: OrderStatus, total: i64) -> RefundInput {
        RefundInput {
            issue,
            order_status: status,
            order_total: total,
            order_items: vec![],
            claimed_item_names: vec![],
            delay_minutes: 0,
            has_evidence: false,
            initiator: CancellationInitiator::Unknown,
        }
    }

    #[test]
    fn test_not_delivered_full_refund_before_delivery() {
        let policy = PolicyConfig::default();
        let d = evaluate_refund(
            &policy,
            &input(RefundIssue::NotDelivered, OrderStatus::Preparing, 500_00),
        );
        assert_eq!(d.approved_amount, 500_00);
        assert_eq!(d.refund_type, RefundType::Full);
        assert!(d.auto_approved);
    }

    #[test]
    fn test_not_delivered_rejected_after_delivery() {
        let policy = PolicyConfig::default();
        for status in [
            OrderStatus::Delivered,
            OrderStatus::Completed,
            OrderStatus::RatingPending,
        ] {
            let d = evaluate_refund(&policy, &input(RefundIssue::NotDelivered, status, 500_00));
            assert_eq!(d.approved_amount, 0);
            assert!(!d.auto_approved);
        }
    }

    #[test]
    fn test_late_tiers() {
        let policy = PolicyConfig::default();
        let mut i = input(RefundIssue::Late, OrderStatus::Delivered, 500_00);

        i.delay_minutes = 75;
        let d = evaluate_refund(&policy, &i);
        assert_eq!((d.approved_amount, d.refund_type, d.auto_approved),
                   (500_00, RefundType::Full, true));

        i.delay_minutes = 40;
        let d = evaluate_refund(&policy, &i);
        assert_eq!((d.approved_amount, d.refund_type, d.auto_approved),
                   (150_00, RefundType::Partial, true));

        i.delay_minutes = 20;
        let d = evaluate_refund(&policy, &i);
        assert_eq!((d.approved_amount, d.refund_type, d.auto_approved),
                   (0, RefundType::Voucher, false));

        i.delay_minutes = 10;
        let d = evaluate_refund(&policy, &i);
        assert_eq!(d.approved_amount, 0);
        assert!(!d.auto_approved);
    }

    #[test]
    fn test_wrong_items_sums_claimed_lines_capped_at_total() {
        let policy = PolicyConfig::default();
        let mut i = input(RefundIssue::WrongItems, OrderStatus::Delivered, 300_00);
        i.order_items = vec![
            ClaimedItem { name: "Sisig Rice".into(), price: 120_00, quantity: 2 },
            ClaimedItem { name: "Iced Tea".into(), price: 40_00, quantity: 1 },
        ];
        i.claimed_item_names = vec!["sisig rice".into()];
        let d = evaluate_refund(&policy, &i);
        assert_eq!(d.approved_amount, 240_00);
        assert!(d.auto_approved);

        // Claiming everything is capped at the order total.
        i.claimed_item_names.clear();
        let d = evaluate_refund(&policy, &i);
        assert_eq!(d.approved_amount, 280_00);

        // No matching line -> nothing approved.
        i.claimed_item_names = vec!["halo-halo".into()];
        let d = evaluate_refund(&policy, &i);
        assert_eq!(d.approved_amount, 0);
        assert!(!d.auto_approved);
    }

    #[test]
    fn test_quality_requires_evidence() {
        let policy = PolicyConfig::default();
        let mut i = input(RefundIssue::Quality, OrderStatus::Delivered, 500_00);
        let d = evaluate_refund(&policy, &i);
        assert_eq!(d.approved_amount, 0);

        i.has_evidence = true;
        let d = evaluate_refund(&policy, &i);
        assert_eq!(d.approved_amount, 250_00);
        assert!(d.auto_approved);
    }

    #[test]
    fn test_cancelled_rules() {
        let policy = PolicyConfig::default();
        let mut i = input(RefundIssue::Cancelled, OrderStatus::Preparing, 500_00);

        i.initiator = CancellationInitiator::Vendor;
        assert!(evaluate_refund(&policy, &i).auto_approved);

        i.initiator = CancellationInitiator::Courier;
        assert_eq!(evaluate_refund(&policy, &i).approved_amount, 500_00);

        // Customer-initiated only refunds while the order is still early.
        i.initiator = CancellationInitiator::Customer;
        assert!(!evaluate_refund(&policy, &i).auto_approved);
        i.order_status = OrderStatus::Confirmed;
        assert!(evaluate_refund(&policy, &i).auto_approved);
        i.order_status = OrderStatus::PendingConfirmation;
        assert!(evaluate_refund(&policy, &i).auto_approved);
    }

    #[test]
    fn test_issue_aliases_parse() {
        assert_eq!("no_delivery".parse::<RefundIssue>().unwrap(), RefundIssue::NotDelivered);
        assert_eq!("DELIVERED_LATE".parse::<RefundIssue>().unwrap(), RefundIssue::Late);
        assert_eq!("canceled".parse::<RefundIssue>().unwrap(), RefundIssue::Cancelled);
        assert!("SOMETHING_ELSE".parse::<RefundIssue>().is_err());
    }
}
