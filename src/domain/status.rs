use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

/// Caller roles as carried in the JWT `role` claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Student,
    Vendor,
    PendingVendor,
    DeliveryStaff,
    Rider,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Vendor => "vendor",
            Role::PendingVendor => "pending_vendor",
            Role::DeliveryStaff => "delivery_staff",
            Role::Rider => "rider",
            Role::Admin => "admin",
        }
    }

    /// Delivery staff and riders share the same transition authority.
    pub fn is_courier(&self) -> bool {
        matches!(self, Role::DeliveryStaff | Role::Rider)
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(Role::Student),
            "vendor" => Ok(Role::Vendor),
            "pending_vendor" => Ok(Role::PendingVendor),
            "delivery_staff" => Ok(Role::DeliveryStaff),
            "rider" => Ok(Role::Rider),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Internal (DB) order status vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    PendingConfirmation,
    Confirmed,
    PaymentProcessing,
    Preparing,
    ReadyForPickup,
    OnTheWay,
    ArrivingSoon,
    Delivered,
    Completed,
    RatingPending,
    Rejected,
}

/// Simplified status vocabulary shown to clients. The projection from
/// [`OrderStatus`] is exhaustive and monotonic: a later DB status never maps
/// to an earlier UI status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum UiStatus {
    Pending,
    Preparing,
    Ready,
    InProgress,
    Completed,
    Cancelled,
}

impl UiStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UiStatus::Pending => "pending",
            UiStatus::Preparing => "preparing",
            UiStatus::Ready => "ready",
            UiStatus::InProgress => "in_progress",
            UiStatus::Completed => "completed",
            UiStatus::Cancelled => "cancelled",
        }
    }

    /// The DB statuses that project onto this UI status, used by list
    /// endpoints that filter on the client vocabulary.
    pub fn db_statuses(&self) -> &'static [OrderStatus] {
        use OrderStatus::*;
        match self {
            UiStatus::Pending => &[PendingConfirmation, Confirmed, PaymentProcessing],
            UiStatus::Preparing => &[Preparing],
            UiStatus::Ready => &[ReadyForPickup],
            UiStatus::InProgress => &[OnTheWay, ArrivingSoon],
            UiStatus::Completed => &[Delivered, Completed, RatingPending],
            UiStatus::Cancelled => &[Rejected],
        }
    }

    /// Position along the forward lifecycle. Cancelled sits outside the
    /// forward chain and compares as terminal.
    pub fn rank(&self) -> u8 {
        match self {
            UiStatus::Pending => 0,
            UiStatus::Preparing => 1,
            UiStatus::Ready => 2,
            UiStatus::InProgress => 3,
            UiStatus::Completed => 4,
            UiStatus::Cancelled => 5,
        }
    }
}

impl FromStr for UiStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(UiStatus::Pending),
            "preparing" => Ok(UiStatus::Preparing),
            "ready" => Ok(UiStatus::Ready),
            "in_progress" | "in-progress" => Ok(UiStatus::InProgress),
            "completed" => Ok(UiStatus::Completed),
            "cancelled" => Ok(UiStatus::Cancelled),
            other => Err(format!("unknown ui status: {other}")),
        }
    }
}

impl fmt::Display for UiStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 11] = [
        OrderStatus::PendingConfirmation,
        OrderStatus::Confirmed,
        OrderStatus::PaymentProcessing,
        OrderStatus::Preparing,
        OrderStatus::ReadyForPickup,
        OrderStatus::OnTheWay,
        OrderStatus::ArrivingSoon,
        OrderStatus::Delivered,
        OrderStatus::Completed,
        OrderStatus::RatingPending,
        OrderStatus::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::PendingConfirmation => "PENDING_CONFIRMATION",
            OrderStatus::Confirmed => "CONFIRMED",
            OrderStatus::PaymentProcessing => "PAYMENT_PROCESSING",
            OrderStatus::Preparing => "PREPARING",
            OrderStatus::ReadyForPickup => "READY_FOR_PICKUP",
            OrderStatus::OnTheWay => "ON_THE_WAY",
            OrderStatus::ArrivingSoon => "ARRIVING_SOON",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Completed => "COMPLETED",
            OrderStatus::RatingPending => "RATING_PENDING",
            OrderStatus::Rejected => "REJECTED",
        }
    }

    /// The single canonical projection to the client vocabulary.
    pub fn ui_status(&self) -> UiStatus {
        match self {
            OrderStatus::PendingConfirmation
            | OrderStatus::Confirmed
            | OrderStatus::PaymentProcessing => UiStatus::Pending,
            OrderStatus::Preparing => UiStatus::Preparing,
            OrderStatus::ReadyForPickup => UiStatus::Ready,
            OrderStatus::OnTheWay | OrderStatus::ArrivingSoon => UiStatus::InProgress,
            OrderStatus::Delivered | OrderStatus::Completed | OrderStatus::RatingPending => {
                UiStatus::Completed
            }
            OrderStatus::Rejected => UiStatus::Cancelled,
        }
    }

    /// Position along the forward lifecycle, used to assert the UI
    /// projection is monotonic. Rejected is terminal from the early states.
    pub fn ordinal(&self) -> u8 {
        match self {
            OrderStatus::PendingConfirmation => 0,
            OrderStatus::Confirmed => 1,
            OrderStatus::PaymentProcessing => 2,
            OrderStatus::Preparing => 3,
            OrderStatus::ReadyForPickup => 4,
            OrderStatus::OnTheWay => 5,
            OrderStatus::ArrivingSoon => 6,
            OrderStatus::Delivered => 7,
            OrderStatus::Completed => 8,
            OrderStatus::RatingPending => 9,
            OrderStatus::Rejected => 10,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::RatingPending | OrderStatus::Rejected
        )
    }

    /// A delivered/completed order for refund purposes.
    pub fn is_delivered(&self) -> bool {
        matches!(
            self,
            OrderStatus::Delivered | OrderStatus::Completed | OrderStatus::RatingPending
        )
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING_CONFIRMATION" => Ok(OrderStatus::PendingConfirmation),
            "CONFIRMED" => Ok(OrderStatus::Confirmed),
            "PAYMENT_PROCESSING" => Ok(OrderStatus::PaymentProcessing),
            "PREPARING" => Ok(OrderStatus::Preparing),
            "READY_FOR_PICKUP" => Ok(OrderStatus::ReadyForPickup),
            "ON_THE_WAY" => Ok(OrderStatus::OnTheWay),
            "ARRIVING_SOON" => Ok(OrderStatus::ArrivingSoon),
            "DELIVERED" => Ok(OrderStatus::Delivered),
            "COMPLETED" => Ok(OrderStatus::Completed),
            "RATING_PENDING" => Ok(OrderStatus::RatingPending),
            "REJECTED" => Ok(OrderStatus::Rejected),
            other => Err(format!("unknown order status: {other}")),
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The authorized transition table. A `(current, role) -> next` request is
/// legal only if this returns true; every status write goes through it.
///
/// `staff_assigned` carries the delivery flag: once a courier is on the
/// order the vendor may not advance it past READY_FOR_PICKUP.
pub fn transition_allowed(
    role: Role,
    current: OrderStatus,
    next: OrderStatus,
    staff_assigned: bool,
) -> bool {
    use OrderStatus::*;

    match role {
        Role::Student => matches!(
            (current, next),
            (PendingConfirmation, Rejected)
                | (Delivered, RatingPending)
                | (Completed, RatingPending)
        ),
        Role::Vendor => match (current, next) {
            (PendingConfirmation, Confirmed)
            | (Confirmed, PaymentProcessing)
            | (PaymentProcessing, Preparing)
            | (Preparing, ReadyForPickup) => true,
            // Pickup orders are closed out by the vendor at the counter.
            (ReadyForPickup, Completed) => !staff_assigned,
            (PendingConfirmation, Rejected)
            | (Confirmed, Rejected)
            | (Preparing, Rejected)
            | (ReadyForPickup, Rejected) => true,
            _ => false,
        },
        Role::DeliveryStaff | Role::Rider => matches!(
            (current, next),
            (ReadyForPickup, OnTheWay)
                | (OnTheWay, ArrivingSoon)
                | (OnTheWay, Delivered)
                | (ArrivingSoon, Delivered)
                | (Delivered, Completed)
        ),
        Role::PendingVendor | Role::Admin => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use OrderStatus::*;

    #[test]
    fn test_every_status_has_exactly_one_projection() {
        // Exhaustive by construction (match), but make sure round-tripping
        // through strings keeps the projection stable.
        for status in OrderStatus::ALL {
            let parsed: OrderStatus = status.as_str().parse().unwrap();
            assert_eq!(parsed, status);
            assert_eq!(parsed.ui_status(), status.ui_status());
        }
    }

    #[test]
    fn test_projection_is_monotonic() {
        // Walking the forward chain must never map a later DB status to an
        // earlier UI status.
        let forward = [
            PendingConfirmation,
            Confirmed,
            PaymentProcessing,
            Preparing,
            ReadyForPickup,
            OnTheWay,
            ArrivingSoon,
            Delivered,
            Completed,
            RatingPending,
        ];
        for pair in forward.windows(2) {
            assert!(
                pair[1].ui_status().rank() >= pair[0].ui_status().rank(),
                "{} -> {} goes backwards in the UI projection",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn test_ui_filter_covers_every_db_status_once() {
        let mut seen = Vec::new();
        for ui in [
            UiStatus::Pending,
            UiStatus::Preparing,
            UiStatus::Ready,
            UiStatus::InProgress,
            UiStatus::Completed,
            UiStatus::Cancelled,
        ] {
            for db in ui.db_statuses() {
                assert_eq!(db.ui_status(), ui);
                seen.push(*db);
            }
        }
        assert_eq!(seen.len(), OrderStatus::ALL.len());
    }

    #[test]
    fn test_student_may_only_cancel_pending_orders() {
        assert!(transition_allowed(
            Role::Student,
            PendingConfirmation,
            Rejected,
            false
        ));
        assert!(!transition_allowed(Role::Student, Confirmed, Rejected, false));
        assert!(!transition_allowed(Role::Student, Preparing, Rejected, false));
        assert!(!transition_allowed(
            Role::Student,
            PendingConfirmation,
            Confirmed,
            false
        ));
    }

    #[test]
    fn test_vendor_forward_chain() {
        assert!(transition_allowed(
            Role::Vendor,
            PendingConfirmation,
            Confirmed,
            false
        ));
        assert!(transition_allowed(
            Role::Vendor,
            Confirmed,
            PaymentProcessing,
            false
        ));
        assert!(transition_allowed(
            Role::Vendor,
            PaymentProcessing,
            Preparing,
            false
        ));
        assert!(transition_allowed(
            Role::Vendor,
            Preparing,
            ReadyForPickup,
            false
        ));
        // No skipping.
        assert!(!transition_allowed(
            Role::Vendor,
            PendingConfirmation,
            Preparing,
            false
        ));
        // No backward transitions.
        assert!(!transition_allowed(
            Role::Vendor,
            Preparing,
            Confirmed,
            false
        ));
    }

    #[test]
    fn test_vendor_cannot_advance_past_ready_when_staff_assigned() {
        assert!(transition_allowed(
            Role::Vendor,
            ReadyForPickup,
            Completed,
            false
        ));
        assert!(!transition_allowed(
            Role::Vendor,
            ReadyForPickup,
            Completed,
            true
        ));
        assert!(!transition_allowed(
            Role::Vendor,
            ReadyForPickup,
            OnTheWay,
            true
        ));
        assert!(!transition_allowed(Role::Vendor, OnTheWay, Delivered, true));
    }

    #[test]
    fn test_courier_chain() {
        for role in [Role::DeliveryStaff, Role::Rider] {
            assert!(transition_allowed(role, ReadyForPickup, OnTheWay, true));
            assert!(transition_allowed(role, OnTheWay, ArrivingSoon, true));
            assert!(transition_allowed(role, OnTheWay, Delivered, true));
            assert!(transition_allowed(role, ArrivingSoon, Delivered, true));
            assert!(transition_allowed(role, Delivered, Completed, true));
            assert!(!transition_allowed(role, PendingConfirmation, OnTheWay, true));
            assert!(!transition_allowed(role, Delivered, OnTheWay, true));
        }
    }

    #[test]
    fn test_terminal_statuses_have_no_exits() {
        for role in [Role::Student, Role::Vendor, Role::DeliveryStaff, Role::Rider] {
            for next in OrderStatus::ALL {
                assert!(!transition_allowed(role, Rejected, next, false));
                assert!(!transition_allowed(role, RatingPending, next, false));
            }
        }
    }
}
