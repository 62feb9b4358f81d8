pub mod refund;
pub mod status;

pub use refund::{
    evaluate_refund, CancellationInitiator, ClaimedItem, RefundDecision, RefundInput, RefundIssue,
    RefundType,
};
pub use status::{transition_allowed, OrderStatus, Role, UiStatus};
