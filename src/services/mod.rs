pub mod admin_service;
pub mod auth_service;
pub mod menu_service;
pub mod notification_service;
pub mod order_service;
pub mod refund_service;
pub mod reward_service;
pub mod wallet_service;

#[cfg(test)]
pub(crate) mod test_support;

pub use admin_service::AdminService;
pub use auth_service::AuthService;
pub use menu_service::MenuService;
pub use notification_service::NotificationService;
pub use order_service::OrderService;
pub use refund_service::RefundService;
pub use reward_service::RewardService;
pub use wallet_service::WalletService;
