pub mod delivery_staff;
pub mod menu_items;
pub mod notifications;
pub mod orders;
pub mod refunds;
pub mod rewards;
pub mod student_profiles;
pub mod transactions;
pub mod users;
pub mod vendor_profiles;
pub mod vendor_reviews;
pub mod vouchers;
pub mod wallets;

pub use delivery_staff::DeliveryStaff;
pub use menu_items::MenuItem;
pub use notifications::Notification;
pub use orders::Order;
pub use refunds::Refund;
pub use rewards::Reward;
pub use student_profiles::StudentProfile;
pub use transactions::Transaction;
pub use users::User;
pub use vendor_profiles::VendorProfile;
pub use vendor_reviews::VendorReview;
pub use vouchers::Voucher;
pub use wallets::Wallet;
